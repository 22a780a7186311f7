#[cfg(test)]
mod tests {
    use ilbm::chunks::{COMPRESSION_BYTE_RUN1, COMPRESSION_NONE, MASK_HAS_MASK};
    use ilbm::{Cursor, IlbmError, IlbmImage, PixelFormat, Renderer};

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(tag);
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(payload);
        if payload.len() % 2 != 0 {
            bytes.push(0);
        }
        bytes
    }

    fn bmhd(width: u16, height: u16, num_planes: u8, compression: u8, mask: u8) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&width.to_be_bytes());
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&0i16.to_be_bytes()); // x origin
        payload.extend_from_slice(&0i16.to_be_bytes()); // y origin
        payload.push(num_planes);
        payload.push(mask);
        payload.push(compression);
        payload.push(0); // flags
        payload.extend_from_slice(&0u16.to_be_bytes()); // transparent color
        payload.push(0); // x aspect
        payload.push(0); // y aspect
        payload.extend_from_slice(&0i16.to_be_bytes()); // page width
        payload.extend_from_slice(&0i16.to_be_bytes()); // page height
        payload
    }

    fn form(form_type: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
        let content_len: usize = 4 + chunks.iter().map(Vec::len).sum::<usize>();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"FORM");
        bytes.extend_from_slice(&(content_len as u32).to_be_bytes());
        bytes.extend_from_slice(form_type);
        for chunk in chunks {
            bytes.extend_from_slice(chunk);
        }
        bytes
    }

    fn black_white_cmap() -> Vec<u8> {
        vec![0, 0, 0, 255, 255, 255]
    }

    #[test]
    fn decodes_a_minimal_palette_image() {
        // 2x2, one plane, each row has only its leftmost pixel set
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd(2, 2, 1, COMPRESSION_NONE, 0)),
                chunk(b"CMAP", &black_white_cmap()),
                chunk(b"BODY", &[0b1000_0000, 0, 0b1000_0000, 0]),
            ],
        );

        let image = ilbm::decode(&file).unwrap();
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 2);
        assert_eq!(image.pixel_format(), PixelFormat::RGB8);
        assert_eq!(
            image.as_rgb8(),
            vec![255, 255, 255, 0, 0, 0, 255, 255, 255, 0, 0, 0]
        );
    }

    #[test]
    fn sniffs_only_iff_form_images() {
        let file = form(b"ILBM", &[chunk(b"BMHD", &bmhd(2, 2, 1, 0, 0))]);
        assert!(ilbm::can_decode(&file));

        let pbm = form(b"PBM ", &[chunk(b"BMHD", &bmhd(2, 2, 8, 0, 0))]);
        assert!(ilbm::can_decode(&pbm));

        assert!(!ilbm::can_decode(b"\x89PNG\r\n\x1a\n"));
        assert!(!ilbm::can_decode(b"FO"));
    }

    #[test]
    fn truncated_header_fails_the_parse() {
        let file = form(b"ILBM", &[chunk(b"BMHD", &[0, 2, 0, 2])]);
        assert!(ilbm::decode(&file).is_err());
    }

    #[test]
    fn truncated_body_is_an_io_error() {
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd(2, 2, 1, COMPRESSION_NONE, 0)),
                chunk(b"BODY", &[0b1000_0000, 0]), // one row missing
            ],
        );

        let mut reader = Cursor::new(&file);
        assert!(matches!(
            IlbmImage::read(&mut reader),
            Err(IlbmError::IoError(_))
        ));
    }

    #[test]
    fn byte_run1_compressed_body_round_trips() {
        // each row: replicate 0xF0 twice (257 - 255 = 2)
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd(16, 2, 1, COMPRESSION_BYTE_RUN1, 0)),
                chunk(b"CMAP", &black_white_cmap()),
                chunk(b"BODY", &[255, 0xF0, 255, 0xF0]),
            ],
        );

        let image = ilbm::decode(&file).unwrap();
        let pixels = image.as_rgb8();
        // 0xF0 repeats per byte: the top four pixels of each group of
        // eight are white, the bottom four black
        for row in 0..2 {
            for x in 0..16 {
                let offset = (row * 16 + x) * 3;
                let expected = if x % 8 < 4 { 255 } else { 0 };
                assert_eq!(&pixels[offset..offset + 3], &[expected; 3]);
            }
        }
    }

    #[test]
    fn pbm_files_decode_chunky_rows() {
        let mut body = vec![0u8; 16];
        body[..3].copy_from_slice(&[0, 1, 1]);
        let file = form(
            b"PBM ",
            &[
                chunk(b"BMHD", &bmhd(3, 1, 8, COMPRESSION_NONE, 0)),
                chunk(b"CMAP", &black_white_cmap()),
                chunk(b"BODY", &body),
            ],
        );

        let image = ilbm::decode(&file).unwrap();
        assert_eq!(image.as_rgb8(), vec![0, 0, 0, 255, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn masked_images_render_with_alpha() {
        // one plane plus a mask plane per row; second pixel transparent
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd(2, 1, 1, COMPRESSION_NONE, MASK_HAS_MASK)),
                chunk(b"CMAP", &black_white_cmap()),
                chunk(b"BODY", &[0b1100_0000, 0, 0b1000_0000, 0]),
            ],
        );

        let image = ilbm::decode(&file).unwrap();
        assert_eq!(image.pixel_format(), PixelFormat::RGBA8);
        assert_eq!(
            image.as_rgba8(),
            vec![255, 255, 255, 255, 255, 255, 255, 0]
        );
    }

    #[test]
    fn color_cycling_animates_over_time() {
        let mut crng = Vec::new();
        crng.extend_from_slice(&0u16.to_be_bytes()); // padding
        crng.extend_from_slice(&280u16.to_be_bytes()); // one step per second
        crng.extend_from_slice(&1u16.to_be_bytes()); // active
        crng.push(0);
        crng.push(1);

        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd(2, 1, 1, COMPRESSION_NONE, 0)),
                chunk(b"CMAP", &black_white_cmap()),
                chunk(b"CRNG", &crng),
                chunk(b"BODY", &[0b1000_0000, 0]),
            ],
        );

        let mut reader = Cursor::new(&file);
        let parsed = IlbmImage::read(&mut reader).unwrap();
        let renderer = Renderer::new(&parsed);
        assert!(renderer.is_animated());

        let mut pixels = vec![0u8; 6];
        renderer.render(&mut pixels, 6, 0.0, false);
        assert_eq!(pixels, vec![255, 255, 255, 0, 0, 0]);

        // one second in, the two palette entries have swapped
        renderer.render(&mut pixels, 6, 1.0, false);
        assert_eq!(pixels, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn hold_and_modify_end_to_end() {
        // 6 planes, HAM: first pixel looks up entry 0, second modifies blue
        let mut planes = vec![0u8; 12];
        // pixel 0 code 0b000000, pixel 1 code 0b011111:
        // plane bits for pixel 1 (x=1): planes 0..3 set (payload 0xF), plane 4 set (mode 1)
        for plane in 0..5 {
            planes[plane * 2] = 0b0100_0000;
        }
        let mut chunks = vec![
            chunk(b"BMHD", &bmhd(2, 1, 6, COMPRESSION_NONE, 0)),
            chunk(b"CMAP", &[10, 20, 30]),
        ];
        chunks.push(chunk(b"CAMG", &0x800u32.to_be_bytes()));
        chunks.push(chunk(b"BODY", &planes));
        let file = form(b"ILBM", &chunks);

        let image = ilbm::decode(&file).unwrap();
        let pixels = image.as_rgb8();
        assert_eq!(&pixels[0..3], &[10, 20, 30]);
        // blue := 0xF0 | (30 & 0x0F) = 0xFE, red and green held
        assert_eq!(&pixels[3..6], &[10, 20, 0xFE]);
    }

    #[test]
    fn palette_only_files_become_a_preview_raster() {
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd(0, 0, 5, COMPRESSION_NONE, 0)),
                chunk(b"CMAP", &black_white_cmap()),
            ],
        );

        let image = ilbm::decode(&file).unwrap();
        assert_eq!(image.width(), 128);
        assert_eq!(image.height(), 128);

        // swatch (1, 0) is palette entry 1, white
        let pixels = image.as_rgb8();
        let offset = 8 * 3;
        assert_eq!(&pixels[offset..offset + 3], &[255, 255, 255]);
    }

    #[test]
    fn info_surfaces_text_chunks_and_modes() {
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd(4, 4, 6, COMPRESSION_NONE, 0)),
                chunk(b"CAMG", &0x804u32.to_be_bytes()), // HAM | LACE
                chunk(b"NAME", b"Venus"),
                chunk(b"AUTH", b"J\xF8rgen"), // Latin-1
                chunk(b"DYCP", &[0, 0, 0, 1, 0, 0, 0, 2]),
            ],
        );

        let info = ilbm::info(&file).unwrap();
        assert_eq!(info.width, 4);
        assert_eq!(info.height, 4);
        assert!(info.hold_and_modify);
        assert!(info.interlaced);
        assert!(!info.extra_half_bright);
        assert_eq!(info.name.as_deref(), Some("Venus"));
        assert_eq!(info.author.as_deref(), Some("Jørgen"));
        assert!(!info.is_animated);

        let dycp = info.dycp.unwrap();
        assert_eq!((dycp.value1, dycp.value2), (1, 2));
    }

    #[test]
    fn unsupported_form_types_are_rejected() {
        let file = form(b"AIFF", &[chunk(b"BMHD", &bmhd(2, 2, 1, 0, 0))]);
        let mut reader = Cursor::new(&file);
        assert!(matches!(
            IlbmImage::read(&mut reader),
            Err(IlbmError::Unsupported(_))
        ));
    }
}
