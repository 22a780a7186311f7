use serde::Serialize;

use crate::body::BodyData;
use crate::chunks::{
    Bmhd, Camg, Ccrt, Cmap, Crng, Ctbl, Dycp, Pchg, Sham, CHUNK_ANNO, CHUNK_AUTH, CHUNK_BMHD,
    CHUNK_BODY, CHUNK_CAMG, CHUNK_CCRT, CHUNK_CMAP, CHUNK_COPY, CHUNK_CRNG, CHUNK_CTBL, CHUNK_DYCP,
    CHUNK_NAME, CHUNK_PCHG, CHUNK_SHAM, FORM, FORM_ILBM, FORM_PBM,
};
use crate::log_warn;
use crate::palette::{Color, Cycle, Palette};
use crate::utils::cursor::Cursor;
use crate::utils::error::{IlbmError, IlbmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileType {
    Ilbm,
    Pbm,
}

/// Everything a single IFF file parsed into. Sub-records are filled in while
/// iterating the chunk list and, apart from the post-parse normalization in
/// [`IlbmImage::normalize`], never mutated afterwards.
#[derive(Debug, Default)]
pub struct IlbmImage {
    pub file_type: Option<FileType>,
    pub bmhd: Option<Bmhd>,
    pub camg: Option<Camg>,
    pub dycp: Option<Dycp>,
    pub body: Option<BodyData>,
    pub cmap: Option<Cmap>,
    pub ctbl: Option<Ctbl>,
    pub sham: Option<Sham>,
    pub pchg: Option<Pchg>,
    pub crngs: Vec<Crng>,
    pub ccrts: Vec<Ccrt>,
    pub name: Option<Vec<u8>>,
    pub auth: Option<Vec<u8>>,
    pub anno: Option<Vec<u8>>,
    pub copyright: Option<Vec<u8>>,
}

impl IlbmImage {
    /// FORM header plus a BMHD chunk; nothing smaller can be an image.
    pub const MIN_SIZE: u32 = Bmhd::SIZE + 12;

    /// Format sniffing over the first 12 bytes: container tag, a sane
    /// declared length, and one of the two recognized form types.
    pub fn can_read(data: &[u8]) -> bool {
        let mut reader = Cursor::new(data);
        let Ok(fourcc) = reader.read_fourcc() else {
            return false;
        };
        if fourcc != FORM {
            return false;
        }

        let Ok(main_len) = reader.read_u32() else {
            return false;
        };
        if main_len < IlbmImage::MIN_SIZE {
            return false;
        }

        match reader.read_fourcc() {
            Ok(form) => form == FORM_ILBM || form == FORM_PBM,
            Err(_) => false,
        }
    }

    /// Parses a whole file. Any chunk that fails to decode fails the parse.
    pub fn read(reader: &mut Cursor) -> IlbmResult<IlbmImage> {
        Self::read_with(reader, true)
    }

    /// Parses for browsing: a malformed optional chunk is logged and
    /// dropped instead of failing the file, so metadata of partially broken
    /// images is still available. A malformed BMHD or a truncated outer
    /// chunk list is still fatal.
    pub fn read_tolerant(reader: &mut Cursor) -> IlbmResult<IlbmImage> {
        Self::read_with(reader, false)
    }

    fn read_with(reader: &mut Cursor, strict: bool) -> IlbmResult<IlbmImage> {
        let fourcc = reader.read_fourcc()?;
        if fourcc != FORM {
            return Err(IlbmError::Unsupported(format!(
                "container tag: {}",
                String::from_utf8_lossy(&fourcc)
            )));
        }

        let main_len = reader.read_u32()?;
        if main_len < IlbmImage::MIN_SIZE {
            return Err(IlbmError::ParsingError(format!(
                "declared FORM length too small: {} < {}",
                main_len,
                IlbmImage::MIN_SIZE
            )));
        }

        let form_type = reader.read_fourcc()?;
        let file_type = if form_type == FORM_ILBM {
            FileType::Ilbm
        } else if form_type == FORM_PBM {
            FileType::Pbm
        } else {
            return Err(IlbmError::Unsupported(format!(
                "form type: {}",
                String::from_utf8_lossy(&form_type)
            )));
        };

        let mut image = IlbmImage {
            file_type: Some(file_type),
            ..IlbmImage::default()
        };

        // the declared length includes the form type we already consumed;
        // a lone trailing pad byte must not be read as a new chunk tag
        let mut main = reader.sub_reader(main_len as usize - 4);
        while main.remaining() >= 8 {
            let tag = main.read_fourcc()?;
            let chunk_len = main.read_u32()? as usize;
            let mut chunk = main.sub_reader(chunk_len);

            match image.read_chunk(tag, &mut chunk, file_type) {
                Ok(()) => {}
                Err(err) if !strict && tag != CHUNK_BMHD => {
                    log_warn!(
                        "skipping malformed {} chunk: {}",
                        String::from_utf8_lossy(&tag),
                        err
                    );
                }
                Err(err) => return Err(err),
            }

            // chunks are word aligned
            main.seek_relative(chunk_len + (chunk_len & 1));
        }

        image.normalize();

        Ok(image)
    }

    fn read_chunk(&mut self, tag: [u8; 4], chunk: &mut Cursor, file_type: FileType) -> IlbmResult<()> {
        match tag {
            CHUNK_BMHD => self.bmhd = Some(Bmhd::read(chunk)?),
            CHUNK_BODY => {
                let Some(bmhd) = &self.bmhd else {
                    // the decoder cannot know the dimensions yet
                    return Err(IlbmError::ParsingError(
                        "BODY chunk before BMHD".to_string(),
                    ));
                };
                self.body = Some(BodyData::read(chunk, file_type, bmhd)?);
            }
            CHUNK_CMAP => self.cmap = Some(Cmap::read(chunk)?),
            CHUNK_CAMG => self.camg = Some(Camg::read(chunk)?),
            CHUNK_CRNG => self.crngs.push(Crng::read(chunk)?),
            CHUNK_CCRT => self.ccrts.push(Ccrt::read(chunk)?),
            CHUNK_CTBL => self.ctbl = Some(Ctbl::read(chunk)?),
            CHUNK_SHAM => self.sham = Some(Sham::read(chunk)?),
            CHUNK_PCHG => self.pchg = Some(Pchg::read(chunk)?),
            CHUNK_DYCP => self.dycp = Some(Dycp::read(chunk)?),
            CHUNK_NAME => self.name = Some(chunk.read_to_end().to_vec()),
            CHUNK_AUTH => self.auth = Some(chunk.read_to_end().to_vec()),
            CHUNK_ANNO => self.anno = Some(chunk.read_to_end().to_vec()),
            CHUNK_COPY => self.copyright = Some(chunk.read_to_end().to_vec()),
            _ => {
                // unknown chunks are skipped for forward compatibility
            }
        }
        Ok(())
    }

    /// The one mutation step after the chunk loop: EHB palette synthesis,
    /// the HAM empty-palette guarantee and scanline table backfill.
    fn normalize(&mut self) {
        if let Some(camg) = self.camg {
            if camg.ehb() {
                let cmap = self.cmap.get_or_insert_with(Cmap::default);
                // only synthesize entries the file did not supply itself
                let supplied = cmap.colors.len();
                if supplied < 64 {
                    cmap.colors.resize(64, Color::default());
                    for index in supplied.max(32)..64 {
                        let color = cmap.colors[index - 32];
                        cmap.colors[index] =
                            Color::new(color.r >> 1, color.g >> 1, color.b >> 1);
                    }
                }
            }

            // HAM may reference palette entry 0 even when no CMAP was
            // present; make sure an (all black) palette exists
            if camg.ham() && self.cmap.is_none() {
                self.cmap = Some(Cmap::default());
            }
        }

        let height = usize::from(self.bmhd.map(|bmhd| bmhd.height).unwrap_or(0));
        let cmap = self.cmap.clone();
        if let Some(ctbl) = &mut self.ctbl {
            backfill_rows(&mut ctbl.palettes, cmap.as_ref(), height);
        }
        if let Some(sham) = &mut self.sham {
            backfill_rows(&mut sham.palettes, cmap.as_ref(), height);
        }
    }

    /// The validated cycle list, CRNG records first, then CCRT records.
    /// Nonsensical ranges have already been dropped.
    pub fn cycles(&self) -> Vec<Cycle> {
        let mut cycles = Vec::new();
        for crng in &self.crngs {
            if let Some(cycle) = crng.cycle() {
                cycles.push(cycle);
            }
        }
        for ccrt in &self.ccrts {
            if let Some(cycle) = ccrt.cycle() {
                cycles.push(cycle);
            }
        }
        cycles
    }

    /// The global palette expanded to a full 256-entry table.
    pub fn palette(&self) -> Option<Palette> {
        self.cmap.as_ref().map(|cmap| {
            let mut palette = Palette::default();
            for (index, color) in cmap.colors.iter().take(256).enumerate() {
                palette[index] = *color;
            }
            palette
        })
    }
}

/// Scanline palette tables must cover every scanline. Supplied rows only
/// carry 16 colors, so entries 16 and up are taken from the global palette;
/// missing rows repeat the global palette, or the last supplied row when
/// there is none.
fn backfill_rows(rows: &mut Vec<Palette>, cmap: Option<&Cmap>, height: usize) {
    if let Some(cmap) = cmap {
        for row in rows.iter_mut() {
            for (index, color) in cmap.colors.iter().take(256).enumerate().skip(16) {
                row[index] = *color;
            }
        }
    }

    if rows.len() >= height {
        return;
    }

    let filler = match cmap {
        Some(cmap) => {
            let mut row = Palette::default();
            for (index, color) in cmap.colors.iter().take(256).enumerate() {
                row[index] = *color;
            }
            row
        }
        None => rows.last().cloned().unwrap_or_default(),
    };

    rows.resize(height, filler);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::COMPRESSION_NONE;

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

    fn bmhd_payload(width: u16, height: u16, num_planes: u8) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&width.to_be_bytes());
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&0i16.to_be_bytes());
        payload.extend_from_slice(&0i16.to_be_bytes());
        payload.push(num_planes);
        payload.push(0); // mask
        payload.push(COMPRESSION_NONE);
        payload.push(0); // flags
        payload.extend_from_slice(&0u16.to_be_bytes());
        payload.push(0); // x aspect
        payload.push(0); // y aspect
        payload.extend_from_slice(&0i16.to_be_bytes());
        payload.extend_from_slice(&0i16.to_be_bytes());
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

    #[test]
    fn sniffing_needs_form_envelope_and_sane_length() {
        let file = form(b"ILBM", &[chunk(b"BMHD", &bmhd_payload(8, 1, 1))]);
        assert!(IlbmImage::can_read(&file));

        assert!(!IlbmImage::can_read(b"RIFF\x00\x00\x00\x20WAVE"));
        assert!(!IlbmImage::can_read(b"FORM\x00\x00\x00\x04AIFF"));
        // declared length smaller than a BMHD can ever be
        assert!(!IlbmImage::can_read(b"FORM\x00\x00\x00\x08ILBM"));
    }

    #[test]
    fn body_before_bmhd_is_a_parsing_error() {
        let file = form(
            b"ILBM",
            &[
                chunk(b"BODY", &[0, 0]),
                chunk(b"BMHD", &bmhd_payload(8, 1, 1)),
            ],
        );
        let mut reader = Cursor::new(&file);
        assert!(matches!(
            IlbmImage::read(&mut reader),
            Err(IlbmError::ParsingError(_))
        ));
    }

    #[test]
    fn unknown_chunks_and_odd_lengths_are_skipped() {
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd_payload(8, 1, 1)),
                chunk(b"XYZ!", &[1, 2, 3]), // odd length, padded
                chunk(b"BODY", &[0b1010_0000, 0]),
            ],
        );
        let mut reader = Cursor::new(&file);
        let image = IlbmImage::read(&mut reader).unwrap();

        assert_eq!(image.body.unwrap().data, vec![1, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn tolerant_mode_keeps_going_past_broken_optional_chunks() {
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd_payload(8, 1, 1)),
                chunk(b"CAMG", &[0, 0]), // truncated
                chunk(b"BODY", &[0b1111_0000, 0]),
            ],
        );

        let mut reader = Cursor::new(&file);
        assert!(IlbmImage::read(&mut reader).is_err());

        let mut reader = Cursor::new(&file);
        let image = IlbmImage::read_tolerant(&mut reader).unwrap();
        assert!(image.camg.is_none());
        assert!(image.body.is_some());
    }

    #[test]
    fn ehb_synthesizes_half_bright_upper_palette() {
        let mut cmap_payload = vec![0u8; 96];
        cmap_payload[0..3].copy_from_slice(&[200, 100, 50]);
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd_payload(8, 1, 6)),
                chunk(b"CMAP", &cmap_payload),
                chunk(b"CAMG", &Camg::EHB.to_be_bytes()),
            ],
        );

        let mut reader = Cursor::new(&file);
        let image = IlbmImage::read(&mut reader).unwrap();
        let cmap = image.cmap.unwrap();

        assert_eq!(cmap.colors.len(), 64);
        assert_eq!(cmap.colors[0], Color::new(200, 100, 50));
        assert_eq!(cmap.colors[32], Color::new(100, 50, 25));
    }

    #[test]
    fn ehb_keeps_upper_palette_entries_the_file_supplied() {
        let mut cmap_payload = vec![0u8; 192]; // full 64 colors
        cmap_payload[0..3].copy_from_slice(&[200, 100, 50]);
        cmap_payload[96..99].copy_from_slice(&[11, 22, 33]); // entry 32
        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd_payload(8, 1, 6)),
                chunk(b"CMAP", &cmap_payload),
                chunk(b"CAMG", &Camg::EHB.to_be_bytes()),
            ],
        );

        let mut reader = Cursor::new(&file);
        let image = IlbmImage::read(&mut reader).unwrap();
        let cmap = image.cmap.unwrap();

        assert_eq!(cmap.colors.len(), 64);
        assert_eq!(cmap.colors[32], Color::new(11, 22, 33));
    }

    #[test]
    fn scanline_tables_are_backfilled_to_image_height() {
        // 2 supplied rows against a height of 5, no global palette
        let mut ctbl_payload = Vec::new();
        for value in [0x0F00u16, 0x00F0] {
            for _ in 0..16 {
                ctbl_payload.extend_from_slice(&value.to_be_bytes());
            }
        }

        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd_payload(8, 5, 4)),
                chunk(b"CTBL", &ctbl_payload),
            ],
        );

        let mut reader = Cursor::new(&file);
        let image = IlbmImage::read(&mut reader).unwrap();
        let rows = image.ctbl.unwrap().palettes;

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0][0], Color::new(255, 0, 0));
        assert_eq!(rows[1][0], Color::new(0, 255, 0));
        // padded rows duplicate the last supplied row
        assert_eq!(rows[4][0], Color::new(0, 255, 0));
    }

    #[test]
    fn cycle_list_concatenates_crng_and_ccrt_sources() {
        let mut crng_payload = Vec::new();
        crng_payload.extend_from_slice(&0u16.to_be_bytes());
        crng_payload.extend_from_slice(&8192u16.to_be_bytes());
        crng_payload.extend_from_slice(&1u16.to_be_bytes());
        crng_payload.push(0);
        crng_payload.push(15);

        let mut ccrt_payload = Vec::new();
        ccrt_payload.extend_from_slice(&1i16.to_be_bytes());
        ccrt_payload.push(16);
        ccrt_payload.push(31);
        ccrt_payload.extend_from_slice(&1u32.to_be_bytes());
        ccrt_payload.extend_from_slice(&0u32.to_be_bytes());
        ccrt_payload.extend_from_slice(&0u16.to_be_bytes());

        let file = form(
            b"ILBM",
            &[
                chunk(b"BMHD", &bmhd_payload(8, 1, 5)),
                chunk(b"CRNG", &crng_payload),
                chunk(b"CCRT", &ccrt_payload),
            ],
        );

        let mut reader = Cursor::new(&file);
        let image = IlbmImage::read(&mut reader).unwrap();
        let cycles = image.cycles();

        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0], Cycle::new(0, 15, 8192, false));
        assert_eq!(cycles[1], Cycle::new(16, 31, 8903, true));
    }
}
