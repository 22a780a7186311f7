use crate::chunks::{Bmhd, CHUNK_VDAT, COMPRESSION_BYTE_RUN1, COMPRESSION_NONE, COMPRESSION_VDAT, MASK_HAS_MASK};
use crate::image::FileType;
use crate::utils::cursor::Cursor;
use crate::utils::error::{IlbmError, IlbmResult};

/// The decoded BODY chunk: one byte per pixel for indexed images, three or
/// four bytes per pixel for 24/32-bit truecolor, plus the optional 1-bit
/// transparency mask (true = opaque).
#[derive(Debug, Clone, Default)]
pub struct BodyData {
    pub data: Vec<u8>,
    pub mask: Vec<bool>,
}

fn plane_len(width: u16) -> usize {
    // planes are padded to a whole number of 16-bit words
    (usize::from(width) + 15) / 16 * 2
}

fn channels(num_planes: u8) -> usize {
    match num_planes {
        24 => 3,
        32 => 4,
        _ => 1,
    }
}

impl BodyData {
    pub fn read(reader: &mut Cursor, file_type: FileType, bmhd: &Bmhd) -> IlbmResult<BodyData> {
        let num_planes = bmhd.num_planes;
        let plane_count_ok = matches!(num_planes, 1 | 4 | 8 | 24 | 32)
            || (file_type == FileType::Ilbm && num_planes >= 1 && num_planes <= 8);
        if !plane_count_ok {
            return Err(IlbmError::Unsupported(format!(
                "number of bit planes: {}",
                num_planes
            )));
        }

        let mut body = match bmhd.compression {
            COMPRESSION_NONE => Self::read_uncompressed(reader, file_type, bmhd),
            COMPRESSION_BYTE_RUN1 => Self::read_byte_run1(reader, file_type, bmhd),
            COMPRESSION_VDAT => Self::read_vdat(reader, bmhd),
            other => Err(IlbmError::Unsupported(format!("compression mode: {}", other))),
        }?;

        // VDAT never produces mask bits, and a truncated masked file may
        // produce too few; missing entries count as opaque.
        if bmhd.mask == MASK_HAS_MASK {
            let num_pixels = usize::from(bmhd.width) * usize::from(bmhd.height);
            if body.mask.len() < num_pixels {
                body.mask.resize(num_pixels, true);
            }
        }

        Ok(body)
    }

    fn read_uncompressed(reader: &mut Cursor, file_type: FileType, bmhd: &Bmhd) -> IlbmResult<BodyData> {
        let mut body = BodyData::default();
        let line_len = line_len(bmhd);

        for _ in 0..bmhd.height {
            let line = reader.read_bytes(line_len)?;
            decode_line(line, file_type, bmhd, &mut body);
        }

        Ok(body)
    }

    fn read_byte_run1(reader: &mut Cursor, file_type: FileType, bmhd: &Bmhd) -> IlbmResult<BodyData> {
        let mut body = BodyData::default();
        let line_len = line_len(bmhd);
        let mut line = vec![0u8; line_len];

        for _ in 0..bmhd.height {
            line.fill(0);
            let mut pos = 0;

            // bytes the command stream never produced stay zero
            while pos < line_len && !reader.is_empty() {
                let cmd = reader.read_u8()?;
                if cmd < 128 {
                    let count = usize::from(cmd) + 1;
                    if pos + count > line_len {
                        return Err(IlbmError::ParsingError(format!(
                            "ByteRun1 literal run overflows the row: {} + {} > {}",
                            pos, count, line_len
                        )));
                    }
                    line[pos..pos + count].copy_from_slice(reader.read_bytes(count)?);
                    pos += count;
                } else if cmd > 128 {
                    let count = 257 - usize::from(cmd);
                    if pos + count > line_len {
                        return Err(IlbmError::ParsingError(format!(
                            "ByteRun1 replicate run overflows the row: {} + {} > {}",
                            pos, count, line_len
                        )));
                    }
                    let value = reader.read_u8()?;
                    line[pos..pos + count].fill(value);
                    pos += count;
                }
                // 128 is a documented no-op
            }

            decode_line(&line, file_type, bmhd, &mut body);
        }

        Ok(body)
    }

    fn read_vdat(reader: &mut Cursor, bmhd: &Bmhd) -> IlbmResult<BodyData> {
        if bmhd.num_planes > 8 {
            return Err(IlbmError::Unsupported(format!(
                "VDAT compression with {} bit planes",
                bmhd.num_planes
            )));
        }

        let width = usize::from(bmhd.width);
        let height = usize::from(bmhd.height);
        let words_per_row = plane_len(bmhd.width) / 2;
        let mut data = vec![0u8; width * height];

        for plane in 0..bmhd.num_planes {
            let fourcc = reader.read_fourcc()?;
            if fourcc != CHUNK_VDAT {
                return Err(IlbmError::ParsingError(format!(
                    "expected a VDAT sub-chunk for plane {}, found {:?}",
                    plane, fourcc
                )));
            }

            let sub_len = reader.read_u32()? as usize;
            let mut sub = reader.sub_reader(sub_len);
            reader.seek_relative(sub_len + (sub_len & 1));

            decode_vdat_plane(&mut sub, plane, words_per_row, width, height, &mut data)?;
        }

        Ok(BodyData {
            data,
            mask: Vec::new(),
        })
    }
}

fn line_len(bmhd: &Bmhd) -> usize {
    let plane_len = plane_len(bmhd.width);
    let mut line_len = plane_len * usize::from(bmhd.num_planes);
    if bmhd.mask == MASK_HAS_MASK {
        line_len += plane_len;
    }
    line_len
}

/// Deinterleaves one assembled scanline into pixel values, and its trailing
/// mask plane into mask bits. Bits are MSB first throughout; PBM rows are
/// chunky instead of planar.
fn decode_line(line: &[u8], file_type: FileType, bmhd: &Bmhd, body: &mut BodyData) {
    let width = usize::from(bmhd.width);
    let plane_len = plane_len(bmhd.width);
    let num_planes = usize::from(bmhd.num_planes);

    match (file_type, bmhd.num_planes) {
        (FileType::Pbm, 1) => {
            for x in 0..width {
                body.data.push(line[x / 8] >> (7 - x % 8) & 1);
            }
        }
        (FileType::Pbm, 4) => {
            for x in 0..width {
                let byte = line[x / 2];
                body.data.push(if x % 2 == 0 { byte >> 4 } else { byte & 0xF });
            }
        }
        (FileType::Pbm, _) => {
            // 8, 24 and 32 bit PBM rows are already in pixel order
            body.data.extend_from_slice(&line[..width * channels(bmhd.num_planes)]);
        }
        (FileType::Ilbm, 24) | (FileType::Ilbm, 32) => {
            let num_channels = channels(bmhd.num_planes);
            for x in 0..width {
                let byte = x / 8;
                let shift = 7 - x % 8;
                for channel in 0..num_channels {
                    let mut value = 0u8;
                    for bit in 0..8 {
                        let plane = channel * 8 + bit;
                        value |= (line[plane_len * plane + byte] >> shift & 1) << bit;
                    }
                    body.data.push(value);
                }
            }
        }
        (FileType::Ilbm, _) => {
            for x in 0..width {
                let byte = x / 8;
                let shift = 7 - x % 8;
                let mut value = 0u8;
                for plane in 0..num_planes {
                    value |= (line[plane_len * plane + byte] >> shift & 1) << plane;
                }
                body.data.push(value);
            }
        }
    }

    if bmhd.mask == MASK_HAS_MASK {
        let mask_plane = &line[plane_len * num_planes..];
        for x in 0..width {
            body.mask.push(mask_plane[x / 8] >> (7 - x % 8) & 1 != 0);
        }
    }
}

/// Expands one plane's VDAT command stream and scatters the resulting word
/// columns into the pixel buffer. Words are column-major: all rows of word
/// column 0, then word column 1, and so on.
fn decode_vdat_plane(
    reader: &mut Cursor,
    plane: u8,
    words_per_row: usize,
    width: usize,
    height: usize,
    data: &mut [u8],
) -> IlbmResult<()> {
    let cnt = usize::from(reader.read_u16()?);
    if cnt < 2 {
        return Err(IlbmError::ParsingError(format!(
            "VDAT command count out of range: {}",
            cnt
        )));
    }

    let cmds = reader.read_bytes(cnt - 2)?;
    let total_words = words_per_row * height;
    let mut word_index = 0;

    let mut read_word = |reader: &mut Cursor| {
        reader
            .read_u16()
            .map_err(|_| IlbmError::ParsingError("VDAT data area overrun".to_string()))
    };

    let mut scatter = |word: u16, word_index: usize| {
        let column = word_index / height;
        let y = word_index % height;
        for bit in 0..16 {
            let x = column * 16 + bit;
            if x < width {
                data[y * width + x] |= ((word >> (15 - bit) & 1) as u8) << plane;
            }
        }
    };

    'commands: for &cmd in cmds {
        let cmd = cmd as i8;
        let (count, repeated) = match cmd {
            0 => (usize::from(read_word(reader)?), false),
            1 => (usize::from(read_word(reader)?), true),
            cmd if cmd < 0 => (cmd.unsigned_abs() as usize, false),
            cmd => (cmd as usize, true),
        };

        if repeated {
            let word = read_word(reader)?;
            for _ in 0..count {
                if word_index >= total_words {
                    break 'commands;
                }
                scatter(word, word_index);
                word_index += 1;
            }
        } else {
            for _ in 0..count {
                if word_index >= total_words {
                    break 'commands;
                }
                scatter(read_word(reader)?, word_index);
                word_index += 1;
            }
        }
    }

    Ok(())
}
