use serde::Serialize;

use crate::log_warn;
use crate::palette::{Color, Cycle, Palette};
use crate::utils::cursor::Cursor;
use crate::utils::error::{IlbmError, IlbmResult};

pub const FORM: [u8; 4] = *b"FORM";
pub const FORM_ILBM: [u8; 4] = *b"ILBM";
pub const FORM_PBM: [u8; 4] = *b"PBM ";

pub const CHUNK_BMHD: [u8; 4] = *b"BMHD";
pub const CHUNK_BODY: [u8; 4] = *b"BODY";
pub const CHUNK_CMAP: [u8; 4] = *b"CMAP";
pub const CHUNK_CAMG: [u8; 4] = *b"CAMG";
pub const CHUNK_CRNG: [u8; 4] = *b"CRNG";
pub const CHUNK_CCRT: [u8; 4] = *b"CCRT";
pub const CHUNK_CTBL: [u8; 4] = *b"CTBL";
pub const CHUNK_SHAM: [u8; 4] = *b"SHAM";
pub const CHUNK_PCHG: [u8; 4] = *b"PCHG";
pub const CHUNK_DYCP: [u8; 4] = *b"DYCP";
pub const CHUNK_VDAT: [u8; 4] = *b"VDAT";
pub const CHUNK_NAME: [u8; 4] = *b"NAME";
pub const CHUNK_AUTH: [u8; 4] = *b"AUTH";
pub const CHUNK_ANNO: [u8; 4] = *b"ANNO";
pub const CHUNK_COPY: [u8; 4] = *b"(c) ";

/// BMHD, the bitmap header. Width and height are fixed once read and drive
/// the expected size of every later chunk.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Bmhd {
    pub width: u16,
    pub height: u16,
    pub x_origin: i16,
    pub y_origin: i16,
    pub num_planes: u8,
    pub mask: u8,
    pub compression: u8,
    pub flags: u8,
    pub trans_color: u16,
    pub x_aspect: u8,
    pub y_aspect: u8,
    pub page_width: i16,
    pub page_height: i16,
}

pub const MASK_NONE: u8 = 0;
pub const MASK_HAS_MASK: u8 = 1;
pub const MASK_HAS_TRANSPARENT_COLOR: u8 = 2;
pub const MASK_LASSO: u8 = 3;

pub const COMPRESSION_NONE: u8 = 0;
pub const COMPRESSION_BYTE_RUN1: u8 = 1;
pub const COMPRESSION_VDAT: u8 = 2;

impl Bmhd {
    pub const SIZE: u32 = 20;

    pub fn read(reader: &mut Cursor) -> IlbmResult<Bmhd> {
        if reader.remaining() < Bmhd::SIZE as usize {
            return Err(IlbmError::ParsingError(format!(
                "truncated BMHD chunk: {} < {}",
                reader.remaining(),
                Bmhd::SIZE
            )));
        }

        Ok(Bmhd {
            width: reader.read_u16()?,
            height: reader.read_u16()?,
            x_origin: reader.read_i16()?,
            y_origin: reader.read_i16()?,
            num_planes: reader.read_u8()?,
            mask: reader.read_u8()?,
            compression: reader.read_u8()?,
            flags: reader.read_u8()?,
            trans_color: reader.read_u16()?,
            x_aspect: reader.read_u8()?,
            y_aspect: reader.read_u8()?,
            page_width: reader.read_i16()?,
            page_height: reader.read_i16()?,
        })
    }
}

/// CAMG, the Amiga viewport mode flags.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Camg {
    pub viewport_mode: u32,
}

impl Camg {
    pub const SIZE: u32 = 4;

    pub const LACE: u32 = 0x4;
    pub const EHB: u32 = 0x80;
    pub const HAM: u32 = 0x800;
    pub const HIRES: u32 = 0x8000;

    pub fn read(reader: &mut Cursor) -> IlbmResult<Camg> {
        if reader.remaining() < Camg::SIZE as usize {
            return Err(IlbmError::ParsingError(format!(
                "truncated CAMG chunk: {} < {}",
                reader.remaining(),
                Camg::SIZE
            )));
        }

        Ok(Camg {
            viewport_mode: reader.read_u32()?,
        })
    }

    pub fn lace(&self) -> bool {
        self.viewport_mode & Camg::LACE != 0
    }

    pub fn ehb(&self) -> bool {
        self.viewport_mode & Camg::EHB != 0
    }

    pub fn ham(&self) -> bool {
        self.viewport_mode & Camg::HAM != 0
    }
}

/// CMAP, the global palette: a run of 3-byte RGB triples.
#[derive(Debug, Clone, Default)]
pub struct Cmap {
    pub colors: Vec<Color>,
}

impl Cmap {
    pub fn read(reader: &mut Cursor) -> IlbmResult<Cmap> {
        let num_colors = reader.remaining() / 3;
        let mut colors = Vec::with_capacity(num_colors.min(256));

        for _ in 0..num_colors {
            let rgb = reader.read_bytes(3)?;
            colors.push(Color::new(rgb[0], rgb[1], rgb[2]));
        }

        Ok(Cmap { colors })
    }
}

/// CRNG, the DPaint color cycling range. The rate is expressed directly;
/// bit 0 of the flags enables the range and bit 1 reverses its direction.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Crng {
    pub rate: u16,
    pub flags: u16,
    pub low: u8,
    pub high: u8,
}

impl Crng {
    pub const SIZE: u32 = 8;

    pub fn read(reader: &mut Cursor) -> IlbmResult<Crng> {
        if reader.remaining() < Crng::SIZE as usize {
            return Err(IlbmError::ParsingError(format!(
                "truncated CRNG chunk: {} < {}",
                reader.remaining(),
                Crng::SIZE
            )));
        }

        let _padding = reader.read_u16()?;
        Ok(Crng {
            rate: reader.read_u16()?,
            flags: reader.read_u16()?,
            low: reader.read_u8()?,
            high: reader.read_u8()?,
        })
    }

    /// Converts to a renderable cycle, dropping inactive or nonsensical
    /// ranges. A dropped range is not an error; the image still renders as
    /// a static frame.
    pub fn cycle(&self) -> Option<Cycle> {
        if self.low >= self.high || self.rate == 0 {
            return None;
        }

        if self.flags & 1 != 0 {
            if self.flags > 3 {
                log_warn!("unsupported CRNG flags: {:#x}", self.flags);
            }
            Some(Cycle::new(self.low, self.high, u32::from(self.rate), self.flags & 2 != 0))
        } else {
            if self.flags != 0 {
                log_warn!("unsupported CRNG flags: {:#x}", self.flags);
            }
            None
        }
    }
}

/// CCRT, the Graphicraft cycling range. Expresses a delay per step in
/// seconds and microseconds instead of a rate.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Ccrt {
    pub direction: i16,
    pub low: u8,
    pub high: u8,
    pub delay_sec: u32,
    pub delay_usec: u32,
}

impl Ccrt {
    pub const SIZE: u32 = 14;

    pub fn read(reader: &mut Cursor) -> IlbmResult<Ccrt> {
        if reader.remaining() < Ccrt::SIZE as usize {
            return Err(IlbmError::ParsingError(format!(
                "truncated CCRT chunk: {} < {}",
                reader.remaining(),
                Ccrt::SIZE
            )));
        }

        let direction = reader.read_i16()?;
        if !(-1..=1).contains(&direction) {
            return Err(IlbmError::ParsingError(format!(
                "invalid CCRT direction: {}",
                direction
            )));
        }

        Ok(Ccrt {
            direction,
            low: reader.read_u8()?,
            high: reader.read_u8()?,
            delay_sec: reader.read_u32()?,
            delay_usec: reader.read_u32()?,
        })
    }

    pub fn cycle(&self) -> Option<Cycle> {
        if self.direction == 0 || self.low >= self.high {
            return None;
        }

        let usec = u64::from(self.delay_sec) * 1_000_000 + u64::from(self.delay_usec);
        let rate = usec * 8903 / 1_000_000;
        if rate == 0 {
            return None;
        }

        Some(Cycle::new(self.low, self.high, rate as u32, self.direction > 0))
    }
}

/// DYCP. Its two longwords are of unknown meaning; the chunk is kept so its
/// presence can be surfaced in metadata.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Dycp {
    pub value1: u32,
    pub value2: u32,
}

impl Dycp {
    pub const SIZE: u32 = 8;

    pub fn read(reader: &mut Cursor) -> IlbmResult<Dycp> {
        if reader.remaining() < Dycp::SIZE as usize {
            return Err(IlbmError::ParsingError(format!(
                "truncated DYCP chunk: {} < {}",
                reader.remaining(),
                Dycp::SIZE
            )));
        }

        Ok(Dycp {
            value1: reader.read_u32()?,
            value2: reader.read_u32()?,
        })
    }
}

fn read_palette_row(reader: &mut Cursor) -> IlbmResult<Palette> {
    let mut row = Palette::default();
    for index in 0..16 {
        let value = reader.read_u16()?;
        row[index] = Color::from_rgb4((value >> 8) as u8, (value >> 4) as u8, value as u8);
    }
    Ok(row)
}

/// CTBL, a palette per scanline: rows of 16 packed 12-bit colors.
#[derive(Debug, Clone, Default)]
pub struct Ctbl {
    pub palettes: Vec<Palette>,
}

impl Ctbl {
    pub fn read(reader: &mut Cursor) -> IlbmResult<Ctbl> {
        let num_rows = reader.remaining() / 32;
        let mut palettes = Vec::with_capacity(num_rows);
        for _ in 0..num_rows {
            palettes.push(read_palette_row(reader)?);
        }
        Ok(Ctbl { palettes })
    }
}

/// SHAM, the "sliced HAM" variant of CTBL: a version word, then rows of 16
/// packed 12-bit colors.
#[derive(Debug, Clone, Default)]
pub struct Sham {
    pub version: u16,
    pub palettes: Vec<Palette>,
}

impl Sham {
    pub fn read(reader: &mut Cursor) -> IlbmResult<Sham> {
        let version = reader.read_u16()?;
        let num_rows = reader.remaining() / 32;
        let mut palettes = Vec::with_capacity(num_rows);
        for _ in 0..num_rows {
            palettes.push(read_palette_row(reader)?);
        }
        Ok(Sham { version, palettes })
    }
}

/// A single palette register write from a PCHG line record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterChange {
    pub register: u16,
    pub color: Color,
}

/// PCHG, sparse per-line palette patches, optionally Huffman compressed.
///
/// `changes` holds one entry per line in `start_line..start_line +
/// line_count`; lines whose bit in the chunk's line mask was clear get an
/// empty list.
#[derive(Debug, Clone, Default)]
pub struct Pchg {
    pub start_line: i16,
    pub line_count: u16,
    pub min_reg: u16,
    pub max_reg: u16,
    pub changes: Vec<Vec<RegisterChange>>,
}

impl Pchg {
    pub const COMPRESSION_NONE: u16 = 0;
    pub const COMPRESSION_HUFFMAN: u16 = 1;

    pub const FLAG_12BIT: u16 = 1;
    pub const FLAG_32BIT: u16 = 2;

    // keeps a hostile PCHG chunk from requesting a gigantic allocation
    const MAX_DECOMPRESSED_SIZE: u32 = 16 * 1024 * 1024;

    pub fn read(reader: &mut Cursor) -> IlbmResult<Pchg> {
        let compression = reader.read_u16()?;
        let flags = reader.read_u16()?;
        let start_line = reader.read_i16()?;
        let line_count = reader.read_u16()?;
        let _changed_lines = reader.read_u16()?;
        let min_reg = reader.read_u16()?;
        let max_reg = reader.read_u16()?;
        let _max_changes = reader.read_u16()?;
        let _total_changes = reader.read_u32()?;

        if min_reg > max_reg {
            return Err(IlbmError::ParsingError(format!(
                "PCHG register range is inverted: {} > {}",
                min_reg, max_reg
            )));
        }

        let big_changes = flags & Pchg::FLAG_32BIT != 0;
        if !big_changes && flags & Pchg::FLAG_12BIT == 0 {
            return Err(IlbmError::Unsupported(format!(
                "PCHG without a known line format, flags: {:#x}",
                flags
            )));
        }

        let decompressed;
        let line_data = match compression {
            Pchg::COMPRESSION_NONE => reader.read_to_end(),
            Pchg::COMPRESSION_HUFFMAN => {
                let comp_info_size = reader.read_u32()?;
                let original_size = reader.read_u32()?;
                if original_size > Pchg::MAX_DECOMPRESSED_SIZE {
                    return Err(IlbmError::ParsingError(format!(
                        "PCHG decompressed size out of range: {}",
                        original_size
                    )));
                }

                let tree_bytes = reader.read_bytes(comp_info_size as usize)?;
                let tree: Vec<i16> = tree_bytes
                    .chunks_exact(2)
                    .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
                    .collect();

                decompressed = huffman_decompress(&tree, reader.read_to_end(), original_size as usize)?;
                &decompressed[..]
            }
            other => {
                return Err(IlbmError::Unsupported(format!(
                    "PCHG compression id: {}",
                    other
                )));
            }
        };

        let mut data = Cursor::new(line_data);

        // one bit per line, MSB first, packed into big-endian longwords
        let mask_words = (usize::from(line_count) + 31) / 32;
        let mut line_mask = Vec::with_capacity(mask_words);
        for _ in 0..mask_words {
            line_mask.push(data.read_u32()?);
        }

        let mut changes = Vec::with_capacity(usize::from(line_count));
        for line in 0..usize::from(line_count) {
            let flagged = line_mask[line / 32] & (0x8000_0000 >> (line % 32)) != 0;
            if !flagged {
                changes.push(Vec::new());
                continue;
            }

            let line_changes = if big_changes {
                read_big_line_changes(&mut data, min_reg, max_reg)?
            } else {
                read_small_line_changes(&mut data, min_reg, max_reg)?
            };
            changes.push(line_changes);
        }

        Ok(Pchg {
            start_line,
            line_count,
            min_reg,
            max_reg,
            changes,
        })
    }
}

fn keep_change(changes: &mut Vec<RegisterChange>, register: u16, color: Color, min_reg: u16, max_reg: u16) {
    if register < min_reg || register > max_reg {
        log_warn!(
            "dropping PCHG change for register {} outside {}..={}",
            register,
            min_reg,
            max_reg
        );
        return;
    }
    changes.push(RegisterChange { register, color });
}

fn read_small_line_changes(data: &mut Cursor, min_reg: u16, max_reg: u16) -> IlbmResult<Vec<RegisterChange>> {
    let count16 = data.read_u8()?;
    let count32 = data.read_u8()?;
    let mut changes = Vec::with_capacity(usize::from(count16) + usize::from(count32));

    for bank in 0..2u16 {
        let count = if bank == 0 { count16 } else { count32 };
        for _ in 0..count {
            let entry = data.read_u16()?;
            let register = (entry >> 12) + bank * 16;
            let color = Color::from_rgb4((entry >> 8) as u8, (entry >> 4) as u8, entry as u8);
            keep_change(&mut changes, register, color, min_reg, max_reg);
        }
    }

    Ok(changes)
}

fn read_big_line_changes(data: &mut Cursor, min_reg: u16, max_reg: u16) -> IlbmResult<Vec<RegisterChange>> {
    let count = data.read_u16()?;
    let mut changes = Vec::with_capacity(usize::from(count));

    for _ in 0..count {
        let register = data.read_u16()?;
        if register >= 256 {
            return Err(IlbmError::Unsupported(format!(
                "PCHG 32-bit change for register {}",
                register
            )));
        }

        // the channel order really is A, R, B, G; the PCHG spec documents
        // it as "ARBG, not ARGB"
        let _alpha = data.read_u8()?;
        let r = data.read_u8()?;
        let b = data.read_u8()?;
        let g = data.read_u8()?;
        keep_change(&mut changes, register, Color::new(r, g, b), min_reg, max_reg);
    }

    Ok(changes)
}

/// PCHG Huffman decompression. The tree is an array of 16-bit nodes walked
/// from its last entry: a set input bit either emits the current node's low
/// byte (non-negative node) or jumps backwards by `-node / 2` entries; a
/// clear bit steps back one entry and emits only if bit 8 of the node is
/// set. Every position update is range-checked, an escape from the tree is
/// a parsing error.
fn huffman_decompress(tree: &[i16], src: &[u8], output_size: usize) -> IlbmResult<Vec<u8>> {
    if tree.is_empty() {
        return Err(IlbmError::ParsingError("empty PCHG Huffman tree".to_string()));
    }

    let root = tree.len() - 1;
    let mut pos = root;
    let mut output = Vec::with_capacity(output_size);
    let mut bytes = src.iter();

    while output.len() < output_size {
        let Some(&byte) = bytes.next() else {
            return Err(IlbmError::ParsingError(
                "truncated PCHG Huffman stream".to_string(),
            ));
        };

        for bit in (0..8).rev() {
            if byte & (1 << bit) != 0 {
                let value = tree[pos];
                if value >= 0 {
                    output.push(value as u8);
                    pos = root;
                } else {
                    let back = usize::from((value / 2).unsigned_abs());
                    pos = pos.checked_sub(back).ok_or_else(|| {
                        IlbmError::ParsingError("PCHG Huffman tree escape".to_string())
                    })?;
                }
            } else {
                pos = pos.checked_sub(1).ok_or_else(|| {
                    IlbmError::ParsingError("PCHG Huffman tree escape".to_string())
                })?;
                let value = tree[pos];
                if value >= 0 && value & 0x100 != 0 {
                    output.push(value as u8);
                    pos = root;
                }
            }

            if output.len() >= output_size {
                break;
            }
        }
    }

    Ok(output)
}
