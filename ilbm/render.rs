use std::ops::RangeInclusive;

use crate::body::BodyData;
use crate::chunks::MASK_HAS_MASK;
use crate::image::IlbmImage;
use crate::log_warn;
use crate::palette::{Color, Cycle, Palette};
use crate::utils::image::{ImageFrame, PixelData, PixelFormat};

// generated as round(i * 255 / ((1 << bits) - 1)) per bit depth
static GRAY_1BIT: [u8; 2] = [0, 255];
static GRAY_2BITS: [u8; 4] = [0, 85, 170, 255];
static GRAY_3BITS: [u8; 8] = [0, 36, 73, 109, 146, 182, 219, 255];
static GRAY_4BITS: [u8; 16] = [
    0, 17, 34, 51, 68, 85, 102, 119, 136, 153, 170, 187, 204, 221, 238, 255,
];
static GRAY_5BITS: [u8; 32] = [
    0, 8, 16, 25, 33, 41, 49, 58, 66, 74, 82, 90, 99, 107, 115, 123, 132, 140, 148, 156, 165, 173,
    181, 189, 197, 206, 214, 222, 230, 239, 247, 255,
];
static GRAY_6BITS: [u8; 64] = [
    0, 4, 8, 12, 16, 20, 24, 28, 32, 36, 40, 45, 49, 53, 57, 61, 65, 69, 73, 77, 81, 85, 89, 93,
    97, 101, 105, 109, 113, 117, 121, 125, 130, 134, 138, 142, 146, 150, 154, 158, 162, 166, 170,
    174, 178, 182, 186, 190, 194, 198, 202, 206, 210, 215, 219, 223, 227, 231, 235, 239, 243, 247,
    251, 255,
];
static GRAY_7BITS: [u8; 128] = [
    0, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24, 26, 28, 30, 32, 34, 36, 38, 40, 42, 44, 46, 48,
    50, 52, 54, 56, 58, 60, 62, 64, 66, 68, 70, 72, 74, 76, 78, 80, 82, 84, 86, 88, 90, 92, 94,
    96, 98, 100, 102, 104, 106, 108, 110, 112, 114, 116, 118, 120, 122, 124, 126, 129, 131, 133,
    135, 137, 139, 141, 143, 145, 147, 149, 151, 153, 155, 157, 159, 161, 163, 165, 167, 169, 171,
    173, 175, 177, 179, 181, 183, 185, 187, 189, 191, 193, 195, 197, 199, 201, 203, 205, 207, 209,
    211, 213, 215, 217, 219, 221, 223, 225, 227, 229, 231, 233, 235, 237, 239, 241, 243, 245, 247,
    249, 251, 253, 255,
];

fn gray_lookup(num_planes: u8) -> &'static [u8] {
    match num_planes {
        1 => &GRAY_1BIT,
        2 => &GRAY_2BITS,
        3 => &GRAY_3BITS,
        4 => &GRAY_4BITS,
        5 => &GRAY_5BITS,
        6 => &GRAY_6BITS,
        _ => &GRAY_7BITS,
    }
}

/// Palette-only files are rendered as a 16x16 grid of color swatches,
/// this many pixels per swatch edge.
const PREVIEW_SWATCH_SIZE: usize = 8;
const PREVIEW_EDGE: usize = PREVIEW_SWATCH_SIZE * 16;

/// Resolves a parsed image plus a point in time into RGB(A) pixels.
///
/// The renderer never owns the output: [`Renderer::render`] writes into a
/// caller-supplied buffer and is reentrant; `now` (in seconds) is the only
/// input that varies between frames of a color-cycled image.
pub struct Renderer<'a> {
    image: &'a IlbmImage,
    base_palette: Option<Palette>,
    cycles: Vec<Cycle>,
    ham_planes: RangeInclusive<u8>,
}

impl<'a> Renderer<'a> {
    pub fn new(image: &'a IlbmImage) -> Renderer<'a> {
        Renderer {
            base_palette: image.palette(),
            cycles: image.cycles(),
            // HAM is only documented for 6 and 8 planes, but files with
            // other depths and the HAM bit set do exist
            ham_planes: 4..=8,
            image,
        }
    }

    /// Restricts the plane counts treated as HAM when the viewport flag is
    /// set; outside the range the image falls back to plain palette lookup.
    pub fn with_ham_planes(mut self, ham_planes: RangeInclusive<u8>) -> Renderer<'a> {
        self.ham_planes = ham_planes;
        self
    }

    pub fn width(&self) -> u32 {
        if self.is_palette_preview() {
            return PREVIEW_EDGE as u32;
        }
        self.image.bmhd.map(|bmhd| u32::from(bmhd.width)).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        if self.is_palette_preview() {
            return PREVIEW_EDGE as u32;
        }
        self.image.bmhd.map(|bmhd| u32::from(bmhd.height)).unwrap_or(0)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        if self.is_palette_preview() {
            return PixelFormat::RGB8;
        }

        match self.image.bmhd {
            Some(bmhd) if bmhd.num_planes == 32 || bmhd.mask == MASK_HAS_MASK => PixelFormat::RGBA8,
            _ => PixelFormat::RGB8,
        }
    }

    /// Cycling only produces distinct frames when there is a palette for
    /// the cycles to rotate.
    pub fn is_animated(&self) -> bool {
        self.base_palette.is_some() && !self.cycles.is_empty()
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    fn is_palette_preview(&self) -> bool {
        self.image.body.is_none() && self.image.cmap.is_some()
    }

    /// Renders into a freshly allocated [`ImageFrame`]. `delay` is in
    /// milliseconds and is simply carried through to the frame.
    pub fn render_frame(&self, now: f64, blend: bool, delay: u32) -> ImageFrame {
        let width = self.width();
        let height = self.height();
        let format = self.pixel_format();
        let pitch = width as usize * format.bytes_per_pixel();

        let mut pixels = vec![0u8; pitch * height as usize];
        self.render(&mut pixels, pitch, now, blend);

        let mut pixels = match format {
            PixelFormat::RGB8 => PixelData::RGB8(pixels),
            PixelFormat::RGBA8 => PixelData::RGBA8(pixels),
        };
        pixels.correct_pixels(width, height);

        ImageFrame::new(width, height, pixels, delay)
    }

    /// Writes one fully resolved frame into `pixels`. Rows are `pitch`
    /// bytes apart; each pixel is 3 or 4 bytes per [`Renderer::pixel_format`].
    /// A buffer too small for the declared dimensions is diagnosed and left
    /// untouched rather than partially written.
    pub fn render(&self, pixels: &mut [u8], pitch: usize, now: f64, blend: bool) {
        let width = self.width() as usize;
        let height = self.height() as usize;
        let bytes_per_pixel = self.pixel_format().bytes_per_pixel();
        let row_len = width * bytes_per_pixel;

        if width == 0 || height == 0 {
            return;
        }

        if pitch < row_len || pixels.len() < pitch * (height - 1) + row_len {
            log_warn!(
                "pixel buffer too small: {} bytes with a pitch of {} for {}x{}",
                pixels.len(),
                pitch,
                width,
                height
            );
            return;
        }

        let Some(body) = &self.image.body else {
            if let Some(base) = &self.base_palette {
                self.render_palette_preview(base, pixels, pitch, now, blend);
            }
            return;
        };

        let num_planes = self.image.bmhd.map(|bmhd| bmhd.num_planes).unwrap_or(0);
        match num_planes {
            24 | 32 => self.render_truecolor(body, pixels, pitch),
            _ if self.image.pchg.is_some() => self.render_pchg(body, pixels, pitch),
            _ if self.has_palette() => self.render_indexed(body, pixels, pitch, now, blend),
            _ if num_planes < 8 => {
                self.render_gray(body, pixels, pitch, gray_lookup(num_planes))
            }
            _ => self.render_raw_gray(body, pixels, pitch),
        }
    }

    fn has_palette(&self) -> bool {
        self.base_palette.is_some() || self.image.sham.is_some() || self.image.ctbl.is_some()
    }

    fn has_alpha(&self) -> bool {
        self.pixel_format() == PixelFormat::RGBA8
    }

    fn render_truecolor(&self, body: &BodyData, pixels: &mut [u8], pitch: usize) {
        let width = self.width() as usize;
        let height = self.height() as usize;
        let alpha = self.has_alpha();
        let channels = if self.image.bmhd.map(|bmhd| bmhd.num_planes) == Some(32) {
            4
        } else {
            3
        };

        for y in 0..height {
            let row = &mut pixels[y * pitch..];
            let mut out = 0;
            for x in 0..width {
                let index = (y * width + x) * channels;
                let Some(pixel) = body.data.get(index..index + channels) else {
                    return;
                };

                row[out] = pixel[0];
                row[out + 1] = pixel[1];
                row[out + 2] = pixel[2];
                out += 3;
                if alpha {
                    // 32-bit images carry their own alpha plane group; a
                    // masked 24-bit image takes it from the mask instead
                    row[out] = if channels == 4 {
                        pixel[3]
                    } else {
                        opacity(body, y * width + x)
                    };
                    out += 1;
                }
            }
        }
    }

    fn render_pchg(&self, body: &BodyData, pixels: &mut [u8], pitch: usize) {
        let width = self.width() as usize;
        let height = self.height() as usize;
        let Some(pchg) = &self.image.pchg else {
            return;
        };

        let mut working = self.base_palette.clone().unwrap_or_default();
        let mut next_change = 0;

        for y in 0..height {
            // changes for lines before the first visible one (negative
            // start lines) all land here at y == 0
            while next_change < pchg.changes.len() {
                let line = i32::from(pchg.start_line) + next_change as i32;
                if line > y as i32 {
                    break;
                }
                for change in &pchg.changes[next_change] {
                    working[usize::from(change.register)] = change.color;
                }
                next_change += 1;
            }

            self.write_indexed_row(body, &working, y, &mut pixels[y * pitch..]);
        }
    }

    fn render_indexed(&self, body: &BodyData, pixels: &mut [u8], pitch: usize, now: f64, blend: bool) {
        let height = self.height() as usize;
        let num_planes = self.image.bmhd.map(|bmhd| bmhd.num_planes).unwrap_or(0);
        let laced = self.image.camg.map(|camg| camg.lace()).unwrap_or(false);
        let ham = self.image.camg.map(|camg| camg.ham()).unwrap_or(false)
            && self.ham_planes.contains(&num_planes);

        // SHAM takes priority over CTBL when a file carries both
        let rows = self
            .image
            .sham
            .as_ref()
            .map(|sham| &sham.palettes)
            .or_else(|| self.image.ctbl.as_ref().map(|ctbl| &ctbl.palettes));

        let fallback = Palette::default();
        let base = self.base_palette.as_ref().unwrap_or(&fallback);
        let mut cycled = Palette::default();

        match rows {
            Some(rows) => {
                for y in 0..height {
                    // laced scanline tables hold one palette row per field
                    // pair, so two physical lines share a row
                    let row_index = if laced { y / 2 } else { y };
                    let row_base = rows.get(row_index).unwrap_or(base);
                    cycled.apply_cycles_from(row_base, &self.cycles, now, blend);

                    if ham {
                        self.write_ham_row(body, &cycled, y, &mut pixels[y * pitch..]);
                    } else {
                        self.write_indexed_row(body, &cycled, y, &mut pixels[y * pitch..]);
                    }
                }
            }
            None => {
                cycled.apply_cycles_from(base, &self.cycles, now, blend);
                for y in 0..height {
                    if ham {
                        self.write_ham_row(body, &cycled, y, &mut pixels[y * pitch..]);
                    } else {
                        self.write_indexed_row(body, &cycled, y, &mut pixels[y * pitch..]);
                    }
                }
            }
        }
    }

    fn write_indexed_row(&self, body: &BodyData, palette: &Palette, y: usize, row: &mut [u8]) {
        let width = self.width() as usize;
        let alpha = self.has_alpha();
        let mut out = 0;

        for x in 0..width {
            let index = y * width + x;
            let value = body.data.get(index).copied().unwrap_or(0);
            let color = palette[usize::from(value)];

            row[out] = color.r;
            row[out + 1] = color.g;
            row[out + 2] = color.b;
            out += 3;
            if alpha {
                row[out] = opacity(body, index);
                out += 1;
            }
        }
    }

    /// Hold-And-Modify: the top two bits of each pixel code either select a
    /// palette entry or overwrite one channel of the previous pixel on the
    /// same scanline, keeping the other two. State starts at black on every
    /// row.
    fn write_ham_row(&self, body: &BodyData, palette: &Palette, y: usize, row: &mut [u8]) {
        let width = self.width() as usize;
        let alpha = self.has_alpha();
        let num_planes = self.image.bmhd.map(|bmhd| bmhd.num_planes).unwrap_or(0);

        let payload_bits = num_planes - 2;
        let ham_shift = 8 - payload_bits;
        let ham_mask = (1u8 << ham_shift) - 1;
        let payload_mask = 0xFF >> ham_shift;

        let mut color = Color::default();
        let mut out = 0;

        for x in 0..width {
            let index = y * width + x;
            let code = body.data.get(index).copied().unwrap_or(0);
            let mode = code >> payload_bits;
            let payload = code & payload_mask;

            match mode {
                0 => color = palette[usize::from(payload)],
                1 => color.b = (payload << ham_shift) | (color.b & ham_mask),
                2 => color.r = (payload << ham_shift) | (color.r & ham_mask),
                _ => color.g = (payload << ham_shift) | (color.g & ham_mask),
            }

            row[out] = color.r;
            row[out + 1] = color.g;
            row[out + 2] = color.b;
            out += 3;
            if alpha {
                row[out] = opacity(body, index);
                out += 1;
            }
        }
    }

    fn render_gray(&self, body: &BodyData, pixels: &mut [u8], pitch: usize, lookup: &[u8]) {
        let width = self.width() as usize;
        let height = self.height() as usize;
        let alpha = self.has_alpha();

        for y in 0..height {
            let row = &mut pixels[y * pitch..];
            let mut out = 0;
            for x in 0..width {
                let index = y * width + x;
                let value = body.data.get(index).copied().unwrap_or(0);
                let value = lookup.get(usize::from(value)).copied().unwrap_or(0);

                row[out] = value;
                row[out + 1] = value;
                row[out + 2] = value;
                out += 3;
                if alpha {
                    row[out] = opacity(body, index);
                    out += 1;
                }
            }
        }
    }

    fn render_raw_gray(&self, body: &BodyData, pixels: &mut [u8], pitch: usize) {
        let width = self.width() as usize;
        let height = self.height() as usize;
        let alpha = self.has_alpha();

        for y in 0..height {
            let row = &mut pixels[y * pitch..];
            let mut out = 0;
            for x in 0..width {
                let index = y * width + x;
                let value = body.data.get(index).copied().unwrap_or(0);

                row[out] = value;
                row[out + 1] = value;
                row[out + 2] = value;
                out += 3;
                if alpha {
                    row[out] = opacity(body, index);
                    out += 1;
                }
            }
        }
    }

    fn render_palette_preview(&self, base: &Palette, pixels: &mut [u8], pitch: usize, now: f64, blend: bool) {
        let mut cycled = Palette::default();
        cycled.apply_cycles_from(base, &self.cycles, now, blend);

        for y in 0..PREVIEW_EDGE {
            let row = &mut pixels[y * pitch..];
            for x in 0..PREVIEW_EDGE {
                let index = y / PREVIEW_SWATCH_SIZE * 16 + x / PREVIEW_SWATCH_SIZE;
                let color = cycled[index];
                row[x * 3] = color.r;
                row[x * 3 + 1] = color.g;
                row[x * 3 + 2] = color.b;
            }
        }
    }
}

fn opacity(body: &BodyData, index: usize) -> u8 {
    if body.mask.get(index).copied().unwrap_or(true) {
        255
    } else {
        0
    }
}
