use crate::log_warn;
use serde::Serialize;

fn drop_alpha_channel(pixels: Vec<u8>) -> Vec<u8> {
    pixels.chunks(4).flat_map(|chunk| chunk[0..3].to_vec()).collect()
}

fn add_alpha_channel(pixels: Vec<u8>) -> Vec<u8> {
    pixels
        .chunks(3)
        .flat_map(|chunk| [chunk[0], chunk[1], chunk[2], 255])
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PixelFormat {
    RGB8,
    RGBA8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::RGB8 => 3,
            PixelFormat::RGBA8 => 4,
        }
    }
}

/// A decoded raster, one or more frames deep. Color-cycled files produce one
/// frame per requested point in time; everything else produces exactly one.
#[derive(Debug)]
pub struct Image {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    frames: Vec<ImageFrame>,
}

impl Image {
    pub fn from_frame(frame: ImageFrame) -> Image {
        Image {
            width: frame.width(),
            height: frame.height(),
            pixel_format: frame.pixel_format(),
            frames: Vec::from([frame]),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn has_alpha(&self) -> bool {
        self.pixel_format == PixelFormat::RGBA8
    }

    pub fn frames(&self) -> &Vec<ImageFrame> {
        &self.frames
    }

    /// Returns the first frame's pixels as RGB8 bytes.
    pub fn as_rgb8(&self) -> Vec<u8> {
        match self.frames.first() {
            Some(frame) => frame.as_rgb8(),
            None => Vec::new(),
        }
    }

    /// Returns the first frame's pixels as RGBA8 bytes.
    pub fn as_rgba8(&self) -> Vec<u8> {
        match self.frames.first() {
            Some(frame) => frame.as_rgba8(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelData,
    pub delay: u32,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32, pixels: PixelData, delay: u32) -> ImageFrame {
        ImageFrame {
            width,
            height,
            pixels,
            delay,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &PixelData {
        &self.pixels
    }

    pub fn delay(&self) -> u32 {
        self.delay
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixels.pixel_format()
    }

    pub fn has_alpha(&self) -> bool {
        self.pixel_format() == PixelFormat::RGBA8
    }

    pub fn as_rgb8(&self) -> Vec<u8> {
        match &self.pixels {
            PixelData::RGB8(pixels) => pixels.clone(),
            PixelData::RGBA8(pixels) => drop_alpha_channel(pixels.clone()),
        }
    }

    pub fn as_rgba8(&self) -> Vec<u8> {
        match &self.pixels {
            PixelData::RGB8(pixels) => add_alpha_channel(pixels.clone()),
            PixelData::RGBA8(pixels) => pixels.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PixelData {
    RGB8(Vec<u8>),
    RGBA8(Vec<u8>),
}

impl PixelData {
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            PixelData::RGB8(_) => PixelFormat::RGB8,
            PixelData::RGBA8(_) => PixelFormat::RGBA8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PixelData::RGB8(pixels) => pixels,
            PixelData::RGBA8(pixels) => pixels,
        }
    }

    // Used as a last resort to correct the number of pixels in the image
    // in case something went wrong during decoding
    pub fn correct_pixels(&mut self, width: u32, height: u32) {
        let components = self.pixel_format().bytes_per_pixel();
        let expected_len = (width as usize) * (height as usize) * components;
        let pixels = match self {
            PixelData::RGB8(pixels) => pixels,
            PixelData::RGBA8(pixels) => pixels,
        };

        if pixels.len() == expected_len {
            return;
        }

        if pixels.len() > expected_len {
            log_warn!(
                "Truncating excess pixels. Received from decoder: {}, expected: {}",
                pixels.len() / components,
                expected_len / components
            );
            pixels.truncate(expected_len);
        } else {
            log_warn!(
                "Adding missing pixels. Received from decoder: {}, expected: {}",
                pixels.len() / components,
                expected_len / components
            );
            pixels.resize(expected_len, 0);
        }
    }
}
