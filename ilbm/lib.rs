pub mod body;
pub mod chunks;
pub mod image;
pub mod palette;
pub mod render;
pub mod utils;

pub use body::BodyData;
pub use image::{FileType, IlbmImage};
pub use palette::{Color, Cycle, Palette, CYCLE_RATE_DIVISOR};
pub use render::Renderer;
pub use utils::cursor::Cursor;
pub use utils::error::{IlbmError, IlbmResult};
pub use utils::image::{Image, ImageFrame, PixelData, PixelFormat};
pub use utils::info::{CycleInfo, IlbmInfo};

use serde::Serialize;
use tsify::Tsify;
use wasm_bindgen::prelude::wasm_bindgen;

/// Checks whether `data` starts with an IFF FORM envelope this crate can
/// decode. Twelve bytes are enough.
pub fn can_decode(data: &[u8]) -> bool {
    IlbmImage::can_read(data)
}

/// Parses `data` and renders the image at time zero.
pub fn decode(data: &[u8]) -> IlbmResult<Image> {
    decode_at(data, 0.0, false)
}

/// Parses `data` and renders it at `now` seconds into its color cycling
/// animation. `blend` cross-fades between cycle steps.
pub fn decode_at(data: &[u8], now: f64, blend: bool) -> IlbmResult<Image> {
    let mut reader = Cursor::new(data);
    let image = IlbmImage::read(&mut reader)?;
    let renderer = Renderer::new(&image);

    Ok(Image::from_frame(renderer.render_frame(now, blend, 0)))
}

/// Extracts metadata without insisting on a decodable raster; broken
/// optional chunks are skipped.
pub fn info(data: &[u8]) -> IlbmResult<IlbmInfo> {
    let mut reader = Cursor::new(data);
    let image = IlbmImage::read_tolerant(&mut reader)?;

    Ok(IlbmInfo::from(&image))
}

#[derive(Serialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct JsImage {
    width: u32,
    height: u32,
    is_animated: bool,
    frames: Vec<JsImageFrame>,
}

#[derive(Serialize)]
pub struct JsImageFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    delay: u32,
}

fn js_frame(frame: &ImageFrame) -> JsImageFrame {
    JsImageFrame {
        width: frame.width(),
        height: frame.height(),
        pixels: frame.as_rgba8(),
        delay: frame.delay(),
    }
}

#[wasm_bindgen(js_name = canDecode)]
pub fn wasm_can_decode(data: &[u8]) -> bool {
    can_decode(data)
}

#[wasm_bindgen(js_name = getInfo)]
pub fn wasm_get_info(data: &[u8]) -> Result<IlbmInfo, String> {
    info(data).map_err(|e| e.to_string())
}

#[wasm_bindgen(js_name = decodeImage)]
pub fn wasm_decode_image(data: &[u8]) -> Result<JsImage, String> {
    let mut reader = Cursor::new(data);
    let image = IlbmImage::read(&mut reader).map_err(|e| e.to_string())?;
    let renderer = Renderer::new(&image);

    let frame = renderer.render_frame(0.0, false, 0);
    Ok(JsImage {
        width: frame.width(),
        height: frame.height(),
        is_animated: renderer.is_animated(),
        frames: Vec::from([js_frame(&frame)]),
    })
}

/// Renders a single animation frame at `now` seconds, for hosts that drive
/// color cycling themselves.
#[wasm_bindgen(js_name = renderFrame)]
pub fn wasm_render_frame(data: &[u8], now: f64, blend: bool) -> Result<JsImage, String> {
    let mut reader = Cursor::new(data);
    let image = IlbmImage::read(&mut reader).map_err(|e| e.to_string())?;
    let renderer = Renderer::new(&image);

    let frame = renderer.render_frame(now, blend, 0);
    Ok(JsImage {
        width: frame.width(),
        height: frame.height(),
        is_animated: renderer.is_animated(),
        frames: Vec::from([js_frame(&frame)]),
    })
}
