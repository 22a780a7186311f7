use serde::Serialize;
use tsify::Tsify;

use crate::chunks::Dycp;
use crate::image::{FileType, IlbmImage};
use crate::palette::Cycle;

#[derive(Debug, Serialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct IlbmInfo {
    pub file_type: FileType,
    pub width: u32,
    pub height: u32,
    pub num_planes: u8,
    pub compression: u8,
    pub mask: u8,
    pub trans_color: u16,
    pub x_origin: i16,
    pub y_origin: i16,
    pub x_aspect: u8,
    pub y_aspect: u8,
    pub page_width: i16,
    pub page_height: i16,
    pub viewport_mode: Option<u32>,
    pub interlaced: bool,
    pub extra_half_bright: bool,
    pub hold_and_modify: bool,
    pub palette_size: usize,
    pub has_body: bool,
    pub has_scanline_palettes: bool,
    pub has_palette_changes: bool,
    pub dycp: Option<Dycp>,
    pub cycles: Vec<CycleInfo>,
    pub is_animated: bool,
    pub name: Option<String>,
    pub author: Option<String>,
    pub annotation: Option<String>,
    pub copyright: Option<String>,
}

#[derive(Debug, Serialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct CycleInfo {
    pub low: u8,
    pub high: u8,
    pub rate: u32,
    pub reverse: bool,
}

impl From<&Cycle> for CycleInfo {
    fn from(cycle: &Cycle) -> CycleInfo {
        CycleInfo {
            low: cycle.low,
            high: cycle.high,
            rate: cycle.rate,
            reverse: cycle.reverse,
        }
    }
}

// text chunks predate any Unicode convention and are effectively Latin-1
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| byte as char).collect()
}

impl From<&IlbmImage> for IlbmInfo {
    fn from(image: &IlbmImage) -> IlbmInfo {
        let bmhd = image.bmhd.unwrap_or_default();
        let cycles: Vec<CycleInfo> = image.cycles().iter().map(CycleInfo::from).collect();

        IlbmInfo {
            file_type: image.file_type.unwrap_or(FileType::Ilbm),
            width: u32::from(bmhd.width),
            height: u32::from(bmhd.height),
            num_planes: bmhd.num_planes,
            compression: bmhd.compression,
            mask: bmhd.mask,
            trans_color: bmhd.trans_color,
            x_origin: bmhd.x_origin,
            y_origin: bmhd.y_origin,
            x_aspect: bmhd.x_aspect,
            y_aspect: bmhd.y_aspect,
            page_width: bmhd.page_width,
            page_height: bmhd.page_height,
            viewport_mode: image.camg.map(|camg| camg.viewport_mode),
            interlaced: image.camg.map(|camg| camg.lace()).unwrap_or(false),
            extra_half_bright: image.camg.map(|camg| camg.ehb()).unwrap_or(false),
            hold_and_modify: image.camg.map(|camg| camg.ham()).unwrap_or(false),
            palette_size: image.cmap.as_ref().map(|cmap| cmap.colors.len()).unwrap_or(0),
            has_body: image.body.is_some(),
            has_scanline_palettes: image.ctbl.is_some() || image.sham.is_some(),
            has_palette_changes: image.pchg.is_some(),
            dycp: image.dycp,
            is_animated: image.cmap.is_some() && !cycles.is_empty(),
            cycles,
            name: image.name.as_deref().map(latin1),
            author: image.auth.as_deref().map(latin1),
            annotation: image.anno.as_deref().map(latin1),
            copyright: image.copyright.as_deref().map(latin1),
        }
    }
}
