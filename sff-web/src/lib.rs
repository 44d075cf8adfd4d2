//! WASM bindings for the sprite container reader.
//!
//! Provides a JavaScript/TypeScript API for loading SFF files, decoding
//! sprites for canvas rendering, and reading AIR animation scripts.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use sff::{Animation, Sff, SffOptions};

fn js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// RGBA image data suitable for use with HTML Canvas.
#[wasm_bindgen]
pub struct ImageData {
    #[wasm_bindgen(readonly)]
    pub width: u32,
    #[wasm_bindgen(readonly)]
    pub height: u32,
    data: Vec<u8>,
}

#[wasm_bindgen]
impl ImageData {
    /// Get RGBA pixel data as Uint8Array.
    #[wasm_bindgen(getter)]
    pub fn data(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(&self.data[..])
    }
}

/// Sprite metadata as handed to JavaScript.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpriteInfo {
    group: i16,
    image: i16,
    width: u16,
    height: u16,
    axis_x: i16,
    axis_y: i16,
    format: String,
    palette_index: usize,
    link_index: Option<usize>,
}

/// An SFF sprite container.
#[wasm_bindgen]
pub struct SffFile {
    inner: Sff,
}

#[wasm_bindgen]
impl SffFile {
    /// Load a container from a Uint8Array.
    ///
    /// `options` is an optional plain object, e.g.
    /// `{ palette: { alpha: "Stored", channel_order: "Bgr" }, repair_regions: false }`.
    #[wasm_bindgen(constructor)]
    pub fn new(data: &[u8], options: JsValue) -> Result<SffFile, JsError> {
        let options: SffOptions = if options.is_undefined() || options.is_null() {
            SffOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(js_error)?
        };

        let inner = Sff::from_bytes_with(data.to_vec(), options).map_err(js_error)?;
        for warning in inner.warnings() {
            web_sys::console::warn_1(&warning.to_string().into());
        }
        Ok(SffFile { inner })
    }

    /// "v1", "v2" or "unknown".
    #[wasm_bindgen(getter)]
    pub fn version(&self) -> String {
        self.inner.version().to_string()
    }

    #[wasm_bindgen(getter, js_name = "spriteCount")]
    pub fn sprite_count(&self) -> usize {
        self.inner.sprite_count()
    }

    #[wasm_bindgen(getter, js_name = "paletteCount")]
    pub fn palette_count(&self) -> usize {
        self.inner.palettes().len()
    }

    /// Problems found while loading, as messages.
    #[wasm_bindgen(getter)]
    pub fn warnings(&self) -> Vec<String> {
        self.inner.warnings().iter().map(|w| w.to_string()).collect()
    }

    /// Metadata for every sprite, in file order.
    pub fn sprites(&self) -> Result<JsValue, JsError> {
        let sprites: Vec<SpriteInfo> = self
            .inner
            .sprites()
            .iter()
            .map(|s| SpriteInfo {
                group: s.group,
                image: s.image,
                width: s.width,
                height: s.height,
                axis_x: s.axis_x,
                axis_y: s.axis_y,
                format: s.format.to_string(),
                palette_index: s.palette_index,
                link_index: s.link_index,
            })
            .collect();
        serde_wasm_bindgen::to_value(&sprites).map_err(js_error)
    }

    #[wasm_bindgen(js_name = "hasSprite")]
    pub fn has_sprite(&self, group: i16, image: i16) -> bool {
        self.inner.sprite(group, image).is_some()
    }

    /// Decode a sprite to RGBA, optionally with another palette.
    pub fn decode(&self, group: i16, image: i16, palette: Option<usize>) -> Result<ImageData, JsError> {
        let raster = self.inner.decode(group, image, palette).map_err(js_error)?;

        Ok(ImageData {
            width: raster.width,
            height: raster.height,
            data: raster.pixels,
        })
    }
}

/// Parse an AIR script. Returns an array of actions sorted by id.
#[wasm_bindgen(js_name = "parseAir")]
pub fn parse_air(text: &str) -> Result<JsValue, JsError> {
    let script = sff::air::parse(text);
    for warning in &script.warnings {
        web_sys::console::warn_1(&warning.to_string().into());
    }
    let animations: Vec<&Animation> = script.animations.values().collect();
    serde_wasm_bindgen::to_value(&animations).map_err(js_error)
}
