//! Writing decoded sprites to disk.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use sff::{AnimationFrame, DecodedRaster, RasterCache, Sff, SffError};

/// Error types for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to load sprite container: {0}")]
    Container(#[from] SffError),

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),

    #[error("raster is {width}x{height} but holds {len} bytes")]
    RasterSize { width: u32, height: u32, len: usize },

    #[error("action {0} not found")]
    ActionNotFound(i32),

    #[error("sprite {group},{image} is out of range")]
    SpriteOutOfRange { group: i32, image: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

fn to_image(raster: &DecodedRaster) -> Result<RgbaImage> {
    RgbaImage::from_raw(raster.width, raster.height, raster.pixels.clone()).ok_or(
        CliError::RasterSize {
            width: raster.width,
            height: raster.height,
            len: raster.pixels.len(),
        },
    )
}

pub fn save_raster(raster: &DecodedRaster, path: &Path) -> Result<()> {
    to_image(raster)?.save(path)?;
    log::info!("wrote {}x{} to {}", raster.width, raster.height, path.display());
    Ok(())
}

/// Write every sprite as `<group>_<image>.png`. Returns how many were written.
pub fn extract_all(sff: &Sff, dir: &Path, palette: Option<usize>) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut written = 0;

    for (index, sprite) in sff.sprites().iter().enumerate() {
        // shadowed duplicates would overwrite the visible sprite's file
        if sff.sprite_index(sprite.group, sprite.image) != Some(index) {
            continue;
        }
        let raster = sff.decode_index(index, palette)?;
        save_raster(&raster, &dir.join(format!("{}_{}.png", sprite.group, sprite.image)))?;
        written += 1;
    }

    Ok(written)
}

/// Write each frame of an action, flipped as the script says, as
/// `<action>_<frame>.png`. Sprites shared between frames decode once.
pub fn export_frames(
    sff: &Sff,
    cache: &RasterCache,
    action: i32,
    frames: &[AnimationFrame],
    dir: &Path,
    palette: Option<usize>,
) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut written = 0;

    for (index, frame) in frames.iter().enumerate() {
        if frame.is_loop_marker {
            continue;
        }
        let (Ok(group), Ok(image)) = (i16::try_from(frame.group), i16::try_from(frame.image)) else {
            return Err(CliError::SpriteOutOfRange {
                group: frame.group,
                image: frame.image,
            });
        };

        let raster = match cache.get_or_decode(sff, group, image, palette) {
            Ok(raster) => raster,
            Err(SffError::SpriteNotFound { .. }) => {
                log::warn!("action {} frame {} uses missing sprite {},{}", action, index, group, image);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut img = to_image(&raster)?;
        if frame.flip_horizontal {
            image::imageops::flip_horizontal_in_place(&mut img);
        }
        if frame.flip_vertical {
            image::imageops::flip_vertical_in_place(&mut img);
        }
        img.save(dir.join(format!("{}_{}.png", action, index)))?;
        written += 1;
    }

    Ok(written)
}
