//! Reader for MUGEN sprite containers (SFF v1 and v2) and AIR animation
//! scripts.
//!
//! Opening a container reads its tables only. Sprites are decoded one at a
//! time, on request, to RGBA.
//!
//! # Example
//!
//! ```ignore
//! use sff::Sff;
//!
//! let sff = Sff::open("kfm.sff").unwrap();
//! println!("{} container, {} sprites", sff.version(), sff.sprite_count());
//!
//! // Standing frame, with the sprite's own palette
//! let raster = sff.decode(0, 0, None).unwrap();
//! println!("Sprite: {}x{}", raster.width, raster.height);
//!
//! let script = sff::air::parse_file("kfm.air").unwrap();
//! println!("Actions: {:?}", script.animations.keys().collect::<Vec<_>>());
//! ```

pub mod air;
mod cache;
pub mod compression;
mod detect;
pub mod embedded;
pub mod palette;
pub mod pcx;
pub mod reader;
mod sff;
mod v1;
mod v2;
mod warning;

pub use air::{Animation, AnimationFrame, AnimationScript, BlendMode, HitBox};
pub use cache::{CacheKey, RasterCache};
pub use compression::SpriteFormat;
pub use detect::{DETECT_WINDOW, Version, detect as detect_format};
pub use embedded::{EmbeddedError, EmbeddedFallback};
pub use palette::{AlphaPolicy, ChannelOrder, PaletteOptions, PaletteRecord, PaletteTable};
pub use sff::{DecodedRaster, Sff, SffError, SffOptions, SpriteDescriptor, SpriteFlags};
pub use warning::{LinkKind, Table, Warning};
