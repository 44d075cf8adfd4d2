//! SFF inspection CLI
//!
//! Lists, decodes and extracts sprites from MUGEN sprite containers, and
//! summarizes AIR animation scripts.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use sff::{AlphaPolicy, ChannelOrder, EmbeddedFallback, PaletteOptions, RasterCache, Sff, SffOptions};

mod export;

use export::CliError;

/// Sprites kept decoded while exporting animation frames
const FRAME_CACHE_SIZE: usize = 64;

#[derive(Parser)]
#[command(name = "sff-inspect")]
#[command(about = "Inspect MUGEN sprite containers (SFF v1/v2) and AIR animation scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DecodeArgs {
    /// Palette entries are stored blue-green-red
    #[arg(long)]
    bgr: bool,

    /// Keep palette alpha as stored instead of making index 0 transparent
    #[arg(long)]
    stored_alpha: bool,

    /// Colour embedded images with black palettes using a debug ramp
    #[arg(long)]
    debug_palette: bool,

    /// Never retry blank v2 payloads from the other data region
    #[arg(long)]
    no_region_repair: bool,
}

impl DecodeArgs {
    fn options(&self) -> SffOptions {
        SffOptions {
            palette: PaletteOptions {
                alpha: if self.stored_alpha {
                    AlphaPolicy::Stored
                } else {
                    AlphaPolicy::IndexZeroTransparent
                },
                channel_order: if self.bgr { ChannelOrder::Bgr } else { ChannelOrder::Rgb },
            },
            embedded_fallback: if self.debug_palette {
                EmbeddedFallback::DebugPalette
            } else {
                EmbeddedFallback::ContainerPalette
            },
            repair_regions: !self.no_region_repair,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List sprites in a container
    List {
        /// SFF file
        file: PathBuf,

        /// Only show this group
        #[arg(short, long)]
        group: Option<i16>,
    },

    /// List palettes and how many sprites use each
    Palettes {
        /// SFF file
        file: PathBuf,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Decode one sprite to PNG
    Decode {
        /// SFF file
        file: PathBuf,

        group: i16,

        image: i16,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Palette index to use instead of the sprite's own
        #[arg(short, long)]
        palette: Option<usize>,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Decode every sprite into a directory
    Extract {
        /// SFF file
        file: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Palette index to use instead of each sprite's own
        #[arg(short, long)]
        palette: Option<usize>,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Summarize an AIR script, optionally rendering an action's frames
    Anim {
        /// AIR file
        file: PathBuf,

        /// Only show this action
        #[arg(short, long)]
        action: Option<i32>,

        /// SFF file to render frames from (requires --action and --output)
        #[arg(long, requires_all = ["action", "output"])]
        sff: Option<PathBuf>,

        /// Output directory for rendered frames
        #[arg(short, long, requires = "sff")]
        output: Option<PathBuf>,

        /// Palette index to use instead of each sprite's own
        #[arg(short, long)]
        palette: Option<usize>,

        #[command(flatten)]
        decode: DecodeArgs,
    },
}

fn open(path: &Path, options: SffOptions) -> Result<Sff, CliError> {
    let data = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let sff = Sff::from_bytes_with(data, options)?;
    for warning in sff.warnings() {
        eprintln!("Warning: {}", warning);
    }
    Ok(sff)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { file, group } => {
            let sff = open(&file, SffOptions::default())?;
            println!("{} container, {} sprites", sff.version(), sff.sprite_count());
            println!("{:-<70}", "");
            for (index, sprite) in sff.sprites().iter().enumerate() {
                if group.is_some_and(|g| g != sprite.group) {
                    continue;
                }
                let target = match sprite.link_index {
                    Some(target) => format!("link -> #{}", target),
                    None => format!("{} bytes", sprite.data_length),
                };
                println!(
                    "  #{:<5} {:>5},{:<5} {:>4}x{:<4} axis {:>4},{:<4} {:<8} pal {:<3} {}",
                    index,
                    sprite.group,
                    sprite.image,
                    sprite.width,
                    sprite.height,
                    sprite.axis_x,
                    sprite.axis_y,
                    sprite.format.to_string(),
                    sprite.palette_index,
                    target
                );
            }
        }

        Commands::Palettes { file, decode } => {
            let sff = open(&file, decode.options())?;
            println!("{} palettes", sff.palettes().len());
            println!("{:-<70}", "");
            for palette in sff.palettes() {
                let usage = sff.palette_usage(palette.index);
                let kind = match palette.link_index {
                    Some(target) => format!("shares #{}", target),
                    None if usage == 1 => "dedicated".to_string(),
                    None => "own".to_string(),
                };
                let [r, g, b, a] = palette.colors[1];
                println!(
                    "  #{:<4} {:>5},{:<5} {:<12} used by {:<4} colour 1 = #{:02X}{:02X}{:02X}{:02X}",
                    palette.index, palette.group_id, palette.palette_id, kind, usage, r, g, b, a
                );
            }
        }

        Commands::Decode {
            file,
            group,
            image,
            output,
            palette,
            decode,
        } => {
            let sff = open(&file, decode.options())?;
            let raster = sff.decode(group, image, palette)?;
            export::save_raster(&raster, &output)?;
            eprintln!("Done! {}x{} -> {}", raster.width, raster.height, output.display());
        }

        Commands::Extract {
            file,
            output,
            palette,
            decode,
        } => {
            let sff = open(&file, decode.options())?;
            let written = export::extract_all(&sff, &output, palette)?;
            eprintln!("Done! {} sprites -> {}", written, output.display());
        }

        Commands::Anim {
            file,
            action,
            sff: sff_path,
            output,
            palette,
            decode,
        } => {
            let script = sff::air::parse_file(&file).map_err(|source| CliError::Read {
                path: file.clone(),
                source,
            })?;
            for warning in &script.warnings {
                eprintln!("Warning: {}", warning);
            }

            for (id, animation) in &script.animations {
                if action.is_some_and(|a| a != *id) {
                    continue;
                }
                let duration = match animation.total_duration() {
                    Some(ticks) => format!("{} ticks", ticks),
                    None => "holds forever".to_string(),
                };
                let looping = match animation.loop_start_index {
                    Some(index) => format!(", loops from frame {}", index),
                    None => String::new(),
                };
                println!("Action {} ({} frames, {}{})", id, animation.frames.len(), duration, looping);
                for frame in &animation.frames {
                    if frame.is_loop_marker {
                        println!("    -- loop start --");
                        continue;
                    }
                    println!(
                        "    {},{} at {},{} for {} ({} attack, {} hurt boxes)",
                        frame.group,
                        frame.image,
                        frame.x,
                        frame.y,
                        frame.duration,
                        frame.hit_boxes_a.len(),
                        frame.hit_boxes_b.len()
                    );
                }
            }

            if let (Some(sff_path), Some(action), Some(output)) = (sff_path, action, output) {
                let animation = script.get(action).ok_or(CliError::ActionNotFound(action))?;
                let container = open(&sff_path, decode.options())?;
                let cache = RasterCache::new(FRAME_CACHE_SIZE);
                let written =
                    export::export_frames(&container, &cache, action, &animation.frames, &output, palette)?;
                eprintln!("Done! {} frames -> {}", written, output.display());
            }
        }
    }

    Ok(())
}
