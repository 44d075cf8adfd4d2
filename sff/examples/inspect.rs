use sff::Sff;

fn main() {
    let path = std::env::args().nth(1).expect("Usage: inspect <file.sff> [file.air]");
    let sff = Sff::open(&path).expect("parse");

    println!("Container: {} ({} sprites, {} palettes)", sff.version(), sff.sprite_count(), sff.palettes().len());

    for warning in sff.warnings() {
        println!("  warning: {}", warning);
    }

    println!("\nSprites:");
    for (i, sprite) in sff.sprites().iter().enumerate() {
        let link = match sprite.link_index {
            Some(target) => format!(" -> #{}", target),
            None => String::new(),
        };
        println!(
            "  #{:<4} {:>5},{:<4} {:>4}x{:<4} axis ({},{}) {} pal {}{}",
            i,
            sprite.group,
            sprite.image,
            sprite.width,
            sprite.height,
            sprite.axis_x,
            sprite.axis_y,
            sprite.format,
            sprite.palette_index,
            link
        );
    }

    println!("\nPalettes:");
    for palette in sff.palettes() {
        let shared = match palette.link_index {
            Some(target) => format!(" (same as {})", target),
            None => String::new(),
        };
        println!(
            "  #{:<3} {},{} used by {}{}",
            palette.index,
            palette.group_id,
            palette.palette_id,
            sff.palette_usage(palette.index),
            shared
        );
    }

    // Optional animation script
    if let Some(air_path) = std::env::args().nth(2) {
        let script = sff::air::parse_file(&air_path).expect("read script");
        println!("\nActions:");
        for (id, animation) in &script.animations {
            let missing = animation
                .frames
                .iter()
                .filter(|f| !f.is_loop_marker)
                .filter(|f| {
                    let group = i16::try_from(f.group).ok();
                    let image = i16::try_from(f.image).ok();
                    !matches!((group, image), (Some(g), Some(i)) if sff.sprite(g, i).is_some())
                })
                .count();
            println!(
                "  {} ({} frames, loop at {:?}, {} missing sprites)",
                id,
                animation.frames.len(),
                animation.loop_start_index,
                missing
            );
        }
    }
}
