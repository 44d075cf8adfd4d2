mod common;

use std::sync::Arc;

use common::{
    Region, V2Palette, V2Sprite, build_v2, indexed_png, put_u32, solid_palette,
};
use sff::{
    ChannelOrder, DecodedRaster, EmbeddedFallback, LinkKind, PaletteOptions, RasterCache, Sff,
    SffError, SffOptions, SpriteFlags, SpriteFormat, Table, Version, Warning,
};

fn eight_palettes() -> Vec<V2Palette> {
    (0..8u8).map(|i| solid_palette([i * 10, 0, 0])).collect()
}

#[test]
fn test_raw_sprite_and_header() {
    let data = build_v2(
        &[V2Sprite::raw(9000, 0, 2, 2, vec![0, 1, 1, 0])],
        &[solid_palette([255, 255, 0])],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    assert_eq!(sff.version(), Version::V2);
    assert!(sff.warnings().is_empty(), "{:?}", sff.warnings());
    assert_eq!(sff.sprite(9000, 0).unwrap().format, SpriteFormat::Raw);

    let raster = sff.decode(9000, 0, None).unwrap();
    assert_eq!((raster.width, raster.height), (2, 2));
    assert_eq!(raster.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(raster.pixel(1, 0), Some([255, 255, 0, 255]));
}

#[test]
fn test_data_region_selection() {
    let data = build_v2(
        &[
            V2Sprite::raw(0, 0, 1, 1, vec![1]),
            V2Sprite::raw(0, 1, 1, 1, vec![2]).in_region(Region::T),
        ],
        &[V2Palette::Colors(vec![[0, 0, 0, 0], [10, 0, 0, 0], [20, 0, 0, 0]])],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    let l = sff.sprite(0, 0).unwrap();
    let t = sff.sprite(0, 1).unwrap();
    assert!(!l.flags.contains(SpriteFlags::TDATA));
    assert!(t.flags.contains(SpriteFlags::TDATA));
    assert_ne!(l.data_offset, t.data_offset);

    assert_eq!(sff.decode(0, 0, None).unwrap().pixel(0, 0), Some([10, 0, 0, 255]));
    assert_eq!(sff.decode(0, 1, None).unwrap().pixel(0, 0), Some([20, 0, 0, 255]));
}

#[test]
fn test_link_cycle_is_transparent() {
    let data = build_v2(
        &[
            V2Sprite::link(1, 0, 1),
            V2Sprite::link(1, 1, 0),
            V2Sprite::link(1, 2, 2),
        ],
        &[solid_palette([1, 2, 3])],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    for image in 0..3 {
        assert_eq!(sff.decode(1, image, None).unwrap(), DecodedRaster::transparent());
    }
}

#[test]
fn test_link_uses_target_pixels() {
    let data = build_v2(
        &[
            V2Sprite::raw(0, 0, 2, 1, vec![1, 1]),
            V2Sprite::link(0, 1, 0),
            V2Sprite::link(0, 2, 7),
        ],
        &[solid_palette([9, 9, 9])],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    let link = sff.sprite(0, 1).unwrap();
    assert!(link.is_link());
    assert_eq!(link.link_index, Some(0));
    assert_eq!(sff.decode(0, 1, None).unwrap(), sff.decode(0, 0, None).unwrap());

    // out of range target
    assert_eq!(sff.decode(0, 2, None).unwrap(), DecodedRaster::transparent());
}

#[test]
fn test_dedicated_palette_wins_over_override() {
    let data = build_v2(
        &[
            V2Sprite::raw(0, 0, 1, 1, vec![1]).with_palette(7),
            V2Sprite::raw(0, 1, 1, 1, vec![1]).with_palette(3),
            V2Sprite::raw(0, 2, 1, 1, vec![1]).with_palette(3),
        ],
        &eight_palettes(),
    );
    let sff = Sff::from_bytes(data).expect("parse");

    assert_eq!(sff.palette_usage(7), 1);
    assert!(sff.is_dedicated_palette(7));
    assert_eq!(sff.palette_usage(3), 2);
    assert!(!sff.is_dedicated_palette(3));

    assert_eq!(sff.decode(0, 0, Some(3)).unwrap().pixel(0, 0), Some([70, 0, 0, 255]));
    // a shared palette can be swapped
    assert_eq!(sff.decode(0, 1, Some(5)).unwrap().pixel(0, 0), Some([50, 0, 0, 255]));
    assert_eq!(sff.decode(0, 1, None).unwrap().pixel(0, 0), Some([30, 0, 0, 255]));

    assert!(matches!(
        sff.decode(0, 1, Some(8)),
        Err(SffError::InvalidPaletteIndex(8))
    ));
}

#[test]
fn test_palette_links_share_colors() {
    let data = build_v2(
        &[V2Sprite::raw(0, 0, 1, 1, vec![1]).with_palette(1)],
        &[solid_palette([40, 50, 60]), V2Palette::Link(0)],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    let palettes = sff.palettes();
    assert!(Arc::ptr_eq(
        palettes.colors(0).unwrap(),
        palettes.colors(1).unwrap()
    ));
    assert_eq!(sff.decode(0, 0, None).unwrap().pixel(0, 0), Some([40, 50, 60, 255]));
}

#[test]
fn test_cyclic_palette_link_falls_back_to_grayscale() {
    let data = build_v2(
        &[V2Sprite::raw(0, 0, 1, 1, vec![77])],
        &[V2Palette::Link(1), V2Palette::Link(0)],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    assert!(sff.warnings().contains(&Warning::CyclicLink {
        kind: LinkKind::Palette,
        index: 0,
    }));
    assert_eq!(sff.decode(0, 0, None).unwrap().pixel(0, 0), Some([77, 77, 77, 255]));
}

#[test]
fn test_bgr_channel_order() {
    let data = build_v2(
        &[V2Sprite::raw(0, 0, 1, 1, vec![1])],
        &[solid_palette([1, 2, 3])],
    );
    let options = SffOptions {
        palette: PaletteOptions {
            channel_order: ChannelOrder::Bgr,
            ..Default::default()
        },
        ..Default::default()
    };
    let sff = Sff::from_bytes_with(data, options).expect("parse");
    assert_eq!(sff.decode(0, 0, None).unwrap().pixel(0, 0), Some([3, 2, 1, 255]));
}

#[test]
fn test_compressed_formats() {
    // 2x2 of colour 1 in each codec
    let rle8 = vec![4, 0, 0, 0, 0x44, 1];
    let rle5 = vec![3, 0x80, 1];
    let lz5 = vec![4, 0, 0, 0, 0x00, (4 << 5) | 1];
    let data = build_v2(
        &[
            V2Sprite::raw(0, 0, 2, 2, rle8).with_format(2),
            V2Sprite::raw(0, 1, 2, 2, rle5).with_format(3),
            V2Sprite::raw(0, 2, 2, 2, lz5).with_format(4),
        ],
        &[solid_palette([5, 6, 7])],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    assert_eq!(sff.sprite(0, 0).unwrap().format, SpriteFormat::Rle8);
    assert_eq!(sff.sprite(0, 1).unwrap().format, SpriteFormat::Rle5);
    assert_eq!(sff.sprite(0, 2).unwrap().format, SpriteFormat::Lz5);
    for image in 0..3 {
        let raster = sff.decode(0, image, None).unwrap();
        assert_eq!(raster.pixels, [5, 6, 7, 255].repeat(4), "image {}", image);
    }
}

#[test]
fn test_unknown_format_with_raw_size() {
    let data = build_v2(
        &[V2Sprite::raw(0, 0, 2, 1, vec![1, 0]).with_format(99)],
        &[solid_palette([8, 8, 8])],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    assert_eq!(sff.sprite(0, 0).unwrap().format, SpriteFormat::Unknown(99));
    let raster = sff.decode(0, 0, None).unwrap();
    assert_eq!(raster.pixels, vec![8, 8, 8, 255, 0, 0, 0, 0]);
}

fn prefixed(png: Vec<u8>) -> Vec<u8> {
    let mut payload = (png.len() as u32).to_le_bytes().to_vec();
    payload.extend_from_slice(&png);
    payload
}

#[test]
fn test_embedded_png_with_palette() {
    let png = indexed_png(2, 1, &[0, 0, 0, 0, 200, 100], &[1, 0]);
    let data = build_v2(
        &[V2Sprite::raw(0, 0, 2, 1, prefixed(png)).with_format(10)],
        &[solid_palette([1, 1, 1])],
    );
    let sff = Sff::from_bytes(data).expect("parse");

    assert_eq!(sff.sprite(0, 0).unwrap().format, SpriteFormat::Embedded);
    let raster = sff.decode(0, 0, None).unwrap();
    assert_eq!(raster.pixel(0, 0), Some([0, 200, 100, 255]));
    assert_eq!(raster.pixel(1, 0), Some([0, 0, 0, 255]));
}

#[test]
fn test_embedded_png_black_palette_fallbacks() {
    let png = indexed_png(2, 1, &[0; 6], &[1, 0]);
    let sprites = [V2Sprite::raw(0, 0, 2, 1, prefixed(png)).with_format(12)];
    let palettes = [solid_palette([11, 22, 33])];

    let sff = Sff::from_bytes(build_v2(&sprites, &palettes)).expect("parse");
    let raster = sff.decode(0, 0, None).unwrap();
    assert_eq!(raster.pixels, vec![11, 22, 33, 255, 0, 0, 0, 0]);

    let options = SffOptions {
        embedded_fallback: EmbeddedFallback::DebugPalette,
        ..Default::default()
    };
    let sff = Sff::from_bytes_with(build_v2(&sprites, &palettes), options).expect("parse");
    let raster = sff.decode(0, 0, None).unwrap();
    assert_eq!(raster.pixels, vec![37, 73, 151, 255, 0, 0, 0, 0]);
}

#[test]
fn test_png_signature_overrides_format_code() {
    let png = indexed_png(1, 1, &[0, 0, 0, 9, 8, 7], &[1]);
    let data = build_v2(
        &[V2Sprite::raw(0, 0, 1, 1, prefixed(png)).with_format(2)],
        &[solid_palette([1, 1, 1])],
    );
    let sff = Sff::from_bytes(data).expect("parse");
    assert_eq!(sff.decode(0, 0, None).unwrap().pixel(0, 0), Some([9, 8, 7, 255]));
}

#[test]
fn test_misfiled_region_is_repaired() {
    // 4x4 literal pixels 1..=16 behind a size hint
    let mut rle8 = vec![16, 0, 0, 0];
    rle8.extend(1..=16u8);
    // written to L after the palette, but flagged as T
    let mut misfiled = V2Sprite::raw(0, 1, 4, 4, rle8).with_format(2);
    misfiled.flags = Some(1);

    let palette = V2Palette::Colors((0..=16u8).map(|i| [i, i, i, 0]).collect());
    let blank = V2Sprite::raw(0, 0, 8, 16, vec![0; 128]).in_region(Region::T);
    let sprites = [blank, misfiled];

    let sff = Sff::from_bytes(build_v2(&sprites, std::slice::from_ref(&palette))).expect("parse");
    let raster = sff.decode(0, 1, None).unwrap();
    assert_eq!(raster.pixel(0, 0), Some([1, 1, 1, 255]));
    assert_eq!(raster.pixel(3, 3), Some([16, 16, 16, 255]));

    let options = SffOptions {
        repair_regions: false,
        ..Default::default()
    };
    let sff = Sff::from_bytes_with(build_v2(&sprites, &[palette]), options).expect("parse");
    let raster = sff.decode(0, 1, None).unwrap();
    assert!(raster.pixels.chunks(4).all(|p| p == [0, 0, 0, 0]));
}

#[test]
fn test_truncated_sprite_table() {
    let mut data = build_v2(
        &[
            V2Sprite::raw(9, 9, 1, 1, vec![1]),
            V2Sprite::raw(9, 8, 1, 1, vec![1]),
        ],
        &[solid_palette([4, 4, 4])],
    );
    put_u32(&mut data, 0x28, 1000);

    let sff = Sff::from_bytes(data).expect("parse");
    assert!(sff.warnings().iter().any(|w| matches!(
        w,
        Warning::TruncatedTable {
            table: Table::Sprites,
            expected: 1000,
            ..
        }
    )));
    assert!(sff.sprite_count() < 1000);
    assert_eq!(sff.sprites()[0].group, 9);
    assert_eq!(sff.decode_index(0, None).unwrap().pixel(0, 0), Some([4, 4, 4, 255]));
}

#[test]
fn test_unsupported_version_loads_empty() {
    let mut data = build_v2(&[V2Sprite::raw(0, 0, 1, 1, vec![1])], &[]);
    data[12..16].copy_from_slice(&[0, 0, 0, 3]);
    data[20..24].copy_from_slice(b"SFF2");

    let sff = Sff::from_bytes(data).expect("parse");
    assert_eq!(sff.version(), Version::V2);
    assert_eq!(sff.sprite_count(), 0);
    assert!(matches!(sff.warnings(), [Warning::InvalidSignature { .. }]));
}

#[test]
fn test_duplicate_sprite_last_wins() {
    let data = build_v2(
        &[
            V2Sprite::raw(3, 3, 1, 1, vec![1]),
            V2Sprite::raw(3, 3, 2, 1, vec![1, 1]),
        ],
        &[solid_palette([1, 1, 1])],
    );
    let sff = Sff::from_bytes(data).expect("parse");
    assert_eq!(sff.sprite_count(), 2);
    assert_eq!(sff.sprite_index(3, 3), Some(1));
    assert_eq!(sff.sprite(3, 3).unwrap().width, 2);
}

#[test]
fn test_cache_and_parallel_decode() {
    let sprites: Vec<V2Sprite> = (0..8)
        .map(|i| V2Sprite::raw(0, i, 2, 2, vec![1; 4]))
        .collect();
    let sff = Sff::from_bytes(build_v2(&sprites, &[solid_palette([2, 2, 2])])).expect("parse");
    let cache = RasterCache::new(4);

    let first = cache.get_or_decode(&sff, 0, 0, None).unwrap();
    let again = cache.get_or_decode(&sff, 0, 0, None).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    std::thread::scope(|scope| {
        for image in 0..8 {
            let (sff, cache) = (&sff, &cache);
            scope.spawn(move || {
                let raster = cache.get_or_decode(sff, 0, image, None).unwrap();
                assert_eq!(raster.pixel(1, 1), Some([2, 2, 2, 255]));
            });
        }
    });
    assert!(cache.len() <= cache.capacity());

    assert!(matches!(
        cache.get_or_decode(&sff, 5, 5, None),
        Err(SffError::SpriteNotFound { .. })
    ));
}
