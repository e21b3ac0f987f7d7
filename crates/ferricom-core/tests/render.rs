mod common;

use crate::common::{IDLE_JMP, chr_with_solid_tiles, nes_with_program_and_chr};
use ferricom_core::Nes;

/// Golden RGBA values straight from the fixed system palette.
const WHITE: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF]; // $30
const NEAR_BLACK: [u8; 4] = [0x05, 0x05, 0x05, 0xFF]; // $0F
const ORANGE: [u8; 4] = [0xFF, 0x37, 0x1A, 0xFF]; // $16
const SKY_BLUE: [u8; 4] = [0x00, 0x95, 0xFF, 0xFF]; // $21

fn nes_with_tiles() -> Nes {
    nes_with_program_and_chr(&IDLE_JMP, &chr_with_solid_tiles())
}

fn write_vram(nes: &mut Nes, addr: u16, value: u8) {
    nes.bus_write(0x2006, (addr >> 8) as u8).expect("addr high");
    nes.bus_write(0x2006, (addr & 0xFF) as u8).expect("addr low");
    nes.bus_write(0x2007, value).expect("vram data");
}

#[test]
fn background_tile_renders_through_palette_zero() {
    let mut nes = nes_with_tiles();

    write_vram(&mut nes, 0x2000, 0x01); // tile (0,0) uses solid tile 1
    write_vram(&mut nes, 0x3F00, 0x0F); // backdrop
    write_vram(&mut nes, 0x3F01, 0x16); // BG palette 0, entry 1
    nes.bus_write(0x2001, 0x08).expect("show background");

    let frame = nes.run_frame().expect("frame").clone();

    for (x, y) in [(0, 0), (7, 7), (3, 5)] {
        assert_eq!(frame.pixel(x, y), ORANGE, "tile pixel ({x},{y})");
    }
    // Outside the tile only the backdrop shows.
    assert_eq!(frame.pixel(8, 0), NEAR_BLACK);
    assert_eq!(frame.pixel(128, 120), NEAR_BLACK);
}

#[test]
fn attribute_quadrants_select_the_sub_palette() {
    let mut nes = nes_with_tiles();

    write_vram(&mut nes, 0x2004, 0x01); // tile (4,0)
    write_vram(&mut nes, 0x23C1, 0b01); // block (1,0), top-left quadrant -> palette 1
    write_vram(&mut nes, 0x3F00, 0x0F);
    write_vram(&mut nes, 0x3F05, 0x21); // BG palette 1, entry 1
    nes.bus_write(0x2001, 0x08).expect("show background");

    let frame = nes.run_frame().expect("frame").clone();

    assert_eq!(frame.pixel(32, 0), SKY_BLUE);
    assert_eq!(frame.pixel(0, 0), NEAR_BLACK);
}

#[test]
fn disabled_background_fills_with_the_backdrop() {
    let mut nes = nes_with_tiles();

    write_vram(&mut nes, 0x2000, 0x01);
    write_vram(&mut nes, 0x3F00, 0x30);

    let frame = nes.run_frame().expect("frame").clone();

    for (x, y) in [(0, 0), (100, 100), (255, 239)] {
        assert_eq!(frame.pixel(x, y), WHITE, "backdrop pixel ({x},{y})");
    }
}

#[test]
fn sprites_arrive_by_dma_and_draw_over_transparent_background() {
    let mut nes = nes_with_tiles();

    // Sprite 0: top-left at (32, 17), solid tile 1, sprite palette 0.
    for (offset, value) in [(0u16, 0x10u8), (1, 0x01), (2, 0x00), (3, 0x20)] {
        nes.bus_write(0x0200 + offset, value).expect("oam staging");
    }
    // Park the remaining 63 sprites off screen.
    for offset in 4..256u16 {
        nes.bus_write(0x0200 + offset, 0xFF).expect("oam staging");
    }
    nes.bus_write(0x4014, 0x02).expect("oam dma");

    write_vram(&mut nes, 0x3F00, 0x0F);
    write_vram(&mut nes, 0x3F11, 0x30); // sprite palette 0, entry 1
    nes.bus_write(0x2001, 0x18).expect("show background and sprites");

    let frame = nes.run_frame().expect("frame").clone();

    assert_eq!(frame.pixel(32, 17), WHITE);
    assert_eq!(frame.pixel(39, 24), WHITE);
    assert_eq!(frame.pixel(48, 17), NEAR_BLACK);

    // Nothing opaque sat underneath, so no sprite-0 hit.
    let status = nes.bus_read(0x2002).expect("status");
    assert_eq!(status & 0x40, 0);
}

#[test]
fn behind_priority_sprite_loses_to_opaque_background_and_flags_sprite_zero() {
    let mut nes = nes_with_tiles();

    // Background tile (4,2) is solid; pixels (32..40, 16..24).
    write_vram(&mut nes, 0x2044, 0x01);
    write_vram(&mut nes, 0x3F00, 0x0F);
    write_vram(&mut nes, 0x3F01, 0x16);
    write_vram(&mut nes, 0x3F12, 0x21); // sprite palette 0, entry 2

    // Sprite 0 behind the background, solid tile 2, same spot.
    for (offset, value) in [(0u16, 0x0F), (1, 0x02), (2, 0x20), (3, 0x20)] {
        nes.bus_write(0x0200 + offset, value).expect("oam staging");
    }
    for offset in 4..256u16 {
        nes.bus_write(0x0200 + offset, 0xFF).expect("oam staging");
    }
    nes.bus_write(0x4014, 0x02).expect("oam dma");
    nes.bus_write(0x2001, 0x18).expect("show background and sprites");

    let frame = nes.run_frame().expect("frame").clone();

    // The opaque background wins over the behind-priority sprite.
    assert_eq!(frame.pixel(32, 16), ORANGE);
    // Where the background is transparent the sprite still shows.
    assert_eq!(frame.pixel(32, 24), SKY_BLUE);

    let status = nes.bus_read(0x2002).expect("status");
    assert_eq!(status & 0x40, 0x40, "sprite 0 hit must be flagged");
}

#[test]
fn horizontal_flip_mirrors_sprite_pixels() {
    // Tile 3 carries only its leftmost pixel column.
    let mut chr = chr_with_solid_tiles();
    for row in 0..8 {
        chr[16 * 3 + row] = 0x80;
    }
    let mut nes = nes_with_program_and_chr(&IDLE_JMP, &chr);

    // Sprite 0 plain at x=$40, sprite 1 flipped at x=$60.
    for (offset, value) in [
        (0u16, 0x10u8),
        (1, 0x03),
        (2, 0x00),
        (3, 0x40),
        (4, 0x10),
        (5, 0x03),
        (6, 0x40),
        (7, 0x60),
    ] {
        nes.bus_write(0x0200 + offset, value).expect("oam staging");
    }
    for offset in 8..256u16 {
        nes.bus_write(0x0200 + offset, 0xFF).expect("oam staging");
    }
    nes.bus_write(0x4014, 0x02).expect("oam dma");
    write_vram(&mut nes, 0x3F00, 0x0F);
    write_vram(&mut nes, 0x3F11, 0x30);
    nes.bus_write(0x2001, 0x18).expect("show sprites");

    let frame = nes.run_frame().expect("frame").clone();

    assert_eq!(frame.pixel(0x40, 17), WHITE);
    assert_eq!(frame.pixel(0x40 + 7, 17), NEAR_BLACK);
    assert_eq!(frame.pixel(0x60 + 7, 17), WHITE);
    assert_eq!(frame.pixel(0x60, 17), NEAR_BLACK);
}

#[test]
fn more_than_eight_sprites_on_a_line_sets_overflow() {
    let mut nes = nes_with_tiles();

    for sprite in 0..10u16 {
        let base = 0x0200 + sprite * 4;
        nes.bus_write(base, 0x40).expect("y");
        nes.bus_write(base + 1, 0x01).expect("tile");
        nes.bus_write(base + 2, 0x00).expect("attr");
        nes.bus_write(base + 3, (sprite * 8) as u8).expect("x");
    }
    for offset in 40..256u16 {
        nes.bus_write(0x0200 + offset, 0xFF).expect("oam staging");
    }
    nes.bus_write(0x4014, 0x02).expect("oam dma");
    nes.bus_write(0x2001, 0x10).expect("show sprites");

    nes.run_frame().expect("frame");

    let status = nes.bus_read(0x2002).expect("status");
    assert_eq!(status & 0x20, 0x20, "overflow must be flagged");
}
