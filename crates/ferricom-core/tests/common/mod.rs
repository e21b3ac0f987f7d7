#![allow(dead_code)]

use ferricom_core::{Cartridge, Nes};

pub const PRG_BANK: usize = 16 * 1024;
pub const CHR_BANK: usize = 8 * 1024;

/// Assembles an iNES image from raw PRG/CHR sections.
pub fn build_rom(prg: &[u8], chr: &[u8], flags6: u8) -> Vec<u8> {
    assert_eq!(prg.len() % PRG_BANK, 0, "PRG must be whole 16 KiB banks");
    assert_eq!(chr.len() % CHR_BANK, 0, "CHR must be whole 8 KiB banks");
    let mut rom = vec![
        b'N',
        b'E',
        b'S',
        0x1A,
        (prg.len() / PRG_BANK) as u8,
        (chr.len() / CHR_BANK) as u8,
        flags6,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
    ];
    rom.extend_from_slice(prg);
    rom.extend_from_slice(chr);
    rom
}

/// Patches a little-endian vector inside a PRG bank (NROM-128 mirroring
/// puts `$FFFA-$FFFF` at the end of the 16 KiB bank).
pub fn set_vector(prg: &mut [u8], vector: u16, target: u16) {
    let offset = (vector as usize - 0x8000) % prg.len();
    prg[offset] = (target & 0xFF) as u8;
    prg[offset + 1] = (target >> 8) as u8;
}

/// One 16 KiB PRG bank: `program` at `$8000`, all three vectors parked on
/// `$8000` until a test points them elsewhere.
pub fn prg_with_program(program: &[u8]) -> Vec<u8> {
    let mut prg = vec![0u8; PRG_BANK];
    prg[..program.len()].copy_from_slice(program);
    set_vector(&mut prg, 0xFFFC, 0x8000);
    set_vector(&mut prg, 0xFFFA, 0x8000);
    set_vector(&mut prg, 0xFFFE, 0x8000);
    prg
}

/// `JMP $8000`, the idle loop synthetic programs end in so a frame's cycle
/// budget can burn down safely.
pub const IDLE_JMP: [u8; 3] = [0x4C, 0x00, 0x80];

pub fn cartridge_with_program(program: &[u8]) -> Cartridge {
    let prg = prg_with_program(program);
    let rom = build_rom(&prg, &vec![0; CHR_BANK], 0);
    Cartridge::load(&rom).expect("cartridge parses")
}

pub fn nes_with_program(program: &[u8]) -> Nes {
    Nes::new(cartridge_with_program(program)).expect("nes boots")
}

pub fn nes_with_program_and_chr(program: &[u8], chr: &[u8]) -> Nes {
    let prg = prg_with_program(program);
    let rom = build_rom(&prg, chr, 0);
    let cartridge = Cartridge::load(&rom).expect("cartridge parses");
    Nes::new(cartridge).expect("nes boots")
}

/// CHR bank where tile 1 is solid color-index 1 and tile 2 is solid
/// color-index 2; everything else stays transparent.
pub fn chr_with_solid_tiles() -> Vec<u8> {
    let mut chr = vec![0u8; CHR_BANK];
    // Tile 1: low plane set, high plane clear.
    for row in 0..8 {
        chr[16 + row] = 0xFF;
    }
    // Tile 2: low plane clear, high plane set.
    for row in 0..8 {
        chr[32 + 8 + row] = 0xFF;
    }
    chr
}
