//! iNES header parsing.
//!
//! The first 16 bytes of every `.nes` ROM are the *iNES header*. It stores how
//! much PRG/CHR data the cartridge exposes, which mapper is required, and a
//! few compatibility flags. This core reads the original iNES 1.0 flavour
//! only; dumps carrying the NES 2.0 detection bits are rejected at parse time.

use bitflags::bitflags;

use crate::error::Error;

const NES_MAGIC: &[u8; 4] = b"NES\x1A";

/// Size of the fixed iNES header in bytes.
pub const NES_HEADER_LEN: usize = 16;

bitflags! {
    /// iNES flags 6: mirroring, battery, trainer, four-screen and the low
    /// nibble of the mapper number.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags6: u8 {
        const MIRRORING       = 0b0000_0001;
        const BATTERY         = 0b0000_0010;
        const TRAINER         = 0b0000_0100;
        const FOUR_SCREEN     = 0b0000_1000;
        const MAPPER_LOW_MASK = 0b1111_0000;
    }
}

bitflags! {
    /// iNES flags 7: console hints, NES 2.0 detection bits and the high
    /// nibble of the mapper number.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags7: u8 {
        const VS_UNISYSTEM     = 0b0000_0001;
        const PLAYCHOICE_10    = 0b0000_0010;
        const NES2_DETECTION   = 0b0000_1100;
        const MAPPER_HIGH_MASK = 0b1111_0000;
    }
}

/// Layout mirroring type for the PPU nametables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    /// Two horizontal nametables that mirror vertically.
    Horizontal,
    /// Two vertical nametables that mirror horizontally.
    Vertical,
    /// Cartridge supplies its own four nametables.
    FourScreen,
}

/// Parsed iNES 1.0 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// PRG ROM size in 16 KiB units (byte 4).
    pub prg_banks: u8,
    /// CHR ROM size in 8 KiB units (byte 5).
    pub chr_banks: u8,
    /// iNES flags 6.
    pub flags6: Flags6,
    /// iNES flags 7.
    pub flags7: Flags7,
}

impl Header {
    /// Parse an iNES header from the start of the given byte slice.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < NES_HEADER_LEN {
            return Err(Error::TooShort {
                actual: bytes.len(),
            });
        }
        if &bytes[0..4] != NES_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let header = Self {
            prg_banks: bytes[4],
            chr_banks: bytes[5],
            flags6: Flags6::from_bits_truncate(bytes[6]),
            flags7: Flags7::from_bits_truncate(bytes[7]),
        };
        if header.is_nes2() {
            return Err(Error::UnsupportedFormat);
        }
        Ok(header)
    }

    /// NES 2.0 dumps set bits 2..=3 of flags 7 to `0b10`.
    fn is_nes2(&self) -> bool {
        self.flags7.bits() & 0x0C == 0x08
    }

    /// Mapper ID (0 == NROM, 1 == MMC1, ...).
    pub fn mapper(&self) -> u16 {
        ((self.flags7.bits() & 0xF0) | (self.flags6.bits() >> 4)) as u16
    }

    /// How the PPU nametables are mirrored.
    pub fn mirroring(&self) -> Mirroring {
        if self.flags6.contains(Flags6::FOUR_SCREEN) {
            Mirroring::FourScreen
        } else if self.flags6.contains(Flags6::MIRRORING) {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        }
    }

    /// Whether the optional 512 byte trainer block sits between the header
    /// and the PRG data.
    pub fn trainer_present(&self) -> bool {
        self.flags6.contains(Flags6::TRAINER)
    }

    /// Battery bit indicates the cartridge keeps PRG RAM contents when
    /// powered off.
    pub fn battery_backed(&self) -> bool {
        self.flags6.contains(Flags6::BATTERY)
    }

    /// Amount of PRG ROM in bytes.
    pub fn prg_rom_size(&self) -> usize {
        self.prg_banks as usize * 16 * 1024
    }

    /// Amount of CHR ROM in bytes.
    pub fn chr_rom_size(&self) -> usize {
        self.chr_banks as usize * 8 * 1024
    }

    /// Boards that declare zero CHR banks carry 8 KiB of CHR RAM instead.
    pub fn chr_ram_size(&self) -> usize {
        if self.chr_banks == 0 { 8 * 1024 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(prg: u8, chr: u8, flags6: u8, flags7: u8) -> [u8; NES_HEADER_LEN] {
        [
            b'N', b'E', b'S', 0x1A, prg, chr, flags6, flags7, 0, 0, 0, 0, 0, 0, 0, 0,
        ]
    }

    #[test]
    fn parses_valid_header() {
        let header = Header::parse(&header_bytes(2, 1, 0b0000_0001, 0)).expect("header parses");

        assert_eq!(header.prg_rom_size(), 2 * 16 * 1024);
        assert_eq!(header.chr_rom_size(), 8 * 1024);
        assert_eq!(header.mirroring(), Mirroring::Vertical);
        assert_eq!(header.mapper(), 0);
        assert!(!header.trainer_present());
        assert!(!header.battery_backed());
    }

    #[test]
    fn rejects_invalid_magic() {
        let mut bytes = header_bytes(1, 1, 0, 0);
        bytes[..4].copy_from_slice(b"NOPE");

        let err = Header::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidMagic));
    }

    #[test]
    fn rejects_short_buffer() {
        let err = Header::parse(&[b'N', b'E', b'S']).unwrap_err();
        assert!(matches!(err, Error::TooShort { actual: 3 }));
    }

    #[test]
    fn rejects_nes2_detection_bits() {
        let err = Header::parse(&header_bytes(1, 1, 0, 0b0000_1000)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat));
    }

    #[test]
    fn combines_mapper_nibbles() {
        let header = Header::parse(&header_bytes(1, 1, 0xC0, 0x40)).expect("header parses");
        assert_eq!(header.mapper(), 0x4C);
    }

    #[test]
    fn zero_chr_banks_mean_chr_ram() {
        let header = Header::parse(&header_bytes(1, 0, 0, 0)).expect("header parses");
        assert_eq!(header.chr_rom_size(), 0);
        assert_eq!(header.chr_ram_size(), 8 * 1024);
    }
}
