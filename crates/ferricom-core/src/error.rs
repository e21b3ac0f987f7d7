use thiserror::Error;

/// Everything the core can refuse to do.
///
/// Load-time variants abort startup; runtime variants surface from the CPU
/// step or the bus and carry the faulting address (and opcode byte where one
/// exists). Nothing is retried inside the core.
#[derive(Debug, Error)]
pub enum Error {
    /// Provided buffer is shorter than the 16-byte header.
    #[error("rom image is {actual} bytes, shorter than the 16-byte iNES header")]
    TooShort { actual: usize },
    /// Magic number ("NES<EOF>") is missing.
    #[error("missing NES magic bytes")]
    InvalidMagic,
    /// Header advertises a format we do not implement.
    #[error("NES 2.0 headers are not supported")]
    UnsupportedFormat,
    /// A ROM section (trainer/PRG/CHR) is shorter than the header advertises.
    #[error("{section} section expected {expected} bytes, got {actual}")]
    SectionTooShort {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Header advertises a mapper this core does not implement.
    #[error("mapper {0} is not implemented")]
    UnsupportedMapper(u16),
    /// The opcode byte has no entry in the instruction table.
    #[error("opcode {opcode:#04X} at {pc:#06X} has no table entry")]
    UnsupportedOpcode { opcode: u8, pc: u16 },
    /// Write into a read-only bus range.
    #[error("illegal bus write to {addr:#06X}")]
    BusAccess { addr: u16 },
    /// PPU register accessed against its documented direction, or VRAM
    /// access through the forbidden $3000-$3EFF mirror.
    #[error("PPU protocol violation at {addr:#06X}")]
    PpuProtocol { addr: u16 },
    /// Wrapper for I/O errors raised while reading ROMs from disk.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
