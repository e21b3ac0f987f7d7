use crate::cpu::{addressing::Addressing, mnemonic::Mnemonic};

/// One row of the 256-entry decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Instruction {
    pub(crate) mnemonic: Mnemonic,
    pub(crate) mode: Addressing,
    /// Base cycle cost before page-cross and branch penalties.
    pub(crate) cycles: u8,
    /// Charges one extra cycle when the operand fetch crossed a page.
    pub(crate) page_penalty: bool,
}
