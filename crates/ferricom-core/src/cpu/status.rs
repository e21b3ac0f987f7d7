use bitflags::bitflags;

bitflags! {
    /// The 8-bit processor status register (P).
    ///
    /// Bit layout:
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// N V U B D I Z C
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Carry flag: unsigned overflow on adds, not-borrow on subtracts,
        /// and the bit shifted out of shifts/rotates.
        const CARRY = 0b0000_0001;

        /// Zero flag.
        const ZERO = 0b0000_0010;

        /// IRQ disable flag.
        const INTERRUPT_DISABLE = 0b0000_0100;

        /// Decimal mode is latched but has no arithmetic effect on the NES.
        const DECIMAL = 0b0000_1000;

        /// Break flag; only meaningful on copies of P pushed to the stack
        /// (set by PHP/BRK, clear on NMI/IRQ pushes).
        const BREAK = 0b0001_0000;

        /// Unused bit; reads as 1 on every pushed copy of P.
        const UNUSED = 0b0010_0000;

        /// Signed overflow flag.
        const OVERFLOW = 0b0100_0000;

        /// Negative flag, mirroring bit 7 of the last result.
        const NEGATIVE = 0b1000_0000;
    }
}

impl Status {
    /// Power-up value: I and U set.
    pub fn power_up() -> Self {
        Status::from_bits_retain(0x24)
    }

    /// Set Z and N from a result byte.
    pub(crate) fn set_zero_negative(&mut self, value: u8) {
        self.set(Status::ZERO, value == 0);
        self.set(Status::NEGATIVE, value & 0x80 != 0);
    }

    /// Carry as an arithmetic operand (0 or 1).
    pub(crate) fn carry_bit(&self) -> u8 {
        self.contains(Status::CARRY) as u8
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::power_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_result_sets_z_clears_n() {
        let mut p = Status::empty();
        p.set_zero_negative(0);
        assert!(p.contains(Status::ZERO));
        assert!(!p.contains(Status::NEGATIVE));
    }

    #[test]
    fn high_bit_sets_n_clears_z() {
        let mut p = Status::empty();
        p.set_zero_negative(0x80);
        assert!(!p.contains(Status::ZERO));
        assert!(p.contains(Status::NEGATIVE));
    }

    #[test]
    fn positive_result_clears_both() {
        let mut p = Status::from_bits_retain(0xFF);
        p.set_zero_negative(0x7F);
        assert!(!p.contains(Status::ZERO));
        assert!(!p.contains(Status::NEGATIVE));
    }
}
