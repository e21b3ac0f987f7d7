//! Instruction-stepped 6502 core.
//!
//! One [`Cpu::step`] fetches, decodes through the 256-entry lookup table,
//! resolves the addressing mode, executes, and charges the consumed cycles on
//! the bus. The core reproduces the documented instruction set, the common
//! undocumented opcodes, and the hardware quirks that games rely on (the
//! indirect-JMP page-wrap bug, zero-page index wrapping, the B/U bit rules on
//! pushed status bytes).

use tracing::debug;

use crate::bus::Bus;
use crate::cpu::addressing::{Addressing, pages_differ};
use crate::cpu::instruction::Instruction;
use crate::cpu::lookup::LOOKUP_TABLE;
use crate::cpu::mnemonic::Mnemonic;
use crate::cpu::status::Status;
use crate::error::Error;
use crate::memory::cpu as cpu_mem;

pub mod addressing;
pub(crate) mod instruction;
pub(crate) mod lookup;
pub mod mnemonic;
pub mod status;

/// Copyable register snapshot, taken before and after every step for the
/// trace log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub pc: u16,
    pub s: u8,
    pub p: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
}

/// One executed instruction, as observed by the trace log.
#[derive(Debug, Clone, Copy)]
pub struct StepTrace {
    pub prev: Registers,
    pub next: Registers,
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub mode: Addressing,
    /// Effective address the handler operated on (0 for implied modes).
    pub operand: u16,
    /// Cycles charged, including page-cross and branch penalties.
    pub cycles: u64,
}

#[derive(Debug, Clone)]
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    s: u8,
    p: Status,
    pc: u16,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0xFD,
            p: Status::power_up(),
            pc: 0,
        }
    }

    pub fn registers(&self) -> Registers {
        Registers {
            pc: self.pc,
            s: self.s,
            p: self.p.bits(),
            a: self.a,
            x: self.x,
            y: self.y,
        }
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn set_status(&mut self, p: u8) {
        self.p = Status::from_bits_retain(p);
    }

    /// Power-on / reset sequence: registers to their documented state, PC
    /// from the reset vector, frame counter and channel enables quiesced.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) -> Result<(), Error> {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.p = Status::power_up();
        self.s = 0xFD;
        self.pc = bus.read_word(cpu_mem::RESET_VECTOR)?;
        bus.write(cpu_mem::CONTROLLER_PORT_2, 0x00)?;
        bus.write(cpu_mem::APU_STATUS, 0x00)?;
        debug!(pc = %format_args!("{:04X}", self.pc), "cpu reset");
        Ok(())
    }

    /// Non-maskable interrupt entry. The pushed status byte has U set and B
    /// clear, distinguishing it from BRK frames.
    pub fn nmi<B: Bus>(&mut self, bus: &mut B) -> Result<(), Error> {
        self.push_word(bus, self.pc)?;
        self.push(bus, (self.p | Status::UNUSED).difference(Status::BREAK).bits())?;
        self.p.insert(Status::INTERRUPT_DISABLE);
        self.pc = bus.read_word(cpu_mem::NMI_VECTOR)?;
        bus.tick(7);
        Ok(())
    }

    /// Maskable interrupt entry; a no-op while I is set.
    pub fn irq<B: Bus>(&mut self, bus: &mut B) -> Result<(), Error> {
        if self.p.contains(Status::INTERRUPT_DISABLE) {
            return Ok(());
        }
        self.push_word(bus, self.pc)?;
        self.push(bus, (self.p | Status::UNUSED).difference(Status::BREAK).bits())?;
        self.p.insert(Status::INTERRUPT_DISABLE);
        self.pc = bus.read_word(cpu_mem::IRQ_VECTOR)?;
        bus.tick(7);
        Ok(())
    }

    /// Fetch, decode, execute one instruction and charge its cycles.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<StepTrace, Error> {
        let prev = self.registers();
        let opcode = bus.read(self.pc)?;
        self.pc = self.pc.wrapping_add(1);

        let instruction =
            LOOKUP_TABLE[opcode as usize].ok_or(Error::UnsupportedOpcode { opcode, pc: prev.pc })?;

        let (operand, crossed) = self.resolve_operand(instruction.mode, bus)?;
        let extra = self.execute(&instruction, operand, crossed, bus)?;

        let mut cycles = instruction.cycles as u64 + extra;
        if instruction.page_penalty && crossed {
            cycles += 1;
        }
        bus.tick(cycles);

        Ok(StepTrace {
            prev,
            next: self.registers(),
            opcode,
            mnemonic: instruction.mnemonic,
            mode: instruction.mode,
            operand,
            cycles,
        })
    }

    /// Computes the effective address for a mode, advancing PC over the
    /// operand bytes. The bool reports a page crossing during indexing.
    fn resolve_operand<B: Bus>(
        &mut self,
        mode: Addressing,
        bus: &mut B,
    ) -> Result<(u16, bool), Error> {
        let resolved = match mode {
            Addressing::Implied => (0, false),
            Addressing::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (addr, false)
            }
            Addressing::ZeroPage => {
                let addr = self.fetch(bus)? as u16;
                (addr, false)
            }
            Addressing::ZeroPageX => {
                let base = self.fetch(bus)?;
                (base.wrapping_add(self.x) as u16, false)
            }
            Addressing::ZeroPageY => {
                let base = self.fetch(bus)?;
                (base.wrapping_add(self.y) as u16, false)
            }
            Addressing::Absolute => {
                let addr = self.fetch_word(bus)?;
                (addr, false)
            }
            Addressing::AbsoluteX => {
                let base = self.fetch_word(bus)?;
                let addr = base.wrapping_add(self.x as u16);
                (addr, pages_differ(base, addr))
            }
            Addressing::AbsoluteY => {
                let base = self.fetch_word(bus)?;
                let addr = base.wrapping_add(self.y as u16);
                (addr, pages_differ(base, addr))
            }
            Addressing::Indirect => {
                let ptr = self.fetch_word(bus)?;
                // The pointer fetch cannot carry into the high byte: a
                // pointer at $xxFF reads its high byte from $xx00.
                let lo = bus.read(ptr)?;
                let hi = bus.read((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF))?;
                (u16::from_le_bytes([lo, hi]), false)
            }
            Addressing::IndirectX => {
                let base = self.fetch(bus)?.wrapping_add(self.x);
                let lo = bus.read(base as u16)?;
                let hi = bus.read(base.wrapping_add(1) as u16)?;
                (u16::from_le_bytes([lo, hi]), false)
            }
            Addressing::IndirectY => {
                let zp = self.fetch(bus)?;
                let lo = bus.read(zp as u16)?;
                let hi = bus.read(zp.wrapping_add(1) as u16)?;
                let base = u16::from_le_bytes([lo, hi]);
                let addr = base.wrapping_add(self.y as u16);
                (addr, pages_differ(base, addr))
            }
            Addressing::Relative => {
                let offset = self.fetch(bus)? as i8;
                let target = self.pc.wrapping_add(offset as u16);
                (target, pages_differ(self.pc, target))
            }
        };
        Ok(resolved)
    }

    /// Runs the handler. Returns extra cycles charged by taken branches.
    fn execute<B: Bus>(
        &mut self,
        instruction: &Instruction,
        addr: u16,
        crossed: bool,
        bus: &mut B,
    ) -> Result<u64, Error> {
        use Mnemonic::*;

        let accumulator = instruction.mode == Addressing::Implied;
        match instruction.mnemonic {
            ADC => {
                let m = bus.read(addr)?;
                self.adc(m);
            }
            SBC => {
                let m = bus.read(addr)?;
                self.adc(!m);
            }
            AND => {
                self.a &= bus.read(addr)?;
                self.p.set_zero_negative(self.a);
            }
            ORA => {
                self.a |= bus.read(addr)?;
                self.p.set_zero_negative(self.a);
            }
            EOR => {
                self.a ^= bus.read(addr)?;
                self.p.set_zero_negative(self.a);
            }
            CMP => self.compare(bus, addr, self.a)?,
            CPX => self.compare(bus, addr, self.x)?,
            CPY => self.compare(bus, addr, self.y)?,
            BIT => {
                let m = bus.read(addr)?;
                self.p.set(Status::ZERO, self.a & m == 0);
                self.p.set(Status::OVERFLOW, m & 0x40 != 0);
                self.p.set(Status::NEGATIVE, m & 0x80 != 0);
            }

            LDA => {
                self.a = bus.read(addr)?;
                self.p.set_zero_negative(self.a);
            }
            LDX => {
                self.x = bus.read(addr)?;
                self.p.set_zero_negative(self.x);
            }
            LDY => {
                self.y = bus.read(addr)?;
                self.p.set_zero_negative(self.y);
            }
            STA => bus.write(addr, self.a)?,
            STX => bus.write(addr, self.x)?,
            STY => bus.write(addr, self.y)?,

            TAX => {
                self.x = self.a;
                self.p.set_zero_negative(self.x);
            }
            TAY => {
                self.y = self.a;
                self.p.set_zero_negative(self.y);
            }
            TXA => {
                self.a = self.x;
                self.p.set_zero_negative(self.a);
            }
            TYA => {
                self.a = self.y;
                self.p.set_zero_negative(self.a);
            }
            TSX => {
                self.x = self.s;
                self.p.set_zero_negative(self.x);
            }
            TXS => self.s = self.x,

            INC => {
                self.inc_mem(bus, addr)?;
            }
            DEC => {
                self.dec_mem(bus, addr)?;
            }
            INX => {
                self.x = self.x.wrapping_add(1);
                self.p.set_zero_negative(self.x);
            }
            INY => {
                self.y = self.y.wrapping_add(1);
                self.p.set_zero_negative(self.y);
            }
            DEX => {
                self.x = self.x.wrapping_sub(1);
                self.p.set_zero_negative(self.x);
            }
            DEY => {
                self.y = self.y.wrapping_sub(1);
                self.p.set_zero_negative(self.y);
            }

            ASL => {
                if accumulator {
                    self.p.set(Status::CARRY, self.a & 0x80 != 0);
                    self.a <<= 1;
                    self.p.set_zero_negative(self.a);
                } else {
                    self.asl_mem(bus, addr)?;
                }
            }
            LSR => {
                if accumulator {
                    self.p.set(Status::CARRY, self.a & 0x01 != 0);
                    self.a >>= 1;
                    self.p.set_zero_negative(self.a);
                } else {
                    self.lsr_mem(bus, addr)?;
                }
            }
            ROL => {
                if accumulator {
                    let carry_in = self.p.carry_bit();
                    self.p.set(Status::CARRY, self.a & 0x80 != 0);
                    self.a = (self.a << 1) | carry_in;
                    self.p.set_zero_negative(self.a);
                } else {
                    self.rol_mem(bus, addr)?;
                }
            }
            ROR => {
                if accumulator {
                    let carry_in = self.p.carry_bit();
                    self.p.set(Status::CARRY, self.a & 0x01 != 0);
                    self.a = (self.a >> 1) | (carry_in << 7);
                    self.p.set_zero_negative(self.a);
                } else {
                    self.ror_mem(bus, addr)?;
                }
            }

            CLC => self.p.remove(Status::CARRY),
            SEC => self.p.insert(Status::CARRY),
            CLI => self.p.remove(Status::INTERRUPT_DISABLE),
            SEI => self.p.insert(Status::INTERRUPT_DISABLE),
            CLD => self.p.remove(Status::DECIMAL),
            SED => self.p.insert(Status::DECIMAL),
            CLV => self.p.remove(Status::OVERFLOW),

            BCC => return Ok(self.branch(!self.p.contains(Status::CARRY), addr, crossed)),
            BCS => return Ok(self.branch(self.p.contains(Status::CARRY), addr, crossed)),
            BNE => return Ok(self.branch(!self.p.contains(Status::ZERO), addr, crossed)),
            BEQ => return Ok(self.branch(self.p.contains(Status::ZERO), addr, crossed)),
            BPL => return Ok(self.branch(!self.p.contains(Status::NEGATIVE), addr, crossed)),
            BMI => return Ok(self.branch(self.p.contains(Status::NEGATIVE), addr, crossed)),
            BVC => return Ok(self.branch(!self.p.contains(Status::OVERFLOW), addr, crossed)),
            BVS => return Ok(self.branch(self.p.contains(Status::OVERFLOW), addr, crossed)),

            JMP => self.pc = addr,
            JSR => {
                let ret = self.pc.wrapping_sub(1);
                self.push_word(bus, ret)?;
                self.pc = addr;
            }
            RTS => {
                self.pc = self.pop_word(bus)?.wrapping_add(1);
            }
            RTI => {
                self.pop_status(bus)?;
                self.pc = self.pop_word(bus)?;
            }
            BRK => {
                // The byte after the opcode is padding; the pushed return
                // address skips it.
                let ret = self.pc.wrapping_add(1);
                self.push_word(bus, ret)?;
                self.push(bus, (self.p | Status::UNUSED | Status::BREAK).bits())?;
                self.p.insert(Status::INTERRUPT_DISABLE);
                self.pc = bus.read_word(cpu_mem::IRQ_VECTOR)?;
            }

            PHA => self.push(bus, self.a)?,
            PHP => self.push(bus, (self.p | Status::UNUSED | Status::BREAK).bits())?,
            PLA => {
                self.a = self.pop(bus)?;
                self.p.set_zero_negative(self.a);
            }
            PLP => self.pop_status(bus)?,

            NOP => {
                // Multi-byte NOPs still perform the operand read.
                if !accumulator {
                    let _ = bus.read(addr)?;
                }
            }

            LAX => {
                let m = bus.read(addr)?;
                self.a = m;
                self.x = m;
                self.p.set_zero_negative(m);
            }
            SAX => bus.write(addr, self.a & self.x)?,
            DCP => {
                self.dec_mem(bus, addr)?;
                self.compare(bus, addr, self.a)?;
            }
            ISB => {
                self.inc_mem(bus, addr)?;
                let m = bus.read(addr)?;
                self.adc(!m);
            }
            SLO => {
                self.asl_mem(bus, addr)?;
                self.a |= bus.read(addr)?;
                self.p.set_zero_negative(self.a);
            }
            RLA => {
                self.rol_mem(bus, addr)?;
                self.a &= bus.read(addr)?;
                self.p.set_zero_negative(self.a);
            }
            SRE => {
                self.lsr_mem(bus, addr)?;
                self.a ^= bus.read(addr)?;
                self.p.set_zero_negative(self.a);
            }
            RRA => {
                self.ror_mem(bus, addr)?;
                let m = bus.read(addr)?;
                self.adc(m);
            }
        }
        Ok(0)
    }

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> Result<u8, Error> {
        let value = bus.read(self.pc)?;
        self.pc = self.pc.wrapping_add(1);
        Ok(value)
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> Result<u16, Error> {
        let value = bus.read_word(self.pc)?;
        self.pc = self.pc.wrapping_add(2);
        Ok(value)
    }

    /// Adds with carry; SBC feeds the one's complement of its operand here.
    fn adc(&mut self, m: u8) {
        let sum = self.a as u16 + m as u16 + self.p.carry_bit() as u16;
        let result = sum as u8;
        self.p.set(Status::CARRY, sum > 0xFF);
        self.p.set(
            Status::OVERFLOW,
            (self.a ^ m) & 0x80 == 0 && (self.a ^ result) & 0x80 != 0,
        );
        self.a = result;
        self.p.set_zero_negative(result);
    }

    fn compare<B: Bus>(&mut self, bus: &mut B, addr: u16, register: u8) -> Result<(), Error> {
        let m = bus.read(addr)?;
        self.p.set(Status::CARRY, register >= m);
        self.p.set_zero_negative(register.wrapping_sub(m));
        Ok(())
    }

    fn branch(&mut self, taken: bool, target: u16, crossed: bool) -> u64 {
        if !taken {
            return 0;
        }
        self.pc = target;
        1 + crossed as u64
    }

    fn asl_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) -> Result<(), Error> {
        let m = bus.read(addr)?;
        let result = m << 1;
        bus.write(addr, result)?;
        self.p.set(Status::CARRY, m & 0x80 != 0);
        self.p.set_zero_negative(result);
        Ok(())
    }

    fn lsr_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) -> Result<(), Error> {
        let m = bus.read(addr)?;
        let result = m >> 1;
        bus.write(addr, result)?;
        self.p.set(Status::CARRY, m & 0x01 != 0);
        self.p.set_zero_negative(result);
        Ok(())
    }

    fn rol_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) -> Result<(), Error> {
        let m = bus.read(addr)?;
        let result = (m << 1) | self.p.carry_bit();
        bus.write(addr, result)?;
        self.p.set(Status::CARRY, m & 0x80 != 0);
        self.p.set_zero_negative(result);
        Ok(())
    }

    fn ror_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) -> Result<(), Error> {
        let m = bus.read(addr)?;
        let result = (m >> 1) | (self.p.carry_bit() << 7);
        bus.write(addr, result)?;
        self.p.set(Status::CARRY, m & 0x01 != 0);
        self.p.set_zero_negative(result);
        Ok(())
    }

    fn inc_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) -> Result<(), Error> {
        let result = bus.read(addr)?.wrapping_add(1);
        bus.write(addr, result)?;
        self.p.set_zero_negative(result);
        Ok(())
    }

    fn dec_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) -> Result<(), Error> {
        let result = bus.read(addr)?.wrapping_sub(1);
        bus.write(addr, result)?;
        self.p.set_zero_negative(result);
        Ok(())
    }

    /// Pushes write at `$0100 + S`, then S decrements.
    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) -> Result<(), Error> {
        bus.write(cpu_mem::STACK_PAGE + self.s as u16, value)?;
        self.s = self.s.wrapping_sub(1);
        Ok(())
    }

    fn push_word<B: Bus>(&mut self, bus: &mut B, value: u16) -> Result<(), Error> {
        self.push(bus, (value >> 8) as u8)?;
        self.push(bus, (value & 0xFF) as u8)
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> Result<u8, Error> {
        self.s = self.s.wrapping_add(1);
        bus.read(cpu_mem::STACK_PAGE + self.s as u16)
    }

    fn pop_word<B: Bus>(&mut self, bus: &mut B) -> Result<u16, Error> {
        let lo = self.pop(bus)?;
        let hi = self.pop(bus)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Pops P for PLP/RTI: the in-flight B bit survives, U reads as 1.
    fn pop_status<B: Bus>(&mut self, bus: &mut B) -> Result<(), Error> {
        let break_bit = self.p.contains(Status::BREAK);
        self.p = Status::from_bits_retain(self.pop(bus)?);
        self.p.insert(Status::UNUSED);
        self.p.set(Status::BREAK, break_bit);
        Ok(())
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
