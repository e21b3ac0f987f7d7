//! Top-level console assembly and the frame driver loop.
//!
//! [`Nes`] owns every component; the borrowing [`CpuBus`] is rebuilt for each
//! batch of accesses so ownership stays acyclic. [`Nes::run_frame`] is the
//! frame driver: raise VBlank, deliver the NMI if enabled, burn the frame's
//! cycle budget on the CPU, then compose the image. Wall-clock pacing belongs
//! to the host, not here.

use tracing::trace;

use crate::bus::{Bus, CpuBus};
use crate::cartridge::Cartridge;
use crate::controller::Controller;
use crate::cpu::{Cpu, StepTrace};
use crate::error::Error;
use crate::memory::cpu as cpu_mem;
use crate::ppu::{Ppu, frame::Frame};

/// CPU cycles in one NTSC frame (21.477 MHz master clock / 12 / ~60.1 Hz).
pub const CYCLES_PER_FRAME: u64 = 29_780;
/// CPU cycles spent inside vertical blank each frame (20 scanlines).
pub const VBLANK_CYCLES: u64 = 2_273;

pub struct Nes {
    cpu: Cpu,
    ppu: Ppu,
    ram: [u8; cpu_mem::INTERNAL_RAM_SIZE],
    controllers: [Controller; 2],
    cartridge: Cartridge,
    cycles: u64,
    frame: Frame,
}

impl Nes {
    /// Assembles a console around a loaded cartridge and runs the reset
    /// sequence.
    pub fn new(cartridge: Cartridge) -> Result<Self, Error> {
        let mut nes = Self {
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            ram: [0; cpu_mem::INTERNAL_RAM_SIZE],
            controllers: [Controller::new(), Controller::new()],
            cartridge,
            cycles: 0,
            frame: Frame::new(),
        };
        nes.reset()?;
        Ok(nes)
    }

    /// Re-runs the CPU reset sequence through the reset vector.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.with_bus(|cpu, bus| cpu.reset(bus))
    }

    fn with_bus<R>(&mut self, f: impl FnOnce(&mut Cpu, &mut CpuBus<'_>) -> R) -> R {
        let mut bus = CpuBus::new(
            &mut self.ram,
            &mut self.ppu,
            &mut self.controllers,
            Some(&mut self.cartridge),
            &mut self.cycles,
        );
        f(&mut self.cpu, &mut bus)
    }

    /// Executes a single instruction, returning its trace record.
    pub fn step(&mut self) -> Result<StepTrace, Error> {
        self.with_bus(|cpu, bus| cpu.step(bus))
    }

    /// Runs one frame: VBlank in, NMI if requested, the frame's cycle
    /// budget of instructions, then the rendered image.
    pub fn run_frame(&mut self) -> Result<&Frame, Error> {
        self.run_frame_with(|_| {})
    }

    /// [`Nes::run_frame`] with a per-instruction observer for trace logging.
    pub fn run_frame_with<F>(&mut self, mut on_step: F) -> Result<&Frame, Error>
    where
        F: FnMut(&StepTrace),
    {
        if self.ppu.enter_vblank() {
            trace!("vblank nmi");
            self.with_bus(|cpu, bus| cpu.nmi(bus))?;
        }
        self.run_cycles(VBLANK_CYCLES, &mut on_step)?;
        self.ppu.exit_vblank();
        self.run_cycles(CYCLES_PER_FRAME - VBLANK_CYCLES, &mut on_step)?;

        self.ppu.render(&self.cartridge, &mut self.frame);
        Ok(&self.frame)
    }

    fn run_cycles<F>(&mut self, budget: u64, on_step: &mut F) -> Result<(), Error>
    where
        F: FnMut(&StepTrace),
    {
        let target = self.cycles.saturating_add(budget);
        while self.cycles < target {
            let step = self.step()?;
            on_step(&step);
        }
        Ok(())
    }

    /// Reads through the bus with all hardware side effects.
    pub fn bus_read(&mut self, addr: u16) -> Result<u8, Error> {
        self.with_bus(|_, bus| bus.read(addr))
    }

    /// Writes through the bus with all hardware side effects (including OAM
    /// DMA on `$4014`).
    pub fn bus_write(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        self.with_bus(|_, bus| bus.write(addr, value))
    }

    /// Side-effect-free view of RAM, PRG RAM and PRG ROM; everything else
    /// reads as zero.
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize]
            }
            cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END => self.cartridge.prg_ram_read(addr),
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => self.cartridge.prg_read(addr),
            _ => 0,
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn controller_mut(&mut self, port: usize) -> &mut Controller {
        &mut self.controllers[port]
    }

    /// Total CPU cycles charged since power-on.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The most recently rendered frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}
