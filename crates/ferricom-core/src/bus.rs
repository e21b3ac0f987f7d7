//! CPU-visible bus and address decoding.

use crate::{
    cartridge::Cartridge,
    controller::Controller,
    error::Error,
    memory::{cpu as cpu_mem, ppu as ppu_mem},
    ppu::Ppu,
};

/// Cycle-aware memory capability the CPU executes against.
///
/// The production implementation is [`CpuBus`]; unit tests substitute a flat
/// 64 KiB array. `tick` is how the CPU reports consumed cycles to whoever
/// drives PPU timing.
pub trait Bus {
    fn read(&mut self, addr: u16) -> Result<u8, Error>;
    fn write(&mut self, addr: u16, value: u8) -> Result<(), Error>;
    /// Charges CPU cycles on the tick counter.
    fn tick(&mut self, cycles: u64);
    fn cycles(&self) -> u64;

    /// Little-endian 16-bit read.
    fn read_word(&mut self, addr: u16) -> Result<u16, Error> {
        let lo = self.read(addr)?;
        let hi = self.read(addr.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }
}

/// CPU-visible bus that bridges the core to RAM, the PPU, the controllers
/// and the cartridge. It borrows the hardware from the owning
/// [`crate::nes::Nes`] for the duration of one access batch.
#[derive(Debug)]
pub struct CpuBus<'a> {
    ram: &'a mut [u8; cpu_mem::INTERNAL_RAM_SIZE],
    ppu: &'a mut Ppu,
    controllers: &'a mut [Controller; 2],
    cartridge: Option<&'a mut Cartridge>,
    cycles: &'a mut u64,
}

impl<'a> CpuBus<'a> {
    pub(crate) fn new(
        ram: &'a mut [u8; cpu_mem::INTERNAL_RAM_SIZE],
        ppu: &'a mut Ppu,
        controllers: &'a mut [Controller; 2],
        cartridge: Option<&'a mut Cartridge>,
        cycles: &'a mut u64,
    ) -> Self {
        Self {
            ram,
            ppu,
            controllers,
            cartridge,
            cycles,
        }
    }

    /// Folds the RAM and PPU register mirrors onto their canonical
    /// addresses before routing.
    fn canonicalize(addr: u16) -> u16 {
        match addr {
            0x0800..=0x1FFF => addr & cpu_mem::INTERNAL_RAM_MASK,
            0x2008..=0x3FFF => {
                cpu_mem::PPU_REGISTER_BASE + (addr & ppu_mem::REGISTER_SELECT_MASK)
            }
            _ => addr,
        }
    }

    /// OAM DMA: 256 reads starting at `page << 8`, handed to the PPU as a
    /// complete OAM image. Costs 513 cycles, 514 when started on an odd one.
    fn oam_dma(&mut self, page: u8) -> Result<(), Error> {
        let base = (page as u16) << 8;
        let odd_start = *self.cycles & 1 != 0;
        let mut oam = [0u8; ppu_mem::OAM_RAM_SIZE];
        for (offset, slot) in oam.iter_mut().enumerate() {
            *slot = self.read(base + offset as u16)?;
        }
        self.ppu.load_oam(page, &oam);
        self.tick(513 + odd_start as u64);
        Ok(())
    }
}

impl Bus for CpuBus<'_> {
    fn read(&mut self, addr: u16) -> Result<u8, Error> {
        let addr = Self::canonicalize(addr);
        let value = match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize]
            }
            cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                match self.cartridge.as_deref_mut() {
                    Some(cartridge) => self.ppu.cpu_read(addr, cartridge)?,
                    None => 0,
                }
            }
            cpu_mem::APU_REGISTER_BASE..=cpu_mem::APU_REGISTER_END => 0,
            cpu_mem::OAM_DMA => self.ppu.dma_page(),
            cpu_mem::APU_STATUS => 0,
            cpu_mem::CONTROLLER_PORT_1 => self.controllers[0].read(),
            cpu_mem::CONTROLLER_PORT_2 => self.controllers[1].read(),
            cpu_mem::EXPANSION_START..=cpu_mem::EXPANSION_END => 0,
            cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END => self
                .cartridge
                .as_deref()
                .map(|cartridge| cartridge.prg_ram_read(addr))
                .unwrap_or(0),
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => self
                .cartridge
                .as_deref()
                .map(|cartridge| cartridge.prg_read(addr))
                .unwrap_or(0),
        };
        Ok(value)
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        let addr = Self::canonicalize(addr);
        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize] = value;
            }
            cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                if let Some(cartridge) = self.cartridge.as_deref_mut() {
                    self.ppu.cpu_write(addr, value, cartridge)?;
                }
            }
            cpu_mem::APU_REGISTER_BASE..=cpu_mem::APU_REGISTER_END => {}
            cpu_mem::OAM_DMA => self.oam_dma(value)?,
            cpu_mem::APU_STATUS => {}
            // Writing $4016 strobes both controller shift registers.
            cpu_mem::CONTROLLER_PORT_1 => {
                for pad in self.controllers.iter_mut() {
                    pad.write_strobe(value);
                }
            }
            // $4017 writes configure the APU frame counter, inert here.
            cpu_mem::CONTROLLER_PORT_2 => {}
            cpu_mem::EXPANSION_START..=cpu_mem::EXPANSION_END => {}
            cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END => {
                if let Some(cartridge) = self.cartridge.as_deref_mut() {
                    cartridge.prg_ram_write(addr, value);
                }
            }
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => {
                return Err(Error::BusAccess { addr });
            }
        }
        Ok(())
    }

    fn tick(&mut self, cycles: u64) {
        *self.cycles += cycles;
    }

    fn cycles(&self) -> u64 {
        *self.cycles
    }
}
