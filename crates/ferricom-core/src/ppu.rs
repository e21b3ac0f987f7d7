//! PPU register interface and frame-granular rendering.
//!
//! The PPU is not clocked per dot in this core. It exposes the eight
//! CPU-visible ports with their hardware side effects (the `$2002` read
//! clearing VBlank and the write toggle, the buffered `$2007` read, palette
//! aliasing), plus [`Ppu::enter_vblank`] / [`Ppu::exit_vblank`] for the frame
//! driver and a [`Ppu::render`] pass that composes one RGBA image from the
//! nametables, pattern tables, attributes, palette RAM and OAM.
//!
//! Pattern-table space lives on the cartridge, so the port methods and the
//! render pass take the cartridge as a parameter; the PPU never calls back
//! into the bus.

use crate::cartridge::Cartridge;
use crate::cartridge::header::Mirroring;
use crate::error::Error;
use crate::memory::ppu as ppu_mem;
use crate::ppu::frame::Frame;
use crate::ppu::registers::{Control, Mask, Status};

pub mod frame;
pub(crate) mod palette;
pub(crate) mod registers;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

/// Physical nametable storage: 4 KiB, folded down by the cartridge's
/// mirroring mode for two-table boards.
const NAMETABLE_RAM_SIZE: usize = 0x1000;

const TILE_BYTES: u16 = 16;

#[derive(Debug, Clone)]
pub struct Ppu {
    ctrl: Control,
    mask: Mask,
    status: Status,
    oam_addr: u8,
    oam: [u8; ppu_mem::OAM_RAM_SIZE],
    /// Last page written to the DMA port, readable back at `$4014`.
    dma_page: u8,
    nametables: [u8; NAMETABLE_RAM_SIZE],
    palette_ram: [u8; ppu_mem::PALETTE_RAM_SIZE],
    /// 14-bit VRAM pointer formed by the two-phase `$2006` writes.
    vram_addr: u16,
    /// Delay buffer backing non-palette `$2007` reads.
    read_buffer: u8,
    scroll_x: u8,
    scroll_y: u8,
    /// First/second-write toggle shared by PPUADDR and PPUSCROLL; a `$2002`
    /// read resets it.
    write_toggle: bool,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            ctrl: Control::default(),
            mask: Mask::default(),
            status: Status::default(),
            oam_addr: 0,
            oam: [0; ppu_mem::OAM_RAM_SIZE],
            dma_page: 0,
            nametables: [0; NAMETABLE_RAM_SIZE],
            palette_ram: [0; ppu_mem::PALETTE_RAM_SIZE],
            vram_addr: 0,
            read_buffer: 0,
            scroll_x: 0,
            scroll_y: 0,
            write_toggle: false,
        }
    }

    /// CPU read of a canonicalized `$2000-$2007` port address.
    pub(crate) fn cpu_read(&mut self, addr: u16, cartridge: &Cartridge) -> Result<u8, Error> {
        match ppu_mem::Register::from_cpu_addr(addr) {
            ppu_mem::Register::Status => {
                let value = self.status.bits();
                self.status.remove(Status::VERTICAL_BLANK);
                self.write_toggle = false;
                Ok(value)
            }
            ppu_mem::Register::OamData => Ok(self.oam[self.oam_addr as usize]),
            ppu_mem::Register::Data => {
                let pointer = self.vram_addr & ppu_mem::VRAM_MIRROR_MASK;
                let value = if pointer >= ppu_mem::PALETTE_BASE {
                    // Palette reads bypass the delay buffer; the buffer still
                    // refills from the nametable underneath.
                    self.read_buffer = self.vram_read(pointer - 0x1000, cartridge)?;
                    self.palette_ram[palette_index(pointer)]
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = self.vram_read(pointer, cartridge)?;
                    buffered
                };
                self.increment_vram_addr();
                Ok(value)
            }
            ppu_mem::Register::Control
            | ppu_mem::Register::Mask
            | ppu_mem::Register::OamAddr
            | ppu_mem::Register::Scroll
            | ppu_mem::Register::Addr => Err(Error::PpuProtocol { addr }),
        }
    }

    /// CPU write of a canonicalized `$2000-$2007` port address.
    pub(crate) fn cpu_write(
        &mut self,
        addr: u16,
        value: u8,
        cartridge: &mut Cartridge,
    ) -> Result<(), Error> {
        match ppu_mem::Register::from_cpu_addr(addr) {
            ppu_mem::Register::Control => self.ctrl = Control::from_bits_truncate(value),
            ppu_mem::Register::Mask => self.mask = Mask::from_bits_truncate(value),
            ppu_mem::Register::Status => return Err(Error::PpuProtocol { addr }),
            ppu_mem::Register::OamAddr => self.oam_addr = value,
            ppu_mem::Register::OamData => {
                self.oam[self.oam_addr as usize] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            ppu_mem::Register::Scroll => {
                if self.write_toggle {
                    self.scroll_y = value;
                } else {
                    self.scroll_x = value;
                }
                self.write_toggle = !self.write_toggle;
            }
            ppu_mem::Register::Addr => {
                if self.write_toggle {
                    self.vram_addr = (self.vram_addr & 0xFF00) | value as u16;
                } else {
                    // High byte first, masked to the 14-bit space.
                    self.vram_addr = ((value as u16 & 0x3F) << 8) | (self.vram_addr & 0x00FF);
                }
                self.write_toggle = !self.write_toggle;
            }
            ppu_mem::Register::Data => {
                let pointer = self.vram_addr & ppu_mem::VRAM_MIRROR_MASK;
                self.vram_write(pointer, value, cartridge)?;
                self.increment_vram_addr();
            }
        }
        Ok(())
    }

    /// Accepts a complete OAM image from the `$4014` DMA transfer.
    pub(crate) fn load_oam(&mut self, page: u8, bytes: &[u8; ppu_mem::OAM_RAM_SIZE]) {
        self.dma_page = page;
        self.oam = *bytes;
    }

    pub(crate) fn dma_page(&self) -> u8 {
        self.dma_page
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    /// The (X, Y) scroll origin latched through `$2005`. Stored for hosts
    /// and debuggers; the frame-granular render pass does not apply it.
    pub fn scroll(&self) -> (u8, u8) {
        (self.scroll_x, self.scroll_y)
    }

    /// Raises the VBlank flag; returns whether PPUCTRL asks for an NMI.
    pub fn enter_vblank(&mut self) -> bool {
        self.status.insert(Status::VERTICAL_BLANK);
        self.ctrl.nmi_enabled()
    }

    /// Ends the blanking interval, clearing the per-frame status bits.
    pub fn exit_vblank(&mut self) {
        self.status
            .remove(Status::VERTICAL_BLANK | Status::SPRITE_ZERO_HIT | Status::SPRITE_OVERFLOW);
    }

    fn increment_vram_addr(&mut self) {
        self.vram_addr =
            self.vram_addr.wrapping_add(self.ctrl.vram_increment()) & ppu_mem::VRAM_MIRROR_MASK;
    }

    fn vram_read(&self, addr: u16, cartridge: &Cartridge) -> Result<u8, Error> {
        let addr = addr & ppu_mem::VRAM_MIRROR_MASK;
        match addr {
            0x0000..=0x1FFF => Ok(cartridge.chr_read(addr)),
            ppu_mem::NAMETABLE_BASE..=ppu_mem::NAMETABLE_END => {
                Ok(self.nametables[nametable_index(addr, cartridge.mirroring())])
            }
            0x3000..=0x3EFF => Err(Error::PpuProtocol { addr }),
            _ => Ok(self.palette_ram[palette_index(addr)]),
        }
    }

    fn vram_write(&mut self, addr: u16, value: u8, cartridge: &mut Cartridge) -> Result<(), Error> {
        let addr = addr & ppu_mem::VRAM_MIRROR_MASK;
        match addr {
            0x0000..=0x1FFF => cartridge.chr_write(addr, value),
            ppu_mem::NAMETABLE_BASE..=ppu_mem::NAMETABLE_END => {
                self.nametables[nametable_index(addr, cartridge.mirroring())] = value;
            }
            0x3000..=0x3EFF => return Err(Error::PpuProtocol { addr }),
            _ => self.palette_ram[palette_index(addr)] = value,
        }
        Ok(())
    }

    /// Composes one frame from the current VRAM, palette and OAM state.
    pub fn render(&mut self, cartridge: &Cartridge, frame: &mut Frame) {
        let mut bg_opaque = vec![false; SCREEN_WIDTH * SCREEN_HEIGHT];
        if self.mask.contains(Mask::SHOW_BACKGROUND) {
            self.render_background(cartridge, frame, &mut bg_opaque);
        } else {
            let backdrop = palette::rgba(self.palette_ram[0]);
            for y in 0..SCREEN_HEIGHT {
                for x in 0..SCREEN_WIDTH {
                    frame.set_pixel(x, y, backdrop);
                }
            }
        }
        if self.mask.contains(Mask::SHOW_SPRITES) {
            self.render_sprites(cartridge, frame, &bg_opaque);
            self.update_sprite_overflow();
        }
    }

    /// Walks the 32x30 tile grid of the selected nametable, combining the
    /// two pattern bit-planes with the attribute quadrant bits into 4-bit
    /// palette indices.
    fn render_background(&self, cartridge: &Cartridge, frame: &mut Frame, opaque: &mut [bool]) {
        let pattern_base = self.ctrl.background_pattern_table();
        let nametable_base = self.ctrl.base_nametable_addr();
        let mirroring = cartridge.mirroring();

        for tile_y in 0..30usize {
            for tile_x in 0..32usize {
                let tile_addr = nametable_base + (tile_y * 32 + tile_x) as u16;
                let tile = self.nametables[nametable_index(tile_addr, mirroring)];

                // One attribute byte covers a 4x4 tile block, two bits per
                // 2x2 quadrant.
                let attr_addr = nametable_base + 0x3C0 + ((tile_y / 4) * 8 + tile_x / 4) as u16;
                let attr = self.nametables[nametable_index(attr_addr, mirroring)];
                let quadrant = (tile_y % 4) / 2 * 2 + (tile_x % 4) / 2;
                let palette_select = (attr >> (quadrant * 2)) & 0b11;

                let tile_base = pattern_base + tile as u16 * TILE_BYTES;
                for row in 0..8u16 {
                    let plane_lo = cartridge.chr_read(tile_base + row);
                    let plane_hi = cartridge.chr_read(tile_base + row + 8);
                    for col in 0..8u16 {
                        let bit = 7 - col;
                        let pix = (((plane_hi >> bit) & 1) << 1) | ((plane_lo >> bit) & 1);
                        let x = tile_x * 8 + col as usize;
                        let y = tile_y * 8 + row as usize;
                        frame.set_pixel(x, y, palette::rgba(self.background_color(palette_select, pix)));
                        if pix != 0 {
                            opaque[y * SCREEN_WIDTH + x] = true;
                        }
                    }
                }
            }
        }
    }

    /// Index 0 of every sub-palette aliases the universal backdrop.
    fn background_color(&self, palette_select: u8, pix: u8) -> u8 {
        if pix == 0 {
            self.palette_ram[0]
        } else {
            self.palette_ram[(palette_select * 4 + pix) as usize]
        }
    }

    /// Draws OAM sprites over (or behind) the background. Iterates high to
    /// low so lower OAM indices end up in front.
    fn render_sprites(&mut self, cartridge: &Cartridge, frame: &mut Frame, bg_opaque: &[bool]) {
        let height = self.sprite_height();

        for sprite in (0..64usize).rev() {
            let entry = &self.oam[sprite * 4..sprite * 4 + 4];
            let (oam_y, tile, attr, oam_x) = (entry[0], entry[1], entry[2], entry[3]);

            // OAM stores top-minus-one; $FF parks the sprite off screen.
            let top = oam_y as usize + 1;
            if top >= SCREEN_HEIGHT {
                continue;
            }

            let palette_select = attr & 0b11;
            let behind = attr & 0x20 != 0;
            let hflip = attr & 0x40 != 0;
            let vflip = attr & 0x80 != 0;

            for line in 0..height {
                let y = top + line;
                if y >= SCREEN_HEIGHT {
                    break;
                }
                let sprite_line = if vflip { height - 1 - line } else { line };
                let (table, index, row) = if height == 16 {
                    // 8x16 sprites take their table from tile bit 0 and
                    // stack two adjacent tiles.
                    let table = if tile & 1 != 0 {
                        ppu_mem::PATTERN_TABLE_1
                    } else {
                        ppu_mem::PATTERN_TABLE_0
                    };
                    let index = (tile & 0xFE) + (sprite_line >= 8) as u8;
                    (table, index, (sprite_line % 8) as u16)
                } else {
                    (self.ctrl.sprite_pattern_table(), tile, sprite_line as u16)
                };

                let tile_base = table + index as u16 * TILE_BYTES;
                let plane_lo = cartridge.chr_read(tile_base + row);
                let plane_hi = cartridge.chr_read(tile_base + row + 8);

                for col in 0..8usize {
                    let x = oam_x as usize + col;
                    if x >= SCREEN_WIDTH {
                        break;
                    }
                    let bit = if hflip { col } else { 7 - col };
                    let pix = (((plane_hi >> bit) & 1) << 1) | ((plane_lo >> bit) & 1);
                    if pix == 0 {
                        continue;
                    }

                    let over_background = bg_opaque[y * SCREEN_WIDTH + x];
                    if sprite == 0 && over_background {
                        self.status.insert(Status::SPRITE_ZERO_HIT);
                    }
                    if behind && over_background {
                        continue;
                    }

                    let color = self.palette_ram[(0x10 + palette_select * 4 + pix) as usize];
                    frame.set_pixel(x, y, palette::rgba(color));
                }
            }
        }
    }

    fn sprite_height(&self) -> usize {
        if self.ctrl.use_8x16_sprites() { 16 } else { 8 }
    }

    /// More than eight sprites on any scanline raises the overflow flag.
    fn update_sprite_overflow(&mut self) {
        let height = self.sprite_height();
        let mut counts = [0u8; SCREEN_HEIGHT];
        for sprite in 0..64usize {
            let top = self.oam[sprite * 4] as usize + 1;
            for line in top..(top + height).min(SCREEN_HEIGHT) {
                counts[line] += 1;
            }
        }
        if counts.iter().any(|&count| count > 8) {
            self.status.insert(Status::SPRITE_OVERFLOW);
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a `$2000-$2FFF` address to physical nametable storage.
fn nametable_index(addr: u16, mirroring: Mirroring) -> usize {
    let offset = (addr - ppu_mem::NAMETABLE_BASE) as usize;
    match mirroring {
        Mirroring::Vertical => offset & 0x07FF,
        Mirroring::Horizontal => ((offset >> 1) & 0x400) | (offset & 0x3FF),
        Mirroring::FourScreen => offset,
    }
}

/// Palette addresses fold modulo 32; the four sprite backdrop slots alias
/// their background counterparts.
fn palette_index(addr: u16) -> usize {
    let index = (addr as usize - ppu_mem::PALETTE_BASE as usize) % ppu_mem::PALETTE_RAM_SIZE;
    match index {
        0x10 | 0x14 | 0x18 | 0x1C => index - 0x10,
        _ => index,
    }
}
