mod common;

use ferricom_core::controller::Button;
use ferricom_core::error::Error;

use crate::common::{IDLE_JMP, nes_with_program};

#[test]
fn ram_is_mirrored_every_2k() {
    let mut nes = nes_with_program(&IDLE_JMP);

    nes.bus_write(0x0000, 0xAB).expect("ram write");

    for mirror in [0x0800u16, 0x1000, 0x1800] {
        assert_eq!(nes.bus_read(mirror).expect("ram read"), 0xAB);
    }

    nes.bus_write(0x1FFF, 0x5A).expect("mirror write");
    assert_eq!(nes.bus_read(0x07FF).expect("ram read"), 0x5A);
}

#[test]
fn ppu_registers_mirror_at_stride_8() {
    let mut nes = nes_with_program(&IDLE_JMP);

    // OAMADDR through a high mirror, OAMDATA through another; read back on
    // the canonical port.
    nes.bus_write(0x3FEB, 0x20).expect("oamaddr mirror"); // $2003 + k*8
    nes.bus_write(0x200C, 0x77).expect("oamdata mirror"); // $2004 + 8
    nes.bus_write(0x2003, 0x20).expect("oamaddr");
    assert_eq!(nes.bus_read(0x2004).expect("oamdata"), 0x77);
}

#[test]
fn oam_dma_copies_a_full_page_and_charges_cycles() {
    let mut nes = nes_with_program(&IDLE_JMP);

    for offset in 0..256u16 {
        nes.bus_write(0x0200 + offset, offset as u8).expect("ram fill");
    }

    let before = nes.cycles();
    nes.bus_write(0x4014, 0x02).expect("dma");
    let charged = nes.cycles() - before;

    assert!(
        charged == 513 || charged == 514,
        "dma charged {charged} cycles"
    );
    let oam: Vec<u8> = nes.ppu().oam().to_vec();
    let expected: Vec<u8> = (0..256u16).map(|v| v as u8).collect();
    assert_eq!(oam, expected);
}

#[test]
fn dma_port_reads_back_the_latched_page() {
    let mut nes = nes_with_program(&IDLE_JMP);

    nes.bus_write(0x4014, 0x03).expect("dma");
    assert_eq!(nes.bus_read(0x4014).expect("dma read"), 0x03);
}

#[test]
fn apu_and_expansion_ranges_read_zero() {
    let mut nes = nes_with_program(&IDLE_JMP);

    for addr in [0x4000u16, 0x4013, 0x4015, 0x4018, 0x5000, 0x5FFF] {
        assert_eq!(nes.bus_read(addr).expect("io read"), 0);
    }
}

#[test]
fn prg_rom_writes_fail_with_bus_access_error() {
    let mut nes = nes_with_program(&IDLE_JMP);

    let err = nes.bus_write(0x8000, 0x00).expect_err("rom is read-only");
    assert!(matches!(err, Error::BusAccess { addr: 0x8000 }));
}

#[test]
fn controller_strobe_then_serial_read() {
    let mut nes = nes_with_program(&IDLE_JMP);

    nes.bus_write(0x4016, 1).expect("strobe on");
    nes.controller_mut(0).set_button(Button::A, true);
    nes.controller_mut(0).set_button(Button::Down, true);
    nes.bus_write(0x4016, 0).expect("strobe off");

    // A, B, Select, Start, Up, Down, Left, Right.
    let bits: Vec<u8> = (0..8)
        .map(|_| nes.bus_read(0x4016).expect("pad read"))
        .collect();
    assert_eq!(bits, vec![1, 0, 0, 0, 0, 1, 0, 0]);

    // The exhausted register reports 1.
    assert_eq!(nes.bus_read(0x4016).expect("pad read"), 1);
}

#[test]
fn second_controller_port_is_independent() {
    let mut nes = nes_with_program(&IDLE_JMP);

    nes.controller_mut(1).set_button(Button::B, true);
    nes.bus_write(0x4016, 1).expect("strobe on");
    nes.bus_write(0x4016, 0).expect("strobe off");

    assert_eq!(nes.bus_read(0x4017).expect("pad 2 A"), 0);
    assert_eq!(nes.bus_read(0x4017).expect("pad 2 B"), 1);
    assert_eq!(nes.bus_read(0x4016).expect("pad 1 A"), 0);
}
