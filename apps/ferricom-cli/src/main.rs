mod args;

use std::{
    fs::File,
    io::BufWriter,
    path::Path,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use ferricom_core::{
    Cartridge, Nes,
    cpu::StepTrace,
    ppu::frame::Frame,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::Args;

/// ~60.0988 Hz NTSC field rate.
const FRAME_TIME: Duration = Duration::from_nanos(16_639_267);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let cartridge = Cartridge::load_from_file(&args.rom)
        .with_context(|| format!("loading {}", args.rom.display()))?;
    let mut nes = Nes::new(cartridge)?;
    info!(rom = %args.rom.display(), "starting emulation");

    let mut frames = 0u64;
    let mut instructions = 0u64;
    loop {
        let deadline = Instant::now() + FRAME_TIME;

        if args.trace {
            nes.run_frame_with(|step| {
                instructions += 1;
                println!("{}", format_trace(instructions, step));
            })?;
        } else {
            nes.run_frame()?;
        }

        frames += 1;
        if let Some(limit) = args.frames
            && frames >= limit
        {
            break;
        }

        if !args.no_pacing
            && let Some(rest) = deadline.checked_duration_since(Instant::now())
        {
            thread::sleep(rest);
        }
    }

    if let Some(path) = &args.screenshot {
        write_png(path, nes.frame())
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote screenshot");
    }

    info!(frames, cycles = nes.cycles(), "emulation finished");
    Ok(())
}

fn format_trace(index: u64, step: &StepTrace) -> String {
    let prev = step.prev;
    format!(
        "{index:04} PC: {:04X} {:02X} OP: {} {:04X}({}) A:{:02X} X:{:02X} Y:{:02X} P:{:02X} S:{:02X}",
        prev.pc, step.opcode, step.mnemonic, step.operand, step.mode, prev.a, prev.x, prev.y, prev.p,
        prev.s
    )
}

fn write_png(path: &Path, frame: &Frame) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, frame.width() as u32, frame.height() as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(frame.as_bytes())?;
    Ok(())
}
