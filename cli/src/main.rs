//! Batch inspection/export tool. Deliberately does not open a window or
//! read keyboard input — interactive playback is out of scope for this
//! binary; it parses a cutscene, reports on it, or rasterizes one frame to
//! a PNG.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use flashback_core::assets::cutscene::Cutscene;
use flashback_core::assets::script::encode_command;
use flashback_core::gfx::framebuffer::{HEIGHT, WIDTH};
use flashback_core::vm::Vm;

#[derive(Parser)]
#[command(name = "flashback-cli", about = "Inspect and export Flashback-style cutscenes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a cutscene's shape/palette/script summary.
    Inspect {
        /// Directory containing `<NAME>.CMD` and `<NAME>.POL`.
        data_dir: PathBuf,
        /// Cutscene name (case-insensitive; files are matched upper-case).
        name: String,
    },
    /// Rasterize a single frame and write it out as a PNG.
    RenderFrame {
        data_dir: PathBuf,
        name: String,
        frame: u32,
        output: PathBuf,
    },
}

fn load_cutscene(data_dir: &Path, name: &str) -> Result<Cutscene> {
    let upper = name.to_uppercase();
    let cmd_path = data_dir.join(format!("{upper}.CMD"));
    let pol_path = data_dir.join(format!("{upper}.POL"));
    let cmd_bytes = fs::read(&cmd_path).with_context(|| format!("reading {}", cmd_path.display()))?;
    let pol_bytes = fs::read(&pol_path).with_context(|| format!("reading {}", pol_path.display()))?;
    Cutscene::parse(&upper, &cmd_bytes, &pol_bytes).map_err(|e| anyhow::anyhow!("{e}"))
}

fn run_inspect(data_dir: PathBuf, name: String) -> Result<()> {
    let cutscene = load_cutscene(&data_dir, &name)?;
    println!("cutscene: {}", cutscene.name);
    println!("shapes: {}", cutscene.shapes.len());
    println!("palettes: {}", cutscene.palettes.len());
    println!("subscenes: {}", cutscene.script.subscenes.len());
    println!("total frames: {}", cutscene.total_frames());

    for subscene in &cutscene.script.subscenes {
        println!("  subscene {}: {} frames", subscene.id, subscene.frames.len());
        for (fi, frame) in subscene.frames.iter().enumerate() {
            for cmd in &frame.commands {
                let re_encoded_len = encode_command(cmd).len();
                println!("    frame {fi}: {:?} ({re_encoded_len} bytes)", cmd.kind);
            }
        }
    }
    Ok(())
}

fn run_render_frame(data_dir: PathBuf, name: String, frame: u32, output: PathBuf) -> Result<()> {
    let cutscene = load_cutscene(&data_dir, &name)?;
    let mut vm = Vm::new(cutscene);
    vm.go_to_frame(frame);

    let pixels = vm.renderer().framebuffer().as_bytes();

    let file = fs::File::create(&output).with_context(|| format!("creating {}", output.display()))?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, WIDTH as u32, HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().context("writing PNG header")?;
    writer.write_image_data(pixels).context("writing PNG pixel data")?;

    println!("wrote frame {frame} of {} to {}", name.to_uppercase(), output.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect { data_dir, name } => run_inspect(data_dir, name),
        Command::RenderFrame { data_dir, name, frame, output } => {
            run_render_frame(data_dir, name, frame, output)
        }
    }
}
