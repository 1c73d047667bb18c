//! Rebuild an image from a pixel dump captured in a device log.
//!
//! ## Usage
//!
//! ```bash
//! facecloak-decode                                  # output.txt -> output.png, 336x300
//! facecloak-decode -i serial.log -o frame.png --width 320 --height 240
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;

use facecloak::pixels::{self, DEFAULT_HEIGHT, DEFAULT_WIDTH};

struct DecodeArgs {
    input: PathBuf,
    output: PathBuf,
    width: u32,
    height: u32,
}

impl Default for DecodeArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("output.txt"),
            output: PathBuf::from("output.png"),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let log = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let img = pixels::decode_rgb(&log, args.width, args.height)?;
    img.save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("Image saved as {}", args.output.display());
    Ok(())
}

fn parse_args() -> Result<DecodeArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = DecodeArgs::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--input" | "-i" => {
                parsed.input = PathBuf::from(value.context("--input requires a path argument")?);
                i += 1;
            }
            "--output" | "-o" => {
                parsed.output = PathBuf::from(value.context("--output requires a path argument")?);
                i += 1;
            }
            "--width" => {
                parsed.width = value.context("--width requires a number")?.parse()?;
                i += 1;
            }
            "--height" => {
                parsed.height = value.context("--height requires a number")?.parse()?;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Ok(parsed)
}

fn print_help() {
    println!(
        r#"facecloak-decode - Rebuild an RGB frame from a logged pixel dump

USAGE:
    facecloak-decode [OPTIONS]

OPTIONS:
    --input, -i PATH    Log file containing the dump (default: output.txt)
    --output, -o PATH   Image to write (default: output.png)
    --width N           Frame width in pixels (default: {DEFAULT_WIDTH})
    --height N          Frame height in pixels (default: {DEFAULT_HEIGHT})
    --help, -h          Show this help message

The dump is the hex text between ===PIXELS_START=== and ===PIXELS_END===."#
    );
}
