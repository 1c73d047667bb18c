//! Produce the pixelated, blacked-out and blurred variants of an original image.
//!
//! The variants are named after the scanner keywords, so the output directory
//! can be evaluated by `facecloak` directly once the original is placed in it.
//!
//! ## Usage
//!
//! ```bash
//! facecloak-anonymize -i images/group/original.jpg          # writes pixel.jpg, black.jpg, blurr.jpg next to it
//! facecloak-anonymize -i shot.png -o out/ --dump             # also writes pixel.txt, ... as pixel dumps
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use facecloak::anonymize;
use facecloak::config::Config;
use facecloak::evaluation::Technique;
use facecloak::faces::{BoundingBox, OnnxEngine};
use facecloak::logging;
use facecloak::pixels;

#[derive(Default)]
struct AnonymizeArgs {
    input: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    dump: bool,
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let input = args.input.context("--input is required")?;

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    logging::init(&config.logging)?;

    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let img = image::open(&input).with_context(|| format!("Failed to open {}", input.display()))?;
    let engine = OnnxEngine::load(&config.engine).context("Failed to load face models")?;
    let faces: Vec<BoundingBox> = engine
        .detect_in_image(&img)
        .with_context(|| format!("Face detection failed on {}", input.display()))?
        .into_iter()
        .map(|face| face.bbox)
        .collect();

    tracing::info!(image = ?input, faces = faces.len(), "Faces detected");
    if faces.is_empty() {
        println!("No faces found in {}; variants are copies of the original", input.display());
    }

    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();
    let rgb = img.to_rgb8();

    for technique in Technique::ALL {
        let variant = anonymize::anonymize(&rgb, &faces, technique);
        let keyword = config.scanner.keyword(technique);

        let path = output_dir.join(format!("{keyword}.{extension}"));
        variant
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}: {}", technique.display_name(), path.display());

        if args.dump {
            let dump_path = output_dir.join(format!("{keyword}.txt"));
            std::fs::write(&dump_path, pixels::render_pixel_block(&variant))
                .with_context(|| format!("Failed to write {}", dump_path.display()))?;
        }
    }

    Ok(())
}

fn parse_args() -> Result<AnonymizeArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = AnonymizeArgs::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--input" | "-i" => {
                parsed.input = Some(PathBuf::from(value.context("--input requires a path argument")?));
                i += 1;
            }
            "--output-dir" | "-o" => {
                parsed.output_dir = Some(PathBuf::from(value.context("--output-dir requires a path argument")?));
                i += 1;
            }
            "--config" | "-c" => {
                parsed.config_path = Some(PathBuf::from(value.context("--config requires a path argument")?));
                i += 1;
            }
            "--dump" => parsed.dump = true,
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
        r#"facecloak-anonymize - Write pixelated, blacked-out and blurred variants of an image

USAGE:
    facecloak-anonymize --input PATH [OPTIONS]

OPTIONS:
    --input, -i PATH        Original image
    --output-dir, -o DIR    Where to write the variants (default: next to the input)
    --config, -c PATH       Path to config file (models and filename keywords)
    --dump                  Also write each variant as a pixel dump (<keyword>.txt)
    --help, -h              Show this help message

Faces are found with the same models `facecloak` evaluates with. Block and
kernel sizes scale with each face: pixelation blocks are 10% of the shorter
side (at least 3 px), the blur radius is 15% (at least 15 px, at most a third)."#
    );
}
