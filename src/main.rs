use anyhow::{Context, Result};
use std::path::PathBuf;

use facecloak::config::Config;
use facecloak::evaluation::{evaluate_folders, FolderEvaluation};
use facecloak::faces::{DetectionEngine, MatchStrategy, OnnxEngine};
use facecloak::logging;
use facecloak::report::{self, SkippedFolder};
use facecloak::scanner::{discover_folders, find_variant_set};

#[derive(Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    images_root: Option<PathBuf>,
    folders: Vec<String>,
    strategy: Option<MatchStrategy>,
    json: bool,
    write_config: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("facecloak {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                cli.config_path = Some(PathBuf::from(require_value(&args, i, "--config")));
                i += 1;
            }
            "--root" | "-r" => {
                cli.images_root = Some(PathBuf::from(require_value(&args, i, "--root")));
                i += 1;
            }
            "--folder" | "-f" => {
                cli.folders.push(require_value(&args, i, "--folder").to_string());
                i += 1;
            }
            "--strategy" | "-s" => {
                match require_value(&args, i, "--strategy").parse() {
                    Ok(strategy) => cli.strategy = Some(strategy),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            "--json" => cli.json = true,
            "--write-config" => cli.write_config = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn require_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires an argument", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"facecloak - Check whether face anonymization defeats face recognition

USAGE:
    facecloak [OPTIONS]

OPTIONS:
    --config, -c PATH     Path to config file
    --root, -r DIR        Directory with one subfolder per scene (default: images)
    --folder, -f NAME     Evaluate only this subfolder (repeatable)
    --strategy, -s NAME   Face pairing: greedy (default) or optimal
    --json                Print the report as JSON
    --write-config        Save the effective configuration and exit
    --version, -V         Show version
    --help, -h            Show this help message

Each scene folder must contain an image whose name includes "original" and
one per technique whose name includes "pixel", "black" or "blurr".

ENVIRONMENT:
    FACECLOAK_CONFIG    Path to config file (overrides default location)
    FACECLOAK_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/facecloak/config.toml"#
    );
}

fn main() -> Result<()> {
    let cli = parse_args();

    let mut config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(root) = cli.images_root {
        config.images_root = root;
    }
    if !cli.folders.is_empty() {
        config.folders = cli.folders;
    }
    if let Some(strategy) = cli.strategy {
        config.matching.strategy = strategy;
    }
    config.validate()?;

    if cli.write_config {
        let path = cli.config_path.unwrap_or_else(Config::config_path);
        config.save_to(&path)?;
        println!("Config written to {}", path.display());
        return Ok(());
    }

    logging::init(&config.logging)?;

    let mut skipped = Vec::new();
    let mut sets = Vec::new();
    for folder in discover_folders(&config.images_root, &config.folders)? {
        let set = folder.and_then(|folder| find_variant_set(&folder, &config.scanner));
        match set {
            Ok(set) => sets.push(set),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping folder");
                let name = e
                    .folder()
                    .and_then(|f| f.file_name())
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| config.images_root.display().to_string());
                skipped.push(SkippedFolder {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    if sets.is_empty() {
        tracing::warn!(root = ?config.images_root, "No folders to evaluate");
        return print_report(cli.json, "none", &[], &skipped);
    }

    let engine = OnnxEngine::load(&config.engine).context("Failed to load face models")?;
    let settings = config.evaluation_settings();
    tracing::info!(
        engine = engine.name(),
        strategy = settings.strategy.name(),
        distance_threshold = settings.distance_threshold,
        similarity_threshold = settings.similarity_threshold,
        "Starting evaluation"
    );

    let results = evaluate_folders(&engine, &sets, &settings)?;

    print_report(cli.json, engine.name(), &results, &skipped)
}

fn print_report(json: bool, engine: &str, results: &[FolderEvaluation], skipped: &[SkippedFolder]) -> Result<()> {
    if json {
        println!("{}", report::render_json(engine, results, skipped)?);
    } else {
        print!("{}", report::render_text(results, skipped));
    }
    Ok(())
}
