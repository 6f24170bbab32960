//! setu-solve - solve a tile stack from a JSON dataset
//!
//! Reads a dataset of tile specs and point matches, solves the configured
//! z-range block by block and writes the final models per layer.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use setu_solve::{CheckpointStore, DistributedSolve, JsonDataset, SolveConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

struct Args {
    config_path: Option<PathBuf>,
    dataset_path: Option<PathBuf>,
    output_path: PathBuf,
    merge_only: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut result = Args {
        config_path: None,
        dataset_path: None,
        output_path: PathBuf::from("resolved.json"),
        merge_only: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    result.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--dataset" | "-d" => {
                if i + 1 < args.len() {
                    result.dataset_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    result.output_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--merge-only" => result.merge_only = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    result
}

fn print_help() {
    println!("setu-solve - distributed block solver for microscopy tile stacks");
    println!();
    println!("USAGE:");
    println!("    setu-solve [OPTIONS] --dataset <FILE>");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>     Configuration file (default: built-in defaults)");
    println!("    -d, --dataset <FILE>    JSON dataset with tile_specs and matches");
    println!("    -o, --output <FILE>     Resolved models output (default: resolved.json)");
    println!("        --merge-only        Stitch existing checkpoints instead of solving");
    println!("    -h, --help              Print help information");
    println!();
    println!("CONFIGURATION:");
    println!("    - [stack] min_z, max_z, block_size: range and block layout");
    println!("    - [solver] threads, block_threads, stages: relaxation schedule");
    println!("    - [merge] overlap_top, overlap_bottom: boundary bands");
    println!("    - [checkpoint] directory: solved block checkpoints");
}

fn run(args: &Args) -> setu_solve::Result<()> {
    let config = match &args.config_path {
        Some(path) => SolveConfig::load(path)?,
        None => {
            log::info!("No config given, using defaults");
            SolveConfig::default()
        }
    };

    let mut dataset = match &args.dataset_path {
        Some(path) => JsonDataset::load(path)?,
        None if args.merge_only => JsonDataset::default(),
        None => {
            return Err(setu_solve::Error::Config(
                "--dataset is required unless --merge-only is given".into(),
            ));
        }
    };

    log::info!("setu-solve starting");
    log::info!(
        "  Range: z=[{}, {}], block size {}",
        config.stack.min_z,
        config.stack.max_z,
        config.stack.block_size
    );
    log::info!(
        "  Threads: {} per block, {} blocks at once",
        config.solver.threads,
        config.solver.block_threads
    );
    log::info!("  Stages: {}", config.solver.stages.len());

    let driver = DistributedSolve::new(config)?;
    let summary = if args.merge_only {
        let directory = driver.config().checkpoint.directory.clone().ok_or_else(|| {
            setu_solve::Error::Config("--merge-only needs [checkpoint] directory".into())
        })?;
        let store = CheckpointStore::new(&directory)?;
        let min_entries = driver.config().checkpoint.min_entries;
        driver.merge_from_checkpoints(&store, min_entries, &mut dataset)?
    } else {
        let source = dataset.stack().clone();
        driver.run(&source, &mut dataset)?
    };

    dataset.write_resolved(&args.output_path)?;
    log::info!(
        "Wrote {} tiles in {} layers to {}",
        summary.tiles,
        summary.layers,
        args.output_path.display()
    );
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = parse_args();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("setu-solve failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
