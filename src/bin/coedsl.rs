//! Compile an object dictionary DSL file and run its `make` directives.
//!
//! Usage:
//!   coedsl [-v] [--out-dir DIR] FILE
//!
//! Exits non-zero if the file does not compile or any directive fails.

use anyhow::Context as _;
use clap::Parser;
use coedsl::generator::{self, Registry};
use coedsl::{compile, dump, CompileError};
use env_logger::Env;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(version, about = "EtherCAT CoE object dictionary compiler")]
struct Args {
    /// DSL source file
    file: PathBuf,
    /// Directory relative output paths are written to
    #[clap(long, short, default_value = ".")]
    out_dir: PathBuf,
    /// Dump the resolved dictionary and log at debug level
    #[clap(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let source = std::fs::read_to_string(&args.file)
        .map_err(|e| CompileError::io(&args.file, e))?;
    let compiled = compile(&source).with_context(|| format!("compiling {}", args.file.display()))?;

    if args.verbose {
        print!("{}", dump::dictionary(&compiled.world.dictionary));
    }

    let registry = Registry::default();
    let mut world = compiled.world;
    let failures = generator::run(&registry, &mut world, &compiled.makes, &args.out_dir);
    if !failures.is_empty() {
        for failure in &failures {
            eprintln!(
                "{}:{}: make {}: {}",
                args.file.display(),
                failure.directive.location,
                failure.directive.generator,
                failure.error
            );
        }
        anyhow::bail!("{} of {} make directives failed", failures.len(), compiled.makes.len());
    }
    Ok(())
}
