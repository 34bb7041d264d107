//! Model container probe CLI - tells zip-based model archives from legacy
//! pickle streams and checks the legacy magic number, without unpickling.
//!
//! Usage:
//!   model-probe /path/to/models
//!   model-probe model.pt --strict --format json
//!   model-probe checkpoints/ --gzip --expected-magic 0x1950a86a20f9469cfc6c

mod logging;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use num_bigint::BigInt;
use tracing::info;

use probe_core::magic::{format_magic, legacy_magic_number, parse_magic};
use probe_core::probe::{run_probe, ProbeConfig, ProbeProgress};
use probe_core::report::{print_results, OutputFormat};

#[derive(Parser)]
#[command(name = "model-probe")]
#[command(about = "Container-format and magic-number probe for serialized model files")]
struct Cli {
    /// Paths to probe (files or directories)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Expected legacy magic number, in hex
    #[arg(long, value_parser = parse_expected_magic)]
    expected_magic: Option<BigInt>,

    /// Treat a magic number mismatch as an error and exit non-zero
    #[arg(long)]
    strict: bool,

    /// Inflate gzip-compressed files before probing
    #[arg(long)]
    gzip: bool,

    /// Debug logging for the probe crates
    #[arg(short, long)]
    verbose: bool,
}

fn parse_expected_magic(s: &str) -> Result<BigInt> {
    parse_magic(s).ok_or_else(|| anyhow!("not a hex magic number: {s}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let config = ProbeConfig {
        target_paths: cli.paths,
        expected_magic: cli.expected_magic.unwrap_or_else(legacy_magic_number),
        strict: cli.strict,
        decompress_gzip: cli.gzip,
    };
    info!("expected magic {}", format_magic(&config.expected_magic));

    let progress = Arc::new(ProbeProgress::new());

    info!("probing...");
    let results = run_probe(&config, &progress)?;

    let total = progress.total_files.load(Ordering::Relaxed);
    info!("probed {} files", total);

    if results.is_empty() {
        info!("no files to probe");
        return Ok(());
    }

    print_results(&results, cli.format).context("failed to write report")?;

    let errors = progress.error_count.load(Ordering::Relaxed);
    if config.strict && errors > 0 {
        bail!("{errors} of {total} files failed strict probing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "model-probe",
            "a.pt",
            "dir",
            "--format",
            "json",
            "--strict",
            "--gzip",
            "--expected-magic",
            "0x2a",
        ])
        .unwrap();
        assert_eq!(cli.paths.len(), 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.strict);
        assert!(cli.gzip);
        assert_eq!(cli.expected_magic, Some(BigInt::from(42)));
    }

    #[test]
    fn rejects_bad_magic_and_missing_paths() {
        assert!(Cli::try_parse_from(["model-probe", "a.pt", "--expected-magic", "xyz"]).is_err());
        assert!(Cli::try_parse_from(["model-probe"]).is_err());
    }
}
