//! Probe orchestrator with progress tracking, shared by the CLI.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{ensure, Result};
use num_bigint::BigInt;
use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::compression::{is_compressed_file, should_read_directly};
use crate::error::ProbeError;
use crate::format::ContainerFormat;
use crate::gzip::{is_gzip, GzipStream};
use crate::magic::{check_magic, get_magic_number, legacy_magic_number};
use crate::report::ProbeResult;
use crate::stream::ProbeStream;

/// Configuration for a probe run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub target_paths: Vec<PathBuf>,
    /// Magic number legacy pickles are compared against.
    pub expected_magic: BigInt,
    /// Turn a magic mismatch into a per-file error instead of a flag.
    pub strict: bool,
    /// Inflate gzip-compressed inputs before probing them.
    pub decompress_gzip: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_paths: Vec::new(),
            expected_magic: legacy_magic_number(),
            strict: false,
            decompress_gzip: false,
        }
    }
}

/// Atomic progress tracking, readable from another thread while a run is going.
pub struct ProbeProgress {
    pub total_files: AtomicUsize,
    pub probed_files: AtomicUsize,
    pub zip_count: AtomicUsize,
    pub legacy_count: AtomicUsize,
    pub mismatch_count: AtomicUsize,
    pub error_count: AtomicUsize,
    pub cancel: AtomicBool,
}

impl ProbeProgress {
    pub fn new() -> Self {
        Self {
            total_files: AtomicUsize::new(0),
            probed_files: AtomicUsize::new(0),
            zip_count: AtomicUsize::new(0),
            legacy_count: AtomicUsize::new(0),
            mismatch_count: AtomicUsize::new(0),
            error_count: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
        }
    }
}

impl Default for ProbeProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// What the detectors report for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProbe {
    pub format: ContainerFormat,
    pub compressed: bool,
    pub direct_read: bool,
    /// Extracted magic number; always `None` for zip archives.
    pub magic: Option<BigInt>,
    /// Whether `magic` matched the expected value; `None` for zip archives.
    pub magic_ok: Option<bool>,
}

/// Run every detector over one stream.
///
/// The stream position is unchanged afterwards unless a magic number was
/// found, in which case the stream is left at offset 0.
pub fn probe_stream<S: ProbeStream + ?Sized>(
    stream: &mut S,
    label: &str,
    expected_magic: &BigInt,
    strict: bool,
) -> Result<StreamProbe, ProbeError> {
    let compressed = is_compressed_file(&*stream);
    let direct_read = should_read_directly(&*stream)?;
    let format = ContainerFormat::detect(&mut *stream)?;
    debug!(label, %format, compressed, direct_read, "classified stream");

    if format == ContainerFormat::ZipArchive {
        return Ok(StreamProbe {
            format,
            compressed,
            direct_read,
            magic: None,
            magic_ok: None,
        });
    }

    let magic = get_magic_number(&mut *stream)?;
    let magic_ok = match check_magic(magic.clone(), expected_magic, label) {
        Ok(_) => true,
        Err(err) if strict => return Err(err.into()),
        Err(err) => {
            warn!("magic number mismatch: {err}");
            false
        }
    };

    Ok(StreamProbe {
        format,
        compressed,
        direct_read,
        magic,
        magic_ok: Some(magic_ok),
    })
}

/// Open `path` and probe it, inflating it first if it is gzip and the
/// configuration asks for that.
pub fn probe_file(path: &Path, config: &ProbeConfig) -> Result<StreamProbe, ProbeError> {
    let label = path.display().to_string();
    let mut file = File::open(path)?;

    if config.decompress_gzip && is_gzip(&mut file)? {
        let mut stream = GzipStream::new(BufReader::new(file))?;
        return probe_stream(&mut stream, &label, &config.expected_magic, config.strict);
    }

    let mut reader = BufReader::new(file);
    probe_stream(&mut reader, &label, &config.expected_magic, config.strict)
}

/// Expand `paths` into the sorted list of regular files to probe.
///
/// Directories are walked without following symlinks. Entries the walk
/// cannot read are logged and skipped; the rest of the tree is still
/// collected.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            continue;
        }
        for entry in WalkDir::new(path).follow_links(false) {
            match entry {
                Ok(entry) if entry.path().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => {
                    let at = err.path().unwrap_or(path.as_path()).display().to_string();
                    warn!(path = %at, "skipping unreadable entry: {err}");
                }
            }
        }
    }

    files.sort();
    files
}

/// Run a full probe with progress tracking. Blocking, so call it from a worker thread.
pub fn run_probe(config: &ProbeConfig, progress: &Arc<ProbeProgress>) -> Result<Vec<ProbeResult>> {
    for path in &config.target_paths {
        ensure!(path.exists(), "{} does not exist", path.display());
    }

    let files = collect_files(&config.target_paths);
    progress.total_files.store(files.len(), Ordering::Relaxed);

    if files.is_empty() {
        return Ok(Vec::new());
    }

    let results: Vec<ProbeResult> = files
        .par_iter()
        .filter_map(|path| {
            if progress.cancel.load(Ordering::Relaxed) {
                return None;
            }

            let result = match probe_file(path, config) {
                Ok(probe) => {
                    let counter = match probe.format {
                        ContainerFormat::ZipArchive => &progress.zip_count,
                        ContainerFormat::LegacyPickle => &progress.legacy_count,
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                    if probe.magic_ok == Some(false) {
                        progress.mismatch_count.fetch_add(1, Ordering::Relaxed);
                    }
                    ProbeResult::from_probe(path.clone(), &probe)
                }
                Err(e) => {
                    progress.error_count.fetch_add(1, Ordering::Relaxed);
                    warn!(path = %path.display(), "probe failed: {e}");
                    ProbeResult::from_error(path.clone(), &e)
                }
            };

            progress.probed_files.fetch_add(1, Ordering::Relaxed);
            Some(result)
        })
        .collect();

    Ok(results)
}
