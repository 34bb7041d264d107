//! Output formatting for probe results.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::format::ContainerFormat;
use crate::magic::format_magic;
use crate::probe::StreamProbe;

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ContainerFormat>,
    pub compressed: bool,
    pub direct_read: bool,
    /// Hex-rendered magic number of a legacy pickle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn from_probe(path: PathBuf, probe: &StreamProbe) -> Self {
        Self {
            path,
            format: Some(probe.format),
            compressed: probe.compressed,
            direct_read: probe.direct_read,
            magic: probe.magic.as_ref().map(format_magic),
            magic_ok: probe.magic_ok,
            error: None,
        }
    }

    pub fn from_error(path: PathBuf, error: impl fmt::Display) -> Self {
        Self {
            path,
            format: None,
            compressed: false,
            direct_read: false,
            magic: None,
            magic_ok: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_mismatch(&self) -> bool {
        self.magic_ok == Some(false)
    }
}

/// How results are rendered on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Text, OutputFormat::Json];

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown output format `{0}` (expected `text` or `json`)")]
pub struct UnknownOutputFormat(pub String);

impl std::str::FromStr for OutputFormat {
    type Err = UnknownOutputFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownOutputFormat(s.to_string()))
    }
}

pub fn print_results(results: &[ProbeResult], format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_results(&mut out, results, format)
}

pub fn write_results<W: Write>(
    out: &mut W,
    results: &[ProbeResult],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => write_text(out, results),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&results_json(results))?;
            writeln!(out, "{json}")
        }
    }
}

fn of_format(results: &[ProbeResult], format: ContainerFormat) -> Vec<&ProbeResult> {
    results.iter().filter(|r| r.format == Some(format)).collect()
}

fn write_text<W: Write>(out: &mut W, results: &[ProbeResult]) -> io::Result<()> {
    let zips = of_format(results, ContainerFormat::ZipArchive);
    let legacy = of_format(results, ContainerFormat::LegacyPickle);
    let mismatches: Vec<_> = results.iter().filter(|r| r.is_mismatch()).collect();
    let errors: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    writeln!(out, "\n{}", "=".repeat(70))?;
    writeln!(out, "PROBE RESULTS")?;
    writeln!(out, "{}", "=".repeat(70))?;

    if !zips.is_empty() {
        writeln!(out, "\nZIP ARCHIVES ({}):", zips.len())?;
        for r in &zips {
            writeln!(out, "  {}{}", flags(r), r.path.display())?;
        }
    }

    if !legacy.is_empty() {
        writeln!(out, "\nLEGACY PICKLES ({}):", legacy.len())?;
        for r in &legacy {
            let magic = r.magic.as_deref().unwrap_or("no magic");
            writeln!(out, "  [{magic}] {}{}", flags(r), r.path.display())?;
        }
    }

    if !mismatches.is_empty() {
        writeln!(out, "\nMAGIC MISMATCHES ({}):", mismatches.len())?;
        for r in &mismatches {
            let magic = r.magic.as_deref().unwrap_or("none");
            writeln!(out, "  [{magic}] {}", r.path.display())?;
        }
    }

    if !errors.is_empty() {
        writeln!(out, "\nERRORS ({}):", errors.len())?;
        for r in &errors {
            let err = r.error.as_deref().unwrap_or("unknown");
            writeln!(out, "  [ERR ] {} -- {}", r.path.display(), err)?;
        }
    }

    writeln!(out, "\nSUMMARY:")?;
    writeln!(out, "  Total files probed: {}", results.len())?;
    writeln!(out, "  Zip archives:       {}", zips.len())?;
    writeln!(out, "  Legacy pickles:     {}", legacy.len())?;
    writeln!(out, "  Magic mismatches:   {}", mismatches.len())?;
    writeln!(out, "  Errors:             {}", errors.len())?;
    writeln!(out, "{}", "=".repeat(70))
}

fn flags(r: &ProbeResult) -> String {
    let mut flags = String::new();
    if r.compressed {
        flags.push_str("[gzip] ");
    }
    if r.direct_read {
        flags.push_str("[direct] ");
    }
    flags
}

pub fn results_json(results: &[ProbeResult]) -> serde_json::Value {
    serde_json::json!({
        "results": results,
        "summary": {
            "total": results.len(),
            "zip": of_format(results, ContainerFormat::ZipArchive).len(),
            "legacy": of_format(results, ContainerFormat::LegacyPickle).len(),
            "mismatches": results.iter().filter(|r| r.is_mismatch()).count(),
            "errors": results.iter().filter(|r| r.error.is_some()).count(),
        }
    })
}
