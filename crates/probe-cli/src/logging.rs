//! Tracing setup for the CLI.

use std::io::{stderr, IsTerminal};

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Log to stderr. `RUST_LOG` wins when set; otherwise `info`, or `debug`
/// for the probe crates when `verbose` is on.
pub fn init_tracing(verbose: bool) {
    let env_filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("info,probe_core=debug,model_probe=debug")
    } else {
        EnvFilter::new("info")
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_line_number(false)
        .with_file(false)
        .with_writer(stderr)
        .with_ansi(stderr().is_terminal())
        .with_target(false)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(layer).init();
}
