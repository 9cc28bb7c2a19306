//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence when set; otherwise the level is `info`, or
//! `debug` with `--verbose`.

use anyhow::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Where log output goes, parsed from the `--log` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// `0`/`off`, `1`/`stdout`, `2`/`stderr`, anything else is a file name.
    pub fn parse(s: &str) -> Self {
        match s {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            filename => LogTarget::File(PathBuf::from(filename)),
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber.
pub fn init(target: &LogTarget, verbose: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(verbose));

    match target {
        LogTarget::Off => {}
        LogTarget::Stdout => {
            tracing::subscriber::set_global_default(
                builder.with_writer(std::io::stdout).finish(),
            )?;
        }
        LogTarget::Stderr => {
            tracing::subscriber::set_global_default(
                builder.with_writer(std::io::stderr).finish(),
            )?;
        }
        LogTarget::File(path) => {
            // Append, and keep escape codes out of the file.
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing::subscriber::set_global_default(
                builder.with_writer(Mutex::new(file)).with_ansi(false).finish(),
            )?;
        }
    }
    Ok(())
}
