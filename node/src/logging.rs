//! # Logging
//!
//! Installs the global `tracing` subscriber from the `[node]` section of
//! `levy.toml`. `RUST_LOG`, when set, replaces the configured `log_level`.
//!
//! Output goes to stderr. Stdout belongs to the `init`, `inspect`, and
//! `version` subcommands.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::NodeSection;

/// `log_format` values accepted in `levy.toml`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines with source locations.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Installs the subscriber described by `node`.
///
/// # Errors
///
/// Fails if the filter directives do not parse or a global subscriber is
/// already installed.
pub fn init(node: &NodeSection) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(&node.log_level, rust_log.as_deref())?;
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match node.log_format {
        LogFormat::Pretty => registry
            .with(layer.with_file(true).with_line_number(true))
            .try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    installed.context("failed to install tracing subscriber")?;

    tracing::debug!(format = ?node.log_format, "logging initialized");
    Ok(())
}

/// Picks `RUST_LOG` over the configured directives unless it is blank.
fn build_filter(configured: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    let directives = rust_log
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(configured);
    EnvFilter::try_new(directives)
        .with_context(|| format!("invalid log filter \"{}\"", directives))
}
