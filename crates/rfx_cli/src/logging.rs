//! Diagnostic logging for the CLI.
//!
//! Controlled by `RFX_LOG` (falling back to `RUST_LOG`), using the usual
//! filter syntax:
//!
//! ```bash
//! RFX_LOG=debug rfx transform src/
//! RFX_LOG=rfx_transform=trace RFX_LOG_FORMAT=json rfx edits App.vue
//! ```
//!
//! Nothing is installed when neither variable is set. Output goes to stderr
//! so it never mixes with transformed code on stdout.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("RFX_LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

fn build_filter() -> EnvFilter {
    match std::env::var("RFX_LOG") {
        Ok(val) => EnvFilter::builder().parse_lossy(val),
        Err(_) => EnvFilter::from_default_env(),
    }
}

pub fn init() {
    if std::env::var("RFX_LOG").is_err() && std::env::var("RUST_LOG").is_err() {
        return;
    }

    let filter = build_filter();
    match LogFormat::from_env() {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(layer).init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
