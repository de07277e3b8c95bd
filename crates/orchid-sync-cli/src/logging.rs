// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for the Orchid Sync CLI.
//!
//! Uses `tracing` with `tracing-subscriber`. The level is controlled via the
//! `RUST_LOG` environment variable; logs go to stderr so they never mix with
//! rendered output.
//!
//! ```bash
//! RUST_LOG=orchid_sync=debug orchid-sync labels ensure --repo orchid/app
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "orchid_sync=warn,octocrab=error,reqwest=error";

/// Initialize the logging subsystem.
pub fn init_logging() {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
