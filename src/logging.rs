//! Tracing setup for the CLI and embedding hosts
//!
//! Two audit targets sit beside the crate's own modules:
//!
//! - `forensic_audit` - chain of custody events (see `crate::audit`)
//! - `ai_audit` - model requests and responses, never API keys
//!
//! `RUST_LOG` overrides the defaults below, e.g.
//! `RUST_LOG=warn,forensic_audit=info` for the audit trail only.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,accident_analytics=trace,accident_analytics_lib=trace,forensic_audit=trace,ai_audit=trace"
    } else if cfg!(debug_assertions) {
        "warn,accident_analytics=debug,accident_analytics_lib=debug,forensic_audit=info,ai_audit=info"
    } else {
        "warn,accident_analytics=info,accident_analytics_lib=info,forensic_audit=info,ai_audit=info"
    }
}

/// Install the global subscriber; later calls are no-ops
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    // Audit lines are filtered by target, so it stays in the output
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(verbose)
        .with_line_number(verbose);

    let subscriber = tracing_subscriber::registry().with(filter).with(layer.compact());
    let _ = tracing::subscriber::set_global_default(subscriber);
}
