//! Diagnostic tracing for embedding applications.
//!
//! Audit records are the durable trail of what happened to a case; this is
//! operator output only, controlled by `RUST_LOG`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "bondpath_core=info,bondpath_runtime=info";

/// Install a stderr subscriber.
///
/// Returns `false` if a global subscriber was already set, which is common
/// when the host application configures its own.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .is_ok()
}
