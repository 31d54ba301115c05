//! Tracing subscriber setup.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Directive applied on top of `RUST_LOG`
const DEFAULT_DIRECTIVE: &str = "lightcore=info";

/// Install the global tracing subscriber
///
/// Honours `RUST_LOG`. Returns `false` when a subscriber was already
/// installed, in which case the existing one is kept.
pub fn init(format: LogFormat) -> bool {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = DEFAULT_DIRECTIVE.parse() {
        filter = filter.add_directive(directive);
    }

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    match installed {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(error = %err, "Tracing subscriber already installed");
            false
        }
    }
}
