//! Log subscriber setup for the `ragguard` binary.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Send guardrail and lifecycle events to stderr, leaving stdout to the
/// report and summary. `RUST_LOG` overrides `level`; a second call is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let (plain, structured) = if json {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (None, Some(layer.json()))
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer), None)
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .try_init();
}
