//! Log setup for the storylink CLI.
//!
//! Everything goes to stderr. Stdout carries only command output (plans,
//! resolved targets, extracted ids) so it can be piped into other tools.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process subscriber.
///
/// `RUST_LOG` wins over `level` when set. With `json`, each line is a JSON
/// object for CI log collectors. Returns `false` when a subscriber was
/// already installed, in which case nothing changes.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
    };
    installed.is_ok()
}
