//! Tracing setup.
//!
//! Logs go to stderr because stdout carries the JSON-RPC stream in serve
//! mode. The filter sits behind a reload layer so the `log_level` setting
//! can be re-applied while the server runs.

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Handle for changing the log filter after startup.
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` was set at startup and wins over settings
    pinned: bool,
}

impl LogHandle {
    /// Replace the active filter with `level` (any `EnvFilter` directive).
    pub fn set_level(&self, level: &str) -> anyhow::Result<()> {
        if self.pinned {
            return Ok(());
        }
        let filter = EnvFilter::try_new(level)?;
        self.handle.reload(filter)?;
        Ok(())
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set.
pub fn init(level: &str) -> LogHandle {
    let from_env = EnvFilter::try_from_default_env().ok();
    let pinned = from_env.is_some();
    let filter = from_env
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    LogHandle { handle, pinned }
}
