//! Per-session logger.
//!
//! Each plugin instance owns a [`SessionLogger`] carrying its own
//! [`tracing::Dispatch`]. Work is run under that dispatch with
//! [`tracing::instrument::WithSubscriber`], so two sessions with different
//! levels never share a global logger.

use tracing::Dispatch;
use tracing_subscriber::{fmt, EnvFilter};

use crate::types::LogLevel;

#[derive(Clone)]
pub struct SessionLogger {
    level: LogLevel,
    dispatch: Dispatch,
}

impl SessionLogger {
    /// Logger writing human-readable lines to stderr at `level`.
    pub fn new(level: LogLevel) -> Self {
        let subscriber = fmt()
            .with_max_level(level.filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();
        Self {
            level,
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Logger emitting newline-delimited JSON records to stderr.
    pub fn json(level: LogLevel) -> Self {
        let subscriber = fmt()
            .json()
            .with_max_level(level.filter())
            .with_writer(std::io::stderr)
            .finish();
        Self {
            level,
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Like [`SessionLogger::new`], but a `RUST_LOG` directive in the process
    /// environment takes precedence over `level`.
    pub fn from_env_or(level: LogLevel) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.filter().to_string()));
        let subscriber = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();
        Self {
            level,
            dispatch: Dispatch::new(subscriber),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this session's dispatch as the default subscriber.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl std::fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLogger")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
