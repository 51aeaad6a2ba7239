//! Environment access behind a trait so watch-mode detection can be tested
//! without mutating the real process environment.

use std::collections::HashMap;

/// Variable set by the host bundler when it runs in watch mode.
pub const WATCH_ENV_VAR: &str = "ROLLUP_WATCH";

/// Read-only view of environment variables.
pub trait EnvReader {
    fn var(&self, key: &str) -> Option<String>;

    /// `true` when the host signals watch mode (`"true"` or `"1"`).
    fn watch_requested(&self) -> bool {
        self.var(WATCH_ENV_VAR)
            .map(|value| matches!(value.trim(), "true" | "1"))
            .unwrap_or(false)
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed in-memory environment.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(pub HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvReader for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_requested_accepts_true_and_one() {
        assert!(MapEnv::new().with(WATCH_ENV_VAR, "true").watch_requested());
        assert!(MapEnv::new().with(WATCH_ENV_VAR, "1").watch_requested());
        assert!(!MapEnv::new().with(WATCH_ENV_VAR, "false").watch_requested());
        assert!(!MapEnv::new().watch_requested());
    }
}
