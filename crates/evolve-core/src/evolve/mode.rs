//! Shared, runtime-switchable run mode.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::Mode;

pub const MODE_ENV_VAR: &str = "EVOLVE_MODE";

/// Cloneable handle to one mode setting. Every clone observes `set` calls
/// made through any other clone.
#[derive(Clone, Debug, Default)]
pub struct ModeFlag {
    value: Arc<RwLock<String>>,
}

impl ModeFlag {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Arc::new(RwLock::new(value.into())),
        }
    }

    pub fn development() -> Self {
        Self::new(crate::models::DEVELOPMENT_MODE)
    }

    pub fn production() -> Self {
        Self::new("production")
    }

    /// Initialized from `EVOLVE_MODE`; unset means production.
    pub fn from_env() -> Self {
        Self::new(std::env::var(MODE_ENV_VAR).unwrap_or_default())
    }

    pub fn set(&self, value: impl Into<String>) {
        *self.value.write() = value.into();
    }

    pub fn setting(&self) -> String {
        self.value.read().clone()
    }

    pub fn mode(&self) -> Mode {
        Mode::from_setting(&self.value.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_production() {
        assert_eq!(ModeFlag::default().mode(), Mode::Production);
    }

    #[test]
    fn test_clones_share_state() {
        let flag = ModeFlag::production();
        let other = flag.clone();
        other.set("development");
        assert_eq!(flag.mode(), Mode::Development);
        flag.set("staging");
        assert_eq!(other.mode(), Mode::Production);
        assert_eq!(other.setting(), "staging");
    }
}
