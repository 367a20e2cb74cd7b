//! Runtime guard switches, read at every guard evaluation.

use std::sync::atomic::{AtomicBool, Ordering};

use lazyguard_schema::{GuardConfig, LazyGuardConfig};
use parking_lot::RwLock;
use tracing::debug;

/// Application settings consulted by the guards.
///
/// Each [`Client`](crate::Client) owns one. Values can be changed at any
/// time; the next guard evaluation sees the new value.
#[derive(Debug)]
pub struct Settings {
    guards: RwLock<GuardConfig>,
    log_denials: AtomicBool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

impl Settings {
    /// Create settings with the given guard switches.
    pub fn new(guards: GuardConfig) -> Self {
        Self {
            guards: RwLock::new(guards),
            log_denials: AtomicBool::new(true),
        }
    }

    /// Create settings from a loaded configuration file.
    pub fn from_config(config: &LazyGuardConfig) -> Self {
        let settings = Self::new(config.guards);
        settings.set_log_denials(config.debug.log_denials);
        settings
    }

    /// Current guard switches.
    pub fn guards(&self) -> GuardConfig {
        *self.guards.read()
    }

    /// Replace all guard switches.
    pub fn set_guards(&self, guards: GuardConfig) {
        debug!(?guards, "guard settings changed");
        *self.guards.write() = guards;
    }

    /// Toggle guarding of local fields.
    pub fn set_local_fields(&self, enabled: bool) {
        self.guards.write().local_fields = enabled;
    }

    /// Toggle guarding of singular relations.
    pub fn set_relation_fields(&self, enabled: bool) {
        self.guards.write().relation_fields = enabled;
    }

    /// Toggle guarding of collection relations.
    pub fn set_relation_reverse_fields(&self, enabled: bool) {
        self.guards.write().relation_reverse_fields = enabled;
    }

    /// Whether denials are reported through `tracing`.
    pub fn log_denials(&self) -> bool {
        self.log_denials.load(Ordering::Relaxed)
    }

    /// Toggle reporting of denials.
    pub fn set_log_denials(&self, enabled: bool) {
        self.log_denials.store(enabled, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_on() {
        let settings = Settings::default();
        assert_eq!(settings.guards(), GuardConfig::default());
        assert!(settings.log_denials());
    }

    #[test]
    fn test_toggle_single_switch() {
        let settings = Settings::default();
        settings.set_relation_reverse_fields(false);
        let guards = settings.guards();
        assert!(guards.local_fields);
        assert!(guards.relation_fields);
        assert!(!guards.relation_reverse_fields);
    }

    #[test]
    fn test_from_config() {
        let config = LazyGuardConfig::from_str("[guards]\nlocal_fields = false\n[debug]\nlog_denials = false\n")
            .unwrap();
        let settings = Settings::from_config(&config);
        assert!(!settings.guards().local_fields);
        assert!(!settings.log_denials());
    }
}
