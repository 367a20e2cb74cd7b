//! Configuration file parsing for `lazyguard.toml`.
//!
//! ```toml
//! [guards]
//! local_fields = true
//! relation_fields = true
//! relation_reverse_fields = false
//!
//! [debug]
//! log_denials = true
//!
//! [environments.test.guards]
//! relation_reverse_fields = true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};

/// Environment variable overriding [`GuardConfig::local_fields`].
pub const ENV_LOCAL_FIELDS: &str = "LAZYGUARD_LOCAL_FIELDS";
/// Environment variable overriding [`GuardConfig::relation_fields`].
pub const ENV_RELATION_FIELDS: &str = "LAZYGUARD_RELATION_FIELDS";
/// Environment variable overriding [`GuardConfig::relation_reverse_fields`].
pub const ENV_RELATION_REVERSE_FIELDS: &str = "LAZYGUARD_RELATION_REVERSE_FIELDS";

/// Main configuration structure for `lazyguard.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LazyGuardConfig {
    /// Guard category switches.
    #[serde(default)]
    pub guards: GuardConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl LazyGuardConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(guards) = overrides.guards {
                self.guards = guards.apply(self.guards);
            }
            if let Some(debug) = overrides.debug {
                if let Some(log_denials) = debug.log_denials {
                    self.debug.log_denials = log_denials;
                }
            }
        }
        self
    }

    /// Apply `LAZYGUARD_*` environment variable overrides to the guard switches.
    pub fn with_env_overrides(mut self) -> Self {
        self.guards = self.guards.with_env_overrides();
        self
    }
}

/// Per-category guard switches. All categories are on unless turned off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Guard reads of concrete fields excluded by `only`/`defer`.
    #[serde(default = "default_true")]
    pub local_fields: bool,

    /// Guard single-valued related-object accessors.
    #[serde(default = "default_true")]
    pub relation_fields: bool,

    /// Guard collection managers.
    #[serde(default = "default_true")]
    pub relation_reverse_fields: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            local_fields: true,
            relation_fields: true,
            relation_reverse_fields: true,
        }
    }
}

impl GuardConfig {
    /// Switches with every category turned off.
    pub fn disabled() -> Self {
        Self {
            local_fields: false,
            relation_fields: false,
            relation_reverse_fields: false,
        }
    }

    /// Apply `LAZYGUARD_*` environment variable overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides using `lookup` to resolve variable names.
    ///
    /// Unparseable values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).and_then(|v| parse_bool(&v));

        if let Some(v) = read(ENV_LOCAL_FIELDS) {
            self.local_fields = v;
        }
        if let Some(v) = read(ENV_RELATION_FIELDS) {
            self.relation_fields = v;
        }
        if let Some(v) = read(ENV_RELATION_REVERSE_FIELDS) {
            self.relation_reverse_fields = v;
        }
        self
    }
}

/// Debug/logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Emit a debug event for every denied access.
    #[serde(default = "default_true")]
    pub log_denials: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { log_denials: true }
    }
}

fn default_true() -> bool {
    true
}

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Guard switch overrides.
    pub guards: Option<GuardOverride>,

    /// Debug overrides.
    pub debug: Option<DebugOverride>,
}

/// Guard switch overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardOverride {
    pub local_fields: Option<bool>,
    pub relation_fields: Option<bool>,
    pub relation_reverse_fields: Option<bool>,
}

impl GuardOverride {
    fn apply(self, mut guards: GuardConfig) -> GuardConfig {
        if let Some(v) = self.local_fields {
            guards.local_fields = v;
        }
        if let Some(v) = self.relation_fields {
            guards.relation_fields = v;
        }
        if let Some(v) = self.relation_reverse_fields {
            guards.relation_reverse_fields = v;
        }
        guards
    }
}

/// Debug overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugOverride {
    pub log_denials: Option<bool>,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand `${VAR}` references from the process environment.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = LazyGuardConfig::default();
        assert_eq!(config.guards, GuardConfig::default());
        assert!(config.guards.local_fields);
        assert!(config.debug.log_denials);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = LazyGuardConfig::from_str("").unwrap();
        assert_eq!(config, LazyGuardConfig::default());
    }

    #[test]
    fn test_parse_partial_guards() {
        let config = LazyGuardConfig::from_str(
            r#"
            [guards]
            relation_reverse_fields = false
            "#,
        )
        .unwrap();

        assert!(config.guards.local_fields);
        assert!(config.guards.relation_fields);
        assert!(!config.guards.relation_reverse_fields);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = LazyGuardConfig::from_str("[guards]\nlocal = false\n").unwrap_err();
        assert!(matches!(err, SchemaError::TomlError { .. }));
    }

    #[test]
    fn test_environment_override() {
        let config = LazyGuardConfig::from_str(
            r#"
            [guards]
            local_fields = false

            [environments.ci.guards]
            local_fields = true
            relation_fields = false

            [environments.ci.debug]
            log_denials = false
            "#,
        )
        .unwrap()
        .with_environment("ci");

        assert!(config.guards.local_fields);
        assert!(!config.guards.relation_fields);
        assert!(config.guards.relation_reverse_fields);
        assert!(!config.debug.log_denials);
        assert!(config.environments.is_empty());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let guards = GuardConfig::default().with_overrides_from(|name| match name {
            ENV_LOCAL_FIELDS => Some("off".to_string()),
            ENV_RELATION_FIELDS => Some("garbage".to_string()),
            _ => None,
        });

        assert!(!guards.local_fields);
        assert!(guards.relation_fields);
        assert!(guards.relation_reverse_fields);
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("LAZYGUARD_TEST_LOG_DENIALS", "false");
        }
        let config = LazyGuardConfig::from_str(
            "[debug]\nlog_denials = ${LAZYGUARD_TEST_LOG_DENIALS}\n",
        )
        .unwrap();
        assert!(!config.debug.log_denials);
        unsafe {
            std::env::remove_var("LAZYGUARD_TEST_LOG_DENIALS");
        }
    }
}
