//! Loading guard switches from `lazyguard.toml`.

mod common;

use lazyguard::query::{Client, Settings};
use lazyguard::schema::config::{ENV_LOCAL_FIELDS, ENV_RELATION_REVERSE_FIELDS};
use lazyguard::schema::{GuardConfig, LazyGuardConfig};
use pretty_assertions::assert_eq;

const CONFIG: &str = r#"
[guards]
local_fields = true
relation_fields = false

[debug]
log_denials = false

[environments.ci.guards]
relation_fields = true
relation_reverse_fields = false
"#;

fn client_with(config: &LazyGuardConfig) -> Client {
    lazyguard::install();
    let client = Client::from_config(common::schema(), config);
    common::seed(&client);
    client
}

#[test]
fn test_switches_reach_the_client() {
    let config = LazyGuardConfig::from_str(CONFIG).unwrap();
    let client = client_with(&config);

    assert!(!client.settings().log_denials());
    let ann = client.query("User").only(&["name"]).first().unwrap().unwrap();
    assert!(ann.get("email").is_err());
    assert!(ann.related("role").is_ok());
    assert!(ann.manager("posts").unwrap().all().is_err());
}

#[test]
fn test_environment_overrides() {
    let config = LazyGuardConfig::from_str(CONFIG)
        .unwrap()
        .with_environment("ci");
    assert_eq!(
        config.guards,
        GuardConfig {
            local_fields: true,
            relation_fields: true,
            relation_reverse_fields: false,
        }
    );

    let client = client_with(&config);
    let ann = client.query("User").first().unwrap().unwrap();
    assert!(ann.related("role").is_err());
    assert_eq!(ann.manager("posts").unwrap().all().unwrap().len(), 2);
}

#[test]
fn test_variable_overrides() {
    let guards = GuardConfig::default().with_overrides_from(|name| match name {
        ENV_LOCAL_FIELDS => Some("off".to_string()),
        ENV_RELATION_REVERSE_FIELDS => Some("maybe".to_string()),
        _ => None,
    });
    assert!(!guards.local_fields);
    assert!(guards.relation_fields);
    assert!(guards.relation_reverse_fields);

    lazyguard::install();
    let client = Client::with_settings(common::schema(), Settings::new(guards));
    common::seed(&client);
    let ann = client.query("User").only(&["name"]).first().unwrap().unwrap();
    assert!(ann.get("email").is_ok());
}

#[test]
fn test_disabled_guards_are_transparent() {
    lazyguard::install();
    let client = Client::with_settings(common::schema(), Settings::new(GuardConfig::disabled()));
    common::seed(&client);

    let ann = client.query("User").only(&["name"]).first().unwrap().unwrap();
    client.reset_queries();
    assert!(ann.get("email").is_ok());
    assert!(ann.related("role").unwrap().is_some());
    assert_eq!(ann.manager("posts").unwrap().all().unwrap().len(), 2);
    assert_eq!(client.query_count(), 4);
}

#[test]
fn test_unknown_keys_are_rejected() {
    let err = LazyGuardConfig::from_str("[guards]\nlocal_feilds = false\n").unwrap_err();
    assert!(err.to_string().contains("TOML"));
}

#[test]
fn test_empty_config_enables_everything() {
    let config = LazyGuardConfig::from_str("").unwrap();
    assert_eq!(config.guards, GuardConfig::default());
    assert!(config.debug.log_denials);
}
