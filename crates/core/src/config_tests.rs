// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const FULL: &str = r#"
name = "shop"
remote = "git@example.com:acme/shop.git"
start = ["npm ci", { command = "npm run serve", continue_on_error = true, timeout = "2m" }]
stop = ["pkill -f serve"]
watch = ["main"]
max_sessions = 3
env = { NODE_ENV = "preview" }

[fetch]
interval = "30s"

[startup]
timeout = "5m"
retries = 2

[recycle]
inactivity_timeout = "1h"

[ports]
except = [5432]

[healthcheck]
path = "/health"
status = 204
retry_interval = "500ms"
max_retries = 10

[warmups]
urls = [{ path = "/warm", method = "POST" }]

[[branches]]
pattern = "^release/"
start = ["make release"]
env = { NODE_ENV = "production", EXTRA = "1" }
"#;

#[test]
fn parses_full_application() {
    let app: ApplicationConfig = toml::from_str(FULL).unwrap();
    assert_eq!(app.name, "shop");
    assert_eq!(app.start.len(), 2);
    assert_eq!(app.start[0], CommandConfig::new("npm ci"));
    assert!(app.start[1].continue_on_error);
    assert_eq!(app.start[1].timeout, Some(Duration::from_secs(120)));
    assert_eq!(app.max_sessions, Some(3));
    assert_eq!(app.fetch.interval, Duration::from_secs(30));
    assert_eq!(app.startup.retries, 2);
    assert_eq!(app.startup.timeout, Duration::from_secs(300));
    assert_eq!(app.recycle.inactivity_timeout, Duration::from_secs(3600));
    assert_eq!(app.ports.except, vec![5432]);

    let hc = app.healthcheck.as_ref().unwrap();
    assert_eq!(hc.path, "/health");
    assert_eq!(hc.status, 204);
    assert_eq!(hc.retry_interval, Duration::from_millis(500));
    assert_eq!(hc.max_retries, 10);
    assert_eq!(hc.retry_timeout, Duration::from_secs(5));

    let warm = app.warmups.as_ref().unwrap();
    assert_eq!(warm.urls[0].method, "POST");
    assert_eq!(warm.urls[0].status, 200);
    assert!(app.validate().is_ok());
}

#[test]
fn minimal_application_uses_defaults() {
    let app: ApplicationConfig = toml::from_str("name = \"a\"\nremote = \"r\"").unwrap();
    assert_eq!(app, ApplicationConfig::new("a", "r"));
    assert_eq!(app.startup.retries, 0);
    assert!(app.healthcheck.is_none());
}

#[test]
fn branch_override_replaces_and_merges() {
    let app: ApplicationConfig = toml::from_str(FULL).unwrap();

    let release = app.for_checkout("release/1.2");
    assert_eq!(release.start, vec![CommandConfig::new("make release")]);
    assert_eq!(release.stop, app.stop);
    assert_eq!(release.env.get("NODE_ENV").map(String::as_str), Some("production"));
    assert_eq!(release.env.get("EXTRA").map(String::as_str), Some("1"));

    let main = app.for_checkout("main");
    assert_eq!(main.start, app.start);
    assert!(!main.env.contains_key("EXTRA"));
}

#[test]
fn watched_refs() {
    let app = ApplicationConfig::new("a", "r").watch(vec!["main".into()]);
    assert!(app.is_watched("main"));
    assert!(!app.is_watched("dev"));
}

#[yare::parameterized(
    empty_name   = { ApplicationConfig::new(" ", "r"), ConfigError::MissingName },
    empty_remote = { ApplicationConfig::new("a", ""), ConfigError::MissingRemote("a".into()) },
    bad_status   = {
        ApplicationConfig::new("a", "r").healthcheck(HealthcheckConfig::default().status(42)),
        ConfigError::InvalidStatus { app: "a".into(), status: 42 }
    },
)]
fn validation_errors(app: ApplicationConfig, expected: ConfigError) {
    assert_eq!(app.validate(), Err(expected));
}

#[test]
fn invalid_branch_pattern_is_rejected() {
    let mut app = ApplicationConfig::new("a", "r");
    app.branches.push(BranchOverride {
        pattern: "([".into(),
        start: None,
        stop: None,
        clean: None,
        env: BTreeMap::new(),
        healthcheck: None,
    });
    assert!(matches!(app.validate(), Err(ConfigError::InvalidBranchPattern { .. })));
}

#[test]
fn duplicate_application_names_are_rejected() {
    let apps = vec![ApplicationConfig::new("a", "r1"), ApplicationConfig::new("a", "r2")];
    assert_eq!(validate_applications(&apps), Err(ConfigError::DuplicateApplication("a".into())));
    let apps = vec![ApplicationConfig::new("a", "r1"), ApplicationConfig::new("b", "r2")];
    assert!(validate_applications(&apps).is_ok());
}
