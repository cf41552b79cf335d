// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::Harness;
use pv_core::test_support::{app_config, new_session};

#[yare::parameterized(
    simple = { "::set-var token=abc", Some(("token", "abc")) },
    dotted_key = { "::set-var db.url=postgres://x", Some(("db.url", "postgres://x")) },
    empty_value = { "::set-var empty=", Some(("empty", "")) },
    value_with_equals = { "::set-var q=a=b", Some(("q", "a=b")) },
    trailing_whitespace = { "::set-var k=v  ", Some(("k", "v")) },
    not_a_marker = { "set-var k=v", None },
    bad_key = { "::set-var 1k=v", None },
    plain_output = { "listening on 4000", None },
)]
fn set_var_markers(line: &str, expected: Option<(&str, &str)>) {
    let parsed = parse_set_var(line);
    assert_eq!(parsed, expected.map(|(k, v)| (k.to_string(), v.to_string())));
}

#[test]
fn session_env_has_standard_keys_and_interpolated_app_env() {
    let mut config = app_config("shop");
    config.env.insert("API_URL".into(), "http://localhost:${port}/api".into());
    let session = new_session("shop", "main", "abc1234");
    session.set_variable("port", "4000");

    let env = session_env(&session, &config);
    assert_eq!(env["API_URL"], "http://localhost:4000/api");
    assert_eq!(env["PORT"], "4000");
    assert_eq!(env["SESSION_ID"], session.id().to_string());
    assert_eq!(env["SESSION_ALIAS"], "main-test");
    assert_eq!(env["CHECKOUT"], "main");
    assert_eq!(env["COMMIT"], "abc1234");
    assert!(env.contains_key("SESSION_FOLDER"));
}

#[tokio::test]
async fn stops_at_first_failure() {
    let h = Harness::new(vec![app_config("shop")]);
    h.commands.fail("second");
    let session = Arc::new(new_session("shop", "main", "abc1234"));
    let commands = vec![
        CommandConfig::new("first"),
        CommandConfig::new("second"),
        CommandConfig::new("third"),
    ];

    let result = h
        .engine
        .runtime()
        .run_commands(&session, &app_config("shop"), &commands, &CancellationToken::new(), Guard::Starting)
        .await;

    assert!(matches!(result, Err(RunError::Command(CommandError::Failed { .. }))));
    assert_eq!(h.commands.commands(), vec!["first", "second"]);
    assert!(session.logs().iter().any(|l| l.level == LogLevel::Error));
}

#[tokio::test]
async fn continue_on_error_keeps_going() {
    let h = Harness::new(vec![app_config("shop")]);
    h.commands.fail("optional");
    let session = Arc::new(new_session("shop", "main", "abc1234"));
    let commands =
        vec![CommandConfig::new("optional").continue_on_error(true), CommandConfig::new("required")];

    h.engine
        .runtime()
        .run_commands(&session, &app_config("shop"), &commands, &CancellationToken::new(), Guard::Starting)
        .await
        .unwrap();

    assert_eq!(h.commands.commands(), vec!["optional", "required"]);
    assert!(session.logs().iter().any(|l| l.level == LogLevel::Warn && l.message.contains("continuing")));
}

#[tokio::test]
async fn captured_variable_feeds_later_commands() {
    let h = Harness::new(vec![app_config("shop")]);
    h.commands.output("provision", &["creating database", "::set-var db=shop_42"]);
    let session = Arc::new(new_session("shop", "main", "abc1234"));
    let commands = vec![CommandConfig::new("provision"), CommandConfig::new("migrate ${db}")];

    h.engine
        .runtime()
        .run_commands(&session, &app_config("shop"), &commands, &CancellationToken::new(), Guard::Starting)
        .await
        .unwrap();

    assert_eq!(session.variables()["db"], "shop_42");
    assert_eq!(h.commands.commands()[1], "migrate shop_42");
    let logged: Vec<_> = session.logs().into_iter().map(|l| l.message).collect();
    assert!(logged.contains(&"creating database".to_string()));
    assert!(!logged.iter().any(|m| m.starts_with("::set-var")));
}

#[tokio::test]
async fn unset_session_variables_are_logged_and_left_in_place() {
    let h = Harness::new(vec![app_config("shop")]);
    let session = Arc::new(new_session("shop", "main", "abc1234"));
    let commands = vec![CommandConfig::new("seed --token ${session.token} --home ${HOME}")];

    h.engine
        .runtime()
        .run_commands(&session, &app_config("shop"), &commands, &CancellationToken::new(), Guard::Starting)
        .await
        .unwrap();

    assert_eq!(h.commands.commands()[0], "seed --token ${session.token} --home ${HOME}");
    assert!(session.logs().iter().any(|l| l.message == "unset session variables: token"));
}

#[tokio::test]
async fn start_guard_aborts_when_session_is_stopping() {
    let h = Harness::new(vec![app_config("shop")]);
    let session = Arc::new(new_session("shop", "main", "abc1234"));
    session.transition(SessionStatus::Stopping).unwrap();

    let result = h
        .engine
        .runtime()
        .run_commands(
            &session,
            &app_config("shop"),
            &[CommandConfig::new("never")],
            &CancellationToken::new(),
            Guard::Starting,
        )
        .await;

    assert!(matches!(result, Err(RunError::Aborted(SessionStatus::Stopping))));
    assert!(h.commands.commands().is_empty());

    h.engine
        .runtime()
        .run_commands(
            &session,
            &app_config("shop"),
            &[CommandConfig::new("stop")],
            &CancellationToken::new(),
            Guard::Always,
        )
        .await
        .unwrap();
    assert_eq!(h.commands.commands(), vec!["stop"]);
}
