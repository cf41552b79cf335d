// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;

fn spec(command: &str, dir: &std::path::Path) -> CommandSpec {
    CommandSpec {
        command: command.to_string(),
        cwd: dir.to_path_buf(),
        env: HashMap::new(),
        timeout: None,
    }
}

fn collector() -> (LineCallback, Arc<Mutex<Vec<(OutputStream, String)>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let cb: LineCallback = Arc::new(move |stream, line| sink.lock().push((stream, line.to_string())));
    (cb, lines)
}

#[tokio::test]
async fn streams_stdout_and_stderr_lines() {
    let dir = tempfile::tempdir().unwrap();
    let (cb, lines) = collector();
    let mut s = spec("echo one; echo two >&2; echo $GREETING", dir.path());
    s.env.insert("GREETING".into(), "hello".into());

    ShellCommandRunner.exec(&CancellationToken::new(), cb, s).await.unwrap();

    let lines = lines.lock().clone();
    assert!(lines.contains(&(OutputStream::Stdout, "one".to_string())));
    assert!(lines.contains(&(OutputStream::Stderr, "two".to_string())));
    assert!(lines.contains(&(OutputStream::Stdout, "hello".to_string())));
}

#[tokio::test]
async fn runs_in_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (cb, _) = collector();
    ShellCommandRunner.exec(&CancellationToken::new(), cb, spec("touch marker", dir.path())).await.unwrap();
    assert!(dir.path().join("marker").exists());
}

#[tokio::test]
async fn non_zero_exit_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (cb, _) = collector();
    let err = ShellCommandRunner
        .exec(&CancellationToken::new(), cb, spec("exit 3", dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Failed { code: 3, .. }));
}

#[tokio::test]
async fn pipefail_is_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let (cb, _) = collector();
    let err = ShellCommandRunner
        .exec(&CancellationToken::new(), cb, spec("false | cat", dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Failed { .. }));
}

#[tokio::test]
async fn timeout_kills_command() {
    let dir = tempfile::tempdir().unwrap();
    let (cb, _) = collector();
    let mut s = spec("sleep 10", dir.path());
    s.timeout = Some(Duration::from_millis(100));
    let err = ShellCommandRunner.exec(&CancellationToken::new(), cb, s).await.unwrap_err();
    assert!(matches!(err, CommandError::TimedOut { .. }));
}

#[tokio::test]
async fn cancellation_stops_command() {
    let dir = tempfile::tempdir().unwrap();
    let (cb, _) = collector();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });
    let err = ShellCommandRunner.exec(&token, cb, spec("sleep 10", dir.path())).await.unwrap_err();
    assert!(matches!(err, CommandError::Cancelled(_)));
}

#[tokio::test]
async fn fake_runner_applies_rules_in_order() {
    let runner = FakeCommandRunner::new();
    runner.fail_times("build", 2);
    runner.output("env", &["::set-var token=abc"]);
    let (cb, lines) = collector();
    let token = CancellationToken::new();
    let dir = std::path::Path::new("/tmp");

    assert!(runner.exec(&token, Arc::clone(&cb), spec("make build", dir)).await.is_err());
    assert!(runner.exec(&token, Arc::clone(&cb), spec("make build", dir)).await.is_err());
    assert!(runner.exec(&token, Arc::clone(&cb), spec("make build", dir)).await.is_ok());
    runner.exec(&token, cb, spec("print env", dir)).await.unwrap();

    assert_eq!(runner.count("build"), 3);
    assert_eq!(lines.lock()[0].1, "::set-var token=abc");
}

#[tokio::test(start_paused = true)]
async fn fake_hang_honors_cancellation() {
    let runner = FakeCommandRunner::new();
    runner.hang("serve");
    let token = CancellationToken::new();
    let (cb, _) = collector();
    let handle = {
        let runner = runner.clone();
        let token = token.clone();
        tokio::spawn(async move { runner.exec(&token, cb, spec("serve", std::path::Path::new("/"))).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();
    assert!(matches!(handle.await.unwrap(), Err(CommandError::Cancelled(_))));
}
