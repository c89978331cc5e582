//! Login sequences against a real PTY, with a shell script standing in for
//! `ssh`.
//!
//! The script receives the same arguments `ssh` would (`-t <jump> <remote
//! command>`) and records each invocation in a log file.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jumpline::error::{LoginError, Rejection};
use jumpline::expect::TriggerKind;
use jumpline::session::{BastionCommand, PtySpawner};
use jumpline::{Candidate, LoginOptions, LoginSequencer};
use jumpline_pty::WindowSize;
use tempfile::TempDir;

fn fake_ssh(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-ssh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn spawner(program: &Path) -> PtySpawner {
    PtySpawner::new(BastionCommand::new(program.display().to_string(), "bastion"))
        .with_window_size(WindowSize::new(120, 40))
}

fn options() -> LoginOptions {
    LoginOptions {
        retire_grace: Duration::from_millis(100),
        ..LoginOptions::default()
    }
}

fn candidates() -> Vec<Candidate> {
    ["ec2-user", "ubuntu", "root"]
        .into_iter()
        .map(|user| Candidate::new("prod.pem", user, "10.0.0.5"))
        .collect()
}

fn log_lines(dir: &TempDir) -> Vec<String> {
    fs::read_to_string(dir.path().join("log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn candidates_are_tried_in_order_until_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log");
    let program = fake_ssh(
        dir.path(),
        &format!(
            r#"echo "$1 $2 $3" >> '{log}'
case "$3" in
  *root@*) printf 'Connection closed by 10.0.0.5 port 22\r\n' ;;
  *) printf 'Permission denied (publickey).\r\n'; sleep 5 ;;
esac"#,
            log = log.display()
        ),
    );

    let err = LoginSequencer::new(spawner(&program), candidates(), options())
        .run()
        .await
        .unwrap_err();

    match err {
        LoginError::AuthExhausted { failures } => {
            let reasons: Vec<_> = failures.iter().map(|f| f.reason).collect();
            assert_eq!(
                reasons,
                vec![
                    Rejection::Trigger(TriggerKind::PermissionDenied),
                    Rejection::Trigger(TriggerKind::PermissionDenied),
                    Rejection::Trigger(TriggerKind::ConnectionClosed),
                ]
            );
        }
        other => panic!("unexpected: {other:?}"),
    }

    assert_eq!(
        log_lines(&dir),
        vec![
            "-t bastion ssh -i \"prod.pem\" ec2-user@10.0.0.5",
            "-t bastion ssh -i \"prod.pem\" ubuntu@10.0.0.5",
            "-t bastion ssh -i \"prod.pem\" root@10.0.0.5",
        ]
    );
}

#[tokio::test]
async fn host_key_answer_reaches_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log");
    let mark = dir.path().join("known");
    let program = fake_ssh(
        dir.path(),
        &format!(
            r#"if [ ! -f '{mark}' ]; then
  printf 'Are you sure you want to continue connecting (yes/no)? '
  read answer
  echo "answer:$answer" >> '{log}'
  touch '{mark}'
  exit 0
fi
echo "again" >> '{log}'
printf 'Permission denied (publickey).\r\n'"#,
            mark = mark.display(),
            log = log.display()
        ),
    );

    // The default grace leaves the child time to record the answer.
    let err = LoginSequencer::new(
        spawner(&program),
        candidates()[..1].to_vec(),
        LoginOptions::default(),
    )
    .run()
    .await
    .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(log_lines(&dir), vec!["answer:yes", "again"]);
}

#[tokio::test]
async fn silent_exit_is_a_failed_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_ssh(dir.path(), "exit 255");

    let err = LoginSequencer::new(spawner(&program), candidates()[..1].to_vec(), options())
        .run()
        .await
        .unwrap_err();

    match err {
        LoginError::AuthExhausted { failures } => {
            assert_eq!(failures[0].reason, Rejection::Exited);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn missing_program_aborts() {
    let program = PathBuf::from("/nonexistent/jumpline-fake-ssh");
    let err = LoginSequencer::new(spawner(&program), candidates(), options())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::Spawn(_)));
}
