//! The `jumpline` binary against snapshot files in a temp dir, with no
//! bastion configured.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
  "reservations": [
    { "Instances": [
      { "InstanceId": "i-0aaa", "PrivateIpAddress": "10.0.0.5", "KeyName": "prod",
        "Tags": [{"Key": "Name", "Value": "web-1"}] },
      { "InstanceId": "i-0bbb", "PrivateIpAddress": "10.0.0.6", "KeyName": "prod",
        "Tags": [{"Key": "Name", "Value": "web-2"}] }
    ] }
  ]
}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("inventory.json"), SNAPSHOT).unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        Self { dir }
    }

    fn inventory(&self) -> PathBuf {
        self.dir.path().join("inventory.json")
    }

    fn results(&self) -> PathBuf {
        self.dir.path().join("results.json")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_jumpline"))
            .arg("--config")
            .arg(self.dir.path().join("config.toml"))
            .args(args)
            .env("JUMPLINE_INVENTORY_CACHE", self.inventory())
            .env("JUMPLINE_RESULTS_CACHE", self.results())
            .env_remove("JUMPLINE_JUMP_HOST")
            .env_remove("JUMPLINE_CONFIG")
            .env_remove("JUMPLINE_INVENTORY_COMMAND")
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn ambiguous_target_lists_choices_without_a_bastion() {
    let ws = Workspace::new();
    let out = ws.run(&["web"]);

    assert_eq!(out.status.code(), Some(1));
    let stdout = text(&out.stdout);
    assert!(stdout.contains("[1] Name: web-1 InstanceId: i-0aaa"));
    assert!(stdout.contains("[2] Name: web-2 InstanceId: i-0bbb"));
    let stderr = text(&out.stderr);
    assert!(stderr.contains("matches 2 machines"), "{stderr}");
    assert!(!stderr.contains("no jump host"), "{stderr}");
}

#[test]
fn refresh_flag_keeps_ordinals_from_last_listing() {
    let ws = Workspace::new();
    assert!(ws.run(&["find", "web"]).status.success());

    // The ordinal resolves; only the missing bastion stops the login.
    let out = ws.run(&["--refresh", "2"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = text(&out.stderr);
    assert!(stderr.contains("no jump host"), "{stderr}");
    assert!(!ws.inventory().exists());
    assert!(ws.results().exists());
}

#[test]
fn refresh_command_clears_both_caches() {
    let ws = Workspace::new();
    assert!(ws.run(&["find", "web"]).status.success());

    assert!(ws.run(&["refresh"]).status.success());
    assert!(!ws.inventory().exists());
    assert!(!ws.results().exists());
}
