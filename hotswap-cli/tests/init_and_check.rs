use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hotswap(home: &TempDir, root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hotswap").expect("hotswap binary");
    cmd.env("HOME", home.path())
        .env("USERPROFILE", home.path())
        .arg("--root")
        .arg(root.path());
    cmd
}

fn write(root: &TempDir, rel: &str, contents: &str) {
    let path = root.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

const KEYWORD_VALIDATOR: &str = r#"validator:
  command: sh
  args:
    - "-c"
    - "if grep -q BROKEN; then echo 'unexpected BROKEN' >&2; exit 1; fi"
"#;

#[test]
fn init_writes_default_config_once() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();

    hotswap(&home, &root)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("hotswap.yaml"));

    let written = std::fs::read_to_string(root.path().join("hotswap.yaml")).unwrap();
    assert!(written.contains("entry_file: app/main.rb"), "unexpected config:\n{written}");

    hotswap(&home, &root)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    hotswap(&home, &root).args(["init", "--force"]).assert().success();
}

#[test]
fn status_without_daemon_reports_not_running() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();

    let output = hotswap(&home, &root)
        .args(["status", "--json"])
        .output()
        .expect("run hotswap status");
    assert!(output.status.success(), "stderr={}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["running"], false);
    assert!(value["socket"].as_str().unwrap().ends_with("daemon.sock"));

    hotswap(&home, &root)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("daemon is not running"));
}

#[test]
fn stop_without_daemon_is_not_an_error() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();

    hotswap(&home, &root)
        .arg("stop")
        .assert()
        .success()
        .stdout(predicate::str::contains("daemon is not running"));
}

#[test]
fn check_without_validator_accepts_sources() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write(&root, "app/main.rb", "def tick(args)\nend\n");

    hotswap(&home, &root)
        .args(["check", "app/main.rb"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app/main.rb"));
}

#[test]
fn check_reports_validator_diagnostics() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write(&root, "hotswap.yaml", KEYWORD_VALIDATOR);
    write(&root, "app/good.rb", "def tick(args)\nend\n");
    write(&root, "app/bad.rb", "def tick(args)\n  BROKEN\n");

    hotswap(&home, &root)
        .args(["check", "app/good.rb"])
        .assert()
        .success();

    hotswap(&home, &root)
        .args(["check", "app/good.rb", "app/bad.rb"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unexpected BROKEN"))
        .stderr(predicate::str::contains("1 file(s) failed syntax validation"));
}

#[test]
fn check_skips_compiled_sources() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write(&root, "hotswap.yaml", KEYWORD_VALIDATOR);
    write(&root, "app/lib.rbc", "BROKEN bytes");

    hotswap(&home, &root)
        .args(["check", "app/lib.rbc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not validated"));
}

#[test]
fn check_missing_file_fails() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();

    hotswap(&home, &root)
        .args(["check", "app/missing.rb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
