//! CLI Tests: the `crybro` binary end to end
//!
//! Every command runs inside a temp directory so no `.env` from the
//! checkout leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const NODE_VARS: [&str; 3] = ["PRIVATE_KEY", "ETH_RPC_URL", "DEPLOYER_ADDRESS"];

fn crybro(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("crybro").unwrap();
    cmd.current_dir(cwd).env("RUST_LOG", "off");
    for var in NODE_VARS {
        cmd.env_remove(var);
    }
    for var in ["CRYBRO_PORT", "CRYBRO_NODE_BIN", "CRYBRO_SHELL", "CRYBRO_LOG_JSON"] {
        cmd.env_remove(var);
    }
    cmd
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("deploy.py"), "print('deploy')\n").unwrap();
    fs::create_dir_all(dir.path().join("scripts")).unwrap();
    fs::write(dir.path().join("scripts/Deploy.s.sol"), "").unwrap();
    fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
    fs::write(dir.path().join("node_modules/pkg/index.js"), "").unwrap();
    dir
}

fn free_port() -> u16 {
    std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap().local_addr().unwrap().port()
}

#[test]
fn list_prints_table() {
    let dir = project();
    crybro(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("  1  deploy.py"))
        .stdout(predicate::str::contains("  2  scripts/Deploy.s.sol"))
        .stdout(predicate::str::contains("index.js").not());
}

#[test]
fn list_json() {
    let dir = project();
    let out = crybro(dir.path()).args(["--json", "list"]).output().unwrap();
    assert!(out.status.success());

    let entries: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["index"], 1);
    assert_eq!(entries[0]["kind"], "python");
    assert_eq!(entries[1]["path"], "scripts/Deploy.s.sol");
    assert_eq!(entries[1]["kind"], "solidity");
}

#[test]
fn list_other_dir() {
    let dir = project();
    let cwd = TempDir::new().unwrap();
    crybro(cwd.path())
        .args(["list", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("(2 scripts)"));

    crybro(cwd.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No scripts found"));
}

#[test]
fn env_reads_exported_node_vars() {
    let dir = TempDir::new().unwrap();
    crybro(dir.path())
        .args(["--json", "env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("{}"));

    crybro(dir.path())
        .arg("env")
        .env("ETH_RPC_URL", "http://127.0.0.1:8545")
        .env("UNRELATED", "x")
        .assert()
        .success()
        .stdout(predicate::eq("ETH_RPC_URL=http://127.0.0.1:8545\n"));
}

#[test]
fn start_on_bound_port_fails() {
    let dir = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();

    crybro(dir.path())
        .args(["start", "--port", &port.to_string()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(format!("Port {} is already in use", port)));

    crybro(dir.path())
        .args(["--json", "start", "--port", &port.to_string()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(r#"{"error":"Port "#));
}

#[test]
fn start_with_missing_node_binary() {
    let dir = TempDir::new().unwrap();
    crybro(dir.path())
        .args(["start", "--port", &free_port().to_string()])
        .env("CRYBRO_NODE_BIN", "crybro-no-such-node")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found on PATH"));
}

#[test]
fn run_solidity_without_node_fails() {
    let dir = project();
    crybro(dir.path())
        .args(["--json", "run", "2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ETH_RPC_URL is not set"));
}

#[test]
fn run_unknown_reference() {
    let dir = project();
    crybro(dir.path())
        .args(["run", "nope.py"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Script not found: nope.py"));
}

#[cfg(unix)]
#[test]
fn run_exits_with_script_code() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("job.sh"), "echo \"rpc=$ETH_RPC_URL\"\nexit 3\n").unwrap();

    crybro(dir.path())
        .args(["run", "job"])
        .env("CRYBRO_SHELL", "sh")
        .env("ETH_RPC_URL", "http://127.0.0.1:9999")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("rpc=http://127.0.0.1:9999"))
        .stderr(predicate::str::contains("Running: job.sh"));
}

#[cfg(unix)]
#[test]
fn dotenv_configures_runner() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "CRYBRO_SHELL=sh\nGREETING=from-dotenv\n").unwrap();
    fs::write(dir.path().join("hello.sh"), "echo \"$GREETING\"\n").unwrap();

    crybro(dir.path())
        .args(["run", "hello.sh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-dotenv"));
}

#[cfg(unix)]
mod with_fake_node {
    use super::*;

    // Prints a banner, then exits on its own after a moment
    const SHORT_LIVED: &str = r#"
echo "(0) 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266 (10000.000000000000000000 ETH)"
echo "(0) 0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
echo "Listening on 127.0.0.1:$2"
sleep 1
"#;

    fn start(dir: &Path, port: u16, flags: &[&str]) -> Command {
        let mut cmd = crybro(dir);
        cmd.env("CRYBRO_NODE_BIN", "sh")
            .args(["start", "--port", &port.to_string()])
            .args(flags)
            .args(["--", "-c", SHORT_LIVED, "fake-anvil"]);
        cmd
    }

    #[test]
    fn foreground_start_prints_variables() {
        let dir = TempDir::new().unwrap();
        let port = free_port();
        start(dir.path(), port, &[])
            .assert()
            .success()
            .stdout(predicate::str::contains("PRIVATE_KEY=0xac0974be...f4f2ff80"))
            .stdout(predicate::str::contains("bacb478cbed5efcae784d7bf4f2ff80").not())
            .stdout(predicate::str::contains(format!("ETH_RPC_URL=http://127.0.0.1:{}", port)))
            .stdout(predicate::str::contains("DEPLOYER_ADDRESS=0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"))
            .stdout(predicate::str::contains("Node stopped."));
    }

    #[test]
    fn interactive_start_opens_shell() {
        let dir = TempDir::new().unwrap();
        let port = free_port();
        start(dir.path(), port, &["--interactive"])
            .write_stdin("env add FOO=bar\nenv\nexit\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("crybro shell"))
            .stdout(predicate::str::contains("FOO=bar"))
            .stdout(predicate::str::contains("Goodbye!"));
    }
}
