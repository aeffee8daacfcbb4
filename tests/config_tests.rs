//! Config Tests: `CRYBRO_*` variables and the ambient node variables
//!
//! These touch the process environment, so every test holds `ENV_LOCK`.

use crybro::{EnvRegistry, NodeConfig, RunnerConfig};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use std::time::Duration;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

const NODE_KNOBS: [&str; 4] = [
    "CRYBRO_PORT",
    "CRYBRO_NODE_BIN",
    "CRYBRO_STARTUP_TIMEOUT_SECS",
    "CRYBRO_STOP_GRACE_SECS",
];

const RUNNER_KNOBS: [&str; 4] = ["CRYBRO_PYTHON", "CRYBRO_NODE_JS", "CRYBRO_SHELL", "CRYBRO_FORGE_BIN"];

fn clear(vars: &[&str]) {
    for var in vars {
        std::env::remove_var(var);
    }
}

#[test]
fn node_config_from_env() {
    let _guard = lock_env();
    clear(&NODE_KNOBS);

    assert_eq!(NodeConfig::from_env(), NodeConfig::default());

    std::env::set_var("CRYBRO_PORT", "9545");
    std::env::set_var("CRYBRO_NODE_BIN", "/opt/foundry/bin/anvil");
    std::env::set_var("CRYBRO_STARTUP_TIMEOUT_SECS", "30");
    std::env::set_var("CRYBRO_STOP_GRACE_SECS", "1");

    let config = NodeConfig::from_env();
    assert_eq!(config.port, 9545);
    assert_eq!(config.bin, "/opt/foundry/bin/anvil");
    assert_eq!(config.startup_timeout, Duration::from_secs(30));
    assert_eq!(config.stop_grace, Duration::from_secs(1));
    assert_eq!(config.rpc_url(), "http://127.0.0.1:9545");

    clear(&NODE_KNOBS);
}

#[test]
fn unparseable_values_fall_back_to_defaults() {
    let _guard = lock_env();
    clear(&NODE_KNOBS);

    std::env::set_var("CRYBRO_PORT", "not-a-port");
    std::env::set_var("CRYBRO_STARTUP_TIMEOUT_SECS", "-5");
    std::env::set_var("CRYBRO_NODE_BIN", "   ");

    let config = NodeConfig::from_env();
    assert_eq!(config.port, 8545);
    assert_eq!(config.startup_timeout, Duration::from_secs(10));
    assert_eq!(config.bin, "anvil");

    clear(&NODE_KNOBS);
}

#[test]
fn runner_config_from_env() {
    let _guard = lock_env();
    clear(&RUNNER_KNOBS);

    assert_eq!(RunnerConfig::from_env(), RunnerConfig::default());

    std::env::set_var("CRYBRO_PYTHON", "python3.12");
    std::env::set_var("CRYBRO_FORGE_BIN", "/opt/foundry/bin/forge");

    let config = RunnerConfig::from_env();
    assert_eq!(config.python, "python3.12");
    assert_eq!(config.forge, "/opt/foundry/bin/forge");
    assert_eq!(config.node, "node");
    assert_eq!(config.shell, "bash");
    assert_eq!(config.typescript.len(), 3);

    clear(&RUNNER_KNOBS);
}

#[test]
fn registry_from_process_reads_node_vars_only() {
    let _guard = lock_env();
    for var in ["PRIVATE_KEY", "ETH_RPC_URL", "DEPLOYER_ADDRESS"] {
        std::env::remove_var(var);
    }
    assert!(EnvRegistry::from_process().is_empty());

    std::env::set_var("PRIVATE_KEY", "0xkey");
    std::env::set_var("ETH_RPC_URL", "http://127.0.0.1:8545");

    let registry = EnvRegistry::from_process();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("PRIVATE_KEY"), Some("0xkey"));
    assert!(registry.get("PATH").is_none());

    std::env::remove_var("PRIVATE_KEY");
    std::env::remove_var("ETH_RPC_URL");
}
