//! Node Configuration - resolved by the CLI, defaults otherwise

use crate::core::paths::{config as vars, node as defaults};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Node binary, looked up on PATH unless it is a path
    pub bin: String,
    /// Arguments passed before `--port`
    pub args: Vec<String>,
    pub port: u16,
    pub startup_timeout: Duration,
    pub stop_grace: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bin: defaults::DEFAULT_BIN.into(),
            args: Vec::new(),
            port: defaults::DEFAULT_PORT,
            startup_timeout: Duration::from_secs(defaults::DEFAULT_STARTUP_TIMEOUT_SECS),
            stop_grace: Duration::from_secs(defaults::DEFAULT_STOP_GRACE_SECS),
        }
    }
}

impl NodeConfig {
    pub fn new(port: u16) -> Self {
        Self { port, ..Default::default() }
    }

    /// Defaults overridden by `CRYBRO_*` variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(bin) = env_string(vars::NODE_BIN) {
            config.bin = bin;
        }
        if let Some(port) = env_string(vars::PORT).and_then(|s| s.parse().ok()) {
            config.port = port;
        }
        if let Some(secs) = env_string(vars::STARTUP_TIMEOUT_SECS).and_then(|s| s.parse().ok()) {
            config.startup_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_string(vars::STOP_GRACE_SECS).and_then(|s| s.parse().ok()) {
            config.stop_grace = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_bin(mut self, bin: impl Into<String>) -> Self { self.bin = bin.into(); self }
    pub fn with_args(mut self, args: Vec<String>) -> Self { self.args = args; self }
    pub fn with_port(mut self, port: u16) -> Self { self.port = port; self }
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self { self.startup_timeout = timeout; self }
    pub fn with_stop_grace(mut self, grace: Duration) -> Self { self.stop_grace = grace; self }

    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}", defaults::LOOPBACK, self.port)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}
