//! Variable, extension and directory name constants
//!
//! Centralized registry for every name the node, the locator and the runner
//! agree on.

/// Variables exported once the node reports readiness
pub mod vars {
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";
    pub const DEPLOYER_ADDRESS: &str = "DEPLOYER_ADDRESS";

    pub const NODE: &[&str] = &[PRIVATE_KEY, ETH_RPC_URL, DEPLOYER_ADDRESS];
}

/// Configuration variables (CLI flags take precedence)
pub mod config {
    pub const PORT: &str = "CRYBRO_PORT";
    pub const NODE_BIN: &str = "CRYBRO_NODE_BIN";
    pub const STARTUP_TIMEOUT_SECS: &str = "CRYBRO_STARTUP_TIMEOUT_SECS";
    pub const STOP_GRACE_SECS: &str = "CRYBRO_STOP_GRACE_SECS";
    pub const FORGE_BIN: &str = "CRYBRO_FORGE_BIN";
    pub const PYTHON: &str = "CRYBRO_PYTHON";
    pub const NODE_JS: &str = "CRYBRO_NODE_JS";
    pub const SHELL: &str = "CRYBRO_SHELL";
    pub const LOG_JSON: &str = "CRYBRO_LOG_JSON";
}

/// Node defaults
pub mod node {
    pub const DEFAULT_BIN: &str = "anvil";
    pub const DEFAULT_PORT: u16 = 8545;
    pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_STOP_GRACE_SECS: u64 = 3;
    pub const LOOPBACK: &str = "127.0.0.1";
    pub const UNKNOWN_ADDRESS: &str = "unknown";
}

/// Script discovery
pub mod scripts {
    pub const EXTENSIONS: &[&str] = &["py", "js", "ts", "sh", "sol"];

    /// Directory names never descended into. Hidden directories are skipped as well.
    pub const EXCLUDED_DIRS: &[&str] = &[
        "node_modules",
        "venv",
        "__pycache__",
        "site-packages",
        "target",
        "dist",
        "build",
        // Foundry dependencies and artifacts
        "lib",
        "out",
        "cache",
        "broadcast",
    ];
}
