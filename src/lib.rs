//! crybro: local dev node launcher and script shell.
//!
//! # Architecture
//!
//! ```text
//! CLI (bin/main.rs)
//!   │
//!   ├── Supervisor (node)
//!   │     └── spawns anvil, scrapes the banner → Credentials
//!   │
//!   ├── EnvRegistry (registry)
//!   │     └── PRIVATE_KEY, ETH_RPC_URL, DEPLOYER_ADDRESS + `env add`
//!   │
//!   └── Shell (shell)
//!         ├── discover / Catalog::resolve (scripts)
//!         └── Runner: plan → run in the foreground (scripts)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use crybro::{EnvRegistry, Interrupts, NodeConfig, Runner, RunnerConfig, Shell, Supervisor};
//!
//! let mut registry = EnvRegistry::new();
//! let mut node = Supervisor::new(NodeConfig::from_env());
//! node.start(&mut registry).await?;
//!
//! let runner = Runner::new(RunnerConfig::from_env()).with_workdir(".");
//! let mut shell = Shell::new(node, registry, runner, ".", std::io::stdout());
//! shell.run(tokio::io::BufReader::new(tokio::io::stdin()), &mut Interrupts::install()?).await?;
//! ```

pub mod core;
pub mod logging;
pub mod node;
pub mod registry;
pub mod runtime;
pub mod scripts;
pub mod shell;

pub use node::{Credentials, NodeConfig, NodeControl, NodeError, Supervisor};
pub use registry::{EnvError, EnvRegistry};
pub use runtime::{Interrupt, Interrupts};
pub use scripts::{discover, Catalog, Runner, RunnerConfig, ScriptEntry, ScriptError, ScriptKind};
pub use shell::{Flow, Shell, ShellError};
