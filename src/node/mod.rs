//! Node - supervises the local dev node and exports its first account
//!
//! ```text
//! Supervisor::start(registry)
//!   │
//!   ├── check port ─────────→ PortInUse
//!   ├── which(bin) ─────────→ BinaryNotFound
//!   ├── spawn bin [args] --port N   (own process group, null stdin)
//!   ├── scan banner until key (+ ready line, EOF or deadline) → Timeout / Exited / PortInUse
//!   └── export PRIVATE_KEY, ETH_RPC_URL, DEPLOYER_ADDRESS
//! ```

pub mod banner;
mod config;

pub use banner::{AnvilBanner, Banner, BannerLine, BannerMatcher};
pub use config::NodeConfig;

use crate::core::paths::{node as defaults, vars};
use crate::registry::EnvRegistry;
use crate::runtime::{self, Interrupt};
use async_trait::async_trait;
use banner::ScanOutcome;
use serde::Serialize;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Node supervision errors. `BinaryNotFound`, `Spawn` and `Exited` are startup failures.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("'{0}' not found on PATH. Install Foundry: https://getfoundry.sh")]
    BinaryNotFound(String),

    #[error("Failed to spawn '{bin}': {source}")]
    Spawn { bin: String, source: io::Error },

    #[error("Node exited before it was ready ({status}){}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Exited { status: String, detail: Option<String> },

    #[error("Node printed no private key within {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Port {0} is already in use")]
    PortInUse(u16),

    #[error("Node I/O: {0}")]
    Io(#[from] io::Error),
}

/// First dev account and where to reach the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub private_key: String,
    pub address: String,
    pub rpc_url: String,
    pub port: u16,
}

impl Credentials {
    /// Write the three node variables into the registry
    pub fn export(&self, registry: &mut EnvRegistry) {
        registry.insert(vars::PRIVATE_KEY, self.private_key.clone());
        registry.insert(vars::ETH_RPC_URL, self.rpc_url.clone());
        registry.insert(vars::DEPLOYER_ADDRESS, self.address.clone());
    }
}

/// What the shell needs from a node
#[async_trait]
pub trait NodeControl: Send {
    /// Terminate the node. No-op when nothing runs.
    async fn stop(&mut self) -> Result<(), NodeError>;

    fn credentials(&self) -> Option<&Credentials>;

    /// Whether the node process is still alive
    fn is_running(&mut self) -> bool;
}

struct NodeProcess {
    child: Child,
    credentials: Credentials,
    drain: JoinHandle<()>,
}

/// Owns the one node process of a session
pub struct Supervisor<M = AnvilBanner> {
    config: NodeConfig,
    matcher: M,
    process: Option<NodeProcess>,
}

impl Supervisor<AnvilBanner> {
    pub fn new(config: NodeConfig) -> Self {
        Self::with_matcher(config, AnvilBanner)
    }
}

impl<M: BannerMatcher> Supervisor<M> {
    pub fn with_matcher(config: NodeConfig, matcher: M) -> Self {
        Self { config, matcher, process: None }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(p) => matches!(p.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the node, wait for its banner and export the credentials.
    ///
    /// The registry is only touched on success. Dropping the returned future
    /// before it resolves kills the half-started node.
    pub async fn start(&mut self, registry: &mut EnvRegistry) -> Result<&Credentials, NodeError> {
        if self.is_running() {
            tracing::debug!("Node already running, re-exporting credentials");
        } else {
            self.process = None;
            let process = self.spawn().await?;
            self.process = Some(process);
        }

        let Some(process) = self.process.as_ref() else {
            return Err(io::Error::new(io::ErrorKind::Other, "node process missing").into());
        };
        process.credentials.export(registry);
        Ok(&process.credentials)
    }

    async fn spawn(&self) -> Result<NodeProcess, NodeError> {
        let port = self.config.port;
        check_port_free(port)?;

        let bin = which::which(&self.config.bin)
            .map_err(|_| NodeError::BinaryNotFound(self.config.bin.clone()))?;

        tracing::info!("Starting {} on port {}", self.config.bin, port);
        let mut cmd = Command::new(&bin);
        cmd.args(&self.config.args)
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Keep terminal Ctrl+C aimed at foreground scripts away from the node
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| NodeError::Spawn {
            bin: self.config.bin.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "node stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "node stderr not captured"))?;
        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();

        let scanned = banner::scan(&self.matcher, &mut stdout, &mut stderr, self.config.startup_timeout).await;

        let found = match scanned {
            ScanOutcome::Ready(found) => found,
            ScanOutcome::Closed { errors } => {
                let status = exit_status(&mut child).await;
                if banner::mentions_port_in_use(&errors) {
                    return Err(NodeError::PortInUse(port));
                }
                return Err(NodeError::Exited { status, detail: errors.last().cloned() });
            }
            ScanOutcome::TimedOut => {
                let _ = child.kill().await;
                return Err(NodeError::Timeout(self.config.startup_timeout));
            }
        };

        let credentials = Credentials {
            private_key: found.private_key,
            address: found.address.unwrap_or_else(|| defaults::UNKNOWN_ADDRESS.into()),
            rpc_url: self.config.rpc_url(),
            port,
        };
        tracing::info!(pid = ?child.id(), address = %credentials.address, "Node ready at {}", credentials.rpc_url);

        let drain = tokio::spawn(banner::drain(stdout, stderr));
        Ok(NodeProcess { child, credentials, drain })
    }

    /// Wait for the node to exit on its own. Pending forever when nothing runs.
    pub async fn wait(&mut self) -> Result<ExitStatus, NodeError> {
        match self.process.as_mut() {
            Some(p) => Ok(p.child.wait().await?),
            None => std::future::pending().await,
        }
    }

    /// SIGTERM, then SIGKILL after the grace period
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        if let Err(e) = runtime::forward(&mut process.child, Interrupt::Terminate) {
            tracing::warn!("Failed to signal node: {}", e);
        }

        let grace = self.config.stop_grace;
        let result = match tokio::time::timeout(grace, process.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("Node stopped ({})", status);
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                tracing::warn!("Node still running after {:?}, killing", grace);
                process.child.kill().await.map_err(NodeError::from)
            }
        };
        process.drain.abort();
        result
    }
}

#[async_trait]
impl<M: BannerMatcher> NodeControl for Supervisor<M> {
    async fn stop(&mut self) -> Result<(), NodeError> {
        Supervisor::stop(self).await
    }

    fn credentials(&self) -> Option<&Credentials> {
        self.process.as_ref().map(|p| &p.credentials)
    }

    fn is_running(&mut self) -> bool {
        Supervisor::is_running(self)
    }
}

fn check_port_free(port: u16) -> Result<(), NodeError> {
    match std::net::TcpListener::bind((defaults::LOOPBACK, port)) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(NodeError::PortInUse(port)),
        Err(e) => {
            tracing::debug!("Port check on {} inconclusive: {}", port, e);
            Ok(())
        }
    }
}

async fn exit_status(child: &mut Child) -> String {
    match tokio::time::timeout(Duration::from_secs(1), child.wait()).await {
        Ok(Ok(status)) => status.to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(_) => {
            let _ = child.kill().await;
            "closed its output".into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bound_port_is_rejected_before_spawn() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut supervisor = Supervisor::new(NodeConfig::new(port).with_bin("crybro-no-such-node"));
        let mut registry = EnvRegistry::new();
        let err = supervisor.start(&mut registry).await.unwrap_err();

        assert!(matches!(err, NodeError::PortInUse(p) if p == port));
        assert!(registry.is_empty());
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn missing_binary() {
        let mut supervisor = Supervisor::new(NodeConfig::new(free_port()).with_bin("crybro-no-such-node"));
        let mut registry = EnvRegistry::new();
        let err = supervisor.start(&mut registry).await.unwrap_err();
        assert!(matches!(err, NodeError::BinaryNotFound(ref b) if b == "crybro-no-such-node"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stop_without_process_is_noop() {
        let mut supervisor = Supervisor::new(NodeConfig::default());
        supervisor.stop().await.unwrap();
        supervisor.stop().await.unwrap();
        assert!(NodeControl::credentials(&supervisor).is_none());
    }

    #[test]
    fn export_writes_three_vars() {
        let credentials = Credentials {
            private_key: "0xkey".into(),
            address: "0xaddr".into(),
            rpc_url: "http://127.0.0.1:8545".into(),
            port: 8545,
        };
        let mut registry = EnvRegistry::new();
        credentials.export(&mut registry);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("PRIVATE_KEY"), Some("0xkey"));
        assert_eq!(registry.get("ETH_RPC_URL"), Some("http://127.0.0.1:8545"));
        assert_eq!(registry.get("DEPLOYER_ADDRESS"), Some("0xaddr"));
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap().local_addr().unwrap().port()
    }
}
