//! Runner: script → command line → foreground child process

use super::{ScriptEntry, ScriptError, ScriptKind};
use crate::core::paths::{config as vars, vars as node_vars};
use crate::registry::EnvRegistry;
use crate::runtime::{self, Interrupt, Interrupts};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Programs used per script type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub python: String,
    pub node: String,
    /// Tried in order; a candidate is skipped only when its program is missing
    pub typescript: Vec<Vec<String>>,
    pub shell: String,
    pub forge: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            node: "node".into(),
            typescript: vec![
                vec!["ts-node".into()],
                vec!["tsx".into()],
                vec!["npx".into(), "ts-node".into()],
            ],
            shell: "bash".into(),
            forge: "forge".into(),
        }
    }
}

impl RunnerConfig {
    /// Defaults overridden by `CRYBRO_PYTHON`, `CRYBRO_NODE_JS`, `CRYBRO_SHELL`, `CRYBRO_FORGE_BIN`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|s| !s.trim().is_empty());
        if let Some(v) = var(vars::PYTHON) { config.python = v; }
        if let Some(v) = var(vars::NODE_JS) { config.node = v; }
        if let Some(v) = var(vars::SHELL) { config.shell = v; }
        if let Some(v) = var(vars::FORGE_BIN) { config.forge = v; }
        config
    }

    pub fn with_python(mut self, program: impl Into<String>) -> Self { self.python = program.into(); self }
    pub fn with_node(mut self, program: impl Into<String>) -> Self { self.node = program.into(); self }
    pub fn with_typescript(mut self, candidates: Vec<Vec<String>>) -> Self { self.typescript = candidates; self }
    pub fn with_shell(mut self, program: impl Into<String>) -> Self { self.shell = program.into(); self }
    pub fn with_forge(mut self, program: impl Into<String>) -> Self { self.forge = program.into(); self }
}

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { program: program.into(), args: args.into_iter().map(Into::into).collect() }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Everything needed to launch one script, decided before anything is spawned
#[derive(Debug, Clone)]
pub struct Invocation {
    pub script: ScriptEntry,
    pub candidates: Vec<CommandLine>,
    /// Merged over the ambient environment of the child
    pub env: BTreeMap<String, String>,
}

/// How a script run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// `None` when the child died from a signal
    pub code: Option<i32>,
    /// Strongest interrupt received while the script ran
    pub interrupt: Option<Interrupt>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: RunnerConfig,
    workdir: Option<PathBuf>,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config, workdir: None }
    }

    /// Directory children run in (the catalog root)
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Build the command line(s) for `script`. Never spawns.
    pub fn plan(&self, script: &ScriptEntry, registry: &EnvRegistry) -> Result<Invocation, ScriptError> {
        let path = script.path.to_string_lossy().into_owned();
        let candidates = match script.kind {
            ScriptKind::Python => vec![CommandLine::new(&self.config.python, [path])],
            ScriptKind::JavaScript => vec![CommandLine::new(&self.config.node, [path])],
            ScriptKind::TypeScript => self
                .config
                .typescript
                .iter()
                .filter_map(|prefix| {
                    let (program, rest) = prefix.split_first()?;
                    let args = rest.iter().cloned().chain(std::iter::once(path.clone()));
                    Some(CommandLine::new(program.clone(), args))
                })
                .collect(),
            ScriptKind::Shell => vec![CommandLine::new(&self.config.shell, [path])],
            ScriptKind::Solidity => {
                let rpc_url = registry
                    .get(node_vars::ETH_RPC_URL)
                    .ok_or(ScriptError::MissingCredential(node_vars::ETH_RPC_URL))?;
                let private_key = registry
                    .get(node_vars::PRIVATE_KEY)
                    .ok_or(ScriptError::MissingCredential(node_vars::PRIVATE_KEY))?;
                vec![CommandLine::new(
                    &self.config.forge,
                    [
                        "script",
                        path.as_str(),
                        "--rpc-url",
                        rpc_url,
                        "--private-key",
                        private_key,
                        "--broadcast",
                    ],
                )]
            }
        };

        Ok(Invocation { script: script.clone(), candidates, env: registry.get_all() })
    }

    /// Run in the foreground with inherited stdio until the child exits.
    ///
    /// Interrupts received meanwhile are relayed to the child.
    pub async fn run(&self, invocation: &Invocation, interrupts: &mut Interrupts) -> Result<RunOutcome, ScriptError> {
        for line in &invocation.candidates {
            let mut cmd = Command::new(&line.program);
            cmd.args(&line.args)
                .envs(&invocation.env)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .kill_on_drop(true);
            if let Some(dir) = &self.workdir {
                cmd.current_dir(dir);
            }

            let child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("{} not found, trying next runtime", line.program);
                    continue;
                }
                Err(source) => return Err(ScriptError::Launch { program: line.program.clone(), source }),
            };
            tracing::info!("Running: {}", line);
            return supervise(child, interrupts, io::stdin().is_terminal()).await;
        }

        Err(ScriptError::RuntimeNotFound {
            path: invocation.script.display_path(),
            tried: invocation
                .candidates
                .iter()
                .map(|c| c.program.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// `plan` then `run`
    pub async fn execute(
        &self,
        script: &ScriptEntry,
        registry: &EnvRegistry,
        interrupts: &mut Interrupts,
    ) -> Result<RunOutcome, ScriptError> {
        let invocation = self.plan(script, registry)?;
        self.run(&invocation, interrupts).await
    }
}

async fn supervise(mut child: Child, interrupts: &mut Interrupts, terminal: bool) -> Result<RunOutcome, ScriptError> {
    let mut seen: Option<Interrupt> = None;
    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status?;
                return Ok(RunOutcome { code: status.code(), interrupt: seen });
            }
            interrupt = interrupts.recv() => {
                if needs_relay(interrupt, terminal) {
                    tracing::info!("Relaying {:?} to script", interrupt);
                    if let Err(e) = runtime::forward(&mut child, interrupt) {
                        tracing::warn!("Failed to signal script: {}", e);
                    }
                } else {
                    tracing::debug!("{:?} already delivered by the terminal", interrupt);
                }
                if seen != Some(Interrupt::Terminate) {
                    seen = Some(interrupt);
                }
            }
        }
    }
}

/// Scripts share our process group, so a terminal Ctrl+C reaches them directly.
/// SIGINT is only relayed when it did not come from a terminal.
fn needs_relay(interrupt: Interrupt, terminal: bool) -> bool {
    match interrupt {
        Interrupt::Terminate => true,
        Interrupt::Interrupt => !terminal,
    }
}
