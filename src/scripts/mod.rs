//! Scripts - discovery and execution of developer scripts
//!
//! | Type | Extension | Command |
//! |------|-----------|---------|
//! | python | `.py` | `python3 <path>` |
//! | javascript | `.js` | `node <path>` |
//! | typescript | `.ts` | first of `ts-node`, `tsx`, `npx ts-node` |
//! | shell | `.sh` | `bash <path>` |
//! | solidity | `.sol` | `forge script <path> --rpc-url $ETH_RPC_URL --private-key $PRIVATE_KEY --broadcast` |

mod catalog;
mod runner;

pub use catalog::{discover, Catalog};
pub use runner::{CommandLine, Invocation, RunOutcome, Runner, RunnerConfig};

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Script not found: {0}")]
    NotFound(String),

    #[error("'{reference}' matches {} scripts: {}. Use more of the path.", .candidates.len(), .candidates.join(", "))]
    Ambiguous { reference: String, candidates: Vec<String> },

    #[error("{0} is not set. Start the node first or `env add {0}=...`")]
    MissingCredential(&'static str),

    #[error("Unsupported script type: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("No runtime found for {path} (tried: {tried})")]
    RuntimeNotFound { path: String, tried: String },

    #[error("Cannot read {}: {source}", .path.display())]
    Walk { path: PathBuf, source: walkdir::Error },

    #[error("Failed to launch {program}: {source}")]
    Launch { program: String, source: io::Error },

    #[error("Script I/O: {0}")]
    Io(#[from] io::Error),
}

/// Closed set of runnable file types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Python,
    JavaScript,
    TypeScript,
    Shell,
    Solidity,
}

impl ScriptKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "py" => Some(ScriptKind::Python),
            "js" => Some(ScriptKind::JavaScript),
            "ts" => Some(ScriptKind::TypeScript),
            "sh" => Some(ScriptKind::Shell),
            "sol" => Some(ScriptKind::Solidity),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::Python => "python",
            ScriptKind::JavaScript => "javascript",
            ScriptKind::TypeScript => "typescript",
            ScriptKind::Shell => "shell",
            ScriptKind::Solidity => "solidity",
        }
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One runnable script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptEntry {
    /// 1-based position in its catalog; 0 for a script addressed by path outside the catalog
    pub index: usize,
    pub name: String,
    /// Relative to the catalog root
    pub path: PathBuf,
    pub kind: ScriptKind,
    pub size: u64,
}

impl ScriptEntry {
    /// An entry for a file addressed directly by path
    pub fn direct(path: impl Into<PathBuf>) -> Result<Self, ScriptError> {
        let path = path.into();
        let kind = ScriptKind::from_path(&path).ok_or_else(|| ScriptError::Unsupported(path.clone()))?;
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Ok(Self { index: 0, name: file_name(&path), path, kind, size })
    }

    /// Path as shown to the user, always with `/` separators
    pub fn display_path(&self) -> String {
        self.path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(ScriptKind::from_path(Path::new("a/deploy.py")), Some(ScriptKind::Python));
        assert_eq!(ScriptKind::from_path(Path::new("x.js")), Some(ScriptKind::JavaScript));
        assert_eq!(ScriptKind::from_path(Path::new("x.ts")), Some(ScriptKind::TypeScript));
        assert_eq!(ScriptKind::from_path(Path::new("x.sh")), Some(ScriptKind::Shell));
        assert_eq!(ScriptKind::from_path(Path::new("script/Deploy.s.sol")), Some(ScriptKind::Solidity));
        assert_eq!(ScriptKind::from_path(Path::new("README.md")), None);
        assert_eq!(ScriptKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ScriptKind::TypeScript).unwrap(), "\"typescript\"");
    }

    #[test]
    fn ambiguous_message_lists_candidates() {
        let err = ScriptError::Ambiguous {
            reference: "deploy".into(),
            candidates: vec!["deploy.py".into(), "deploy.js".into()],
        };
        assert_eq!(
            err.to_string(),
            "'deploy' matches 2 scripts: deploy.py, deploy.js. Use more of the path."
        );
    }
}
