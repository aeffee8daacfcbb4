//! Catalog: one directory walk, and the `run <ref>` lookup against it

use super::{file_name, ScriptEntry, ScriptError, ScriptKind};
use crate::core::paths::scripts::EXCLUDED_DIRS;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Scripts found under `root` by a single walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    root: PathBuf,
    entries: Vec<ScriptEntry>,
}

/// Walk `root` and collect every recognized script outside excluded directories.
///
/// Root-level scripts come first; within one depth, walk order (sorted by name).
pub fn discover(root: impl AsRef<Path>) -> Result<Catalog, ScriptError> {
    let root = root.as_ref();
    let mut found: Vec<(usize, PathBuf, ScriptKind, u64)> = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(ScriptError::Walk { path: root.to_path_buf(), source: err });
            }
            Err(err) => {
                tracing::debug!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }
        let Some(kind) = ScriptKind::from_path(entry.path()) else { continue };

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_path_buf();
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        found.push((entry.depth(), relative, kind, size));
    }

    found.sort_by_key(|(depth, ..)| *depth);

    let entries = found
        .into_iter()
        .enumerate()
        .map(|(i, (_, path, kind, size))| ScriptEntry {
            index: i + 1,
            name: file_name(&path),
            path,
            kind,
            size,
        })
        .collect();

    Ok(Catalog { root: root.to_path_buf(), entries })
}

fn is_excluded(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || EXCLUDED_DIRS.contains(&&*name)
}

impl Catalog {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 1-based lookup
    pub fn get(&self, index: usize) -> Option<&ScriptEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Resolve a `run` reference: index, then name/trailing path, then a file on disk.
    pub fn resolve(&self, reference: &str) -> Result<ScriptEntry, ScriptError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ScriptError::NotFound(String::new()));
        }

        if let Ok(index) = reference.parse::<usize>() {
            if let Some(entry) = self.get(index) {
                return Ok(entry.clone());
            }
        }

        let wanted = Path::new(reference.strip_prefix("./").unwrap_or(reference));
        if let Some(entry) = self.entries.iter().find(|e| e.path == wanted) {
            return Ok(entry.clone());
        }

        let matches: Vec<&ScriptEntry> = self
            .entries
            .iter()
            .filter(|e| e.path.ends_with(wanted) || e.path.with_extension("").ends_with(wanted))
            .collect();
        match matches.as_slice() {
            [entry] => return Ok((*entry).clone()),
            [] => {}
            many => {
                return Err(ScriptError::Ambiguous {
                    reference: reference.to_string(),
                    candidates: many.iter().map(|e| e.display_path()).collect(),
                });
            }
        }

        let direct = self.root.join(reference);
        if direct.is_file() {
            let mut entry = ScriptEntry::direct(direct)?;
            entry.path = PathBuf::from(reference);
            return Ok(entry);
        }

        Err(ScriptError::NotFound(reference.to_string()))
    }
}
