use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::GeneratedResult;

pub const HISTORY_SCHEMA_VERSION: u64 = 1;
pub const HISTORY_FILE_NAME: &str = "vision-studio-history.json";

#[derive(Serialize)]
struct HistoryPayloadRef<'a> {
    schema_version: u64,
    entries: &'a [GeneratedResult],
}

#[derive(Deserialize)]
struct HistoryPayload {
    schema_version: u64,
    #[serde(default)]
    entries: Vec<GeneratedResult>,
}

/// Most-recent-first list of results, mirrored to a single JSON file.
///
/// Every mutation rewrites the whole file before returning, so the in-memory
/// list and the file agree whenever a call completes. A failed write rolls
/// the mutation back. A file that could not be parsed at load time is moved
/// to a `.bak` sibling before the first write replaces it.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<GeneratedResult>,
    unparsed: bool,
}

impl HistoryStore {
    /// Reads the history file. A missing or unreadable file yields an empty
    /// history; this never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (entries, unparsed) = match read_entries(&path) {
            Some(entries) => (entries, false),
            None => (Vec::new(), true),
        };
        Self {
            path,
            entries,
            unparsed,
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::load(dir.join(HISTORY_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[GeneratedResult] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&GeneratedResult> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prepend(&mut self, entry: GeneratedResult) -> anyhow::Result<()> {
        if self.get(&entry.id).is_some() {
            bail!("history entry {} already exists", entry.id);
        }
        self.entries.insert(0, entry);
        if let Err(err) = self.persist() {
            self.entries.remove(0);
            return Err(err);
        }
        Ok(())
    }

    /// Removes the entry with `id`. Returns whether anything was removed; an
    /// unknown id leaves the list and the file untouched.
    pub fn remove(&mut self, id: &str) -> anyhow::Result<bool> {
        let Some(idx) = self.entries.iter().position(|entry| entry.id == id) else {
            return Ok(false);
        };
        let removed = self.entries.remove(idx);
        if let Err(err) = self.persist() {
            self.entries.insert(idx, removed);
            return Err(err);
        }
        Ok(true)
    }

    /// Where the file found at load time was moved, if it could not be
    /// parsed and has since been replaced.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".bak");
        self.path.with_file_name(name)
    }

    pub fn persist(&mut self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        if self.unparsed {
            self.set_aside_unparsed()?;
        }
        let payload = HistoryPayloadRef {
            schema_version: HISTORY_SCHEMA_VERSION,
            entries: &self.entries,
        };
        let raw = serde_json::to_string_pretty(&payload)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, raw)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        std::fs::rename(&staging, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn set_aside_unparsed(&mut self) -> anyhow::Result<()> {
        if self.path.exists() {
            let backup = self.backup_path();
            if backup.exists() {
                bail!(
                    "refusing to replace unreadable history {}: {} already exists",
                    self.path.display(),
                    backup.display()
                );
            }
            std::fs::rename(&self.path, &backup).with_context(|| {
                format!("failed to move {} to {}", self.path.display(), backup.display())
            })?;
            tracing::warn!(backup = %backup.display(), "unreadable history moved aside");
        }
        self.unparsed = false;
        Ok(())
    }
}

/// `None` when the file exists but cannot be used.
fn read_entries(path: &Path) -> Option<Vec<GeneratedResult>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Some(Vec::new()),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "history file unreadable; starting empty");
            return None;
        }
    };
    match parse_entries(&raw) {
        Ok(entries) => Some(entries),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "history file malformed; starting empty");
            None
        }
    }
}

fn parse_entries(raw: &str) -> anyhow::Result<Vec<GeneratedResult>> {
    let value: Value = serde_json::from_str(raw).context("history is not valid JSON")?;
    if value.is_array() {
        // Unversioned layout: a bare list of entries.
        return serde_json::from_value(value).context("legacy history entries are malformed");
    }
    let payload: HistoryPayload =
        serde_json::from_value(value).context("history payload is malformed")?;
    if payload.schema_version > HISTORY_SCHEMA_VERSION {
        bail!(
            "history schema version {} is newer than supported version {}",
            payload.schema_version,
            HISTORY_SCHEMA_VERSION
        );
    }
    Ok(payload.entries)
}
