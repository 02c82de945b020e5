use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::options::StudioMode;

/// Something that happened in a studio session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudioEvent {
    ActionStarted {
        mode: StudioMode,
        model: String,
    },
    ResultCreated {
        id: String,
        mode: StudioMode,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        citations: Option<usize>,
    },
    ActionFailed {
        mode: StudioMode,
        error: String,
    },
    CredentialReselected {
        model: String,
    },
    EntryDeleted {
        id: String,
    },
    EntryDownloaded {
        id: String,
        path: String,
    },
}

impl StudioEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StudioEvent::ActionStarted { .. } => "action_started",
            StudioEvent::ResultCreated { .. } => "result_created",
            StudioEvent::ActionFailed { .. } => "action_failed",
            StudioEvent::CredentialReselected { .. } => "credential_reselected",
            StudioEvent::EntryDeleted { .. } => "entry_deleted",
            StudioEvent::EntryDownloaded { .. } => "entry_downloaded",
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    #[serde(flatten)]
    event: &'a StudioEvent,
    session_id: &'a str,
    ts: String,
}

/// Append-only session log, one compact JSON object per line tagged with
/// the event `type`, the `session_id` and a `ts`.
#[derive(Debug, Clone)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Appends `event` and returns the line as written.
    pub fn emit(&self, event: &StudioEvent) -> anyhow::Result<Value> {
        let line = serde_json::to_value(EventLine {
            event,
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{EventWriter, StudioEvent};
    use crate::options::StudioMode;

    #[test]
    fn emit_writes_tagged_line_with_session_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let emitted = writer.emit(&StudioEvent::ResultCreated {
            id: "abc".to_string(),
            mode: StudioMode::Edit,
            model: "gemini-2.5-flash-image".to_string(),
            citations: None,
        })?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], json!("result_created"));
        assert_eq!(parsed["session_id"], json!("session-1"));
        assert_eq!(parsed["mode"], json!("EDIT"));
        assert_eq!(parsed["id"], json!("abc"));
        assert!(parsed.get("citations").is_none());
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn emit_appends_and_creates_parent_dirs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        writer.emit(&StudioEvent::EntryDeleted { id: "one".to_string() })?;
        writer.emit(&StudioEvent::CredentialReselected {
            model: "gemini-3-pro-image-preview".to_string(),
        })?;

        let content = fs::read_to_string(&path)?;
        let types: Vec<String> = content
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row["type"].as_str().map(str::to_string))
            .collect();
        assert_eq!(types, vec!["entry_deleted", "credential_reselected"]);
        Ok(())
    }

    #[test]
    fn kind_matches_serialized_tag() -> anyhow::Result<()> {
        let events = [
            StudioEvent::ActionStarted {
                mode: StudioMode::Generate,
                model: "m".to_string(),
            },
            StudioEvent::ActionFailed {
                mode: StudioMode::Generate,
                error: "boom".to_string(),
            },
            StudioEvent::EntryDownloaded {
                id: "x".to_string(),
                path: "/tmp/x.png".to_string(),
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event)?;
            assert_eq!(value["type"], json!(event.kind()));
        }
        Ok(())
    }
}
