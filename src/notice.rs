//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `paste_failure_notices`.
//! Role: Shared contract helper for CLI diagnostics such as skipped copies.
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use serde_json::{Map, Value, json};

use crate::api::{PasteOutcome, PasteReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub path: String,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    inner.insert("path".to_string(), json!(notice.path));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

/// One `copy_failed` notice per file the paste walk had to skip.
pub fn paste_failure_notices(report: &PasteReport, cmd: &str, time: &str) -> Vec<Notice> {
    report
        .failures()
        .filter_map(|entry| match &entry.outcome {
            PasteOutcome::Failed { kind, message } => {
                let mut details = Map::new();
                details.insert("error_kind".to_string(), json!(format!("{kind:?}")));
                details.insert("destination".to_string(), json!(report.destination));
                Some(Notice {
                    kind: "copy_failed".to_string(),
                    time: time.to_string(),
                    cmd: cmd.to_string(),
                    path: entry.relative_path.clone(),
                    message: message.clone(),
                    details,
                })
            }
            PasteOutcome::Copied { .. } => None,
        })
        .collect()
}
