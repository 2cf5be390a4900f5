//! Purpose: Shared handle-info and paste-report JSON serializers for the CLI.
//! Exports: `handle_json`, `children_json`, `paste_report_json`.
//! Role: Keep handle metadata envelope shape consistent across commands.
//! Invariants: Stable key names for v0 payloads; `sha256` only when requested.
//! Invariants: Dead handles serialize as `null`, never as zero-value records.

use fhandle::api::{FileHandle, PasteReport};
use serde_json::{Map, Value, json};

pub(crate) fn handle_json(handle: &FileHandle, sha256: Option<String>) -> Value {
    let Some(info) = handle.info() else {
        return Value::Null;
    };
    let mut value = serde_json::to_value(&info).unwrap_or(Value::Null);
    if let (Some(digest), Value::Object(map)) = (sha256, &mut value) {
        map.insert("sha256".to_string(), json!(digest));
    }
    value
}

pub(crate) fn children_json(children: &[FileHandle]) -> Value {
    Value::Array(
        children
            .iter()
            .map(|child| handle_json(child, None))
            .collect(),
    )
}

pub(crate) fn paste_report_json(report: &PasteReport) -> Value {
    let mut map = Map::new();
    map.insert("source".to_string(), json!(report.source));
    map.insert("destination".to_string(), json!(report.destination));
    map.insert("copied".to_string(), json!(report.copied()));
    map.insert("failed".to_string(), json!(report.failed()));
    map.insert(
        "entries".to_string(),
        serde_json::to_value(&report.entries).unwrap_or_else(|_| json!([])),
    );
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::{handle_json, paste_report_json};
    use fhandle::api::{ErrorKind, FileHandle, PasteEntry, PasteOutcome, PasteReport};
    use serde_json::Value;

    #[test]
    fn handle_json_reports_cached_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("app.log");
        std::fs::write(&file, vec![b'x'; 100]).expect("write");
        let mut handle = FileHandle::open(file.to_str().expect("utf8")).expect("open");

        let value = handle_json(&handle, Some("abc".to_string()));
        assert_eq!(value["name"], "app.log");
        assert_eq!(value["prefix"], "app");
        assert_eq!(value["suffix"], ".log");
        assert_eq!(value["kind"], "file");
        assert_eq!(value["size"], 100);
        assert_eq!(value["sha256"], "abc");

        handle.invalidate();
        assert_eq!(handle_json(&handle, None), Value::Null);
    }

    #[test]
    fn paste_report_json_tags_outcomes() {
        let report = PasteReport {
            source: "src".to_string(),
            destination: "dst".to_string(),
            entries: vec![
                PasteEntry {
                    relative_path: "a.txt".to_string(),
                    outcome: PasteOutcome::Copied { bytes: 3 },
                },
                PasteEntry {
                    relative_path: "b.txt".to_string(),
                    outcome: PasteOutcome::Failed {
                        kind: ErrorKind::Io,
                        message: "Io".to_string(),
                    },
                },
            ],
        };
        let value = paste_report_json(&report);
        assert_eq!(value["copied"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["entries"][0]["outcome"]["status"], "copied");
        assert_eq!(value["entries"][0]["outcome"]["bytes"], 3);
        assert_eq!(value["entries"][1]["outcome"]["status"], "failed");
        assert_eq!(value["entries"][1]["outcome"]["kind"], "Io");
    }
}
