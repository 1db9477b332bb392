//! Treeherder and Taskcluster records.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Shown when a push has no revision comments at all
pub const NO_COMMENT_PLACEHOLDER: &str = "No commit message available";

static ARTIFACT_ABI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)target\.([^/]+)\.apk$").expect("valid artifact pattern"));

/// Push lookup response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushList {
    #[serde(default)]
    pub results: Vec<PushRecord>,
}

/// One revision submission
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PushRecord {
    pub id: u64,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub push_timestamp: Option<i64>,
    #[serde(default)]
    pub revisions: Vec<RevisionDetail>,
}

/// One commit inside a push
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RevisionDetail {
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub comments: String,
}

impl PushRecord {
    /// Commit messages of the push, in revision order
    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.revisions.iter().map(|r| r.comments.as_str())
    }

    /// The first comment naming a bug, else the first comment, else a placeholder
    pub fn relevant_comment(&self) -> String {
        self.comments()
            .find(|c| c.starts_with("Bug "))
            .or_else(|| self.comments().next())
            .unwrap_or(NO_COMMENT_PLACEHOLDER)
            .to_string()
    }
}

/// Jobs lookup response. Rows are positional arrays.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub results: Vec<Value>,
}

/// One CI job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub app_name: String,
    pub job_name: String,
    pub job_symbol: String,
    pub task_id: String,
}

const APP_NAME_IDX: usize = 3;
const JOB_NAME_IDX: usize = 4;
const JOB_SYMBOL_IDX: usize = 5;
const TASK_ID_IDX: usize = 14;
const MIN_ROW_LEN: usize = 15;

fn cell_text(row: &[Value], idx: usize) -> Option<String> {
    match row.get(idx)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

impl JobRecord {
    /// Decode one positional job row. Every index assumption about the row
    /// layout lives here; rows that are too short or oddly typed yield `None`.
    pub fn from_row(row: &Value) -> Option<Self> {
        let row = row.as_array()?;
        if row.len() < MIN_ROW_LEN {
            return None;
        }

        let task_id = cell_text(row, TASK_ID_IDX)?;
        if task_id.is_empty() {
            return None;
        }

        Some(Self {
            app_name: cell_text(row, APP_NAME_IDX)?,
            job_name: cell_text(row, JOB_NAME_IDX)?,
            job_symbol: cell_text(row, JOB_SYMBOL_IDX)?,
            task_id,
        })
    }

    pub fn is_signed_build(&self) -> bool {
        self.job_symbol.contains('B') && self.job_symbol.contains('s')
    }

    pub fn is_test(&self) -> bool {
        self.job_symbol.contains('t')
    }
}

/// Artifact list response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactList {
    #[serde(default)]
    pub artifacts: Vec<ArtifactRecord>,
}

/// One output file of a task
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    #[serde(rename = "storageType", default)]
    pub storage_type: String,
    pub name: String,
    #[serde(rename = "expires", default)]
    pub expires_at: String,
    #[serde(rename = "contentType", default)]
    pub content_type: String,
}

impl ArtifactRecord {
    pub fn is_apk(&self) -> bool {
        self.name.to_ascii_lowercase().ends_with(".apk")
    }

    /// ABI from a `target.<abi>.apk` name
    pub fn abi(&self) -> Option<String> {
        ARTIFACT_ABI_RE
            .captures(&self.name)
            .map(|caps| caps[1].to_string())
    }

    /// Last path segment of the artifact name
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(symbol: &str, task: &str) -> Value {
        let mut cells: Vec<Value> = (0..15).map(|i| json!(i)).collect();
        cells[3] = json!("fenix");
        cells[4] = json!(format!("build-{}", symbol));
        cells[5] = json!(symbol);
        cells[14] = json!(task);
        Value::Array(cells)
    }

    #[test]
    fn test_decode_row() {
        let job = JobRecord::from_row(&row("Bs", "TASK1")).unwrap();
        assert_eq!(job.app_name, "fenix");
        assert_eq!(job.job_symbol, "Bs");
        assert_eq!(job.task_id, "TASK1");
    }

    #[test]
    fn test_short_row_is_skipped() {
        let short = Value::Array((0..14).map(|i| json!(i)).collect());
        assert!(JobRecord::from_row(&short).is_none());
        assert!(JobRecord::from_row(&json!({"id": 1})).is_none());
        assert!(JobRecord::from_row(&row("Bs", "")).is_none());
    }

    #[test]
    fn test_job_predicates() {
        let signed = JobRecord::from_row(&row("Bs", "a")).unwrap();
        let test = JobRecord::from_row(&row("t", "b")).unwrap();
        let signed_test = JobRecord::from_row(&row("Bst", "c")).unwrap();

        assert!(signed.is_signed_build() && !signed.is_test());
        assert!(!test.is_signed_build() && test.is_test());
        assert!(signed_test.is_signed_build() && signed_test.is_test());
    }

    #[test]
    fn test_relevant_comment() {
        let mut push: PushRecord = serde_json::from_value(json!({
            "id": 42,
            "revision": "abc123",
            "author": "dev@mozilla.com",
            "revisions": [
                {"revision": "r3", "comments": "try: -b o -p android"},
                {"revision": "r2", "comments": "Bug 1900000 - Fix toolbar"},
                {"revision": "r1", "comments": "Bug 1800000 - Older"}
            ]
        }))
        .unwrap();
        assert_eq!(push.relevant_comment(), "Bug 1900000 - Fix toolbar");

        push.revisions.truncate(1);
        assert_eq!(push.relevant_comment(), "try: -b o -p android");

        push.revisions.clear();
        assert_eq!(push.relevant_comment(), NO_COMMENT_PLACEHOLDER);
    }

    #[test]
    fn test_artifact_helpers() {
        let artifact: ArtifactRecord = serde_json::from_value(json!({
            "storageType": "s3",
            "name": "public/build/target.arm64-v8a.apk",
            "expires": "2025-12-01T00:00:00.000Z",
            "contentType": "application/vnd.android.package-archive"
        }))
        .unwrap();

        assert!(artifact.is_apk());
        assert_eq!(artifact.abi().as_deref(), Some("arm64-v8a"));
        assert_eq!(artifact.file_name(), "target.arm64-v8a.apk");
        assert_eq!(artifact.expires_at, "2025-12-01T00:00:00.000Z");

        let log: ArtifactRecord =
            serde_json::from_value(json!({"name": "public/logs/live.log"})).unwrap();
        assert!(!log.is_apk());
        assert_eq!(log.abi(), None);
    }
}
