use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One log line after its `payload` has been merged into the top-level object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub session_id: String,
    pub quiz_name: String,
    pub quiz_hash: String,
    pub commit_hash: String,
    pub attempt: i64,
    pub timestamp: i64,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub correct: bool,
    #[serde(default)]
    pub answer: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSchema {
    pub version: usize,
    pub schema: Value,
}

impl ResolvedSchema {
    pub fn question_count(&self) -> usize {
        self.schema
            .get("questions")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// The authoritative completed first attempt for a (session, quiz, hash) triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAttempt {
    pub session_id: String,
    pub quiz_name: String,
    pub quiz_hash: String,
    pub commit_hash: String,
    pub attempt: i64,
    pub submitted_at: DateTime<Utc>,
    pub version: usize,
    pub answers: Vec<Answer>,
    pub frac_correct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatAnswerRow {
    pub session_id: String,
    pub quiz_name: String,
    pub quiz_hash: String,
    pub commit_hash: String,
    pub attempt: i64,
    pub submitted_at: DateTime<Utc>,
    pub version: usize,
    pub frac_correct: f64,
    pub question: usize,
    pub correct: bool,
    pub answer: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LogRead,
    Resolve,
    Reconcile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub subject: String,
    pub reason: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage,
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHash {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizePaths {
    pub log_path: String,
    pub repo_root: String,
    pub quiz_dir: String,
    pub output_dir: String,
    pub quiz_summary_path: String,
    pub question_summary_path: String,
    pub schema_catalog_path: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SummarizeCounts {
    pub log_lines: usize,
    pub records_parsed: usize,
    pub lines_skipped: usize,
    pub schemas_resolved: usize,
    pub schema_failures: usize,
    pub records_unresolved: usize,
    pub attempts_reconciled: usize,
    pub answers_flattened: usize,
    pub quiz_summary_rows: usize,
    pub question_summary_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub failure_reason: Option<String>,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub question_interval: String,
    pub paths: SummarizePaths,
    pub counts: SummarizeCounts,
    pub source_hashes: Vec<SourceHash>,
    pub diagnostics: Vec<Diagnostic>,
}
