use std::cell::Cell;
use std::collections::HashMap;

use serde_json::json;

use crate::error::OracleError;
use crate::model::{Answer, EventRecord};
use crate::pipeline::oracle::VersionOracle;

/// In-memory history with call counters.
#[derive(Default)]
pub struct FakeOracle {
    commits: HashMap<String, String>,
    schemas: HashMap<(String, String), String>,
    timestamp_calls: Cell<usize>,
    schema_calls: Cell<usize>,
}

impl FakeOracle {
    pub fn with_commit(mut self, commit_hash: &str, timestamp: &str) -> Self {
        self.commits
            .insert(commit_hash.to_string(), timestamp.to_string());
        self
    }

    pub fn with_schema(mut self, commit_hash: &str, quiz_name: &str, source: &str) -> Self {
        self.schemas.insert(
            (commit_hash.to_string(), quiz_name.to_string()),
            source.to_string(),
        );
        self
    }

    /// Registers a commit and a well-formed schema with `question_count` questions.
    pub fn with_quiz(
        self,
        commit_hash: &str,
        timestamp: &str,
        quiz_name: &str,
        question_count: usize,
    ) -> Self {
        self.with_commit(commit_hash, timestamp).with_schema(
            commit_hash,
            quiz_name,
            &quiz_source(question_count),
        )
    }

    pub fn timestamp_calls(&self) -> usize {
        self.timestamp_calls.get()
    }

    pub fn schema_calls(&self) -> usize {
        self.schema_calls.get()
    }
}

impl VersionOracle for FakeOracle {
    fn commit_timestamp(&self, commit_hash: &str) -> Result<String, OracleError> {
        self.timestamp_calls.set(self.timestamp_calls.get() + 1);
        self.commits
            .get(commit_hash)
            .cloned()
            .ok_or_else(|| OracleError::Failed {
                command: format!("git show -s --format=%ai {commit_hash}"),
                stderr: format!("fatal: bad object {commit_hash}"),
            })
    }

    fn schema_source(&self, commit_hash: &str, quiz_name: &str) -> Result<String, OracleError> {
        self.schema_calls.set(self.schema_calls.get() + 1);
        self.schemas
            .get(&(commit_hash.to_string(), quiz_name.to_string()))
            .cloned()
            .ok_or_else(|| OracleError::Failed {
                command: format!("git show {commit_hash}:quizzes/{quiz_name}.toml"),
                stderr: "fatal: path does not exist".to_string(),
            })
    }
}

pub fn quiz_source(question_count: usize) -> String {
    let mut source = String::new();
    for index in 0..question_count {
        source.push_str(&format!(
            "[[questions]]\ntype = \"ShortAnswer\"\nprompt.prompt = \"Question {index}\"\nanswer.answer = \"a{index}\"\n\n"
        ));
    }
    source
}

pub fn event(
    session_id: &str,
    quiz_name: &str,
    quiz_hash: &str,
    commit_hash: &str,
    attempt: i64,
    timestamp: i64,
    correct: &[bool],
) -> EventRecord {
    EventRecord {
        session_id: session_id.to_string(),
        quiz_name: quiz_name.to_string(),
        quiz_hash: quiz_hash.to_string(),
        commit_hash: commit_hash.to_string(),
        attempt,
        timestamp,
        answers: correct
            .iter()
            .enumerate()
            .map(|(index, correct)| Answer {
                correct: *correct,
                answer: json!(format!("answer-{index}")),
            })
            .collect(),
    }
}
