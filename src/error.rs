use thiserror::Error;

use crate::model::Diagnostic;

#[derive(Error, Debug)]
pub enum LogLineError {
    #[error("invalid json: {0}")]
    Json(#[source] serde_json::Error),

    #[error("line is not a json object")]
    NotObject,

    #[error("missing payload field")]
    MissingPayload,

    #[error("payload is not a json object")]
    PayloadNotObject,

    #[error("invalid event fields: {0}")]
    Fields(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("`{command}` timed out after {timeout_ms}ms")]
    TimedOut { command: String, timeout_ms: u64 },

    #[error("`{command}` produced non-utf8 output")]
    Encoding { command: String },

    #[error("rejected {kind} argument: {value}")]
    InvalidArgument { kind: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("commit {commit} for quiz {quiz} could not be dated: {source}")]
    CommitTimestamp {
        quiz: String,
        commit: String,
        #[source]
        source: OracleError,
    },

    #[error("commit {commit} for quiz {quiz} has unparseable timestamp {raw:?}")]
    TimestampParse {
        quiz: String,
        commit: String,
        raw: String,
    },

    #[error("schema for quiz {quiz} at commit {commit} could not be retrieved: {source}")]
    SchemaSource {
        quiz: String,
        commit: String,
        #[source]
        source: OracleError,
    },

    #[error("schema for quiz {quiz} at commit {commit} is invalid: {reason}")]
    SchemaParse {
        quiz: String,
        commit: String,
        reason: String,
    },

    #[error("schema for quiz {quiz} with hash {hash} is unresolved")]
    Unresolved { quiz: String, hash: String },
}

/// A fatal unresolved schema, with the diagnostics gathered before the abort.
#[derive(Error, Debug)]
#[error("reconciliation aborted on an unresolved schema")]
pub struct ReconcileAbort {
    #[source]
    pub source: ResolveError,
    pub diagnostics: Vec<Diagnostic>,
}
