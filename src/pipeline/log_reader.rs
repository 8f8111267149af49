use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::LogLineError;
use crate::model::{Diagnostic, EventRecord, Stage};

#[derive(Debug, Default)]
pub struct LogRead {
    pub records: Vec<EventRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub line_count: usize,
}

pub fn read_log(path: &Path) -> Result<LogRead> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let read = read_lines(BufReader::new(file))
        .with_context(|| format!("failed to read {}", path.display()))?;

    info!(
        path = %path.display(),
        lines = read.line_count,
        records = read.records.len(),
        skipped = read.diagnostics.len(),
        "read event log"
    );

    Ok(read)
}

/// Malformed lines become diagnostics; only I/O failures abort.
pub fn read_lines<R: BufRead>(reader: R) -> std::io::Result<LogRead> {
    let mut read = LogRead::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        read.line_count += 1;

        if line.trim().is_empty() {
            debug!(line = line_number, "skipping blank log line");
            continue;
        }

        match parse_line(&line) {
            Ok(record) => read.records.push(record),
            Err(err) => {
                warn!(line = line_number, error = %err, "skipping malformed log line");
                read.diagnostics.push(Diagnostic::new(
                    Stage::LogRead,
                    format!("line {line_number}"),
                    err.to_string(),
                ));
            }
        }
    }

    Ok(read)
}

/// Payload fields are merged over the top-level fields.
pub fn parse_line(line: &str) -> Result<EventRecord, LogLineError> {
    let value: Value = serde_json::from_str(line).map_err(LogLineError::Json)?;
    let Value::Object(mut object) = value else {
        return Err(LogLineError::NotObject);
    };

    let payload = object
        .remove("payload")
        .ok_or(LogLineError::MissingPayload)?;
    let Value::Object(payload) = payload else {
        return Err(LogLineError::PayloadNotObject);
    };
    object.extend(payload);

    serde_json::from_value(Value::Object(object)).map_err(LogLineError::Fields)
}
