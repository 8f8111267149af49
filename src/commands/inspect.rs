use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::InspectArgs;
use crate::model::EventRecord;
use crate::pipeline::log_reader::read_log;

#[derive(Debug, Default, PartialEq, Eq)]
struct QuizStats {
    records: usize,
    first_attempts: usize,
    hashes: BTreeSet<String>,
}

pub fn run(args: InspectArgs) -> Result<()> {
    info!(log = %args.log_path.display(), "inspect requested");

    let log = read_log(&args.log_path)?;
    if !log.diagnostics.is_empty() {
        warn!(skipped = log.diagnostics.len(), "log contains malformed lines");
    }

    let sessions: BTreeSet<&str> = log
        .records
        .iter()
        .map(|record| record.session_id.as_str())
        .collect();
    let commits: BTreeSet<&str> = log
        .records
        .iter()
        .map(|record| record.commit_hash.as_str())
        .collect();

    info!(
        lines = log.line_count,
        records = log.records.len(),
        skipped = log.diagnostics.len(),
        sessions = sessions.len(),
        commits = commits.len(),
        "log summary"
    );

    for (quiz_name, stats) in quiz_stats(&log.records) {
        info!(
            quiz = %quiz_name,
            records = stats.records,
            first_attempts = stats.first_attempts,
            hashes = stats.hashes.len(),
            "quiz summary"
        );
    }

    Ok(())
}

fn quiz_stats(records: &[EventRecord]) -> BTreeMap<String, QuizStats> {
    let mut stats: BTreeMap<String, QuizStats> = BTreeMap::new();
    for record in records {
        let entry = stats.entry(record.quiz_name.clone()).or_default();
        entry.records += 1;
        if record.attempt == 0 {
            entry.first_attempts += 1;
        }
        entry.hashes.insert(record.quiz_hash.clone());
    }
    stats
}
