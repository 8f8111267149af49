use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{ReconcileAbort, ResolveError};
use crate::model::{Answer, CanonicalAttempt, Diagnostic, EventRecord, Stage};
use crate::pipeline::oracle::VersionOracle;
use crate::pipeline::resolver::SchemaResolver;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub example_quiz: String,
    /// Abort at the first record, in log order, whose schema cannot be resolved.
    pub fail_on_unresolved: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exclusions {
    pub unresolved: usize,
    pub invalid_timestamp: usize,
    pub retry: usize,
    pub example_quiz: usize,
    pub incomplete: usize,
    pub superseded: usize,
}

#[derive(Debug, Default)]
pub struct Reconciled {
    pub attempts: Vec<CanonicalAttempt>,
    pub exclusions: Exclusions,
    pub diagnostics: Vec<Diagnostic>,
}

struct Candidate {
    record: EventRecord,
    version: usize,
    submitted_at: DateTime<Utc>,
}

type GroupKey = (String, String, String);

/// One canonical attempt per (session, quiz, hash), ordered by that key.
///
/// Every record is resolved before any version is read, since resolving an
/// earlier-dated hash re-ranks the versions of its quiz. Only complete first
/// attempts outside the example quiz compete; the latest submission wins and
/// equal timestamps keep the earliest log line.
pub fn reconcile<O: VersionOracle>(
    records: Vec<EventRecord>,
    resolver: &mut SchemaResolver<O>,
    options: &ReconcileOptions,
) -> Result<Reconciled, ReconcileAbort> {
    let resolutions: Vec<Result<(), ResolveError>> = records
        .iter()
        .map(|record| {
            resolver
                .resolve(&record.quiz_name, &record.quiz_hash, &record.commit_hash)
                .map(|_| ())
        })
        .collect();

    let mut reconciled = Reconciled::default();
    let mut candidates = Vec::with_capacity(records.len());

    for (record, resolution) in records.into_iter().zip(resolutions) {
        let resolved = resolution.and_then(|()| {
            resolver
                .cached(&record.quiz_name, &record.quiz_hash)
                .map(|resolved| (resolved.version, resolved.question_count()))
                .ok_or_else(|| ResolveError::Unresolved {
                    quiz: record.quiz_name.clone(),
                    hash: record.quiz_hash.clone(),
                })
        });
        let (version, question_count) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                reconciled
                    .diagnostics
                    .push(record_diagnostic(&record, err.to_string()));
                if options.fail_on_unresolved {
                    return Err(ReconcileAbort {
                        source: err,
                        diagnostics: reconciled.diagnostics,
                    });
                }
                warn!(
                    session = %record.session_id,
                    quiz = %record.quiz_name,
                    hash = %record.quiz_hash,
                    commit = %record.commit_hash,
                    "skipping record with unresolved schema"
                );
                reconciled.exclusions.unresolved += 1;
                continue;
            }
        };

        let Some(submitted_at) = DateTime::from_timestamp_millis(record.timestamp) else {
            warn!(
                session = %record.session_id,
                timestamp = record.timestamp,
                "skipping record with out-of-range timestamp"
            );
            reconciled.exclusions.invalid_timestamp += 1;
            reconciled.diagnostics.push(record_diagnostic(
                &record,
                format!("timestamp out of range: {}", record.timestamp),
            ));
            continue;
        };

        if record.attempt != 0 {
            reconciled.exclusions.retry += 1;
            continue;
        }

        if record.quiz_name == options.example_quiz {
            reconciled.exclusions.example_quiz += 1;
            continue;
        }

        if record.answers.is_empty() || record.answers.len() != question_count {
            reconciled.exclusions.incomplete += 1;
            continue;
        }

        candidates.push(Candidate {
            record,
            version,
            submitted_at,
        });
    }

    let mut groups: BTreeMap<GroupKey, Candidate> = BTreeMap::new();
    for candidate in candidates {
        let key = (
            candidate.record.session_id.clone(),
            candidate.record.quiz_name.clone(),
            candidate.record.quiz_hash.clone(),
        );
        match groups.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                reconciled.exclusions.superseded += 1;
                if candidate.submitted_at > slot.get().submitted_at {
                    slot.insert(candidate);
                }
            }
        }
    }

    reconciled.attempts = groups.into_values().map(into_canonical).collect();

    let exclusions = reconciled.exclusions;
    info!(
        attempts = reconciled.attempts.len(),
        unresolved = exclusions.unresolved,
        invalid_timestamp = exclusions.invalid_timestamp,
        retry = exclusions.retry,
        example_quiz = exclusions.example_quiz,
        incomplete = exclusions.incomplete,
        superseded = exclusions.superseded,
        "reconciled attempts"
    );

    Ok(reconciled)
}

pub fn frac_correct(answers: &[Answer]) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    let correct = answers.iter().filter(|answer| answer.correct).count();
    correct as f64 / answers.len() as f64
}

fn into_canonical(candidate: Candidate) -> CanonicalAttempt {
    let Candidate {
        record,
        version,
        submitted_at,
    } = candidate;
    let frac_correct = frac_correct(&record.answers);

    CanonicalAttempt {
        session_id: record.session_id,
        quiz_name: record.quiz_name,
        quiz_hash: record.quiz_hash,
        commit_hash: record.commit_hash,
        attempt: record.attempt,
        submitted_at,
        version,
        answers: record.answers,
        frac_correct,
    }
}

fn record_diagnostic(record: &EventRecord, reason: String) -> Diagnostic {
    Diagnostic::new(
        Stage::Reconcile,
        format!(
            "session {} quiz {} hash {}",
            record.session_id, record.quiz_name, record.quiz_hash
        ),
        reason,
    )
}
