use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ResolveError;
use crate::model::{Diagnostic, ResolvedSchema, Stage};
use crate::pipeline::oracle::VersionOracle;

/// Quiz name -> content hash -> resolved schema.
pub type SchemaCatalog<'a> = BTreeMap<&'a str, &'a BTreeMap<String, ResolvedSchema>>;

/// Resolved hashes of one quiz ordered by commit date; position is the version.
#[derive(Debug, Default, Clone)]
pub struct RankIndex {
    entries: Vec<(DateTime<Utc>, String)>,
}

impl RankIndex {
    /// Equal dates keep discovery order: the new entry lands after them.
    pub fn insert(&mut self, at: DateTime<Utc>, content_hash: &str) -> usize {
        let rank = self.entries.partition_point(|(existing, _)| *existing <= at);
        self.entries.insert(rank, (at, content_hash.to_string()));
        rank
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Hashes from `start` onwards with their current rank.
    pub fn ranked_from(&self, start: usize) -> impl Iterator<Item = (usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .skip(start)
            .map(|(rank, (_, hash))| (rank, hash.as_str()))
    }

    #[cfg(test)]
    pub fn dates(&self) -> Vec<DateTime<Utc>> {
        self.entries.iter().map(|(at, _)| *at).collect()
    }
}

#[derive(Debug, Default)]
struct QuizVersions {
    schemas: BTreeMap<String, ResolvedSchema>,
    dates: RankIndex,
}

/// Per-run memo of (quiz, content hash) -> version and schema.
///
/// The oracle is consulted at most once per pair, whether resolution
/// succeeds or fails. A version is the rank of the hash's commit date among
/// every date resolved so far for its quiz; discovering an earlier-dated hash
/// shifts the versions of all later-dated ones. Versions are therefore only
/// final once resolution for the run is complete, and are not stable ids
/// across runs.
pub struct SchemaResolver<O> {
    oracle: O,
    quizzes: BTreeMap<String, QuizVersions>,
    failed: BTreeSet<(String, String)>,
    diagnostics: Vec<Diagnostic>,
}

impl<O: VersionOracle> SchemaResolver<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            quizzes: BTreeMap::new(),
            failed: BTreeSet::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn resolve(
        &mut self,
        quiz_name: &str,
        content_hash: &str,
        commit_hash: &str,
    ) -> Result<&ResolvedSchema, ResolveError> {
        let key = (quiz_name.to_string(), content_hash.to_string());
        if self.failed.contains(&key) {
            return Err(unresolved(quiz_name, content_hash));
        }

        if self.cached(quiz_name, content_hash).is_none() {
            if let Err(err) = self.resolve_uncached(quiz_name, content_hash, commit_hash) {
                warn!(
                    quiz = quiz_name,
                    hash = content_hash,
                    commit = commit_hash,
                    error = %err,
                    "schema resolution failed"
                );
                self.diagnostics.push(Diagnostic::new(
                    Stage::Resolve,
                    format!("quiz {quiz_name} commit {commit_hash}"),
                    err.to_string(),
                ));
                self.failed.insert(key);
                return Err(err);
            }
        }

        self.cached(quiz_name, content_hash)
            .ok_or_else(|| unresolved(quiz_name, content_hash))
    }

    pub fn cached(&self, quiz_name: &str, content_hash: &str) -> Option<&ResolvedSchema> {
        self.quizzes
            .get(quiz_name)
            .and_then(|quiz| quiz.schemas.get(content_hash))
    }

    /// Resolved schemas without the date bookkeeping.
    pub fn catalog(&self) -> SchemaCatalog<'_> {
        self.quizzes
            .iter()
            .map(|(name, quiz)| (name.as_str(), &quiz.schemas))
            .collect()
    }

    #[cfg(test)]
    pub fn dates(&self, quiz_name: &str) -> Option<&RankIndex> {
        self.quizzes.get(quiz_name).map(|quiz| &quiz.dates)
    }

    pub fn resolved_count(&self) -> usize {
        self.quizzes.values().map(|quiz| quiz.schemas.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    #[cfg(test)]
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    fn resolve_uncached(
        &mut self,
        quiz_name: &str,
        content_hash: &str,
        commit_hash: &str,
    ) -> Result<(), ResolveError> {
        let raw = self.oracle.commit_timestamp(commit_hash).map_err(|source| {
            ResolveError::CommitTimestamp {
                quiz: quiz_name.to_string(),
                commit: commit_hash.to_string(),
                source,
            }
        })?;
        let committed_at =
            parse_commit_timestamp(&raw).ok_or_else(|| ResolveError::TimestampParse {
                quiz: quiz_name.to_string(),
                commit: commit_hash.to_string(),
                raw: raw.clone(),
            })?;

        // Fetched before the date is ranked so a broken schema leaves ranks untouched.
        let source = self
            .oracle
            .schema_source(commit_hash, quiz_name)
            .map_err(|source| ResolveError::SchemaSource {
                quiz: quiz_name.to_string(),
                commit: commit_hash.to_string(),
                source,
            })?;
        let schema = parse_schema(&source).map_err(|reason| ResolveError::SchemaParse {
            quiz: quiz_name.to_string(),
            commit: commit_hash.to_string(),
            reason,
        })?;

        let quiz = self.quizzes.entry(quiz_name.to_string()).or_default();
        let version = quiz.dates.insert(committed_at, content_hash);
        let resolved = ResolvedSchema { version, schema };
        info!(
            quiz = quiz_name,
            hash = content_hash,
            commit = commit_hash,
            version,
            questions = resolved.question_count(),
            "schema version assigned"
        );
        quiz.schemas.insert(content_hash.to_string(), resolved);

        let later_dates = quiz.dates.len() - 1 - version;
        if later_dates > 0 {
            warn!(
                quiz = quiz_name,
                hash = content_hash,
                version,
                later_dates,
                "earlier-dated schema discovered; re-ranking later versions"
            );
            for (rank, hash) in quiz.dates.ranked_from(version + 1) {
                if let Some(shifted) = quiz.schemas.get_mut(hash) {
                    shifted.version = rank;
                }
            }
        }
        Ok(())
    }
}

fn unresolved(quiz_name: &str, content_hash: &str) -> ResolveError {
    ResolveError::Unresolved {
        quiz: quiz_name.to_string(),
        hash: content_hash.to_string(),
    }
}

/// Accepts `git show --format=%ai` output and RFC 3339.
pub fn parse_commit_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

pub fn parse_schema(source: &str) -> Result<Value, String> {
    let document: toml::Table = toml::from_str(source).map_err(|err| err.to_string())?;
    let schema = serde_json::to_value(&document).map_err(|err| err.to_string())?;

    if !schema.get("questions").is_some_and(Value::is_array) {
        return Err("missing questions array".to_string());
    }

    Ok(schema)
}

#[cfg(test)]
mod tests;
