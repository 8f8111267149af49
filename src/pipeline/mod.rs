pub mod aggregate;
pub mod emit;
pub mod estimators;
pub mod flatten;
pub mod log_reader;
pub mod oracle;
pub mod reconcile;
pub mod resolver;

#[cfg(test)]
mod testing;

use crate::error::ReconcileAbort;
use crate::model::{Diagnostic, SummarizeCounts};
use crate::pipeline::aggregate::{QuestionKey, QuizKey, SummaryRow};
use crate::pipeline::estimators::{CiEstimator, NormalApprox};
use crate::pipeline::log_reader::LogRead;
use crate::pipeline::oracle::VersionOracle;
use crate::pipeline::reconcile::{ReconcileOptions, reconcile};
use crate::pipeline::resolver::SchemaResolver;

#[derive(Debug)]
pub struct PipelineOutput {
    pub quiz_rows: Vec<SummaryRow<QuizKey>>,
    pub question_rows: Vec<SummaryRow<QuestionKey>>,
    pub counts: SummarizeCounts,
    pub diagnostics: Vec<Diagnostic>,
}

/// Reconciles, flattens and aggregates one log snapshot.
///
/// Quiz rows use the normal approximation over attempt scores;
/// `question_estimator` bounds the per-question proportion.
pub fn run_pipeline<O: VersionOracle>(
    log: LogRead,
    resolver: &mut SchemaResolver<O>,
    options: &ReconcileOptions,
    question_estimator: &dyn CiEstimator,
) -> Result<PipelineOutput, ReconcileAbort> {
    let LogRead {
        records,
        diagnostics: mut log_diagnostics,
        line_count,
    } = log;
    let records_parsed = records.len();
    let lines_skipped = log_diagnostics.len();

    let reconciled = reconcile(records, resolver, options)?;
    let rows = flatten::flatten(&reconciled.attempts);

    let quiz_rows = aggregate::quiz_summary(&reconciled.attempts, &NormalApprox);
    let question_rows = aggregate::question_summary(&rows, question_estimator);

    let counts = SummarizeCounts {
        log_lines: line_count,
        records_parsed,
        lines_skipped,
        schemas_resolved: resolver.resolved_count(),
        schema_failures: resolver.failure_count(),
        records_unresolved: reconciled.exclusions.unresolved,
        attempts_reconciled: reconciled.attempts.len(),
        answers_flattened: rows.len(),
        quiz_summary_rows: quiz_rows.len(),
        question_summary_rows: question_rows.len(),
    };

    let mut diagnostics = Vec::new();
    diagnostics.append(&mut log_diagnostics);
    diagnostics.append(&mut resolver.take_diagnostics());
    diagnostics.extend(reconciled.diagnostics);

    Ok(PipelineOutput {
        quiz_rows,
        question_rows,
        counts,
        diagnostics,
    })
}
