use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{QuestionInterval, SummarizeArgs};
use crate::model::{
    Diagnostic, SourceHash, SummarizeCounts, SummarizePaths, SummarizeRunManifest,
};
use crate::pipeline::emit::{ArtifactPaths, emit};
use crate::pipeline::estimators::{BinomialNormal, BinomialWilson, CiEstimator};
use crate::pipeline::log_reader::read_log;
use crate::pipeline::oracle::GitOracle;
use crate::pipeline::reconcile::ReconcileOptions;
use crate::pipeline::resolver::SchemaResolver;
use crate::pipeline::run_pipeline;
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

const MANIFEST_FILE: &str = "summary-run.json";

pub fn run(args: SummarizeArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("summarize-{}", utc_compact_string(started_ts));

    let artifacts = ArtifactPaths::in_dir(&args.output_dir);
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| args.output_dir.join(MANIFEST_FILE));

    info!(
        run_id = %run_id,
        log = %args.log_path.display(),
        repo_root = %args.repo_root.display(),
        "starting summarize"
    );

    let log = read_log(&args.log_path)?;
    let source_hashes = vec![SourceHash {
        path: args.log_path.display().to_string(),
        sha256: sha256_file(&args.log_path)?,
    }];
    let log_lines = log.line_count;
    let records_parsed = log.records.len();
    let log_diagnostics = log.diagnostics.clone();

    let oracle = GitOracle::new(&args.repo_root, &args.quiz_dir, args.oracle_timeout_ms)?;
    let mut resolver = SchemaResolver::new(oracle);
    let options = ReconcileOptions {
        example_quiz: args.example_quiz.clone(),
        fail_on_unresolved: args.fail_on_unresolved,
    };
    let question_estimator = question_estimator(args.question_interval);

    let mut manifest = SummarizeRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "running".to_string(),
        failure_reason: None,
        started_at,
        updated_at: now_utc_string(),
        command: render_summarize_command(&args),
        question_interval: question_estimator.name().to_string(),
        paths: summarize_paths(&args, &artifacts),
        counts: SummarizeCounts {
            log_lines,
            records_parsed,
            lines_skipped: log_diagnostics.len(),
            ..SummarizeCounts::default()
        },
        source_hashes,
        diagnostics: Vec::new(),
    };

    let output = match run_pipeline(
        log,
        &mut resolver,
        &options,
        question_estimator.as_ref(),
    ) {
        Ok(output) => output,
        Err(err) => {
            manifest.status = "failed".to_string();
            manifest.failure_reason = Some(err.source.to_string());
            manifest.updated_at = now_utc_string();
            manifest.diagnostics = log_diagnostics;
            manifest.diagnostics.append(&mut resolver.take_diagnostics());
            manifest.diagnostics.extend(err.diagnostics.iter().cloned());
            write_manifest(&manifest_path, &manifest)?;
            return Err(err).context("unresolved schema aborted the run");
        }
    };

    emit(
        &artifacts,
        &output.quiz_rows,
        &output.question_rows,
        &resolver.catalog(),
    )?;

    report_diagnostics(&output.diagnostics);

    manifest.status = "completed".to_string();
    manifest.updated_at = now_utc_string();
    manifest.counts = output.counts;
    manifest.diagnostics = output.diagnostics;
    write_manifest(&manifest_path, &manifest)?;

    info!(
        run_id = %run_id,
        attempts = manifest.counts.attempts_reconciled,
        quiz_rows = manifest.counts.quiz_summary_rows,
        question_rows = manifest.counts.question_summary_rows,
        diagnostics = manifest.diagnostics.len(),
        "summarize completed"
    );

    Ok(())
}

fn question_estimator(interval: QuestionInterval) -> Box<dyn CiEstimator> {
    match interval {
        QuestionInterval::Normal => Box::new(BinomialNormal),
        QuestionInterval::Wilson => Box::new(BinomialWilson),
    }
}

fn write_manifest(path: &Path, manifest: &SummarizeRunManifest) -> Result<()> {
    write_json_pretty(path, manifest)
        .with_context(|| format!("failed to write run manifest {}", path.display()))?;
    info!(path = %path.display(), status = %manifest.status, "wrote run manifest");
    Ok(())
}

fn report_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    warn!(
        count = diagnostics.len(),
        "run completed with skipped lines or unresolved schemas; see run manifest"
    );
}

fn summarize_paths(args: &SummarizeArgs, artifacts: &ArtifactPaths) -> SummarizePaths {
    SummarizePaths {
        log_path: display(&args.log_path),
        repo_root: display(&args.repo_root),
        quiz_dir: args.quiz_dir.clone(),
        output_dir: display(&args.output_dir),
        quiz_summary_path: display(&artifacts.quiz_summary),
        question_summary_path: display(&artifacts.question_summary),
        schema_catalog_path: display(&artifacts.schema_catalog),
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn render_summarize_command(args: &SummarizeArgs) -> String {
    let mut command = vec![
        "quiz-telemetry".to_string(),
        "summarize".to_string(),
        "--log-path".to_string(),
        display(&args.log_path),
        "--repo-root".to_string(),
        display(&args.repo_root),
        "--quiz-dir".to_string(),
        args.quiz_dir.clone(),
        "--output-dir".to_string(),
        display(&args.output_dir),
        "--example-quiz".to_string(),
        args.example_quiz.clone(),
        "--question-interval".to_string(),
        args.question_interval.as_str().to_string(),
        "--oracle-timeout-ms".to_string(),
        args.oracle_timeout_ms.to_string(),
    ];

    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(display(path));
    }
    if args.fail_on_unresolved {
        command.push("--fail-on-unresolved".to_string());
    }

    command.join(" ")
}
