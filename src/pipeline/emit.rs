use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::pipeline::aggregate::{QuestionKey, QuizKey, SummaryRow};
use crate::pipeline::resolver::SchemaCatalog;
use crate::util::write_json_compact;

pub const QUIZ_SUMMARY_FILE: &str = "quiz-summary.json";
pub const QUESTION_SUMMARY_FILE: &str = "question-summary.json";
pub const SCHEMA_CATALOG_FILE: &str = "quiz-schemas.json";

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub quiz_summary: PathBuf,
    pub question_summary: PathBuf,
    pub schema_catalog: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(output_dir: &Path) -> Self {
        Self {
            quiz_summary: output_dir.join(QUIZ_SUMMARY_FILE),
            question_summary: output_dir.join(QUESTION_SUMMARY_FILE),
            schema_catalog: output_dir.join(SCHEMA_CATALOG_FILE),
        }
    }
}

pub fn emit(
    paths: &ArtifactPaths,
    quiz_rows: &[SummaryRow<QuizKey>],
    question_rows: &[SummaryRow<QuestionKey>],
    catalog: &SchemaCatalog<'_>,
) -> Result<()> {
    write_rows(&paths.quiz_summary, quiz_rows)?;
    write_rows(&paths.question_summary, question_rows)?;

    write_json_compact(&paths.schema_catalog, catalog)?;
    info!(
        path = %paths.schema_catalog.display(),
        quizzes = catalog.len(),
        "wrote schema catalog"
    );

    Ok(())
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_json_compact(path, rows)?;
    info!(path = %path.display(), rows = rows.len(), "wrote summary");
    Ok(())
}
