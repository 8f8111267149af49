use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "quiz-telemetry",
    version,
    about = "Batch summaries of quiz-attempt telemetry logs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Summarize(SummarizeArgs),
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[arg(long, default_value = "answers.log")]
    pub log_path: PathBuf,

    /// Repository whose history holds the quiz schemas.
    #[arg(long, default_value = ".")]
    pub repo_root: PathBuf,

    /// Schema directory, relative to the repository root.
    #[arg(long, default_value = "quizzes")]
    pub quiz_dir: String,

    #[arg(long, default_value = "data")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value = "example-quiz")]
    pub example_quiz: String,

    #[arg(long, value_enum, default_value_t = QuestionInterval::Normal)]
    pub question_interval: QuestionInterval,

    #[arg(long, default_value_t = 10_000)]
    pub oracle_timeout_ms: u64,

    #[arg(long, default_value_t = false)]
    pub fail_on_unresolved: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum QuestionInterval {
    Normal,
    Wilson,
}

impl QuestionInterval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Wilson => "wilson",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long, default_value = "answers.log")]
    pub log_path: PathBuf,
}
