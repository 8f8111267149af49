use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::error::OracleError;

const GIT_PROGRAM: &str = "git";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Read-only view of the source history that dates and recovers quiz schemas.
pub trait VersionOracle {
    /// Author timestamp of `commit_hash`, as printed by the history tool.
    fn commit_timestamp(&self, commit_hash: &str) -> Result<String, OracleError>;

    /// Raw schema text for `quiz_name` as of `commit_hash`.
    fn schema_source(&self, commit_hash: &str, quiz_name: &str) -> Result<String, OracleError>;
}

pub struct GitOracle {
    repo_root: PathBuf,
    quiz_dir: String,
    timeout: Duration,
    commit_pattern: Regex,
    quiz_pattern: Regex,
}

impl GitOracle {
    pub fn new(repo_root: &Path, quiz_dir: &str, timeout_ms: u64) -> Result<Self> {
        let commit_pattern =
            Regex::new(r"^[0-9a-fA-F]{4,64}$").context("failed to compile commit hash regex")?;
        let quiz_pattern = Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]*$")
            .context("failed to compile quiz name regex")?;

        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            quiz_dir: quiz_dir.trim_matches('/').to_string(),
            timeout: Duration::from_millis(timeout_ms),
            commit_pattern,
            quiz_pattern,
        })
    }

    fn checked_commit<'a>(&self, commit_hash: &'a str) -> Result<&'a str, OracleError> {
        if self.commit_pattern.is_match(commit_hash) {
            Ok(commit_hash)
        } else {
            Err(OracleError::InvalidArgument {
                kind: "commit",
                value: commit_hash.to_string(),
            })
        }
    }

    fn schema_path(&self, quiz_name: &str) -> Result<String, OracleError> {
        if !self.quiz_pattern.is_match(quiz_name) {
            return Err(OracleError::InvalidArgument {
                kind: "quiz name",
                value: quiz_name.to_string(),
            });
        }

        if self.quiz_dir.is_empty() {
            Ok(format!("{quiz_name}.toml"))
        } else {
            Ok(format!("{}/{quiz_name}.toml", self.quiz_dir))
        }
    }
}

impl VersionOracle for GitOracle {
    fn commit_timestamp(&self, commit_hash: &str) -> Result<String, OracleError> {
        let commit = self.checked_commit(commit_hash)?;
        let output = run_with_timeout(
            GIT_PROGRAM,
            &["show", "-s", "--format=%ai", commit],
            &self.repo_root,
            self.timeout,
        )?;
        Ok(output.trim().to_string())
    }

    fn schema_source(&self, commit_hash: &str, quiz_name: &str) -> Result<String, OracleError> {
        let commit = self.checked_commit(commit_hash)?;
        let object = format!("{commit}:{}", self.schema_path(quiz_name)?);
        run_with_timeout(
            GIT_PROGRAM,
            &["show", object.as_str()],
            &self.repo_root,
            self.timeout,
        )
    }
}

/// Saturates instead of truncating durations beyond `u64::MAX` milliseconds.
pub fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// Runs `program` to completion, killing it once `timeout` elapses.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    working_dir: &Path,
    timeout: Duration,
) -> Result<String, OracleError> {
    let command = format!("{} {}", program, args.join(" "));
    debug!(command = %command, dir = %working_dir.display(), "running oracle command");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| OracleError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    // An unrepresentable deadline means the command is never killed.
    let deadline = Instant::now().checked_add(timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if deadline.is_some_and(|deadline| Instant::now() >= deadline) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OracleError::TimedOut {
                    command,
                    timeout_ms: timeout_millis(timeout),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return Err(OracleError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(OracleError::Failed {
            command,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    String::from_utf8(stdout).map_err(|_| OracleError::Encoding { command })
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> GitOracle {
        GitOracle::new(Path::new("."), "quizzes/", 1_000).expect("oracle should build")
    }

    #[test]
    fn schema_path_joins_quiz_dir_and_name() {
        let path = oracle()
            .schema_path("ch04-01-ownership")
            .expect("quiz name should be accepted");
        assert_eq!(path, "quizzes/ch04-01-ownership.toml");
    }

    #[test]
    fn rejects_option_like_commit_before_running_git() {
        let err = oracle()
            .commit_timestamp("--output=/tmp/x")
            .expect_err("option-like commit must be rejected");
        assert!(matches!(
            err,
            OracleError::InvalidArgument { kind: "commit", .. }
        ));
    }

    #[test]
    fn rejects_path_traversal_in_quiz_name() {
        let err = oracle()
            .schema_source("abcdef12", "../secrets")
            .expect_err("traversal must be rejected");
        assert!(matches!(
            err,
            OracleError::InvalidArgument {
                kind: "quiz name",
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn run_with_timeout_kills_slow_commands() {
        let err = run_with_timeout("sleep", &["5"], Path::new("."), Duration::from_millis(50))
            .expect_err("sleep should time out");
        assert!(matches!(err, OracleError::TimedOut { timeout_ms: 50, .. }));
    }

    #[test]
    fn timeout_millis_saturates_oversized_durations() {
        assert_eq!(timeout_millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(timeout_millis(Duration::MAX), u64::MAX);
        assert_eq!(
            timeout_millis(Duration::from_secs(u64::MAX / 1_000 + 1)),
            u64::MAX
        );
    }

    #[cfg(unix)]
    #[test]
    fn run_with_timeout_accepts_unbounded_timeout() {
        let output = run_with_timeout("echo", &["ok"], Path::new("."), Duration::MAX)
            .expect("echo should succeed without a reachable deadline");
        assert_eq!(output.trim(), "ok");
    }

    #[cfg(unix)]
    #[test]
    fn run_with_timeout_reports_failed_exit_status() {
        let err = run_with_timeout("false", &[], Path::new("."), Duration::from_secs(5))
            .expect_err("false should fail");
        assert!(matches!(err, OracleError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn run_with_timeout_captures_stdout() {
        let output = run_with_timeout("echo", &["hello"], Path::new("."), Duration::from_secs(5))
            .expect("echo should succeed");
        assert_eq!(output.trim(), "hello");
    }
}
