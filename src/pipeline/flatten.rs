use crate::model::{CanonicalAttempt, FlatAnswerRow};

pub fn flatten(attempts: &[CanonicalAttempt]) -> Vec<FlatAnswerRow> {
    attempts
        .iter()
        .flat_map(|attempt| {
            attempt
                .answers
                .iter()
                .enumerate()
                .map(move |(question, answer)| FlatAnswerRow {
                    session_id: attempt.session_id.clone(),
                    quiz_name: attempt.quiz_name.clone(),
                    quiz_hash: attempt.quiz_hash.clone(),
                    commit_hash: attempt.commit_hash.clone(),
                    attempt: attempt.attempt,
                    submitted_at: attempt.submitted_at,
                    version: attempt.version,
                    frac_correct: attempt.frac_correct,
                    question,
                    correct: answer.correct,
                    answer: answer.answer.clone(),
                })
        })
        .collect()
}
