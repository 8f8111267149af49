use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::model::{CanonicalAttempt, FlatAnswerRow};
use crate::pipeline::estimators::{CiEstimator, mean};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow<K> {
    #[serde(flatten)]
    pub key: K,
    pub mean: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    #[serde(rename = "N")]
    pub n: usize,
    #[serde(flatten)]
    pub extra: BTreeMap<&'static str, Vec<Value>>,
}

/// A per-row value reported for the rows of a group that scored zero.
pub struct ExtraField<R> {
    pub name: &'static str,
    pub value: fn(&R) -> Value,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizKey {
    pub quiz_name: String,
    pub version: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionKey {
    pub quiz_name: String,
    pub version: usize,
    pub question: usize,
}

/// Groups `rows` by `group_by` and reports mean, interval and size per group,
/// ordered by key.
///
/// Extra fields are collected only from rows whose metric is zero, i.e. the
/// wrong answers of a boolean metric.
pub fn summarize<R, K, G, M>(
    rows: &[R],
    group_by: G,
    metric: M,
    estimator: &dyn CiEstimator,
    extras: &[ExtraField<R>],
) -> Vec<SummaryRow<K>>
where
    K: Ord,
    G: Fn(&R) -> K,
    M: Fn(&R) -> f64,
{
    let mut groups: BTreeMap<K, Vec<&R>> = BTreeMap::new();
    for row in rows {
        groups.entry(group_by(row)).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let values: Vec<f64> = members.iter().map(|&row| metric(row)).collect();
            let (lower, upper) = match estimator.interval(&values) {
                Some((lower, upper)) => (Some(lower), Some(upper)),
                None => (None, None),
            };

            let extra = extras
                .iter()
                .map(|field| {
                    let collected = members
                        .iter()
                        .zip(&values)
                        .filter(|(_, value)| **value == 0.0)
                        .map(|(row, _)| (field.value)(*row))
                        .collect();
                    (field.name, collected)
                })
                .collect();

            SummaryRow {
                key,
                mean: mean(&values).unwrap_or_default(),
                lower,
                upper,
                n: members.len(),
                extra,
            }
        })
        .collect()
}

pub fn quiz_summary(
    attempts: &[CanonicalAttempt],
    estimator: &dyn CiEstimator,
) -> Vec<SummaryRow<QuizKey>> {
    summarize(
        attempts,
        |attempt| QuizKey {
            quiz_name: attempt.quiz_name.clone(),
            version: attempt.version,
        },
        |attempt| attempt.frac_correct,
        estimator,
        &[],
    )
}

pub fn question_summary(
    rows: &[FlatAnswerRow],
    estimator: &dyn CiEstimator,
) -> Vec<SummaryRow<QuestionKey>> {
    let extras: [ExtraField<FlatAnswerRow>; 1] = [ExtraField {
        name: "answer",
        value: |row: &FlatAnswerRow| row.answer.clone(),
    }];

    summarize(
        rows,
        |row| QuestionKey {
            quiz_name: row.quiz_name.clone(),
            version: row.version,
            question: row.question,
        },
        |row| if row.correct { 1.0 } else { 0.0 },
        estimator,
        &extras,
    )
}
