use chrono::TimeZone;

use super::*;
use crate::pipeline::testing::FakeOracle;

const QUIZ: &str = "ch04-ownership";

fn chronological_oracle() -> FakeOracle {
    FakeOracle::default()
        .with_quiz("c1", "2022-01-10 09:00:00 -0500", QUIZ, 2)
        .with_quiz("c2", "2022-02-10 09:00:00 -0500", QUIZ, 3)
        .with_quiz("c3", "2022-03-10 09:00:00 -0500", QUIZ, 3)
}

#[test]
fn versions_form_a_permutation_when_resolved_in_commit_order() {
    let mut resolver = SchemaResolver::new(chronological_oracle());

    let mut versions = Vec::new();
    for (hash, commit) in [("h1", "c1"), ("h2", "c2"), ("h3", "c3")] {
        let resolved = resolver
            .resolve(QUIZ, hash, commit)
            .expect("schema should resolve");
        versions.push(resolved.version);
    }

    assert_eq!(versions, vec![0, 1, 2]);
    assert_eq!(resolver.resolved_count(), 3);
}

#[test]
fn repeated_resolution_hits_cache_without_querying_oracle() {
    let mut resolver = SchemaResolver::new(chronological_oracle());

    let first = resolver
        .resolve(QUIZ, "h2", "c2")
        .expect("schema should resolve")
        .clone();
    let second = resolver
        .resolve(QUIZ, "h2", "c2")
        .expect("cached schema should resolve")
        .clone();

    assert_eq!(first, second);
    assert_eq!(first.question_count(), 3);
    assert_eq!(resolver.oracle().timestamp_calls(), 1);
    assert_eq!(resolver.oracle().schema_calls(), 1);
}

#[test]
fn out_of_order_discovery_re_ranks_to_commit_chronology() {
    let mut resolver = SchemaResolver::new(chronological_oracle());

    let first_seen = resolver
        .resolve(QUIZ, "h3", "c3")
        .expect("schema should resolve")
        .version;
    assert_eq!(first_seen, 0);

    resolver
        .resolve(QUIZ, "h1", "c1")
        .expect("schema should resolve");
    resolver
        .resolve(QUIZ, "h2", "c2")
        .expect("schema should resolve");

    let versions: Vec<_> = ["h1", "h2", "h3"]
        .iter()
        .map(|hash| resolver.cached(QUIZ, hash).map(|resolved| resolved.version))
        .collect();
    assert_eq!(versions, vec![Some(0), Some(1), Some(2)]);

    let dates = resolver.dates(QUIZ).expect("dates should be tracked").dates();
    assert_eq!(dates.len(), 3);
    assert!(dates.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn equal_commit_dates_still_receive_distinct_versions() {
    let oracle = FakeOracle::default()
        .with_quiz("c1", "2022-01-10 09:00:00 +0000", QUIZ, 1)
        .with_quiz("c2", "2022-01-10 09:00:00 +0000", QUIZ, 1);
    let mut resolver = SchemaResolver::new(oracle);

    resolver
        .resolve(QUIZ, "h1", "c1")
        .expect("schema should resolve");
    resolver
        .resolve(QUIZ, "h2", "c2")
        .expect("schema should resolve");

    let first = resolver.cached(QUIZ, "h1").map(|resolved| resolved.version);
    let second = resolver.cached(QUIZ, "h2").map(|resolved| resolved.version);
    assert_eq!((first, second), (Some(0), Some(1)));
}

#[test]
fn versions_are_tracked_per_quiz() {
    let oracle = chronological_oracle().with_quiz("c9", "2021-06-01 00:00:00 +0000", "ch05", 1);
    let mut resolver = SchemaResolver::new(oracle);

    resolver
        .resolve(QUIZ, "h3", "c3")
        .expect("schema should resolve");
    let other = resolver
        .resolve("ch05", "h9", "c9")
        .expect("schema should resolve");

    assert_eq!(other.version, 0);
}

#[test]
fn failed_resolution_is_cached_and_reported_once() {
    let mut resolver = SchemaResolver::new(chronological_oracle());

    let first = resolver
        .resolve(QUIZ, "hx", "missing")
        .expect_err("unknown commit should fail");
    assert!(matches!(first, ResolveError::CommitTimestamp { .. }));

    let second = resolver
        .resolve(QUIZ, "hx", "missing")
        .expect_err("failed hash should stay unresolved");
    assert!(matches!(second, ResolveError::Unresolved { .. }));

    assert_eq!(resolver.oracle().timestamp_calls(), 1);
    assert_eq!(resolver.failure_count(), 1);

    let diagnostics = resolver.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].stage, Stage::Resolve);
    assert!(diagnostics[0].subject.contains("missing"));
    assert!(resolver.take_diagnostics().is_empty());
}

#[test]
fn unparseable_timestamp_fails_resolution() {
    let oracle = FakeOracle::default()
        .with_commit("c1", "last tuesday")
        .with_schema("c1", QUIZ, "[[questions]]\ntype = \"Tracing\"\n");
    let mut resolver = SchemaResolver::new(oracle);

    let err = resolver
        .resolve(QUIZ, "h1", "c1")
        .expect_err("timestamp should not parse");
    assert!(matches!(err, ResolveError::TimestampParse { .. }));
    assert_eq!(resolver.oracle().schema_calls(), 0);
}

#[test]
fn broken_schema_leaves_ranks_untouched() {
    let oracle = chronological_oracle()
        .with_commit("c0", "2021-12-01 00:00:00 +0000")
        .with_schema("c0", QUIZ, "questions = [");
    let mut resolver = SchemaResolver::new(oracle);

    let err = resolver
        .resolve(QUIZ, "h0", "c0")
        .expect_err("schema should not parse");
    assert!(matches!(err, ResolveError::SchemaParse { .. }));
    assert!(resolver.dates(QUIZ).is_none());

    let version = resolver
        .resolve(QUIZ, "h1", "c1")
        .expect("schema should resolve")
        .version;
    assert_eq!(version, 0);
}

#[test]
fn missing_schema_file_fails_resolution() {
    let oracle = FakeOracle::default().with_commit("c1", "2022-01-10 09:00:00 -0500");
    let mut resolver = SchemaResolver::new(oracle);

    let err = resolver
        .resolve(QUIZ, "h1", "c1")
        .expect_err("schema should be missing");
    assert!(matches!(err, ResolveError::SchemaSource { .. }));
}

#[test]
fn catalog_exposes_schemas_only() {
    let mut resolver = SchemaResolver::new(chronological_oracle());
    resolver
        .resolve(QUIZ, "h1", "c1")
        .expect("schema should resolve");

    let catalog = serde_json::to_value(resolver.catalog()).expect("catalog should serialize");
    assert_eq!(catalog[QUIZ]["h1"]["version"], 0);
    assert_eq!(
        catalog[QUIZ]["h1"]["schema"]["questions"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );
    assert!(catalog[QUIZ].get("dates").is_none());
}

#[test]
fn parse_commit_timestamp_accepts_git_and_rfc3339_forms() {
    let expected = Utc
        .with_ymd_and_hms(2022, 1, 10, 14, 0, 0)
        .single()
        .expect("valid date");

    assert_eq!(
        parse_commit_timestamp("2022-01-10 09:00:00 -0500"),
        Some(expected)
    );
    assert_eq!(
        parse_commit_timestamp("2022-01-10T09:00:00-05:00\n"),
        Some(expected)
    );
    assert_eq!(parse_commit_timestamp("not a date"), None);
}

#[test]
fn rank_index_places_equal_dates_after_existing_ones() {
    let at = Utc
        .with_ymd_and_hms(2022, 1, 1, 0, 0, 0)
        .single()
        .expect("valid date");
    let earlier = Utc
        .with_ymd_and_hms(2021, 1, 1, 0, 0, 0)
        .single()
        .expect("valid date");

    let mut index = RankIndex::default();
    assert_eq!(index.insert(at, "a"), 0);
    assert_eq!(index.insert(at, "b"), 1);
    assert_eq!(index.insert(earlier, "c"), 0);
    assert_eq!(index.len(), 3);

    let ranked: Vec<_> = index.ranked_from(1).collect();
    assert_eq!(ranked, vec![(1, "a"), (2, "b")]);
}

#[test]
fn parse_schema_requires_questions_array() {
    let err = parse_schema("title = \"no questions\"").expect_err("questions are required");
    assert_eq!(err, "missing questions array");

    let schema = parse_schema("[[questions]]\ntype = \"MultipleChoice\"\n")
        .expect("schema should parse");
    assert_eq!(schema["questions"][0]["type"], "MultipleChoice");
}
