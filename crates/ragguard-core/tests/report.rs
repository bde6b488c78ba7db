//! Report file and JSON artifact persistence.

use std::collections::BTreeSet;

use ragguard_core::{
    read_results_artifact, render_record, write_report, write_results_artifact, ErrorCode,
    EvalScores, EvaluationStats, Faithfulness, PipelineResult, RagGuardError, ReportWriter,
    ResultsArtifact,
};

fn answered() -> PipelineResult {
    PipelineResult {
        query: "What are crosswalk guards?".to_string(),
        answer: "Crosswalk guards are trained supervisors. (Source: handbook, page 12)".to_string(),
        guardrails_triggered: vec![],
        error_code: None,
        chunks: vec![
            "Crosswalk guards help children cross.".to_string(),
            "Drivers can't pass a guard's stop sign.".to_string(),
        ],
        citations: BTreeSet::from(["DH-Chapter2.pdf (Page 12)".to_string()]),
        eval: EvalScores {
            faithfulness: Faithfulness::Faithful,
            relevance: 0.9,
        },
    }
}

fn off_topic() -> PipelineResult {
    PipelineResult {
        query: "How do I bake a chocolate cake?".to_string(),
        answer: "I'm sorry, I can only answer questions about road safety.".to_string(),
        guardrails_triggered: vec![ErrorCode::OffTopic],
        error_code: Some(ErrorCode::OffTopic),
        chunks: vec![],
        citations: BTreeSet::new(),
        eval: EvalScores::unscored(0.0),
    }
}

#[test]
fn test_report_file_matches_record_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output").join("results.txt");

    write_report(&path, &[answered(), off_topic()]).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    let expected = format!(
        "Query: What are crosswalk guards?\n\
         Guardrails Triggered: None\n\
         Error Code: None\n\
         Retrieved Chunks: ['Crosswalk guards help children cross.', \"Drivers can't pass a guard's stop sign.\"]\n\
         Answer: Crosswalk guards are trained supervisors. (Source: handbook, page 12)\n\
         Faithfulness/Eval Score: 1.0\n\
         {sep}\n\
         Query: How do I bake a chocolate cake?\n\
         Guardrails Triggered: OFF_TOPIC\n\
         Error Code: OFF_TOPIC\n\
         Retrieved Chunks: []\n\
         Answer: I'm sorry, I can only answer questions about road safety.\n\
         Faithfulness/Eval Score: N/A\n\
         {sep}\n",
        sep = "-".repeat(120)
    );
    assert_eq!(text, expected);
}

#[test]
fn test_multiple_codes_are_comma_joined() {
    let mut result = off_topic();
    result.guardrails_triggered = vec![ErrorCode::PiiDetected, ErrorCode::OffTopic];
    assert!(render_record(&result).contains("Guardrails Triggered: PII_DETECTED, OFF_TOPIC\n"));
}

#[test]
fn test_artifact_roundtrip_verifies_digest() {
    let dir = tempfile::tempdir().unwrap();
    let mut stats = EvaluationStats::new();
    stats.record_outcome(None);
    stats.record_outcome(Some(ErrorCode::OffTopic));

    let artifact = ResultsArtifact::new(vec![answered(), off_topic()], stats.snapshot()).unwrap();
    let path = write_results_artifact(&artifact, dir.path()).unwrap();
    assert!(path.ends_with("results.json"));

    let digest = std::fs::read_to_string(dir.path().join("results.digest")).unwrap();
    assert_eq!(digest, artifact.results_digest);
    assert_eq!(digest.len(), 64);

    let back = read_results_artifact(dir.path()).unwrap();
    assert_eq!(back, artifact);
}

#[test]
fn test_tampered_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let artifact =
        ResultsArtifact::new(vec![answered()], EvaluationStats::new().snapshot()).unwrap();
    write_results_artifact(&artifact, dir.path()).unwrap();

    let path = dir.path().join("results.json");
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, text.replace("trained supervisors", "untrained volunteers")).unwrap();

    match read_results_artifact(dir.path()) {
        Err(RagGuardError::DigestMismatch { expected, actual }) => assert_ne!(expected, actual),
        other => panic!("expected DigestMismatch, got {:?}", other),
    }
}

#[test]
fn test_artifact_digest_survives_full_precision_relevance() {
    let dir = tempfile::tempdir().unwrap();
    let mut result = answered();
    // Mean of three retriever scores; needs every digit to round-trip.
    result.eval.relevance = 0.18352928327073859;

    let mut stats = EvaluationStats::new();
    stats.record_outcome(None);
    stats.record_relevance(result.eval.relevance);

    let artifact = ResultsArtifact::new(vec![result], stats.snapshot()).unwrap();
    write_results_artifact(&artifact, dir.path()).unwrap();

    let back = read_results_artifact(dir.path()).unwrap();
    assert_eq!(back.results[0].eval.relevance, 0.18352928327073859);
    assert_eq!(back.results_digest, artifact.results_digest);
}

#[test]
fn test_report_writer_flushes_each_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output").join("results.txt");

    let mut writer = ReportWriter::create(&path).unwrap();
    writer.append(&answered()).unwrap();

    // Readable before the batch is over.
    let partial = std::fs::read_to_string(&path).unwrap();
    assert_eq!(partial, render_record(&answered()));

    writer.append(&off_topic()).unwrap();
    assert_eq!(writer.records(), 2);
    let full = std::fs::read_to_string(writer.path()).unwrap();
    assert_eq!(full, format!("{}{}", render_record(&answered()), render_record(&off_topic())));
}

#[test]
fn test_report_writer_truncates_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.txt");
    std::fs::write(&path, "stale report\n").unwrap();

    let mut writer = ReportWriter::create(&path).unwrap();
    writer.append(&off_topic()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("stale report"));
    assert!(text.starts_with("Query: How do I bake a chocolate cake?\n"));
}
