//! Integration tests for knowledge loading and TF-IDF retrieval.

mod common;

use common::{sample_knowledge, KnowledgeBuilder, TestHarness};
use pretty_assertions::assert_eq;
use tanya::init::load_knowledge;
use tanya::models::KbValue;
use tanya::services::index::{
    build_index, fallback_search, search, search_or_fallback, try_build, IndexHandle, SearchMode,
};

#[test]
fn test_loaded_knowledge_matches_written() {
    let harness = TestHarness::new();
    assert_eq!(harness.engine.knowledge(), &sample_knowledge());
    assert_eq!(harness.engine.knowledge().document_count(), 7);
}

#[test]
fn test_yaml_and_toml_knowledge_files() {
    let dir = tempfile::tempdir().unwrap();

    let yaml = dir.path().join("kb.yaml");
    std::fs::write(&yaml, "faq:\n  - Refunds take five days\nabout: A local assistant\n").unwrap();
    let kb = load_knowledge(&yaml).unwrap();
    assert_eq!(
        kb.get("faq"),
        Some(&KbValue::List(vec!["Refunds take five days".into()]))
    );
    assert_eq!(kb.get("about"), Some(&KbValue::Text("A local assistant".into())));

    let toml = dir.path().join("kb.toml");
    std::fs::write(&toml, "[billing]\ninvoice = \"Sent monthly\"\n").unwrap();
    let kb = load_knowledge(&toml).unwrap();
    assert_eq!(kb.document_count(), 1);
}

#[test]
fn test_malformed_knowledge_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(load_knowledge(&path).is_err());
}

#[test]
fn test_document_ids_follow_section_layout() {
    let index = build_index(&sample_knowledge());
    let mut ids: Vec<&str> = index.documents().iter().map(|d| d.id.as_str()).collect();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            "AI.concept1",
            "AI.machine_learning",
            "about",
            "billing.invoice",
            "billing.refund",
            "faq.0",
            "faq.1",
        ]
    );
}

#[test]
fn test_search_finds_refund_entry() {
    let index = build_index(&sample_knowledge());
    let hits = search(&index, "how long do refunds take", 3);
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "billing.refund");
    assert_eq!(hits[0].meta.key.as_deref(), Some("refund"));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_search_scores_are_bounded() {
    let index = build_index(&sample_knowledge());
    for hit in search(&index, "kecerdasan buatan machine learning data", 10) {
        assert!(hit.score > 0.0 && hit.score <= 1.0 + 1e-9, "{}", hit.score);
    }
}

#[test]
fn test_empty_knowledge_cannot_be_indexed() {
    let kb = KnowledgeBuilder::new().build();
    assert!(try_build(&kb).is_err());
    assert!(build_index(&kb).is_empty());
}

#[test]
fn test_fallback_search_without_index() {
    let kb = sample_knowledge();
    let (hits, mode) = search_or_fallback(None, &kb, "refunds", 3);
    assert_eq!(mode, SearchMode::Fallback);
    assert_eq!(hits[0].id, "billing.refund");
    assert_eq!(fallback_search(&kb, "Refunds are processed", 1)[0].score, 1.0);
}

#[test]
fn test_failed_rebuild_keeps_previous_index() {
    let handle = IndexHandle::from_knowledge(&sample_knowledge());
    assert!(handle.is_ready());
    assert!(handle.rebuild(&KnowledgeBuilder::new().build()).is_err());
    assert_eq!(handle.current().map(|i| i.len()), Some(7));
}
