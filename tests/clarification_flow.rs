//! Integration tests for clarification prompts and reply handling.

mod common;

use common::{sample_knowledge, TestHarness};
use pretty_assertions::assert_eq;
use tanya::models::{ClarificationKind, FallbackTier, SourceKind};
use tanya::services::clarification::generate_fallback;
use tanya::session::ConversationContext;
use tanya::{detect_clarification, parse_clarification_reply, render_clarification};

#[test]
fn test_bare_pronoun_is_ambiguous() {
    let found =
        detect_clarification("itu apa?", &ConversationContext::new(), &sample_knowledge()).unwrap();
    assert_eq!(found.kind, ClarificationKind::AmbiguousEntity);
    assert_eq!(found.data.options.first().map(String::as_str), Some("AI"));
    assert!(found.data.options.len() <= 5);
}

#[test]
fn test_prompt_numbers_options() {
    let found =
        detect_clarification("itu apa?", &ConversationContext::new(), &sample_knowledge()).unwrap();
    let prompt = render_clarification(&found);
    for (i, option) in found.data.options.iter().enumerate() {
        assert!(prompt.contains(&format!("{}. {}", i + 1, option)), "{}", prompt);
    }
}

#[test]
fn test_numbered_reply_selects_option() {
    let found =
        detect_clarification("itu apa?", &ConversationContext::new(), &sample_knowledge()).unwrap();
    let parsed = parse_clarification_reply("1", &found);
    assert!(parsed.is_recognized());
    assert_eq!(parsed.resolve_query(&found).as_deref(), Some("AI apa?"));
}

#[test]
fn test_clear_question_needs_no_clarification() {
    assert!(detect_clarification(
        "How long do refunds take to process?",
        &ConversationContext::new(),
        &sample_knowledge()
    )
    .is_none());
}

#[test]
fn test_engine_asks_then_resolves() {
    let mut harness = TestHarness::new();

    let first = harness.say("itu apa?");
    assert_eq!(first.envelope.kind(), SourceKind::Clarification);
    assert!(first.clarification.is_some());
    assert!(harness.session.state.pending_clarification.is_some());

    let second = harness.say("1");
    assert_ne!(second.envelope.kind(), SourceKind::Clarification);
    assert!(harness.session.state.pending_clarification.is_none());
}

#[test]
fn test_fallback_tiers_by_confidence() {
    assert_eq!(generate_fallback("refund", 0.1).tier, FallbackTier::VeryLow);
    assert_eq!(generate_fallback("refund", 0.8).tier, FallbackTier::High);
    let fallback = generate_fallback("invoice schedule", 0.3);
    assert!(!fallback.text.is_empty());
}
