//! End-to-end conversation tests through the engine.

mod common;

use chrono::{Duration, Utc};
use common::TestHarness;
use pretty_assertions::assert_eq;
use tanya::error::TanyaError;
use tanya::models::{EngineAction, Intent, SourceKind};
use tanya::session::{ConversationContext, QuestionKind, Turn};

#[test]
fn test_indonesian_definition_question() {
    let mut harness = TestHarness::new();
    let outcome = harness.say("Apa itu kecerdasan buatan?");
    assert_eq!(outcome.classification.intent, Intent::Definition);
    assert_eq!(outcome.envelope.kind(), SourceKind::Definition);
    assert!(outcome.envelope.confidence > 0.6, "{}", outcome.envelope.confidence);
    assert!(!outcome.envelope.source.attribution.is_empty());
    assert!(outcome.envelope.text.contains("Kecerdasan buatan"));
}

#[test]
fn test_card_number_gets_policy_response() {
    let mut harness = TestHarness::new();
    let outcome = harness.say("my card is 4111111111111111, what is the refund status?");
    assert_eq!(outcome.envelope.kind(), SourceKind::Policy);
    assert_eq!(outcome.envelope.confidence, 1.0);
    assert!(outcome.envelope.requires_review);
    assert!(outcome.clarification.is_none());
}

#[test]
fn test_greeting_then_farewell() {
    let mut harness = TestHarness::new();
    assert_eq!(harness.say("hello").envelope.kind(), SourceKind::Greeting);
    assert_eq!(harness.say("goodbye").envelope.kind(), SourceKind::Farewell);
    assert_eq!(harness.session.state.context.len(), 4);
}

#[test]
fn test_every_answer_is_well_formed() {
    let mut harness = TestHarness::new();
    for message in [
        "hi",
        "what is machine learning",
        "compare invoice and refund",
        "zxqv wplk",
        "thanks!",
        "???",
    ] {
        let envelope = harness.say(message).envelope;
        assert!(!envelope.text.trim().is_empty(), "{}", message);
        assert!((0.0..=1.0).contains(&envelope.confidence), "{}", message);
    }
}

#[test]
fn test_reset_clears_conversation() {
    let mut harness = TestHarness::new();
    harness.say("hello");
    let outcome = harness.say("reset");
    assert_eq!(outcome.envelope.action, Some(EngineAction::ClearContext));
    assert!(harness.session.state.context.is_empty());
}

#[test]
fn test_context_expires_after_thirty_minutes() {
    let mut ctx = ConversationContext::new();
    let now = Utc::now();
    ctx.add_turn(Turn::user("hello", now - Duration::minutes(31)));
    assert!(!ctx.is_valid_at(now));

    let mut fresh = ConversationContext::new();
    fresh.add_turn(Turn::user("hello", now - Duration::minutes(5)));
    assert!(fresh.is_valid_at(now));
}

#[test]
fn test_expired_context_is_replaced_on_next_turn() {
    let mut harness = TestHarness::new();
    let old = Utc::now() - Duration::minutes(45);
    harness
        .session
        .state
        .context
        .add_turn(Turn::user("what is AI", old).with_intent(Intent::Definition));

    harness.say("hello");
    let ctx = &harness.session.state.context;
    assert_eq!(ctx.len(), 2);
    assert_eq!(ctx.turns().next().map(|t| t.content.as_str()), Some("hello"));
}

#[test]
fn test_interleaved_turns_reject_stale_draft() {
    let harness = TestHarness::new();
    let engine = &harness.engine;
    let mut ctx = engine.new_context();
    let mut pending = None;

    let first = engine.prepare_turn();
    let draft = engine.draft_turn(first, "hello", &ctx, None, &harness.settings);
    let second = engine.prepare_turn();
    let newer = engine.draft_turn(second, "thanks", &ctx, None, &harness.settings);

    assert!(matches!(
        engine.commit_turn(draft, &mut ctx, &mut pending),
        Err(TanyaError::StaleTurn { .. })
    ));
    assert!(engine.commit_turn(newer, &mut ctx, &mut pending).is_ok());
    assert_eq!(ctx.len(), 2);
}

#[test]
fn test_training_examples_collected_when_enabled() {
    let mut harness = TestHarness::new();
    harness.settings = harness.settings.clone().with_training(true);
    harness.say("hello");
    harness.say("what is machine learning");
    assert_eq!(harness.session.state.training.len(), 2);
    assert_eq!(harness.session.state.training[0].intent, Intent::Greeting);
}

#[test]
fn test_attribution_scores_follow_the_question() {
    let mut harness = TestHarness::new();
    let score_for = |outcome: &tanya::TurnOutcome| {
        outcome
            .envelope
            .source
            .attribution
            .iter()
            .find(|a| a.id == "AI.machine_learning")
            .map(|a| a.score)
    };

    let loose = harness.say("what is machine learning");
    let close = harness.say("machine learning lets software improve from data");
    let (loose, close) = (score_for(&loose).unwrap(), score_for(&close).unwrap());
    assert!(close > loose, "{} <= {}", close, loose);
}

#[test]
fn test_old_question_does_not_capture_later_replies() {
    let mut harness = TestHarness::new();
    let asked = "Could you rephrase it as a question?";
    let ctx = &mut harness.session.state.context;
    ctx.add_turn(Turn::user("hmm", Utc::now()).with_intent(Intent::Unknown));
    ctx.add_turn(Turn::assistant(asked, Utc::now()));
    ctx.add_unresolved_question(asked, QuestionKind::YesNo, Utc::now());

    harness.say("what is machine learning");

    let reply = harness.say("sure thing");
    assert!(!reply.classification.has_signal("context"));
    assert!(harness.session.state.context.unresolved_questions().count() <= 1);
}
