//! Ambiguity detection, clarification prompts, reply parsing, and
//! confidence-tiered fallback text.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::models::clarification::{
    ClarificationAnswer, ClarificationData, ClarificationKind, ClarificationSituation, Fallback,
    FallbackTier, ParsedClarification,
};
use crate::models::intent::ClassificationResult;
use crate::models::knowledge::KnowledgeBase;
use crate::session::context::{starts_with_any, ConversationContext, ANAPHORIC_PRONOUNS};
use crate::utils::text::{keywords, tokenize};

const AMBIGUOUS_ENTITY_CONFIDENCE: f64 = 0.85;
const INCOMPLETE_QUERY_CONFIDENCE: f64 = 0.7;
const MULTIPLE_INTERPRETATIONS_CONFIDENCE: f64 = 0.65;
const CONTEXT_DEPENDENCY_CONFIDENCE: f64 = 0.6;
const MISSING_SPECIFICATION_CONFIDENCE: f64 = 0.7;
const UNCLEAR_INTENT_CONFIDENCE: f64 = 0.5;

const SELECTION_CONFIDENCE: f64 = 0.95;
const FIELD_CONFIDENCE: f64 = 0.7;
const ELABORATION_CONFIDENCE: f64 = 0.65;

/// Messages shorter than this (in characters) with a question word are
/// treated as incomplete.
const INCOMPLETE_QUERY_CHARS: usize = 15;
/// Replies longer than this are accepted as free-form elaborations.
const ELABORATION_MIN_CHARS: usize = 50;
const MAX_OPTIONS: usize = 5;

const QUESTION_WORDS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "apa", "apakah", "mengapa", "kenapa",
    "bagaimana", "gimana", "kapan", "dimana", "siapa", "mana", "berapa",
];

/// Words that can point at more than one thing.
const AMBIGUOUS_TERMS: &[&str] = &[
    "it", "this", "that", "they", "them", "those", "these", "itu", "ini", "dia", "mereka",
    "tersebut", "one", "thing", "stuff", "hal",
];

const COMPARISON_CRITERIA: &[&str] = &["price", "performance", "ease of use", "reliability"];

const MISSING_FIELDS: &[&str] = &["file", "data", "format"];

const UNCLEAR_OPTIONS: &[&str] = &[
    "Ask about a topic in the knowledge base",
    "Do a calculation",
    "Get step-by-step help",
    "Something else",
];

static COMPARATIVE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(better|best|worse|worst|cheaper|cheapest|faster|fastest|slower|easier|easiest|more\s+\w+|less\s+\w+|lebih|paling|terbaik|termurah|tercepat)\b",
    )
    .ok()
});

static ACTION_VERB_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(please\s+|tolong\s+)?(upload|analy[sz]e|process|convert|open|read|summari[sz]e|export|import|parse|load|unggah|analisis|analisa|proses|ubah|konversi|buka|baca|ringkas|ekspor|impor)\b",
    )
    .ok()
});

static NAMED_TARGET_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\b[\w-]+\.(csv|json|xlsx?|pdf|txt|docx?|md|ya?ml|toml|xml)\b|"[^"]+"|/[\w./-]+)"#)
        .ok()
});

static LEADING_NUMBER_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:option|opsi|nomor|no\.?|number|#)?\s*(\d+)\b").ok()
});

// ═════════════════════════════════════════════════════════════════════════════
// Detection
// ═════════════════════════════════════════════════════════════════════════════

type Heuristic = fn(&str, &ConversationContext, &KnowledgeBase) -> Option<ClarificationSituation>;

const HEURISTICS: &[Heuristic] = &[
    ambiguous_entity,
    incomplete_query,
    multiple_interpretations,
    context_dependency,
    missing_specification,
];

fn situation(
    kind: ClarificationKind,
    message: &str,
    trigger: Option<String>,
    options: Vec<String>,
    missing_fields: Vec<String>,
    confidence: f64,
) -> ClarificationSituation {
    ClarificationSituation {
        kind,
        data: ClarificationData {
            original: message.trim().to_string(),
            trigger,
            options,
            missing_fields,
        },
        confidence,
    }
}

/// Whether the context offers something a pronoun could refer to.
fn has_antecedent(context: &ConversationContext) -> bool {
    context.is_valid()
        && !context.is_empty()
        && (!context.entities().is_empty() || !context.topics().is_empty())
}

fn knowledge_options(kb: &KnowledgeBase) -> Vec<String> {
    kb.section_names()
        .take(MAX_OPTIONS)
        .map(String::from)
        .collect()
}

fn ambiguous_entity(
    message: &str,
    context: &ConversationContext,
    kb: &KnowledgeBase,
) -> Option<ClarificationSituation> {
    let pronoun = starts_with_any(message, ANAPHORIC_PRONOUNS)?;
    if has_antecedent(context) {
        return None;
    }
    let mut options = knowledge_options(kb);
    if options.is_empty() {
        options = UNCLEAR_OPTIONS[..2].iter().map(|s| s.to_string()).collect();
    }
    Some(situation(
        ClarificationKind::AmbiguousEntity,
        message,
        Some(pronoun.to_string()),
        options,
        Vec::new(),
        AMBIGUOUS_ENTITY_CONFIDENCE,
    ))
}

fn incomplete_query(
    message: &str,
    _context: &ConversationContext,
    _kb: &KnowledgeBase,
) -> Option<ClarificationSituation> {
    let trimmed = message.trim();
    if trimmed.chars().count() >= INCOMPLETE_QUERY_CHARS {
        return None;
    }
    let question_word = tokenize(trimmed)
        .into_iter()
        .find(|t| QUESTION_WORDS.contains(&t.as_str()))?;
    Some(situation(
        ClarificationKind::IncompleteQuery,
        message,
        Some(question_word),
        Vec::new(),
        vec!["topic".to_string()],
        INCOMPLETE_QUERY_CONFIDENCE,
    ))
}

/// Concrete things a vague word could stand for: recent topics first, then
/// knowledge base sections.
fn candidate_readings(context: &ConversationContext, kb: &KnowledgeBase) -> Vec<String> {
    let recent = context
        .is_valid()
        .then(|| context.topics().iter().rev().cloned())
        .into_iter()
        .flatten();
    let mut readings: Vec<String> = Vec::new();
    for candidate in recent.chain(kb.section_names().map(String::from)) {
        if !readings.iter().any(|r| r.eq_ignore_ascii_case(&candidate)) {
            readings.push(candidate);
        }
        if readings.len() == MAX_OPTIONS {
            break;
        }
    }
    readings
}

fn multiple_interpretations(
    message: &str,
    context: &ConversationContext,
    kb: &KnowledgeBase,
) -> Option<ClarificationSituation> {
    let mut found: Vec<String> = Vec::new();
    for token in tokenize(message) {
        if AMBIGUOUS_TERMS.contains(&token.as_str()) && !found.contains(&token) {
            found.push(token);
        }
    }
    if found.len() < 2 {
        return None;
    }
    let options = candidate_readings(context, kb);
    if options.is_empty() {
        return None;
    }
    Some(situation(
        ClarificationKind::MultipleInterpretations,
        message,
        found.first().cloned(),
        options,
        Vec::new(),
        MULTIPLE_INTERPRETATIONS_CONFIDENCE,
    ))
}

fn context_dependency(
    message: &str,
    context: &ConversationContext,
    _kb: &KnowledgeBase,
) -> Option<ClarificationSituation> {
    let comparative = COMPARATIVE_RE.as_ref()?.find(message)?;
    if context.is_valid() && !context.topics().is_empty() {
        return None;
    }
    Some(situation(
        ClarificationKind::ContextDependency,
        message,
        Some(comparative.as_str().to_lowercase()),
        COMPARISON_CRITERIA.iter().map(|s| s.to_string()).collect(),
        Vec::new(),
        CONTEXT_DEPENDENCY_CONFIDENCE,
    ))
}

fn missing_specification(
    message: &str,
    _context: &ConversationContext,
    _kb: &KnowledgeBase,
) -> Option<ClarificationSituation> {
    let caps = ACTION_VERB_RE.as_ref()?.captures(message)?;
    if NAMED_TARGET_RE.as_ref().is_some_and(|re| re.is_match(message)) {
        return None;
    }
    let verb = caps.get(2).map(|m| m.as_str().to_lowercase());
    Some(situation(
        ClarificationKind::MissingSpecification,
        message,
        verb,
        Vec::new(),
        MISSING_FIELDS.iter().map(|s| s.to_string()).collect(),
        MISSING_SPECIFICATION_CONFIDENCE,
    ))
}

/// Run every heuristic and return the most confident situation. Earlier
/// heuristics win ties.
pub fn detect(
    message: &str,
    context: &ConversationContext,
    kb: &KnowledgeBase,
) -> Option<ClarificationSituation> {
    let mut best: Option<ClarificationSituation> = None;
    for heuristic in HEURISTICS {
        if let Some(found) = heuristic(message, context, kb) {
            let better = match &best {
                Some(current) => {
                    found.confidence.partial_cmp(&current.confidence) == Some(Ordering::Greater)
                }
                None => true,
            };
            if better {
                best = Some(found);
            }
        }
    }
    if let Some(found) = &best {
        debug!(kind = %found.kind, confidence = found.confidence, "clarification detected");
    }
    best
}

/// UNCLEAR_INTENT when the classifier stayed below the unknown threshold.
pub fn detect_unclear_intent(
    message: &str,
    classification: &ClassificationResult,
    unknown_threshold: f64,
) -> Option<ClarificationSituation> {
    if classification.confidence >= unknown_threshold {
        return None;
    }
    Some(situation(
        ClarificationKind::UnclearIntent,
        message,
        None,
        UNCLEAR_OPTIONS.iter().map(|s| s.to_string()).collect(),
        Vec::new(),
        UNCLEAR_INTENT_CONFIDENCE,
    ))
}

// ═════════════════════════════════════════════════════════════════════════════
// Prompts
// ═════════════════════════════════════════════════════════════════════════════

/// Render a numbered clarification prompt.
pub fn generate_prompt(situation: &ClarificationSituation) -> String {
    let data = &situation.data;
    let trigger = data.trigger.as_deref().unwrap_or("that");
    let header = match situation.kind {
        ClarificationKind::AmbiguousEntity => {
            format!("I'm not sure what \"{}\" refers to. Which topic do you mean?", trigger)
        }
        ClarificationKind::IncompleteQuery => {
            "Your question seems a bit short. Could you tell me which topic you're asking about?"
                .to_string()
        }
        ClarificationKind::MultipleInterpretations => format!(
            "Your message could be read in more than one way. What does \"{}\" refer to?",
            trigger
        ),
        ClarificationKind::ContextDependency => format!(
            "\"{}\" depends on what matters to you. Which criterion should I compare by?",
            trigger
        ),
        ClarificationKind::MissingSpecification => format!(
            "I can {} that, but I need to know what to work with.",
            trigger
        ),
        ClarificationKind::UnclearIntent => {
            "I'm not sure what you'd like me to do. Are you trying to:".to_string()
        }
    };

    let mut lines = vec![header];
    for (i, option) in data.options.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, option));
    }
    if !data.missing_fields.is_empty() {
        lines.push(format!(
            "Please tell me the {}.",
            join_human(&data.missing_fields)
        ));
    }
    if !data.options.is_empty() {
        lines.push("Reply with a number, or describe what you mean.".to_string());
    }
    lines.join("\n")
}

fn join_human(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Reply parsing
// ═════════════════════════════════════════════════════════════════════════════

/// Whole-word, case-insensitive match for a field name.
fn field_pattern(field: &str) -> Option<Regex> {
    match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(field))) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Failed to compile field pattern for '{}': {}", field, e);
            None
        }
    }
}

/// Interpret the user's reply to a clarification prompt.
pub fn parse_user_clarification(
    reply: &str,
    previous: &ClarificationSituation,
) -> ParsedClarification {
    let trimmed = reply.trim();
    let options = &previous.data.options;

    if let Some(caps) = LEADING_NUMBER_RE.as_ref().and_then(|re| re.captures(trimmed)) {
        let number = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok());
        if let Some(n) = number.filter(|n| *n >= 1 && *n <= options.len()) {
            return ParsedClarification {
                answer: ClarificationAnswer::Selection {
                    index: n - 1,
                    option: options[n - 1].clone(),
                },
                confidence: SELECTION_CONFIDENCE,
            };
        }
    }

    for field in &previous.data.missing_fields {
        let Some(mention) = field_pattern(field).and_then(|re| re.find(trimmed)) else {
            continue;
        };
        let rest = trimmed[mention.end()..]
            .trim_start_matches([':', '=', ' '])
            .trim();
        let value = if rest.is_empty() { trimmed } else { rest };
        return ParsedClarification {
            answer: ClarificationAnswer::ProvidedField {
                field: field.clone(),
                value: value.to_string(),
            },
            confidence: FIELD_CONFIDENCE,
        };
    }

    if trimmed.chars().count() > ELABORATION_MIN_CHARS {
        return ParsedClarification {
            answer: ClarificationAnswer::Elaboration {
                text: trimmed.to_string(),
            },
            confidence: ELABORATION_CONFIDENCE,
        };
    }

    ParsedClarification::unrecognized()
}

// ═════════════════════════════════════════════════════════════════════════════
// Fallbacks
// ═════════════════════════════════════════════════════════════════════════════

/// Guidance for a message no handler could answer, bucketed by confidence:
/// `< 0.3`, `< 0.6`, `< 0.8`, and the rest.
pub fn generate_fallback(message: &str, confidence: f64) -> Fallback {
    let topic = keywords(message, 4).into_iter().next();
    let about = topic
        .as_deref()
        .map(|t| format!(" about \"{}\"", t))
        .unwrap_or_default();
    let tier = FallbackTier::for_confidence(confidence);

    let (text, suggestion) = match tier {
        FallbackTier::VeryLow => (
            "I'm not sure I understood that. Could you rephrase it as a question?".to_string(),
            "Try a complete question, for example \"What is ...?\" or \"How do I ...?\""
                .to_string(),
        ),
        FallbackTier::Low => (
            format!(
                "I think I understand part of your question{}, but I need a little more detail.",
                about
            ),
            "Name the specific topic, product or step you mean.".to_string(),
        ),
        FallbackTier::Medium => (
            format!(
                "I understand what you're asking{}, but I couldn't find a confident answer.",
                about
            ),
            "Try different keywords, or ask about a related topic.".to_string(),
        ),
        FallbackTier::High => (
            format!(
                "I understood your question{}, but I don't have that information yet.",
                about
            ),
            "Ask about another topic, or contact support for this one.".to_string(),
        ),
    };

    Fallback {
        tier,
        text,
        suggestion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::intent::Intent;
    use crate::models::knowledge::KbValue;
    use crate::session::context::Turn;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new()
            .with_section(
                "AI",
                KbValue::Map(BTreeMap::from([(
                    "concept1".to_string(),
                    "Kecerdasan buatan adalah simulasi kecerdasan manusia".to_string(),
                )])),
            )
            .with_section("billing", KbValue::Text("Invoices are sent monthly".into()))
    }

    fn empty() -> ConversationContext {
        ConversationContext::new()
    }

    #[test]
    fn test_bare_pronoun_is_ambiguous_entity() {
        let found = detect("itu apa?", &empty(), &kb()).unwrap();
        assert_eq!(found.kind, ClarificationKind::AmbiguousEntity);
        assert_eq!(found.data.trigger.as_deref(), Some("itu"));
        assert_eq!(found.data.options, vec!["AI", "billing"]);
    }

    #[test]
    fn test_pronoun_with_antecedent_is_not_ambiguous() {
        let mut ctx = empty();
        ctx.add_turn(
            Turn::user("what is billing", Utc::now())
                .with_intent(Intent::Definition)
                .with_topics(vec!["billing".into()]),
        );
        let found = detect("it is confusing to me honestly", &ctx, &kb());
        assert!(found.map_or(true, |s| s.kind != ClarificationKind::AmbiguousEntity));
    }

    #[test]
    fn test_short_question_is_incomplete() {
        let found = detect("how come?", &empty(), &kb()).unwrap();
        assert_eq!(found.kind, ClarificationKind::IncompleteQuery);
        assert_eq!(found.data.missing_fields, vec!["topic"]);
    }

    #[test]
    fn test_comparative_without_context() {
        let found =
            detect("Which plan is the best for a large team?", &empty(), &kb())
                .unwrap();
        assert_eq!(found.kind, ClarificationKind::ContextDependency);
        assert_eq!(found.data.options.len(), COMPARISON_CRITERIA.len());
    }

    #[test]
    fn test_action_without_target() {
        let found = detect("Analyze my sales numbers please", &empty(), &kb()).unwrap();
        assert_eq!(found.kind, ClarificationKind::MissingSpecification);
        assert!(detect("Analyze report.csv for trends", &empty(), &kb()).is_none());
    }

    #[test]
    fn test_multiple_interpretations() {
        let found = detect(
            "Should I connect that one with the other service later today",
            &empty(),
            &kb(),
        )
        .unwrap();
        assert_eq!(found.kind, ClarificationKind::MultipleInterpretations);
    }

    #[test]
    fn test_plain_question_needs_no_clarification() {
        assert!(detect(
            "Apa itu kecerdasan buatan dalam bisnis modern?",
            &empty(),
            &kb()
        )
        .is_none());
    }

    #[test]
    fn test_prompt_numbers_options() {
        let found = detect("itu apa?", &empty(), &kb()).unwrap();
        let prompt = generate_prompt(&found);
        assert!(prompt.contains("1. AI"));
        assert!(prompt.contains("2. billing"));
    }

    #[test]
    fn test_parse_numbered_selection() {
        let found = detect("itu apa?", &empty(), &kb()).unwrap();
        let parsed = parse_user_clarification("2", &found);
        assert_eq!(parsed.confidence, 0.95);
        assert_eq!(
            parsed.answer,
            ClarificationAnswer::Selection {
                index: 1,
                option: "billing".into()
            }
        );
        assert_eq!(parsed.resolve_query(&found).as_deref(), Some("billing apa?"));
    }

    #[test]
    fn test_parse_out_of_range_number_is_unrecognized() {
        let found = detect("itu apa?", &empty(), &kb()).unwrap();
        assert!(!parse_user_clarification("9", &found).is_recognized());
    }

    #[test]
    fn test_parse_missing_field() {
        let found = detect("Analyze my sales numbers please", &empty(), &kb()).unwrap();
        let parsed = parse_user_clarification("the file is q3.xlsx", &found);
        assert_eq!(parsed.confidence, 0.7);
        match parsed.answer {
            ClarificationAnswer::ProvidedField { field, value } => {
                assert_eq!(field, "file");
                assert_eq!(value, "is q3.xlsx");
            }
            other => panic!("expected field, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_field_matches_whole_word_only() {
        let found = detect("Analyze my sales numbers please", &empty(), &kb()).unwrap();
        let parsed = parse_user_clarification("my profile file: q3.xlsx", &found);
        assert_eq!(
            parsed.answer,
            ClarificationAnswer::ProvidedField {
                field: "file".into(),
                value: "q3.xlsx".into()
            }
        );
    }

    #[test]
    fn test_parse_field_after_case_changing_letters() {
        let found = detect("Analyze my sales numbers please", &empty(), &kb()).unwrap();
        let parsed = parse_user_clarification("İİİ FILE = q3.xlsx", &found);
        assert_eq!(
            parsed.answer,
            ClarificationAnswer::ProvidedField {
                field: "file".into(),
                value: "q3.xlsx".into()
            }
        );
    }

    #[test]
    fn test_comparative_reply_appends_criterion() {
        let found = detect("Which plan is the best for a large team?", &empty(), &kb()).unwrap();
        let parsed = parse_user_clarification("1", &found);
        assert_eq!(
            parsed.resolve_query(&found).as_deref(),
            Some("Which plan is the best for a large team? (by price)")
        );
    }

    #[test]
    fn test_multiple_interpretations_offer_readings() {
        let message = "Should I connect that one with the other service later today";
        let found = detect(message, &empty(), &kb()).unwrap();
        assert_eq!(found.data.trigger.as_deref(), Some("that"));
        assert_eq!(found.data.options, vec!["AI", "billing"]);

        let parsed = parse_user_clarification("2", &found);
        let resolved = parsed.resolve_query(&found).unwrap();
        assert_ne!(resolved, message);
        assert_eq!(resolved, "Should I connect billing one with the other service later today");
    }

    #[test]
    fn test_multiple_interpretations_prefer_recent_topics() {
        let mut ctx = empty();
        ctx.add_turn(Turn::user("refund status", Utc::now()).with_topics(vec!["refund".into()]));
        let found = detect("Should I connect that one with the other service later today", &ctx, &kb())
            .unwrap();
        assert_eq!(found.kind, ClarificationKind::MultipleInterpretations);
        assert_eq!(found.data.options.first().map(String::as_str), Some("refund"));
    }

    #[test]
    fn test_parse_long_elaboration() {
        let found = detect("itu apa?", &empty(), &kb()).unwrap();
        let reply = "I was asking about how the assistant handles artificial intelligence topics";
        let parsed = parse_user_clarification(reply, &found);
        assert_eq!(parsed.confidence, 0.65);
        assert!(matches!(parsed.answer, ClarificationAnswer::Elaboration { .. }));
    }

    #[test]
    fn test_parse_short_unrelated_reply() {
        let found = detect("itu apa?", &empty(), &kb()).unwrap();
        assert!(!parse_user_clarification("hmm", &found).is_recognized());
    }

    #[test]
    fn test_fallback_tiers_have_distinct_text() {
        let texts: Vec<String> = [0.1, 0.4, 0.7, 0.9]
            .iter()
            .map(|c| generate_fallback("pricing question", *c).text)
            .collect();
        for (i, a) in texts.iter().enumerate() {
            for b in &texts[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(generate_fallback("x", 0.3).tier, FallbackTier::Low);
        assert_eq!(generate_fallback("x", 0.8).tier, FallbackTier::High);
    }

    #[test]
    fn test_unclear_intent_below_threshold() {
        let low = ClassificationResult::unknown(0.1);
        let found = detect_unclear_intent("zq", &low, 0.3).unwrap();
        assert_eq!(found.kind, ClarificationKind::UnclearIntent);
        assert!(detect_unclear_intent("zq", &ClassificationResult::unknown(0.5), 0.3).is_none());
    }
}
