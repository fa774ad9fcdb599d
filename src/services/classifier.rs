//! Multi-signal intent classifier.
//!
//! One pass over the message collects up to four signals:
//!
//! - pattern: regex rules per intent ([`super::patterns`])
//! - entity: references to knowledge base sections, keys and topics
//! - context: yes/no replies to an open question, definition follow-ups
//! - complexity: structural features of the message
//!
//! A strong pattern match short-circuits everything else. Otherwise the
//! intent with the largest weighted support wins and its confidence is the
//! weighted average of the signals that fired, plus small agreement bonuses.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::intent::{
    ClassificationResult, Complexity, Entity, EntityKind, Intent, SignalContribution,
};
use crate::models::knowledge::KnowledgeBase;
use crate::services::patterns::{match_patterns, PatternMatch};
use crate::session::context::{is_follow_up, ConversationContext, QuestionKind};
use crate::utils::math::clamp_unit;
use crate::utils::text::{keywords, tokenize, word_count};

/// Signal weights and decision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub pattern_weight: f64,
    pub entity_weight: f64,
    pub context_weight: f64,
    pub complexity_weight: f64,
    /// A pattern match above this returns immediately.
    pub short_circuit_threshold: f64,
    /// Context signal needed to be used as a fallback.
    pub context_threshold: f64,
    /// Entity signal needed to be used as a fallback.
    pub entity_threshold: f64,
    /// Below this the combined decision is discarded for the fallback chain.
    pub unknown_threshold: f64,
    /// Complexity score at which a message counts as complex.
    pub complexity_threshold: f64,
    pub agreement_bonus: f64,
    pub entity_bonus: f64,
    pub multi_match_bonus: f64,
    /// Minimum normalized Levenshtein similarity for a fuzzy entity match.
    pub fuzzy_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pattern_weight: 0.4,
            entity_weight: 0.3,
            context_weight: 0.2,
            complexity_weight: 0.1,
            short_circuit_threshold: 0.85,
            context_threshold: 0.6,
            entity_threshold: 0.5,
            unknown_threshold: 0.3,
            complexity_threshold: 0.4,
            agreement_bonus: 0.1,
            entity_bonus: 0.05,
            multi_match_bonus: 0.05,
            fuzzy_threshold: 0.85,
        }
    }
}

/// Names and terms from the knowledge base the classifier can recognize.
#[derive(Debug, Clone, Default)]
pub struct KnownVocabulary {
    /// Section names as written.
    sections: Vec<String>,
    /// `(section, key)` pairs for map entries.
    keys: Vec<(String, String)>,
    /// Content keywords across all documents.
    terms: HashSet<String>,
}

impl KnownVocabulary {
    pub fn from_knowledge(kb: &KnowledgeBase) -> Self {
        let sections = kb.section_names().map(String::from).collect();
        let keys = kb
            .keys()
            .into_iter()
            .map(|(s, k)| (s.to_string(), k.to_string()))
            .collect();
        let terms = kb
            .flatten()
            .iter()
            .flat_map(|d| keywords(&d.text, 4))
            .collect();
        Self {
            sections,
            keys,
            terms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.terms.is_empty()
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn knows_term(&self, term: &str) -> bool {
        self.terms.contains(term)
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Complexity features
// ═════════════════════════════════════════════════════════════════════════════

struct Feature {
    name: &'static str,
    regex: Regex,
    weight: f64,
}

static COMPLEXITY_FEATURES: LazyLock<Vec<Feature>> = LazyLock::new(|| {
    let features: Vec<(&str, &str, f64)> = vec![
        (
            "conjunctions",
            r"(?i)\b(and|but|because|however|although|whereas|therefore|dan|tetapi|tapi|karena|namun|meskipun|sehingga)\b",
            0.2,
        ),
        ("multi_clause", r"[,;:]\s*\w+.*[,;:]|\?.+\?", 0.2),
        (
            "conditionals",
            r"(?i)\b(if|unless|when|whether|suppose|jika|kalau|apabila|seandainya|bila)\b",
            0.2,
        ),
        (
            "comparatives",
            r"(?i)\b(\w+er\s+than|more|less|better|worse|best|worst|most|least|lebih|paling|kurang|terbaik)\b",
            0.15,
        ),
    ];
    features
        .into_iter()
        .filter_map(|(name, pattern, weight)| match Regex::new(pattern) {
            Ok(regex) => Some(Feature {
                name,
                regex,
                weight,
            }),
            Err(e) => {
                tracing::warn!("Failed to compile complexity feature '{}': {}", name, e);
                None
            }
        })
        .collect()
});

const QUESTION_WORDS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "apa", "mengapa", "kenapa",
    "bagaimana", "kapan", "dimana", "siapa", "mana",
];

const LONG_MESSAGE_WORDS: usize = 15;
const LONG_MESSAGE_WEIGHT: f64 = 0.15;
const QUESTION_WORDS_WEIGHT: f64 = 0.1;

/// Score the structural complexity of a message.
pub fn analyze_complexity(text: &str, threshold: f64) -> Complexity {
    let mut score = 0.0;
    let mut features = Vec::new();

    for feature in COMPLEXITY_FEATURES.iter() {
        if feature.regex.is_match(text) {
            score += feature.weight;
            features.push(feature.name.to_string());
        }
    }
    if word_count(text) > LONG_MESSAGE_WORDS {
        score += LONG_MESSAGE_WEIGHT;
        features.push("long_message".to_string());
    }
    let question_words: HashSet<String> = tokenize(text)
        .into_iter()
        .filter(|t| QUESTION_WORDS.contains(&t.as_str()))
        .collect();
    if question_words.len() > 1 {
        score += QUESTION_WORDS_WEIGHT;
        features.push("multiple_question_words".to_string());
    }

    let score = clamp_unit(score);
    Complexity {
        is_complex: score >= threshold,
        score,
        features,
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Entity extraction
// ═════════════════════════════════════════════════════════════════════════════

static NUMBER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?\b").ok());

static QUOTED_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""([^"]{2,})"|“([^”]{2,})”"#).ok());

fn fuzzy_mentions(name: &str, tokens: &[String], lowered: &str, threshold: f64) -> bool {
    let name = name.to_lowercase();
    if name.is_empty() {
        return false;
    }
    if name.contains(char::is_whitespace) {
        return lowered.contains(&name);
    }
    tokens.iter().any(|token| {
        token == &name
            || (token.chars().count() >= 4
                && rapidfuzz::distance::levenshtein::normalized_similarity(
                    token.chars(),
                    name.chars(),
                ) >= threshold)
    })
}

/// Knowledge references, numbers and quoted phrases mentioned in the text.
pub fn extract_entities(text: &str, vocabulary: &KnownVocabulary, fuzzy_threshold: f64) -> Vec<Entity> {
    let tokens = tokenize(text);
    let lowered = text.to_lowercase();
    let mut entities: Vec<Entity> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut push = |entity: Entity, entities: &mut Vec<Entity>| {
        if seen.insert(entity.text.to_lowercase()) {
            entities.push(entity);
        }
    };

    for section in &vocabulary.sections {
        if fuzzy_mentions(section, &tokens, &lowered, fuzzy_threshold) {
            push(
                Entity {
                    text: section.clone(),
                    kind: EntityKind::KnowledgeSection,
                    section: Some(section.clone()),
                },
                &mut entities,
            );
        }
    }
    for (section, key) in &vocabulary.keys {
        if fuzzy_mentions(key, &tokens, &lowered, fuzzy_threshold) {
            push(
                Entity {
                    text: key.clone(),
                    kind: EntityKind::KnowledgeKey,
                    section: Some(section.clone()),
                },
                &mut entities,
            );
        }
    }
    if let Some(re) = NUMBER_RE.as_ref() {
        for m in re.find_iter(text) {
            push(
                Entity {
                    text: m.as_str().to_string(),
                    kind: EntityKind::Number,
                    section: None,
                },
                &mut entities,
            );
        }
    }
    if let Some(re) = QUOTED_RE.as_ref() {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                push(
                    Entity {
                        text: m.as_str().to_string(),
                        kind: EntityKind::Quoted,
                        section: None,
                    },
                    &mut entities,
                );
            }
        }
    }

    entities
}

/// Content keywords of at least four characters.
pub fn extract_topics(text: &str) -> Vec<String> {
    keywords(text, 4)
}

// ═════════════════════════════════════════════════════════════════════════════
// Classifier
// ═════════════════════════════════════════════════════════════════════════════

static CONFIRM_DENY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(yes|yeah|yep|yup|sure|ok|okay|of\s+course|please\s+do|no|nope|nah|not\s+really|no\s+thanks|ya|iya|boleh|mau|tentu|oke|tidak|nggak|enggak|gak|ga|bukan|tidak\s+usah|nggak\s+usah)\b",
    )
    .ok()
});

const CONFIRMATION_CONFIDENCE: f64 = 0.85;
const CONTINUATION_CONFIDENCE: f64 = 0.75;
const SHORT_REPLY_WORDS: usize = 4;
const TOPICAL_FALLBACK_CONFIDENCE: f64 = 0.4;
const UNKNOWN_CONFIDENCE: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
struct Signal {
    name: &'static str,
    intent: Intent,
    confidence: f64,
    weight: f64,
}

impl From<&Signal> for SignalContribution {
    fn from(s: &Signal) -> Self {
        SignalContribution {
            name: s.name.to_string(),
            intent: s.intent,
            confidence: s.confidence,
            weight: s.weight,
        }
    }
}

/// Classifier bound to a configuration and a knowledge vocabulary.
#[derive(Debug, Clone, Default)]
pub struct IntentClassifier {
    config: ClassifierConfig,
    vocabulary: KnownVocabulary,
}

impl IntentClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            vocabulary: KnownVocabulary::default(),
        }
    }

    pub fn with_knowledge(mut self, kb: &KnowledgeBase) -> Self {
        self.vocabulary = KnownVocabulary::from_knowledge(kb);
        self
    }

    pub fn set_knowledge(&mut self, kb: &KnowledgeBase) {
        self.vocabulary = KnownVocabulary::from_knowledge(kb);
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &KnownVocabulary {
        &self.vocabulary
    }

    /// Classify one message. An expired context is ignored.
    pub fn classify(&self, text: &str, context: &ConversationContext) -> ClassificationResult {
        let cfg = &self.config;
        let context = context.is_valid().then_some(context);

        let entities = extract_entities(text, &self.vocabulary, cfg.fuzzy_threshold);
        let topics = extract_topics(text);
        let patterns = match_patterns(text);

        // (1) pattern signal; a strong match ends classification here
        if let Some(best) = patterns.first() {
            if best.confidence > cfg.short_circuit_threshold {
                let complexity = analyze_complexity(text, cfg.complexity_threshold);
                debug!(intent = %best.intent, confidence = best.confidence, "pattern short-circuit");
                return self.finish(
                    best.intent,
                    best.confidence,
                    complexity,
                    entities,
                    topics,
                    vec![SignalContribution {
                        name: "pattern".into(),
                        intent: best.intent,
                        confidence: best.confidence,
                        weight: 1.0,
                    }],
                );
            }
        }

        // (2) complexity
        let complexity = analyze_complexity(text, cfg.complexity_threshold);

        let mut signals: Vec<Signal> = Vec::new();
        if let Some(best) = patterns.first() {
            signals.push(Signal {
                name: "pattern",
                intent: best.intent,
                confidence: best.confidence,
                weight: cfg.pattern_weight,
            });
        }

        // (3) entity / topic
        let entity_signal = self.entity_signal(&entities, &topics, &complexity);
        if let Some(signal) = entity_signal.as_ref() {
            signals.push(*signal);
        }

        // (4) context
        let context_signal = context.and_then(|ctx| context_signal(text, ctx, cfg.context_weight));
        if let Some(signal) = context_signal.as_ref() {
            signals.push(*signal);
        }

        if complexity.is_complex {
            signals.push(Signal {
                name: "complexity",
                intent: Intent::ComplexReasoning,
                confidence: complexity.score,
                weight: cfg.complexity_weight,
            });
        }

        // (5) combine
        let decision = self.combine(&signals, &patterns, &entities, entity_signal.as_ref());
        let breakdown = signals.iter().map(SignalContribution::from).collect();

        let (intent, confidence) = match decision {
            Some((intent, confidence)) if confidence >= cfg.unknown_threshold => {
                (intent, confidence)
            }
            _ => self.fallback(
                context_signal.as_ref(),
                entity_signal.as_ref(),
                &complexity,
                &entities,
                &topics,
            ),
        };

        debug!(%intent, confidence, signals = signals.len(), "classified");
        self.finish(intent, confidence, complexity, entities, topics, breakdown)
    }

    fn entity_signal(
        &self,
        entities: &[Entity],
        topics: &[String],
        complexity: &Complexity,
    ) -> Option<Signal> {
        let knowledge_refs = entities
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    EntityKind::KnowledgeSection | EntityKind::KnowledgeKey
                )
            })
            .count();
        let known_topics = topics
            .iter()
            .filter(|t| self.vocabulary.knows_term(t))
            .count();
        if knowledge_refs == 0 && known_topics == 0 {
            return None;
        }

        let confidence =
            (0.45 + 0.15 * knowledge_refs as f64 + 0.05 * known_topics as f64).min(0.9);
        let intent = if complexity.is_complex {
            Intent::ComplexReasoning
        } else {
            Intent::SimpleFactual
        };
        Some(Signal {
            name: "entity",
            intent,
            confidence,
            weight: self.config.entity_weight,
        })
    }

    /// Winning intent by weighted support, with the weighted-average
    /// confidence of all fired signals plus bonuses.
    fn combine(
        &self,
        signals: &[Signal],
        patterns: &[PatternMatch],
        entities: &[Entity],
        entity_signal: Option<&Signal>,
    ) -> Option<(Intent, f64)> {
        let total_weight: f64 = signals.iter().map(|s| s.weight).sum();
        if signals.is_empty() || total_weight <= 0.0 {
            return None;
        }

        let mut support: BTreeMap<Intent, f64> = BTreeMap::new();
        for signal in signals {
            *support.entry(signal.intent).or_insert(0.0) += signal.weight * signal.confidence;
        }
        // Ties go to the signal listed first.
        let mut winner: Option<(Intent, f64)> = None;
        for signal in signals {
            let score = support.get(&signal.intent).copied().unwrap_or(0.0);
            match winner {
                Some((_, best)) if best >= score => {}
                _ => winner = Some((signal.intent, score)),
            }
        }
        let (intent, _) = winner?;

        let mut confidence = signals
            .iter()
            .map(|s| s.weight * s.confidence)
            .sum::<f64>()
            / total_weight;

        let pattern_intent = patterns.first().map(|p| p.intent);
        if let (Some(p), Some(e)) = (pattern_intent, entity_signal) {
            if p == e.intent {
                confidence += self.config.agreement_bonus;
            }
        }
        if !entities.is_empty() {
            confidence += self.config.entity_bonus;
        }
        if patterns.len() > 1 {
            confidence += self.config.multi_match_bonus;
        }

        Some((intent, clamp_unit(confidence)))
    }

    fn fallback(
        &self,
        context_signal: Option<&Signal>,
        entity_signal: Option<&Signal>,
        complexity: &Complexity,
        entities: &[Entity],
        topics: &[String],
    ) -> (Intent, f64) {
        let cfg = &self.config;
        if let Some(s) = context_signal.filter(|s| s.confidence > cfg.context_threshold) {
            return (s.intent, s.confidence);
        }
        if let Some(s) = entity_signal.filter(|s| s.confidence > cfg.entity_threshold) {
            return (s.intent, s.confidence);
        }
        if complexity.is_complex {
            return (Intent::ComplexReasoning, complexity.score.max(cfg.unknown_threshold));
        }
        if !topics.is_empty() || !entities.is_empty() {
            return (Intent::SimpleFactual, TOPICAL_FALLBACK_CONFIDENCE);
        }
        (Intent::Unknown, UNKNOWN_CONFIDENCE)
    }

    fn finish(
        &self,
        intent: Intent,
        confidence: f64,
        complexity: Complexity,
        entities: Vec<Entity>,
        topics: Vec<String>,
        breakdown: Vec<SignalContribution>,
    ) -> ClassificationResult {
        let reasoning = complexity.is_complex
            || matches!(
                intent,
                Intent::ComplexReasoning | Intent::Analysis | Intent::Comparison
            );
        let follow_up_suggested = complexity.is_complex
            || matches!(
                intent,
                Intent::Definition
                    | Intent::HowTo
                    | Intent::SimpleFactual
                    | Intent::ComplexReasoning
                    | Intent::Comparison
                    | Intent::Analysis
            );
        ClassificationResult {
            intent,
            confidence: clamp_unit(confidence),
            complexity,
            entities,
            topics,
            reasoning,
            follow_up_suggested,
            breakdown,
        }
    }
}

fn context_signal(text: &str, context: &ConversationContext, weight: f64) -> Option<Signal> {
    let short_reply = word_count(text) <= SHORT_REPLY_WORDS;
    let awaiting_yes_no = context
        .pending_question()
        .is_some_and(|q| q.kind == QuestionKind::YesNo);

    if awaiting_yes_no
        && short_reply
        && CONFIRM_DENY_RE.as_ref().is_some_and(|re| re.is_match(text))
    {
        return Some(Signal {
            name: "context",
            intent: Intent::Confirmation,
            confidence: CONFIRMATION_CONFIDENCE,
            weight,
        });
    }

    let recent = context.recent_intents();
    if context.last_intent() == Some(Intent::Definition)
        && is_follow_up(text, context.last_user_message(), &recent)
    {
        return Some(Signal {
            name: "context",
            intent: Intent::Clarification,
            confidence: CONTINUATION_CONFIDENCE,
            weight,
        });
    }
    None
}

/// Classify with default configuration and no knowledge vocabulary.
pub fn classify(text: &str, context: &ConversationContext) -> ClassificationResult {
    IntentClassifier::default().classify(text, context)
}
