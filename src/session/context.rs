//! Bounded, expiring conversation history.
//!
//! Holds the last few turns, a rolling window of recent intents, the entities
//! and topics mentioned so far, and any questions the assistant asked that are
//! still waiting for an answer. A context whose last turn is older than the
//! TTL is expired and must be treated as empty.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::intent::Intent;

/// Open questions kept before the oldest is dropped.
const MAX_OPEN_QUESTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Turns kept before the oldest is evicted.
    pub capacity: usize,
    /// Recent user intents kept.
    pub intent_window: usize,
    /// Minutes of inactivity after which the context expires.
    pub ttl_minutes: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            intent_window: 5,
            ttl_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub sender: Sender,
}

impl Turn {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            timestamp,
            intent: None,
            entities: Vec::new(),
            topics: Vec::new(),
            sender: Sender::User,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender: Sender::Assistant,
            ..Self::user(content, timestamp)
        }
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    YesNo,
    Choice,
    Open,
}

/// A question the assistant asked that has not been answered yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedQuestion {
    pub id: String,
    pub question: String,
    pub kind: QuestionKind,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(default)]
    config: ContextConfig,
    turns: VecDeque<Turn>,
    intents: VecDeque<Intent>,
    entities: Vec<String>,
    topics: Vec<String>,
    unresolved: Vec<UnresolvedQuestion>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::with_config(ContextConfig::default())
    }
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            turns: VecDeque::with_capacity(config.capacity),
            intents: VecDeque::with_capacity(config.intent_window),
            config,
            entities: Vec::new(),
            topics: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Append a turn, evicting the oldest one beyond capacity.
    pub fn add_turn(&mut self, turn: Turn) {
        if turn.sender == Sender::User {
            if let Some(intent) = turn.intent {
                self.intents.push_back(intent);
                while self.intents.len() > self.config.intent_window {
                    self.intents.pop_front();
                }
            }
        }
        for entity in &turn.entities {
            push_unique(&mut self.entities, entity);
        }
        for topic in &turn.topics {
            push_unique(&mut self.topics, topic);
        }

        // A new assistant turn supersedes whatever the previous one asked.
        if turn.sender == Sender::Assistant {
            self.unresolved.clear();
        }

        self.turns.push_back(turn);
        while self.turns.len() > self.config.capacity.max(1) {
            self.turns.pop_front();
        }
    }

    /// Record a question waiting for the user's answer and return its id.
    /// Call after adding the assistant turn that asked it; the next assistant
    /// turn drops it.
    pub fn add_unresolved_question(
        &mut self,
        question: impl Into<String>,
        kind: QuestionKind,
        timestamp: DateTime<Utc>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.unresolved.retain(|q| !q.resolved);
        if self.unresolved.len() >= MAX_OPEN_QUESTIONS {
            let excess = self.unresolved.len() + 1 - MAX_OPEN_QUESTIONS;
            self.unresolved.drain(..excess);
        }
        self.unresolved.push(UnresolvedQuestion {
            id: id.clone(),
            question: question.into(),
            kind,
            timestamp,
            resolved: false,
        });
        id
    }

    /// Mark a question as answered. Returns false for unknown ids.
    pub fn resolve_question(&mut self, id: &str) -> bool {
        match self.unresolved.iter_mut().find(|q| q.id == id) {
            Some(question) => {
                question.resolved = true;
                true
            }
            None => false,
        }
    }

    /// Mark every open question as answered.
    pub fn resolve_all(&mut self) {
        for question in &mut self.unresolved {
            question.resolved = true;
        }
    }

    /// Most recent question still awaiting an answer.
    pub fn pending_question(&self) -> Option<&UnresolvedQuestion> {
        self.unresolved.iter().rev().find(|q| !q.resolved)
    }

    pub fn unresolved_questions(&self) -> impl Iterator<Item = &UnresolvedQuestion> {
        self.unresolved.iter().filter(|q| !q.resolved)
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.turns.back().map(|t| t.timestamp)
    }

    /// False once the TTL has elapsed since the last turn. An empty context is
    /// always valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_activity() {
            Some(last) => now - last < Duration::minutes(self.config.ttl_minutes),
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Clear the context if it has expired. Returns whether it was cleared.
    pub fn reset_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_valid_at(now) {
            return false;
        }
        self.clear();
        true
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.intents.clear();
        self.entities.clear();
        self.topics.clear();
        self.unresolved.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn turns(&self) -> impl DoubleEndedIterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Recent user intents, oldest first.
    pub fn recent_intents(&self) -> Vec<Intent> {
        self.intents.iter().copied().collect()
    }

    pub fn last_intent(&self) -> Option<Intent> {
        self.intents.back().copied()
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn last_message_from(&self, sender: Sender) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.sender == sender)
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.last_message_from(Sender::User)
            .map(|t| t.content.as_str())
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    let lowered = item.to_lowercase();
    if !list.iter().any(|existing| existing.to_lowercase() == lowered) {
        list.push(item.to_string());
    }
}

/// Words that continue the previous exchange when they open a message.
pub const CONTINUATION_MARKERS: &[&str] = &[
    "then",
    "and",
    "also",
    "but",
    "so",
    "what about",
    "how about",
    "what else",
    "lalu",
    "terus",
    "trus",
    "kemudian",
    "dan",
    "juga",
    "selanjutnya",
    "bagaimana dengan",
    "gimana dengan",
    "kalau",
];

/// Pronouns that refer back to something said earlier.
pub const ANAPHORIC_PRONOUNS: &[&str] = &[
    "it", "this", "that", "they", "them", "these", "those", "he", "she", "its", "itu", "ini",
    "dia", "mereka", "tersebut", "beliau",
];

/// The first of `phrases` that `text` opens with, matched on whole words.
pub fn starts_with_any(text: &str, phrases: &[&'static str]) -> Option<&'static str> {
    let lowered = text.trim().to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    phrases.iter().copied().find(|phrase| {
        let parts: Vec<&str> = phrase.split_whitespace().collect();
        words.len() >= parts.len() && words[..parts.len()] == parts[..]
    })
}

/// Whether `current` continues the conversation: it opens with a
/// continuation marker after an earlier message, or with an anaphoric pronoun
/// while recent intents exist.
pub fn is_follow_up(current: &str, last: Option<&str>, recent_intents: &[Intent]) -> bool {
    if last.is_some() && starts_with_any(current, CONTINUATION_MARKERS).is_some() {
        return true;
    }
    !recent_intents.is_empty() && starts_with_any(current, ANAPHORIC_PRONOUNS).is_some()
}

/// Guess what kind of answer a question expects.
pub fn infer_question_kind(question: &str) -> QuestionKind {
    let lowered = question.trim().to_lowercase();
    if lowered.contains(" or ") || lowered.contains(" atau ") || lowered.contains("\n1.") {
        return QuestionKind::Choice;
    }
    const YES_NO_OPENERS: &[&str] = &[
        "do", "does", "did", "is", "are", "was", "were", "can", "could", "would", "will",
        "should", "shall", "have", "has", "apakah", "mau", "bisakah", "maukah", "perlu",
    ];
    let last_sentence = lowered
        .rsplit(['.', '!', '\n'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("");
    let first_word = last_sentence
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or("");
    if YES_NO_OPENERS.contains(&first_word) {
        QuestionKind::YesNo
    } else {
        QuestionKind::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut ctx = ConversationContext::new();
        let t = now();
        for i in 0..12 {
            ctx.add_turn(Turn::user(format!("message {}", i), t));
        }
        assert_eq!(ctx.len(), 10);
        assert_eq!(ctx.turns().next().unwrap().content, "message 2");
    }

    #[test]
    fn test_intent_window_keeps_last_five_user_intents() {
        let mut ctx = ConversationContext::new();
        let t = now();
        let intents = [
            Intent::Greeting,
            Intent::Definition,
            Intent::HowTo,
            Intent::Thanks,
            Intent::Calculation,
            Intent::Farewell,
        ];
        for intent in intents {
            ctx.add_turn(Turn::user("x", t).with_intent(intent));
            ctx.add_turn(Turn::assistant("y", t).with_intent(Intent::Unknown));
        }
        assert_eq!(ctx.recent_intents(), intents[1..].to_vec());
        assert_eq!(ctx.last_intent(), Some(Intent::Farewell));
    }

    #[test]
    fn test_entities_and_topics_are_deduplicated() {
        let mut ctx = ConversationContext::new();
        let t = now();
        ctx.add_turn(Turn::user("a", t).with_entities(vec!["AI".into()]).with_topics(vec!["mesin".into()]));
        ctx.add_turn(Turn::user("b", t).with_entities(vec!["ai".into(), "ML".into()]).with_topics(vec!["mesin".into()]));
        assert_eq!(ctx.entities(), &["AI".to_string(), "ML".to_string()]);
        assert_eq!(ctx.topics(), &["mesin".to_string()]);
    }

    #[test]
    fn test_expires_after_thirty_minutes() {
        let mut ctx = ConversationContext::new();
        let t = now();
        ctx.add_turn(Turn::user("hello", t - Duration::minutes(31)));
        assert!(!ctx.is_valid_at(t));

        let mut fresh = ConversationContext::new();
        fresh.add_turn(Turn::user("hello", t - Duration::minutes(29)));
        assert!(fresh.is_valid_at(t));
        assert!(ConversationContext::new().is_valid_at(t));
    }

    #[test]
    fn test_reset_if_expired_clears() {
        let mut ctx = ConversationContext::new();
        let t = now();
        ctx.add_turn(Turn::user("hello", t - Duration::minutes(45)).with_intent(Intent::Greeting));
        assert!(ctx.reset_if_expired(t));
        assert!(ctx.is_empty());
        assert!(ctx.recent_intents().is_empty());
    }

    #[test]
    fn test_unresolved_questions() {
        let mut ctx = ConversationContext::new();
        let t = now();
        let first = ctx.add_unresolved_question("Do you want more?", QuestionKind::YesNo, t);
        let second = ctx.add_unresolved_question("Which one?", QuestionKind::Choice, t);
        assert_eq!(ctx.pending_question().unwrap().id, second);
        assert!(ctx.resolve_question(&second));
        assert_eq!(ctx.pending_question().unwrap().id, first);
        assert!(!ctx.resolve_question("missing"));
        ctx.resolve_all();
        assert!(ctx.pending_question().is_none());
    }

    #[test]
    fn test_next_assistant_turn_supersedes_open_question() {
        let mut ctx = ConversationContext::new();
        let t = now();
        ctx.add_turn(Turn::assistant("Could you rephrase it as a question?", t));
        ctx.add_unresolved_question("Could you rephrase it as a question?", QuestionKind::YesNo, t);

        ctx.add_turn(Turn::user("what is billing", t));
        assert!(ctx.pending_question().is_some());

        ctx.add_turn(Turn::assistant("Invoices are sent monthly.", t));
        assert!(ctx.pending_question().is_none());
        assert_eq!(ctx.unresolved_questions().count(), 0);
    }

    #[test]
    fn test_open_questions_are_capped() {
        let mut ctx = ConversationContext::new();
        let t = now();
        let ids: Vec<String> = (0..8)
            .map(|i| ctx.add_unresolved_question(format!("Question {}?", i), QuestionKind::Open, t))
            .collect();
        assert_eq!(ctx.unresolved_questions().count(), MAX_OPEN_QUESTIONS);
        assert_eq!(ctx.pending_question().map(|q| q.id.as_str()), ids.last().map(String::as_str));
        assert!(!ctx.resolve_question(&ids[0]));
    }

    #[test]
    fn test_is_follow_up() {
        let recent = [Intent::Definition];
        assert!(is_follow_up("and what about ML?", Some("what is AI"), &[]));
        assert!(!is_follow_up("and what about ML?", None, &[]));
        assert!(is_follow_up("It sounds complex", None, &recent));
        assert!(!is_follow_up("It sounds complex", None, &[]));
        assert!(!is_follow_up("Android is an OS", Some("hi"), &recent));
        assert!(is_follow_up("lalu bagaimana?", Some("apa itu AI"), &[]));
    }

    #[test]
    fn test_infer_question_kind() {
        assert_eq!(infer_question_kind("Would you like more detail?"), QuestionKind::YesNo);
        assert_eq!(infer_question_kind("Here it is. Apakah membantu?"), QuestionKind::YesNo);
        assert_eq!(infer_question_kind("Tea or coffee?"), QuestionKind::Choice);
        assert_eq!(infer_question_kind("What topic interests you?"), QuestionKind::Open);
    }

    #[test]
    fn test_serde_round_trip_preserves_state() {
        let mut ctx = ConversationContext::new();
        ctx.add_turn(Turn::user("hello", now()).with_intent(Intent::Greeting));
        let json = serde_json::to_string(&ctx).unwrap();
        let back: ConversationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }
}
