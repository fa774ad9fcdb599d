//! The structured response handed back for a single user turn.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::Calculation;
use crate::utils::math::clamp_unit;

/// Which handler produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Safety gate refusal.
    Policy,
    Greeting,
    Farewell,
    Thanks,
    Definition,
    HowTo,
    /// Direct knowledge base answer.
    Knowledge,
    /// Answer assembled from several knowledge entries.
    Reasoning,
    Calculation,
    Comparison,
    Assistant,
    Complaint,
    Command,
    Clarification,
    Confirmation,
    Fallback,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Policy => "policy",
            SourceKind::Greeting => "greeting",
            SourceKind::Farewell => "farewell",
            SourceKind::Thanks => "thanks",
            SourceKind::Definition => "definition",
            SourceKind::HowTo => "how_to",
            SourceKind::Knowledge => "knowledge",
            SourceKind::Reasoning => "reasoning",
            SourceKind::Calculation => "calculation",
            SourceKind::Comparison => "comparison",
            SourceKind::Assistant => "assistant",
            SourceKind::Complaint => "complaint",
            SourceKind::Command => "command",
            SourceKind::Clarification => "clarification",
            SourceKind::Confirmation => "confirmation",
            SourceKind::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A knowledge entry backing an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Document id (`section.key`).
    pub id: String,
    pub section: String,
    pub score: f64,
    /// Whether the fact checker accepted the entry.
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub kind: SourceKind,
    /// Primary document or rule id, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribution: Vec<Attribution>,
}

/// Side effect the caller should apply after presenting the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineAction {
    /// Forget the conversation so far.
    ClearContext,
}

/// Final response for one user turn. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub text: String,
    pub source: Source,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    /// Whether the response invites a follow-up question.
    pub follow_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<Calculation>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_review: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<EngineAction>,
}

impl ResponseEnvelope {
    pub fn new(kind: SourceKind, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            source: Source {
                kind,
                id: None,
                attribution: Vec::new(),
            },
            confidence: clamp_unit(confidence),
            follow_up: false,
            calculation: None,
            requires_review: false,
            suggestions: Vec::new(),
            action: None,
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source.id = Some(id.into());
        self
    }

    pub fn with_attribution(mut self, attribution: Vec<Attribution>) -> Self {
        self.source.attribution = attribution;
        self
    }

    pub fn with_follow_up(mut self, follow_up: bool) -> Self {
        self.follow_up = follow_up;
        self
    }

    pub fn with_calculation(mut self, calculation: Calculation) -> Self {
        self.calculation = Some(calculation);
        self
    }

    pub fn with_review(mut self) -> Self {
        self.requires_review = true;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_action(mut self, action: EngineAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(ResponseEnvelope::new(SourceKind::Fallback, "x", 3.0).confidence, 1.0);
        assert_eq!(ResponseEnvelope::new(SourceKind::Fallback, "x", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let env = ResponseEnvelope::new(SourceKind::Greeting, "Hi", 0.9);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["source"]["kind"], "greeting");
        assert!(json.get("requires_review").is_none());
        assert!(json.get("calculation").is_none());
        assert!(json["source"].get("attribution").is_none());
    }
}
