//! Clarification situations, parsed replies, and confidence-tiered fallbacks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of ambiguity detected in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClarificationKind {
    /// A bare pronoun with nothing to refer back to.
    AmbiguousEntity,
    /// A question too short to answer.
    IncompleteQuery,
    /// Several terms that can each mean more than one thing.
    MultipleInterpretations,
    /// A comparison without anything to compare against.
    ContextDependency,
    /// An action with no named target.
    MissingSpecification,
    /// The classifier could not settle on an intent.
    UnclearIntent,
}

impl ClarificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClarificationKind::AmbiguousEntity => "AMBIGUOUS_ENTITY",
            ClarificationKind::IncompleteQuery => "INCOMPLETE_QUERY",
            ClarificationKind::MultipleInterpretations => "MULTIPLE_INTERPRETATIONS",
            ClarificationKind::ContextDependency => "CONTEXT_DEPENDENCY",
            ClarificationKind::MissingSpecification => "MISSING_SPECIFICATION",
            ClarificationKind::UnclearIntent => "UNCLEAR_INTENT",
        }
    }
}

impl fmt::Display for ClarificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw material a clarification prompt was built from, kept so the reply can
/// be matched against it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClarificationData {
    /// The message that triggered the clarification.
    pub original: String,
    /// The word or phrase that made it ambiguous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// Numbered options offered to the user, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Field names the user was asked to provide.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationSituation {
    pub kind: ClarificationKind,
    pub data: ClarificationData,
    pub confidence: f64,
}

/// What the user's reply to a clarification prompt amounted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClarificationAnswer {
    /// One of the numbered options (zero-based index).
    Selection { index: usize, option: String },
    /// A value for one of the requested fields.
    ProvidedField { field: String, value: String },
    /// A longer free-form restatement.
    Elaboration { text: String },
    /// Nothing usable; treat the reply as a fresh message.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedClarification {
    pub answer: ClarificationAnswer,
    pub confidence: f64,
}

impl ParsedClarification {
    pub fn unrecognized() -> Self {
        Self {
            answer: ClarificationAnswer::Unrecognized,
            confidence: 0.0,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self.answer, ClarificationAnswer::Unrecognized)
    }

    /// Rewrite the clarified request as a standalone query, given the
    /// situation it answered.
    pub fn resolve_query(&self, situation: &ClarificationSituation) -> Option<String> {
        let original = situation.data.original.trim();
        match &self.answer {
            ClarificationAnswer::Selection { option, .. }
                if situation.kind == ClarificationKind::ContextDependency =>
            {
                Some(format!("{} (by {})", original, option))
            }
            ClarificationAnswer::Selection { option, .. } => match &situation.data.trigger {
                Some(trigger) if contains_word(original, trigger) => {
                    Some(replace_word(original, trigger, option))
                }
                _ => Some(format!("{} {}", original, option)),
            },
            ClarificationAnswer::ProvidedField { field, value } => {
                Some(format!("{} ({}: {})", original, field, value))
            }
            ClarificationAnswer::Elaboration { text } => Some(text.clone()),
            ClarificationAnswer::Unrecognized => None,
        }
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|t| t.eq_ignore_ascii_case(word))
}

/// Replace the first whole-word, case-insensitive occurrence of `word`.
fn replace_word(text: &str, word: &str, with: &str) -> String {
    let mut out = String::with_capacity(text.len() + with.len());
    let mut replaced = false;
    let mut token = String::new();
    for c in text.chars().chain(std::iter::once('\0')) {
        if c.is_alphanumeric() {
            token.push(c);
            continue;
        }
        if !replaced && token.eq_ignore_ascii_case(word) {
            out.push_str(with);
            replaced = true;
        } else {
            out.push_str(&token);
        }
        token.clear();
        if c != '\0' {
            out.push(c);
        }
    }
    out
}

/// Confidence bucket of a fallback response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTier {
    /// Below 0.3.
    VeryLow,
    /// 0.3 up to (excluding) 0.6.
    Low,
    /// 0.6 up to (excluding) 0.8.
    Medium,
    /// 0.8 and above.
    High,
}

impl FallbackTier {
    pub fn for_confidence(confidence: f64) -> Self {
        if confidence < 0.3 {
            FallbackTier::VeryLow
        } else if confidence < 0.6 {
            FallbackTier::Low
        } else if confidence < 0.8 {
            FallbackTier::Medium
        } else {
            FallbackTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackTier::VeryLow => "very_low",
            FallbackTier::Low => "low",
            FallbackTier::Medium => "medium",
            FallbackTier::High => "high",
        }
    }
}

/// Guidance text when no handler could answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    pub tier: FallbackTier,
    pub text: String,
    pub suggestion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn situation(trigger: Option<&str>) -> ClarificationSituation {
        ClarificationSituation {
            kind: ClarificationKind::AmbiguousEntity,
            data: ClarificationData {
                original: "itu apa?".into(),
                trigger: trigger.map(String::from),
                options: vec!["AI".into()],
                missing_fields: vec![],
            },
            confidence: 0.85,
        }
    }

    #[test]
    fn test_tier_cut_points_are_exact() {
        assert_eq!(FallbackTier::for_confidence(0.0), FallbackTier::VeryLow);
        assert_eq!(FallbackTier::for_confidence(0.2999), FallbackTier::VeryLow);
        assert_eq!(FallbackTier::for_confidence(0.3), FallbackTier::Low);
        assert_eq!(FallbackTier::for_confidence(0.5999), FallbackTier::Low);
        assert_eq!(FallbackTier::for_confidence(0.6), FallbackTier::Medium);
        assert_eq!(FallbackTier::for_confidence(0.7999), FallbackTier::Medium);
        assert_eq!(FallbackTier::for_confidence(0.8), FallbackTier::High);
        assert_eq!(FallbackTier::for_confidence(1.0), FallbackTier::High);
    }

    #[test]
    fn test_resolve_selection_replaces_trigger() {
        let parsed = ParsedClarification {
            answer: ClarificationAnswer::Selection {
                index: 0,
                option: "AI".into(),
            },
            confidence: 0.95,
        };
        assert_eq!(
            parsed.resolve_query(&situation(Some("itu"))).as_deref(),
            Some("AI apa?")
        );
        assert_eq!(
            parsed.resolve_query(&situation(None)).as_deref(),
            Some("itu apa? AI")
        );
    }

    #[test]
    fn test_comparison_criterion_is_appended() {
        let situation = ClarificationSituation {
            kind: ClarificationKind::ContextDependency,
            data: ClarificationData {
                original: "Which plan is the best for a large team?".into(),
                trigger: Some("best".into()),
                options: vec!["price".into(), "performance".into()],
                missing_fields: vec![],
            },
            confidence: 0.6,
        };
        let parsed = ParsedClarification {
            answer: ClarificationAnswer::Selection {
                index: 0,
                option: "price".into(),
            },
            confidence: 0.95,
        };
        assert_eq!(
            parsed.resolve_query(&situation).as_deref(),
            Some("Which plan is the best for a large team? (by price)")
        );
    }

    #[test]
    fn test_unrecognized_resolves_to_none() {
        assert!(ParsedClarification::unrecognized()
            .resolve_query(&situation(None))
            .is_none());
    }
}
