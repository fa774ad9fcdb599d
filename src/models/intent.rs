//! Intent labels and the classifier's scored decision.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Intent
// ============================================================================

/// The classified purpose of a user message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Greeting,
    Farewell,
    Thanks,
    /// A yes/no reply, either confirming or denying.
    Confirmation,
    Definition,
    HowTo,
    Comparison,
    AboutAssistant,
    Calculation,
    Analysis,
    Command,
    Request,
    Complaint,
    Praise,
    Concern,
    Clarification,
    Correction,
    Prediction,
    Suggestion,
    /// A factual question answerable from a single knowledge entry.
    SimpleFactual,
    /// A question that needs several pieces of knowledge put together.
    ComplexReasoning,
    #[default]
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 22] = [
        Intent::Greeting,
        Intent::Farewell,
        Intent::Thanks,
        Intent::Confirmation,
        Intent::Definition,
        Intent::HowTo,
        Intent::Comparison,
        Intent::AboutAssistant,
        Intent::Calculation,
        Intent::Analysis,
        Intent::Command,
        Intent::Request,
        Intent::Complaint,
        Intent::Praise,
        Intent::Concern,
        Intent::Clarification,
        Intent::Correction,
        Intent::Prediction,
        Intent::Suggestion,
        Intent::SimpleFactual,
        Intent::ComplexReasoning,
        Intent::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::Thanks => "thanks",
            Intent::Confirmation => "confirmation",
            Intent::Definition => "definition",
            Intent::HowTo => "how_to",
            Intent::Comparison => "comparison",
            Intent::AboutAssistant => "about_assistant",
            Intent::Calculation => "calculation",
            Intent::Analysis => "analysis",
            Intent::Command => "command",
            Intent::Request => "request",
            Intent::Complaint => "complaint",
            Intent::Praise => "praise",
            Intent::Concern => "concern",
            Intent::Clarification => "clarification",
            Intent::Correction => "correction",
            Intent::Prediction => "prediction",
            Intent::Suggestion => "suggestion",
            Intent::SimpleFactual => "simple_factual",
            Intent::ComplexReasoning => "complex_reasoning",
            Intent::Unknown => "unknown",
        }
    }

    /// Small talk that never needs clarification or knowledge lookup.
    pub fn is_social(&self) -> bool {
        matches!(
            self,
            Intent::Greeting | Intent::Farewell | Intent::Thanks | Intent::Praise
        )
    }

    /// Intents answered from the knowledge base.
    pub fn is_knowledge_seeking(&self) -> bool {
        matches!(
            self,
            Intent::Definition
                | Intent::HowTo
                | Intent::SimpleFactual
                | Intent::ComplexReasoning
                | Intent::Comparison
                | Intent::Analysis
                | Intent::Request
                | Intent::Prediction
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Intent::ALL
            .iter()
            .find(|i| i.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown intent '{}'", s))
    }
}

// ============================================================================
// Classification result
// ============================================================================

/// Structural complexity of a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    pub is_complex: bool,
    /// Weighted feature sum in `[0, 1]`.
    pub score: f64,
    /// Names of the features that fired.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A knowledge base section name.
    KnowledgeSection,
    /// A map key inside a knowledge base section.
    KnowledgeKey,
    Number,
    /// A phrase inside quotation marks.
    Quoted,
}

/// Something the message refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub kind: EntityKind,
    /// Owning section for knowledge references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// One signal's contribution to the final decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub name: String,
    pub intent: Intent,
    pub confidence: f64,
    pub weight: f64,
}

/// The classifier's decision for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: Intent,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub complexity: Complexity,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Whether answering needs multi-step reasoning.
    pub reasoning: bool,
    pub follow_up_suggested: bool,
    #[serde(default)]
    pub breakdown: Vec<SignalContribution>,
}

impl ClassificationResult {
    /// An UNKNOWN result with the given confidence and nothing else.
    pub fn unknown(confidence: f64) -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: crate::utils::math::clamp_unit(confidence),
            complexity: Complexity::default(),
            entities: Vec::new(),
            topics: Vec::new(),
            reasoning: false,
            follow_up_suggested: false,
            breakdown: Vec::new(),
        }
    }

    /// Whether the result came from a signal with the given name.
    pub fn has_signal(&self, name: &str) -> bool {
        self.breakdown.iter().any(|s| s.name == name)
    }
}
