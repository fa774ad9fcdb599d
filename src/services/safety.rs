//! Safety gate run before any response handler.
//!
//! Messages that share secrets (passwords, PINs, card or account numbers,
//! national ids) or ask for help with clearly illegal activity get a fixed
//! policy response instead of an answer.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::envelope::{ResponseEnvelope, SourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Credential,
    CardNumber,
    AccountNumber,
    NationalId,
    IllegalActivity,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Credential => "credential",
            ViolationKind::CardNumber => "card_number",
            ViolationKind::AccountNumber => "account_number",
            ViolationKind::NationalId => "national_id",
            ViolationKind::IllegalActivity => "illegal_activity",
        }
    }

    fn response(&self) -> &'static str {
        match self {
            ViolationKind::IllegalActivity => {
                "I can't help with that request. If you have a different question, I'm happy to help."
            }
            _ => {
                "For your security, please don't share passwords, PINs, card numbers or other \
                 personal identifiers here. Remove the sensitive details and ask again."
            }
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyViolation {
    pub kind: ViolationKind,
    /// Index of the rule that fired.
    pub rule: usize,
}

// ═════════════════════════════════════════════════════════════════════════════
// Policy patterns (compiled once, stored in static)
// ═════════════════════════════════════════════════════════════════════════════

struct PolicyRule {
    regex: Regex,
    kind: ViolationKind,
}

static POLICY_RULES: LazyLock<Vec<PolicyRule>> = LazyLock::new(|| {
    let rules: Vec<(&str, ViolationKind)> = vec![
        // password / PIN / OTP assigned, or stated with a digit-bearing value
        (
            r"(?i)\b(password|passwd|kata\s*sandi|sandi|pin|otp|cvv|cvc|api.?key|secret)\s*(?:[:=]\s*\S+|(?:saya|ku|is|adalah)\s+(?:\S{3,}\d\S*|\S*\d\S{3,}))",
            ViolationKind::Credential,
        ),
        // 16 digits, optionally grouped by spaces or dashes
        (
            r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b",
            ViolationKind::CardNumber,
        ),
        // Any longer unbroken run that contains sixteen digits
        (r"\d{16}", ViolationKind::CardNumber),
        (
            r"(?i)\b(account|rekening|no\.?\s*rek)\s*(number|nomor|no\.?|#)?\s*(saya|is|adalah|=|:)?\s*\d{8,}",
            ViolationKind::AccountNumber,
        ),
        (
            r"(?i)\b(nik|ktp|ssn|passport|paspor)\s*(number|nomor|no\.?)?\s*(saya|is|adalah|=|:)?\s*[A-Z0-9]{6,}",
            ViolationKind::NationalId,
        ),
        (
            r"(?i)\b(how\s+to|cara|help\s+me|bantu\s+saya)\s+(hack|steal|launder|membobol|mencuri|meretas|mencuci\s+uang)\b",
            ViolationKind::IllegalActivity,
        ),
        (
            r"(?i)\b(make|build|membuat|merakit)\s+(a\s+)?(bomb|bom|explosive|bahan\s+peledak)\b",
            ViolationKind::IllegalActivity,
        ),
    ];

    rules
        .into_iter()
        .filter_map(|(pattern, kind)| match Regex::new(pattern) {
            Ok(regex) => Some(PolicyRule { regex, kind }),
            Err(e) => {
                warn!("Failed to compile policy pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
});

/// The first policy rule the message violates.
pub fn check_safety(message: &str) -> Option<SafetyViolation> {
    POLICY_RULES
        .iter()
        .enumerate()
        .find(|(_, rule)| rule.regex.is_match(message))
        .map(|(i, rule)| SafetyViolation {
            kind: rule.kind,
            rule: i,
        })
}

/// Fixed refusal for a violation. Always confidence 1.0 and flagged for
/// review.
pub fn policy_envelope(violation: &SafetyViolation) -> ResponseEnvelope {
    ResponseEnvelope::new(SourceKind::Policy, violation.kind.response(), 1.0)
        .with_source_id(format!("policy.{}", violation.kind))
        .with_review()
}
