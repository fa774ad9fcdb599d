//! Claim verification by n-gram and token overlap.
//!
//! Deliberately separate from the TF-IDF index: retrieval ranks documents by
//! relevance, verification asks whether some entry actually backs the claim
//! and favours short, precise entries over long ones that mention everything.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::knowledge::KnowledgeBase;
use crate::utils::math::clamp_unit;
use crate::utils::text::{ngram_jaccard, token_overlap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactCheckOptions {
    /// Minimum best score for a claim to count as verified.
    pub threshold: f64,
    /// Number of supporting sources kept.
    pub top_n: usize,
    /// Longest n-gram used in the Jaccard term.
    pub max_n: usize,
    /// Per-section score multipliers; sections not listed use 1.0.
    pub source_boosts: HashMap<String, f64>,
}

impl Default for FactCheckOptions {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            top_n: 3,
            max_n: 3,
            source_boosts: HashMap::new(),
        }
    }
}

impl FactCheckOptions {
    fn boost(&self, section: &str) -> f64 {
        self.source_boosts.get(section).copied().unwrap_or(1.0)
    }
}

/// A knowledge entry that supports a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSource {
    pub id: String,
    pub section: String,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimCheck {
    pub verified: bool,
    /// Best source score, 0.0 when nothing matched.
    pub score: f64,
    /// Best score clamped to `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<FactSource>,
    pub sources: Vec<FactSource>,
}

impl ClaimCheck {
    fn unverified() -> Self {
        Self {
            verified: false,
            score: 0.0,
            confidence: 0.0,
            best: None,
            sources: Vec::new(),
        }
    }
}

/// `clamp(100 / (chars + 10), 0.5, 1.5)`.
pub fn length_factor(text: &str) -> f64 {
    let len = text.chars().count() as f64;
    (100.0 / (len + 10.0)).clamp(0.5, 1.5)
}

/// `0.6 · ngram_jaccard + 0.4 · token_overlap`, before length and source
/// weighting.
pub fn combined_similarity(claim: &str, text: &str, max_n: usize) -> f64 {
    0.6 * ngram_jaccard(claim, text, max_n) + 0.4 * token_overlap(claim, text)
}

/// Check a claim against every knowledge base entry.
pub fn check_claim(claim: &str, kb: &KnowledgeBase, opts: &FactCheckOptions) -> ClaimCheck {
    let mut sources: Vec<FactSource> = kb
        .flatten()
        .into_iter()
        .filter_map(|doc| {
            let combined = combined_similarity(claim, &doc.text, opts.max_n);
            let scored = combined * length_factor(&doc.text) * opts.boost(&doc.section);
            (scored > 0.0).then(|| FactSource {
                id: doc.id,
                section: doc.section,
                text: doc.text,
                score: scored,
            })
        })
        .collect();

    if sources.is_empty() {
        return ClaimCheck::unverified();
    }

    sources.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    sources.truncate(opts.top_n.max(1));

    let best = sources[0].clone();
    ClaimCheck {
        verified: best.score >= opts.threshold,
        score: best.score,
        confidence: clamp_unit(best.score),
        best: Some(best),
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::knowledge::KbValue;
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
            .with_section(
                "misc",
                KbValue::List(vec![
                    "The office opens at nine".to_string(),
                    "Kecerdasan buatan is mentioned here among a great many other unrelated words that pad this entry out far beyond a concise statement".to_string(),
                ]),
            )
    }

    #[test]
    fn test_empty_kb_is_unverified() {
        let check = check_claim("anything", &KnowledgeBase::new(), &FactCheckOptions::default());
        assert!(!check.verified);
        assert_eq!(check.score, 0.0);
        assert!(check.sources.is_empty());
    }

    #[test]
    fn test_verifies_matching_claim() {
        let check = check_claim(
            "kecerdasan buatan adalah simulasi kecerdasan manusia",
            &kb(),
            &FactCheckOptions::default(),
        );
        assert!(check.verified);
        assert_eq!(check.best.as_ref().unwrap().id, "AI.concept1");
        assert!(check.confidence <= 1.0);
    }

    #[test]
    fn test_concise_entries_outrank_padded_ones() {
        let check = check_claim("kecerdasan buatan", &kb(), &FactCheckOptions::default());
        assert_eq!(check.sources[0].id, "AI.concept1");
    }

    #[test]
    fn test_source_boost_reorders() {
        let opts = FactCheckOptions {
            source_boosts: HashMap::from([("misc".to_string(), 10.0)]),
            ..Default::default()
        };
        let check = check_claim("kecerdasan buatan", &kb(), &opts);
        assert_eq!(check.sources[0].section, "misc");
    }

    #[test]
    fn test_length_factor_bounds() {
        assert_eq!(length_factor(""), 1.5);
        assert_eq!(length_factor(&"x".repeat(500)), 0.5);
        assert!((length_factor(&"x".repeat(90)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unrelated_claim_is_unverified() {
        let check = check_claim("quantum entanglement", &kb(), &FactCheckOptions::default());
        assert!(!check.verified);
        assert!(check.sources.is_empty());
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn confidence_in_unit_range(claim in "\\PC{0,60}") {
                let check = check_claim(&claim, &kb(), &FactCheckOptions::default());
                prop_assert!((0.0..=1.0).contains(&check.confidence));
                prop_assert!(check.sources.len() <= 3);
            }
        }
    }
}
