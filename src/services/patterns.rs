//! Intent pattern rules (English and Indonesian).
//!
//! Each rule is a case-insensitive regex with a confidence boost. A match
//! scores `min(0.95, boost + 0.2)`.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::models::intent::Intent;

/// Ceiling for a pattern match's confidence.
const MAX_PATTERN_CONFIDENCE: f64 = 0.95;
const BOOST_OFFSET: f64 = 0.2;

struct PatternRule {
    intent: Intent,
    regex: Regex,
    boost: f64,
}

/// One rule that matched the text.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub intent: Intent,
    pub confidence: f64,
    /// Position of the rule in the table.
    pub rule: usize,
}

// ═════════════════════════════════════════════════════════════════════════════
// Rule table (compiled once, stored in static)
// ═════════════════════════════════════════════════════════════════════════════

static PATTERN_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    let rules: Vec<(Intent, &str, f64)> = vec![
        // Greetings
        (
            Intent::Greeting,
            r"(?i)^\s*(hi|hello|hey|hiya|halo|hai|hallo|greetings|good\s+(morning|afternoon|evening)|selamat\s+(pagi|siang|sore|malam))\b",
            0.7,
        ),
        (Intent::Greeting, r"(?i)\b(apa\s+kabar|how\s+are\s+you)\b", 0.6),
        // Farewells
        (
            Intent::Farewell,
            r"(?i)^\s*(bye|goodbye|good\s*bye|see\s+(you|ya)|farewell|sampai\s+jumpa|dadah?|selamat\s+tinggal|good\s*night)\b",
            0.7,
        ),
        // Thanks
        (
            Intent::Thanks,
            r"(?i)\b(thanks|thank\s+you|thx|ty|terima\s*kasih|makasih|trims|tengkyu)\b",
            0.7,
        ),
        // Yes / no replies
        (
            Intent::Confirmation,
            r"(?i)^\s*(yes|yeah|yep|yup|sure|ok|okay|correct|right|exactly|no|nope|nah|ya|iya|yoi|betul|benar|oke|tidak|nggak|enggak|gak|ga|bukan|belum|sudah)\b[\s.!]*$",
            0.6,
        ),
        // Definitions
        (
            Intent::Definition,
            r"(?i)^\s*(what\s+is|what's|whats|what\s+are|define|definition\s+of|meaning\s+of|apa\s+itu|apa\s+yang\s+dimaksud(\s+dengan)?|apakah\s+itu|apa\s+arti|arti\s+(dari\s+)?|pengertian|definisi)\b",
            0.7,
        ),
        (Intent::Definition, r"(?i)\b(what\s+does\s+.+\s+mean|artinya\s+apa|itu\s+apa\s+sih)\b", 0.6),
        // How-to
        (
            Intent::HowTo,
            r"(?i)\b(how\s+(do|can|should|would)\s+(i|we|you)|how\s+to|bagaimana\s+(cara|caranya)|gimana\s+cara(nya)?|cara\s+(membuat|menggunakan|mengatur|mengubah|untuk)|langkah[\s-]langkah)\b",
            0.68,
        ),
        // Comparisons
        (
            Intent::Comparison,
            r"(?i)\b(vs\.?|versus|compare|comparison|difference\s+between|better\s+than|worse\s+than|perbedaan|beda(nya)?|bandingkan|dibandingkan|lebih\s+(baik|bagus)\s+mana)\b",
            0.6,
        ),
        // Questions about the assistant itself
        (
            Intent::AboutAssistant,
            r"(?i)\b((who|what)\s+are\s+you|your\s+name|what\s+can\s+you\s+do|are\s+you\s+(a\s+)?(bot|robot|human|ai)|siapa\s+(kamu|anda|namamu)|(kamu|anda)\s+siapa|nama\s+(kamu|anda)|apa\s+yang\s+bisa\s+(kamu|anda)\s+lakukan)\b",
            0.75,
        ),
        // Calculations
        (
            Intent::Calculation,
            r"(?i)\d\s*[-+*/^×÷%]\s*[\d(]",
            0.75,
        ),
        (
            Intent::Calculation,
            r"(?i)(∫|\b(integral|integrate|integrasi(kan)?|derivative|differentiate|turunan(kan)?|calculate|compute|hitung(lah)?|berapa\s+(hasil|\d))\b)",
            0.75,
        ),
        (
            Intent::Calculation,
            r"(?i)\b(sin|cos|tan|log|ln|sqrt|exp|abs)\s*\(",
            0.7,
        ),
        // Analysis
        (
            Intent::Analysis,
            r"(?i)\b(analy[sz]e|analysis|assess|evaluate\s+(the|this|my)|break\s+down|analisis|analisa|evaluasi|tinjau)\b",
            0.55,
        ),
        // Commands
        (
            Intent::Command,
            r"(?i)^\s*(clear|reset|restart|start\s+over|new\s+chat|hapus|bersihkan|ulangi|mulai\s+(lagi|ulang|baru))\b",
            0.6,
        ),
        // Requests
        (
            Intent::Request,
            r"(?i)\b(please|can\s+you|could\s+you|would\s+you|i\s+need|i\s+want|tolong|bisakah|bisa\s+(kamu|anda)|mohon|saya\s+(butuh|perlu|mau|ingin))\b",
            0.5,
        ),
        // Complaints
        (
            Intent::Complaint,
            r"(?i)\b(not\s+working|doesn'?t\s+work|does\s+not\s+work|broken|terrible|awful|useless|disappointed|frustrat\w*|annoying|rusak|tidak\s+berfungsi|error\s+terus|gak\s+bisa|nggak\s+bisa|kecewa|jelek|lemot|payah)\b",
            0.6,
        ),
        // Praise
        (
            Intent::Praise,
            r"(?i)\b(great|awesome|excellent|amazing|fantastic|love\s+it|well\s+done|good\s+job|nice\s+work|hebat|keren|mantap|bagus\s+(sekali|banget)|luar\s+biasa)\b",
            0.6,
        ),
        // Concerns
        (
            Intent::Concern,
            r"(?i)\b(worried|worry|concerned|afraid|nervous|is\s+it\s+safe|risky|khawatir|takut|cemas|was-was|aman\s+(gak|nggak|tidak))\b",
            0.55,
        ),
        // Clarification of an earlier answer
        (
            Intent::Clarification,
            r"(?i)\b(what\s+do\s+you\s+mean|i\s+don'?t\s+understand|explain\s+(again|more)|in\s+other\s+words|clarify|maksud(nya)?\s+apa|maksudnya|jelaskan\s+lagi|kurang\s+jelas|tidak\s+mengerti)\b",
            0.55,
        ),
        // Corrections
        (
            Intent::Correction,
            r"(?i)(^\s*(no,?\s+i\s+meant|actually|i\s+meant|bukan\s+itu|sebenarnya|maksud\s+saya)\b|\bthat'?s\s+(wrong|not\s+right|incorrect)\b|\bitu\s+salah\b)",
            0.6,
        ),
        // Predictions
        (
            Intent::Prediction,
            r"(?i)\b(will\s+it|predict|prediction|forecast|going\s+to\s+happen|in\s+the\s+future|what\s+will|prediksi|ramalan|akan\s+terjadi|masa\s+depan)\b",
            0.55,
        ),
        // Suggestions
        (
            Intent::Suggestion,
            r"(?i)\b(suggest|recommend|recommendation|what\s+should\s+i|any\s+ideas|sarankan|saran(nya)?|rekomendasi(kan)?|sebaiknya\s+apa)\b",
            0.55,
        ),
        // Short factual questions
        (
            Intent::SimpleFactual,
            r"(?i)^\s*(who|when|where|which|siapa|kapan|di\s*mana|dimana|yang\s+mana)\b",
            0.45,
        ),
        // Nothing but punctuation or symbols
        (Intent::Unknown, r"^[\s\p{P}\p{S}]+$", 0.05),
    ];

    rules
        .into_iter()
        .filter_map(|(intent, pattern, boost)| match Regex::new(pattern) {
            Ok(regex) => Some(PatternRule {
                intent,
                regex,
                boost,
            }),
            Err(e) => {
                warn!("Failed to compile {} pattern '{}': {}", intent, pattern, e);
                None
            }
        })
        .collect()
});

/// Confidence of a rule with the given boost.
pub fn pattern_confidence(boost: f64) -> f64 {
    (boost + BOOST_OFFSET).min(MAX_PATTERN_CONFIDENCE)
}

/// Every rule matching the text, highest confidence first. Equal scores keep
/// table order.
pub fn match_patterns(text: &str) -> Vec<PatternMatch> {
    let mut matches: Vec<PatternMatch> = PATTERN_RULES
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.regex.is_match(text))
        .map(|(i, rule)| PatternMatch {
            intent: rule.intent,
            confidence: pattern_confidence(rule.boost),
            rule: i,
        })
        .collect();
    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn best_match(text: &str) -> Option<PatternMatch> {
        match_patterns(text).into_iter().next()
    }

    fn rule_count() -> usize {
        PATTERN_RULES.len()
    }

    fn best(text: &str) -> Option<Intent> {
        best_match(text).map(|m| m.intent)
    }

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(rule_count(), 25);
    }

    #[test]
    fn test_social_patterns() {
        assert_eq!(best("Hello there"), Some(Intent::Greeting));
        assert_eq!(best("selamat pagi"), Some(Intent::Greeting));
        assert_eq!(best("bye!"), Some(Intent::Farewell));
        assert_eq!(best("terima kasih ya"), Some(Intent::Thanks));
    }

    #[test]
    fn test_definition_short_circuits() {
        let m = best_match("Apa itu kecerdasan buatan?").unwrap();
        assert_eq!(m.intent, Intent::Definition);
        assert!((m.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_calculation_beats_definition() {
        assert_eq!(best("what is 2 + 2"), Some(Intent::Calculation));
        assert_eq!(best("integral x^2 from 0 to 1"), Some(Intent::Calculation));
    }

    #[test]
    fn test_about_assistant_beats_definition() {
        assert_eq!(best("what are you?"), Some(Intent::AboutAssistant));
        assert_eq!(best("kamu siapa"), Some(Intent::AboutAssistant));
    }

    #[test]
    fn test_confirmation_only_for_short_replies() {
        assert_eq!(best("ya"), Some(Intent::Confirmation));
        assert_eq!(best("No."), Some(Intent::Confirmation));
        assert_ne!(best("no idea how this works"), Some(Intent::Confirmation));
    }

    #[test]
    fn test_punctuation_only_is_unknown() {
        assert_eq!(best("???"), Some(Intent::Unknown));
        assert!(best_match("???").unwrap().confidence < 0.3);
    }

    #[test]
    fn test_confidence_is_capped() {
        assert_eq!(pattern_confidence(0.9), 0.95);
        assert!((pattern_confidence(0.5) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_matches_sorted_descending() {
        let matches = match_patterns("please compare python vs rust");
        assert!(matches.len() >= 2);
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_plain_text_matches_nothing() {
        assert!(match_patterns("kecerdasan buatan").is_empty());
    }
}
