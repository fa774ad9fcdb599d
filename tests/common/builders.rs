//! Test data builders for knowledge bases.
//!
//! Provides a fluent API for assembling knowledge bases with sensible content.

use std::collections::BTreeMap;

use tanya::models::{KbValue, KnowledgeBase};

/// Builder for test knowledge bases.
#[derive(Default)]
pub struct KnowledgeBuilder {
    kb: KnowledgeBase,
}

impl KnowledgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyed section.
    pub fn map(mut self, section: &str, entries: &[(&str, &str)]) -> Self {
        let map: BTreeMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.kb.insert(section, KbValue::Map(map));
        self
    }

    /// Add a list section.
    pub fn list(mut self, section: &str, items: &[&str]) -> Self {
        self.kb.insert(
            section,
            KbValue::List(items.iter().map(|s| s.to_string()).collect()),
        );
        self
    }

    /// Add a single-text section.
    pub fn text(mut self, section: &str, text: &str) -> Self {
        self.kb.insert(section, KbValue::Text(text.to_string()));
        self
    }

    pub fn build(self) -> KnowledgeBase {
        self.kb
    }
}

/// A small bilingual knowledge base used across the integration tests.
pub fn sample_knowledge() -> KnowledgeBase {
    KnowledgeBuilder::new()
        .map(
            "AI",
            &[
                (
                    "concept1",
                    "Kecerdasan buatan adalah simulasi kecerdasan manusia oleh mesin",
                ),
                (
                    "machine_learning",
                    "Machine learning lets software improve from data without explicit rules",
                ),
            ],
        )
        .map(
            "billing",
            &[
                ("invoice", "Invoices are emailed on the first day of every month"),
                ("refund", "Refunds are processed within five business days"),
            ],
        )
        .list(
            "faq",
            &[
                "Support is available from nine to five on weekdays",
                "Passwords can be reset from the account settings page",
            ],
        )
        .text("about", "Tanya answers questions from a local knowledge base")
        .build()
}
