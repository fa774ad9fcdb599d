//! Knowledge base model: named sections holding lists, maps, or plain text.
//!
//! Collaborators hand over loosely structured data (JSON, YAML, TOML). Each
//! section is normalized into a [`KbValue`] when deserialized; nested records
//! are stringified so every entry becomes searchable text.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Content of one knowledge base section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KbValue {
    /// One document per element.
    List(Vec<String>),
    /// One document per value, keyed by the map key.
    Map(BTreeMap<String, String>),
    /// A single document.
    Text(String),
}

impl KbValue {
    /// Number of documents this value flattens into.
    pub fn len(&self) -> usize {
        match self {
            KbValue::List(items) => items.len(),
            KbValue::Map(entries) => entries.len(),
            KbValue::Text(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<serde_json::Value> for KbValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items) => {
                KbValue::List(items.into_iter().map(stringify_value).collect())
            }
            serde_json::Value::Object(entries) => KbValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, stringify_value(v)))
                    .collect(),
            ),
            other => KbValue::Text(stringify_value(other)),
        }
    }
}

/// Render a JSON value as plain text. Strings stay unquoted; records become
/// `key: value` pairs separated by semicolons.
fn stringify_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(stringify_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Object(entries) => entries
            .into_iter()
            .map(|(k, v)| format!("{}: {}", k, stringify_value(v)))
            .collect::<Vec<_>>()
            .join("; "),
    }
}

/// A flattened knowledge base entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// `section.key` for map entries, `section.N` for list entries,
    /// `section` for text sections.
    pub id: String,
    /// Section the entry came from.
    pub section: String,
    /// Map key or list position, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Stringified content.
    pub text: String,
}

/// The knowledge base consumed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    sections: BTreeMap<String, KbValue>,
}

impl<'de> Deserialize<'de> for KnowledgeBase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, v)| (k, KbValue::from(v))).collect())
    }
}

impl FromIterator<(String, KbValue)> for KnowledgeBase {
    fn from_iter<I: IntoIterator<Item = (String, KbValue)>>(iter: I) -> Self {
        Self {
            sections: iter.into_iter().collect(),
        }
    }
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a section.
    pub fn insert(&mut self, section: impl Into<String>, value: KbValue) {
        self.sections.insert(section.into(), value);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_section(mut self, section: impl Into<String>, value: KbValue) -> Self {
        self.insert(section, value);
        self
    }

    pub fn remove(&mut self, section: &str) -> Option<KbValue> {
        self.sections.remove(section)
    }

    pub fn get(&self, section: &str) -> Option<&KbValue> {
        self.sections.get(section)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&String, &KbValue)> {
        self.sections.iter()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(|s| s.as_str())
    }

    /// Map keys across all sections, paired with their section name.
    pub fn keys(&self) -> Vec<(&str, &str)> {
        self.sections
            .iter()
            .filter_map(|(section, value)| match value {
                KbValue::Map(entries) => Some(
                    entries
                        .keys()
                        .map(move |k| (section.as_str(), k.as_str()))
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// True when no section holds any entry.
    pub fn is_empty(&self) -> bool {
        self.sections.values().all(|v| v.is_empty())
    }

    /// Total number of documents after flattening.
    pub fn document_count(&self) -> usize {
        self.sections.values().map(|v| v.len()).sum()
    }

    /// Flatten every section into documents, in section order then entry order.
    pub fn flatten(&self) -> Vec<Document> {
        let mut documents = Vec::with_capacity(self.document_count());
        for (section, value) in &self.sections {
            match value {
                KbValue::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        documents.push(Document {
                            id: format!("{}.{}", section, i),
                            section: section.clone(),
                            key: Some(i.to_string()),
                            text: item.clone(),
                        });
                    }
                }
                KbValue::Map(entries) => {
                    for (key, text) in entries {
                        documents.push(Document {
                            id: format!("{}.{}", section, key),
                            section: section.clone(),
                            key: Some(key.clone()),
                            text: text.clone(),
                        });
                    }
                }
                KbValue::Text(text) => documents.push(Document {
                    id: section.clone(),
                    section: section.clone(),
                    key: None,
                    text: text.clone(),
                }),
            }
        }
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> KnowledgeBase {
        KnowledgeBase::new()
            .with_section(
                "AI",
                KbValue::Map(BTreeMap::from([(
                    "concept1".to_string(),
                    "Kecerdasan buatan adalah simulasi kecerdasan manusia".to_string(),
                )])),
            )
            .with_section(
                "faq",
                KbValue::List(vec!["First answer".into(), "Second answer".into()]),
            )
            .with_section("motto", KbValue::Text("Help first".into()))
    }

    #[test]
    fn test_flatten_ids_and_order() {
        let ids: Vec<String> = sample().flatten().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["AI.concept1", "faq.0", "faq.1", "motto"]);
    }

    #[test]
    fn test_document_count_matches_flatten() {
        let kb = sample();
        assert_eq!(kb.document_count(), kb.flatten().len());
    }

    #[test]
    fn test_deserialize_stringifies_records() {
        let json = serde_json::json!({
            "products": [{"name": "Widget", "price": 10}, "Plain entry"],
            "contact": {"email": "help@example.com", "hours": ["9-17", "Mon-Fri"]},
            "version": 3
        });
        let kb: KnowledgeBase = serde_json::from_value(json).unwrap();

        assert_eq!(
            kb.get("products"),
            Some(&KbValue::List(vec![
                "name: Widget; price: 10".to_string(),
                "Plain entry".to_string()
            ]))
        );
        match kb.get("contact") {
            Some(KbValue::Map(entries)) => {
                assert_eq!(entries["hours"], "9-17, Mon-Fri");
            }
            other => panic!("expected map, got {:?}", other),
        }
        assert_eq!(kb.get("version"), Some(&KbValue::Text("3".to_string())));
    }

    #[test]
    fn test_empty_sections_count_as_empty() {
        let kb = KnowledgeBase::new().with_section("empty", KbValue::List(vec![]));
        assert!(kb.is_empty());
        assert!(kb.flatten().is_empty());
    }

    #[test]
    fn test_keys_lists_map_entries_only() {
        let kb = sample();
        assert_eq!(kb.keys(), vec![("AI", "concept1")]);
    }
}
