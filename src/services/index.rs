//! TF-IDF knowledge index with cosine-ranked queries.
//!
//! The index is built in one pass over the flattened knowledge base and never
//! updated in place: a knowledge change means a full rebuild. [`IndexHandle`]
//! keeps the current index behind a lock and swaps in a replacement only once
//! it is completely built.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::knowledge::{Document, KnowledgeBase};
use crate::utils::math::{cosine_with_magnitudes, magnitude, SparseVector};
use crate::utils::text::{keywords, tokenize};
use crate::TanyaError;

/// Where a search hit came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitMeta {
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub text: String,
    pub meta: HitMeta,
}

impl SearchHit {
    fn from_document(doc: &Document, score: f64) -> Self {
        Self {
            id: doc.id.clone(),
            score,
            text: doc.text.clone(),
            meta: HitMeta {
                section: doc.section.clone(),
                key: doc.key.clone(),
            },
        }
    }
}

/// How a result set was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Cosine similarity over the TF-IDF index.
    Indexed,
    /// Substring containment over the raw knowledge base.
    Fallback,
}

/// Retrieval limits used when answering from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_n: usize,
    /// Hits scoring below this are ignored.
    pub min_score: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            min_score: 0.05,
        }
    }
}

/// Immutable TF-IDF index.
///
/// `documents`, `term_vectors` and `magnitudes` are parallel: entry `i` of
/// each describes the same document.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    documents: Vec<Document>,
    term_vectors: Vec<SparseVector>,
    idf: HashMap<String, f64>,
    magnitudes: Vec<f64>,
}

impl KnowledgeIndex {
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Inverse document frequency of a term, if it was seen at build time.
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// TF-IDF vector for arbitrary text using this index's idf table.
    /// Terms unseen at build time get no weight.
    fn vectorize(&self, text: &str) -> SparseVector {
        let tokens = tokenize(text);
        term_frequencies(&tokens)
            .into_iter()
            .filter_map(|(term, tf)| self.idf.get(&term).map(|idf| (term, tf * idf)))
            .collect()
    }
}

/// Raw count divided by document length.
fn term_frequencies(tokens: &[String]) -> SparseVector {
    let mut counts = SparseVector::new();
    if tokens.is_empty() {
        return counts;
    }
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0.0) += 1.0;
    }
    let len = tokens.len() as f64;
    for value in counts.values_mut() {
        *value /= len;
    }
    counts
}

/// Build a TF-IDF index over every document of the knowledge base.
///
/// `idf[t] = ln(1 + N / df[t])`. An empty knowledge base yields an empty index.
pub fn build_index(kb: &KnowledgeBase) -> KnowledgeIndex {
    let documents = kb.flatten();
    let n = documents.len() as f64;

    let token_lists: Vec<Vec<String>> = documents.iter().map(|d| tokenize(&d.text)).collect();

    let mut df: HashMap<String, usize> = HashMap::new();
    for tokens in &token_lists {
        let mut seen: Vec<&String> = tokens.iter().collect();
        seen.sort();
        seen.dedup();
        for term in seen {
            *df.entry(term.clone()).or_insert(0) += 1;
        }
    }

    let idf: HashMap<String, f64> = df
        .into_iter()
        .map(|(term, count)| (term, (1.0 + n / count as f64).ln()))
        .collect();

    let term_vectors: Vec<SparseVector> = token_lists
        .iter()
        .map(|tokens| {
            term_frequencies(tokens)
                .into_iter()
                .map(|(term, tf)| {
                    let weight = tf * idf.get(&term).copied().unwrap_or(0.0);
                    (term, weight)
                })
                .collect()
        })
        .collect();

    let magnitudes = term_vectors.iter().map(magnitude).collect();

    info!(
        documents = documents.len(),
        terms = idf.len(),
        "Knowledge index built"
    );

    KnowledgeIndex {
        documents,
        term_vectors,
        idf,
        magnitudes,
    }
}

/// Build an index, failing when the knowledge base has nothing to index.
pub fn try_build(kb: &KnowledgeBase) -> Result<KnowledgeIndex, TanyaError> {
    let index = build_index(kb);
    if index.vocabulary_size() == 0 {
        return Err(TanyaError::KnowledgeBase(
            "knowledge base has no indexable terms".into(),
        ));
    }
    Ok(index)
}

/// Top `top_n` documents by cosine similarity to the query.
///
/// Only documents with a positive score are returned. Ties keep document
/// order.
pub fn search(index: &KnowledgeIndex, query: &str, top_n: usize) -> Vec<SearchHit> {
    let query_vector = index.vectorize(query);
    let query_magnitude = magnitude(&query_vector);
    if query_magnitude == 0.0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f64)> = index
        .term_vectors
        .iter()
        .zip(&index.magnitudes)
        .enumerate()
        .map(|(i, (vector, mag))| {
            (
                i,
                cosine_with_magnitudes(&query_vector, vector, query_magnitude, *mag),
            )
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_n);

    debug!(query, hits = scored.len(), "Index search");

    scored
        .into_iter()
        .map(|(i, score)| SearchHit::from_document(&index.documents[i], score))
        .collect()
}

/// Degraded search by substring containment over the raw knowledge base.
///
/// A document containing the whole query scores 1.0; otherwise the score is
/// the fraction of query keywords it contains.
pub fn fallback_search(kb: &KnowledgeBase, query: &str, top_n: usize) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut terms = keywords(query, 3);
    if terms.is_empty() {
        terms = tokenize(query);
    }

    let mut scored: Vec<(Document, f64)> = kb
        .flatten()
        .into_iter()
        .filter_map(|doc| {
            let haystack = doc.text.to_lowercase();
            let score = if haystack.contains(&needle) {
                1.0
            } else if terms.is_empty() {
                0.0
            } else {
                let found = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                found as f64 / terms.len() as f64
            };
            (score > 0.0).then_some((doc, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_n);

    scored
        .iter()
        .map(|(doc, score)| SearchHit::from_document(doc, *score))
        .collect()
}

/// Search with the index when there is one, otherwise degrade to substring
/// containment over the raw knowledge base.
pub fn search_or_fallback(
    index: Option<&KnowledgeIndex>,
    kb: &KnowledgeBase,
    query: &str,
    top_n: usize,
) -> (Vec<SearchHit>, SearchMode) {
    match index {
        Some(index) => (search(index, query, top_n), SearchMode::Indexed),
        None => {
            warn!("Knowledge index unavailable, using substring fallback search");
            (fallback_search(kb, query, top_n), SearchMode::Fallback)
        }
    }
}

/// Shared slot holding the current index.
///
/// Rebuilds happen outside the lock; the finished index is swapped in with a
/// single write, so readers see either the old index or the new one.
#[derive(Debug, Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<KnowledgeIndex>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial index. An unindexable knowledge base leaves the slot
    /// empty so callers degrade to fallback search.
    pub fn from_knowledge(kb: &KnowledgeBase) -> Self {
        let handle = Self::new();
        if let Err(e) = handle.rebuild(kb) {
            warn!("Initial index build failed: {}", e);
        }
        handle
    }

    pub fn current(&self) -> Option<Arc<KnowledgeIndex>> {
        self.current.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Rebuild from the knowledge base and swap it in. On failure the previous
    /// index stays in place.
    pub fn rebuild(&self, kb: &KnowledgeBase) -> Result<Arc<KnowledgeIndex>, TanyaError> {
        let index = Arc::new(try_build(kb)?);
        *self.current.write() = Some(Arc::clone(&index));
        Ok(index)
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }
}
