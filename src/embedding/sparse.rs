//! Sparse lexical embedding (BM25-style term weighting).
//!
//! Documents and queries are mapped to sparse vectors entirely in-process:
//! tokens are hashed to stable `u32` indices and weighted with the BM25
//! term-frequency formula. The inverse-document-frequency component is
//! applied by the vector index at query time (the sparse field is created
//! with the IDF modifier), which keeps this embedder stateless — it needs
//! no corpus statistics and produces the same vector for the same text on
//! every call.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::models::SparseVector;

/// Named sparse vector field in the index.
pub const SPARSE_VECTOR_NAME: &str = "bm25";

/// BM25-style sparse embedder.
///
/// Stateless per call; safe to share across threads.
#[derive(Debug, Clone)]
pub struct Bm25Embedder {
    k1: f32,
    b: f32,
    avg_doc_len: f32,
}

impl Default for Bm25Embedder {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            avg_doc_len: 256.0,
        }
    }
}

impl Bm25Embedder {
    /// Embed a document: term weights follow the BM25 term-frequency
    /// saturation curve, normalized by document length.
    pub fn embed_document(&self, text: &str) -> SparseVector {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return SparseVector::default();
        }

        let doc_len = tokens.len() as f32;
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for token in &tokens {
            *counts.entry(token_index(token)).or_insert(0.0) += 1.0;
        }

        let norm = self.k1 * (1.0 - self.b + self.b * doc_len / self.avg_doc_len);
        let (indices, values) = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * (self.k1 + 1.0) / (tf + norm)))
            .unzip();

        SparseVector { indices, values }
    }

    /// Embed a query: weight 1.0 per distinct token.
    pub fn embed_query(&self, text: &str) -> SparseVector {
        let mut indices: Vec<u32> = tokenize(text).iter().map(|t| token_index(t)).collect();
        indices.sort_unstable();
        indices.dedup();
        let values = vec![1.0; indices.len()];
        SparseVector { indices, values }
    }

    /// Embed a batch of documents.
    pub fn embed_batch(&self, texts: &[String]) -> Vec<SparseVector> {
        texts.iter().map(|t| self.embed_document(t)).collect()
    }
}

/// Lowercase, Unicode-aware alphanumeric tokenization.
///
/// The same tokenizer runs on documents, queries, and the keyword-filter
/// terms so that all three agree on what a "term" is.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Map a token to a stable sparse index.
///
/// First four bytes of SHA-256, big-endian. Stable across processes and
/// releases, which is what keeps re-ingestion byte-identical.
fn token_index(token: &str) -> u32 {
    let digest = Sha256::digest(token.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
