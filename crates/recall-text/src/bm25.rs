use recall_core::tokenize;
use serde::Deserialize;
use std::collections::HashMap;

use crate::terms::{stem, stem_terms};

/// Okapi BM25 tuning (`bm25` config section).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    /// Snowball-stem both documents and queries.
    pub stem: bool,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75, stem: true }
    }
}

/// BM25 index over an ordered document set.
///
/// All statistics derive from the last `fit`; refitting replaces them
/// wholesale. Document indices are positions in the fitted sequence.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    params: Bm25Params,
    corpus: Vec<Vec<String>>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_freqs: HashMap<String, usize>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f64,
}

impl Bm25Index {
    pub fn new(params: Bm25Params) -> Self {
        Self { params, ..Default::default() }
    }

    /// Shorthand for `new(params)` followed by `fit(documents)`.
    pub fn fitted<S: AsRef<str>>(params: Bm25Params, documents: &[S]) -> Self {
        let mut index = Self::new(params);
        index.fit(documents);
        index
    }

    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) {
        self.corpus = documents.iter().map(|d| self.terms(d.as_ref())).collect();
        self.doc_lengths = self.corpus.iter().map(Vec::len).collect();
        self.avg_doc_length = if self.corpus.is_empty() {
            0.0
        } else {
            self.doc_lengths.iter().sum::<usize>() as f64 / self.corpus.len() as f64
        };

        self.term_freqs = Vec::with_capacity(self.corpus.len());
        self.doc_freqs = HashMap::new();
        for doc in &self.corpus {
            let mut tf: HashMap<String, u32> = HashMap::new();
            for term in doc {
                *tf.entry(term.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            self.term_freqs.push(tf);
        }
    }

    /// Query/document term normalization: tokenize, then optionally stem.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text);
        if self.params.stem { stem_terms(tokens) } else { tokens }
    }

    pub fn params(&self) -> Bm25Params { self.params }
    pub fn len(&self) -> usize { self.corpus.len() }
    pub fn is_empty(&self) -> bool { self.corpus.is_empty() }
    pub fn avg_doc_length(&self) -> f64 { self.avg_doc_length }
    pub fn doc_length(&self, doc_index: usize) -> Option<usize> { self.doc_lengths.get(doc_index).copied() }

    /// Number of fitted documents containing `term` (after normalization).
    pub fn doc_freq(&self, term: &str) -> usize {
        self.doc_freqs.get(&self.normalize_term(term)).copied().unwrap_or(0)
    }

    /// Smoothed inverse document frequency: `ln((N - df + 0.5) / (df + 0.5) + 1)`.
    pub fn idf(&self, term: &str) -> f64 {
        self.idf_for_df(self.doc_freq(term))
    }

    /// `idf` as a function of an explicit document frequency.
    pub fn idf_for_df(&self, df: usize) -> f64 {
        let n = self.corpus.len() as f64;
        let df = df as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    pub fn score(&self, query: &str, doc_index: usize) -> f64 {
        self.score_terms(&self.terms(query), doc_index)
    }

    fn score_terms(&self, query_terms: &[String], doc_index: usize) -> f64 {
        let (Some(tf), Some(&doc_len)) = (self.term_freqs.get(doc_index), self.doc_lengths.get(doc_index)) else {
            return 0.0;
        };
        if doc_len == 0 {
            return 0.0;
        }
        let length_ratio = if self.avg_doc_length > 0.0 { doc_len as f64 / self.avg_doc_length } else { 1.0 };
        let Bm25Params { k1, b, .. } = self.params;

        let mut score = 0.0;
        for term in query_terms {
            let Some(&f) = tf.get(term) else { continue };
            let f = f as f64;
            let idf = self.idf_for_df(self.doc_freqs.get(term).copied().unwrap_or(0));
            let denom = f + k1 * (1.0 - b + b * length_ratio);
            if denom > 0.0 {
                score += idf * f * (k1 + 1.0) / denom;
            }
        }
        score
    }

    /// Every document scored against `query`, best first, ties in corpus order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(usize, f64)> {
        let query_terms = self.terms(query);
        let mut scores: Vec<(usize, f64)> = (0..self.corpus.len()).map(|i| (i, self.score_terms(&query_terms, i))).collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores.truncate(top_k);
        scores
    }

    fn normalize_term(&self, term: &str) -> String {
        let lower = term.to_lowercase();
        if self.params.stem { stem(&lower) } else { lower }
    }
}
