//! BM25-only ranking with a curated keyword boost, used when no embedding
//! model or vector store is available.
use anyhow::Result;
use recall_core::tokenize;
use recall_core::types::{Document, QueryResult};
use recall_text::{Bm25Index, Bm25Params};
use serde::{Deserialize, Serialize};

use crate::backend::{sort_and_truncate, Collection, RankingBackend};
use crate::fusion::FusionConfig;

/// `boost` config section: additive bonus when both query and document
/// mention one of `terms`.
///
/// A term with several words matches consecutive tokens; a trailing `*`
/// matches any token starting with the last word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordBoost {
    pub bonus: f64,
    pub terms: Vec<String>,
}

impl Default for KeywordBoost {
    fn default() -> Self {
        let terms = ["lie", "lies", "lying", "lied", "dishonest", "false promise", "made up", "hallucinat*"];
        Self { bonus: 0.15, terms: terms.iter().map(|t| t.to_string()).collect() }
    }
}

impl KeywordBoost {
    pub fn disabled() -> Self {
        Self { bonus: 0.0, terms: Vec::new() }
    }

    pub fn matches(&self, text: &str) -> bool {
        let tokens = tokenize(text);
        self.terms.iter().any(|term| term_matches(term, &tokens))
    }

    /// Bonus earned by `doc_text` for a query whose match result is `query_matches`.
    pub fn bonus_for(&self, query_matches: bool, doc_text: &str) -> f64 {
        if query_matches && self.bonus != 0.0 && self.matches(doc_text) { self.bonus } else { 0.0 }
    }
}

fn term_matches(term: &str, tokens: &[String]) -> bool {
    let term = term.trim();
    let (body, prefix) = match term.strip_suffix('*') {
        Some(body) => (body, true),
        None => (term, false),
    };
    let words = tokenize(body);
    let Some((last, head)) = words.split_last() else { return false };
    tokens.windows(words.len()).any(|window| {
        let (w_last, w_head) = (&window[head.len()], &window[..head.len()]);
        w_head == head && if prefix { w_last.starts_with(last.as_str()) } else { w_last == last }
    })
}

#[derive(Debug, Clone, Default)]
pub struct LexicalOnlyBackend {
    config: FusionConfig,
    bm25: Bm25Params,
    boost: KeywordBoost,
}

impl LexicalOnlyBackend {
    pub fn new(config: FusionConfig, bm25: Bm25Params, boost: KeywordBoost) -> Self {
        Self { config, bm25, boost }
    }
}

impl RankingBackend for LexicalOnlyBackend {
    fn name(&self) -> &'static str { "lexical" }

    /// BM25 is fitted jointly over every collection, so scores are comparable
    /// across tables.
    fn rank(&mut self, query: &str, collections: &[Collection<'_>], n_results: usize) -> Result<Vec<QueryResult>> {
        let docs: Vec<(&str, &Document)> = collections.iter().flat_map(|(table, docs)| docs.iter().map(move |d| (*table, d))).collect();
        if docs.is_empty() || n_results == 0 {
            return Ok(Vec::new());
        }
        let index = Bm25Index::fitted(self.bm25, &docs.iter().map(|(_, d)| d.text.as_str()).collect::<Vec<_>>());
        let query_boosted = self.boost.matches(query);

        let mut results = Vec::new();
        for (i, raw) in index.search(query, self.config.candidates(n_results)) {
            let (table, doc) = docs[i];
            let score = raw * doc.weight + self.boost.bonus_for(query_boosted, &doc.text);
            if score <= 0.0 { continue; }
            results.push(QueryResult::from_document(table, doc, score, self.config.preview_chars).with_bm25(raw));
        }
        sort_and_truncate(&mut results, n_results);
        Ok(results)
    }
}
