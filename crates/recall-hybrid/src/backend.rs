use anyhow::Result;
use recall_core::types::{Document, QueryResult};
use recall_embed::CacheStats;

/// Named collection paired with its current document snapshot.
pub type Collection<'a> = (&'a str, &'a [Document]);

/// A ranking strategy chosen once, at construction, from the collaborators
/// that turned out to be available.
pub trait RankingBackend: Send {
    fn name(&self) -> &'static str;

    /// Up to `n_results` results across `collections`, best first.
    fn rank(&mut self, query: &str, collections: &[Collection<'_>], n_results: usize) -> Result<Vec<QueryResult>>;

    fn cache_stats(&self) -> Option<CacheStats> { None }
}

/// Stable descending sort on `combined_score`, then truncate.
pub(crate) fn sort_and_truncate(results: &mut Vec<QueryResult>, n_results: usize) {
    results.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    results.truncate(n_results);
}
