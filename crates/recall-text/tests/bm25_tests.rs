use recall_text::{stem, Bm25Index, Bm25Params};

fn pets_corpus() -> Bm25Index {
    Bm25Index::fitted(
        Bm25Params::default(),
        &["the cat sat on the mat", "dogs are great pets", "cats and dogs can be friends"],
    )
}

#[test]
fn cat_query_ranks_exact_then_plural_then_unrelated() {
    let index = pets_corpus();
    let ranked: Vec<usize> = index.search("cat", 3).into_iter().map(|(i, _)| i).collect();
    assert_eq!(ranked, vec![0, 2, 1]);
    assert!(index.score("cat", 0) > 0.0);
    assert!(index.score("cat", 2) > 0.0);
    assert_eq!(index.score("cat", 1), 0.0, "document 1 has no query term");
}

#[test]
fn search_respects_top_k_and_orders_scores() {
    let index = pets_corpus();
    for k in 0..5 {
        let hits = index.search("dogs cats pets", k);
        assert!(hits.len() <= k);
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1), "non-increasing scores: {hits:?}");
    }
}

#[test]
fn ties_keep_corpus_order() {
    let index = Bm25Index::fitted(Bm25Params::default(), &["alpha beta", "gamma delta", "alpha beta"]);
    let hits = index.search("alpha", 3);
    assert_eq!(hits[0].0, 0);
    assert_eq!(hits[1].0, 2);
    assert!((hits[0].1 - hits[1].1).abs() < 1e-12);
}

#[test]
fn empty_corpus_and_empty_query_never_fail() {
    let empty = Bm25Index::fitted::<&str>(Bm25Params::default(), &[]);
    assert!(empty.search("anything", 10).is_empty());
    assert_eq!(empty.avg_doc_length(), 0.0);
    assert_eq!(empty.doc_freq("anything"), 0);
    assert_eq!(empty.score("anything", 0), 0.0);

    let index = pets_corpus();
    let hits = index.search("", 10);
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|(_, s)| *s == 0.0));
    assert!(index.search("!!!", 2).iter().all(|(_, s)| *s == 0.0));
}

#[test]
fn idf_is_non_negative_and_strictly_decreasing() {
    let docs: Vec<String> = (0..10).map(|i| format!("doc number {i}")).collect();
    let index = Bm25Index::fitted(Bm25Params::default(), &docs);
    let mut prev = f64::INFINITY;
    for df in 0..=10 {
        let idf = index.idf_for_df(df);
        assert!(idf.is_finite() && idf >= 0.0, "idf({df}) = {idf}");
        assert!(idf < prev, "idf must decrease: df={df}");
        prev = idf;
    }
    assert_eq!(index.doc_freq("number"), 10);
    assert!(index.idf("number") < index.idf("unseen"));
}

#[test]
fn refit_replaces_statistics() {
    let mut index = pets_corpus();
    index.fit(&["solo document"]);
    assert_eq!(index.len(), 1);
    assert_eq!(index.doc_freq("cat"), 0);
    assert_eq!(index.avg_doc_length(), 2.0);
}

#[test]
fn term_counted_once_per_document() {
    let index = Bm25Index::fitted(Bm25Params::default(), &["error error error", "no match here"]);
    assert_eq!(index.doc_freq("error"), 1);
    assert_eq!(index.doc_length(0), Some(3));
}

#[test]
fn stemming_can_be_disabled() {
    let params = Bm25Params { stem: false, ..Bm25Params::default() };
    let index = Bm25Index::fitted(params, &["the cat sat on the mat", "cats and dogs can be friends"]);
    assert_eq!(index.score("cat", 1), 0.0);
}

#[test]
fn snowball_stems_inflections_but_keeps_invariant_words() {
    assert_eq!(stem("cats"), "cat");
    assert_eq!(stem("entries"), stem("entry"));
    assert_eq!(stem("news"), "news");
    assert_eq!(stem("bias"), "bias");
    assert_eq!(stem("status"), "status");
    assert_eq!(stem("process"), "process");
}

#[test]
fn stemming_does_not_conflate_news_with_new() {
    let index = Bm25Index::fitted(Bm25Params::default(), &["breaking news today", "a new release shipped"]);
    assert_eq!(index.score("new", 0), 0.0);
    assert!(index.score("new", 1) > 0.0);
    assert!(index.score("entry", 0) == 0.0);
    let entries = Bm25Index::fitted(Bm25Params::default(), &["duplicate entries in the log"]);
    assert!(entries.score("entry", 0) > 0.0);
}
