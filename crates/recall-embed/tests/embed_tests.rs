use recall_core::config::MemoryLayout;
use recall_core::traits::Embedder;
use recall_core::Error;
use recall_embed::{load_embedder, EmbeddingSettings, HashingEmbedder, ModelSpec};
use tempfile::TempDir;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn hashing_embedder_is_normalized_and_deterministic() {
    let embedder = HashingEmbedder::new(384);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 384);
    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "norm={norm}");
    for (a, b) in embs[0].iter().zip(&embs[1]) { assert!((a - b).abs() <= 1e-6); }
    assert_eq!(embedder.model_id(), "hash:xxh64:d384");
}

#[test]
fn hashing_embedder_places_overlapping_texts_closer() {
    let embedder = HashingEmbedder::new(384);
    let q = embedder.embed("spread math totals").unwrap();
    let near = embedder.embed("the spread math was wrong").unwrap();
    let far = embedder.embed("unrelated gardening notes").unwrap();
    assert!(cosine(&q, &near) > cosine(&q, &far));
    assert!(embedder.embed("").unwrap().iter().all(|x| *x == 0.0));
}

#[test]
fn model_aliases_resolve() {
    assert_eq!(ModelSpec::resolve("fast").map(|m| m.name), Some("all-MiniLM-L6-v2"));
    assert_eq!(ModelSpec::resolve("BETTER").map(|m| m.name), Some("e5-small-v2"));
    assert_eq!(ModelSpec::resolve("all-minilm-l6-v2").map(|m| m.dim), Some(384));
    assert!(ModelSpec::resolve("huge").is_none());
}

#[test]
fn probe_reports_missing_model_as_missing_dependency() {
    let tmp = TempDir::new().unwrap();
    let layout = MemoryLayout::new(tmp.path());
    let err = load_embedder(&EmbeddingSettings::default(), &layout).err().expect("no model on disk");
    assert!(matches!(err, Error::MissingDependency(_)), "{err}");
    assert!(err.is_degradable());
}

#[test]
fn probe_rejects_unknown_model_alias() {
    let tmp = TempDir::new().unwrap();
    let settings = EmbeddingSettings { model: "huge".into(), ..EmbeddingSettings::default() };
    let err = load_embedder(&settings, &MemoryLayout::new(tmp.path())).err().expect("invalid");
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn probe_returns_hashing_embedder_when_fake_requested() {
    let tmp = TempDir::new().unwrap();
    let settings = EmbeddingSettings { use_fake: true, ..EmbeddingSettings::default() };
    let embedder = load_embedder(&settings, &MemoryLayout::new(tmp.path())).expect("fake embedder");
    assert_eq!(embedder.dim(), 384);
    assert!(embedder.model_id().starts_with("hash:"));
}
