use rust_stemmers::{Algorithm, Stemmer};

/// English Snowball stems for already-tokenized text, so "cats" matches "cat".
pub fn stem_terms(tokens: Vec<String>) -> Vec<String> {
    let stemmer = Stemmer::create(Algorithm::English);
    tokens.into_iter().map(|t| stemmer.stem(&t).into_owned()).collect()
}

/// Stem a single lowercase token.
pub fn stem(token: &str) -> String {
    Stemmer::create(Algorithm::English).stem(token).into_owned()
}
