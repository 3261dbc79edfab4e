/// Split `text` into lowercase alphanumeric tokens.
///
/// Any run of non-alphanumeric characters is a separator, so empty or
/// punctuation-only input yields no tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
