//! Domain types shared by the lexical and semantic rankers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub type DocumentId = String;
pub type Meta = BTreeMap<String, Value>;

/// Collection holding normalized feedback entries.
pub const FEEDBACK_COLLECTION: &str = "rlhf_feedback";
/// Collection holding lessons (JSON lesson files and markdown sections).
pub const LESSONS_COLLECTION: &str = "lessons_learned";

/// Provenance of a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Feedback,
    Lesson,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Lesson => "lesson",
        }
    }
}

/// Per-source fields that only some record shapes carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DocumentSource {
    Feedback {
        signal: Option<String>,
        reward: Option<f64>,
        action: Option<String>,
    },
    Lesson {
        severity: Option<String>,
        domain: Option<String>,
    },
    Section {
        heading: String,
    },
}

/// A normalized, indexable record.
///
/// - `id`: unique within a corpus snapshot
/// - `text`: payload used for both tokenization and embedding; never empty
///   once the corpus has been normalized
/// - `timestamp`: ISO-8601 or empty, used for recency ordering only
/// - `weight`: importance multiplier applied after raw scoring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub kind: DocumentKind,
    pub title: Option<String>,
    pub text: String,
    pub tags: BTreeSet<String>,
    pub timestamp: String,
    pub weight: f64,
    #[serde(flatten)]
    pub source: DocumentSource,
}

impl Document {
    pub fn new(id: impl Into<String>, kind: DocumentKind, text: impl Into<String>) -> Self {
        let source = match kind {
            DocumentKind::Feedback => DocumentSource::Feedback { signal: None, reward: None, action: None },
            DocumentKind::Lesson => DocumentSource::Lesson { severity: None, domain: None },
        };
        Self {
            id: id.into(),
            kind,
            title: None,
            text: text.into(),
            tags: BTreeSet::new(),
            timestamp: String::new(),
            weight: 1.0,
            source,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).filter(|t: &String| !t.is_empty()).collect();
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_source(mut self, source: DocumentSource) -> Self {
        self.source = source;
        self
    }

    /// Lesson severity, when the source carries one.
    pub fn severity(&self) -> Option<&str> {
        match &self.source {
            DocumentSource::Lesson { severity, .. } => severity.as_deref(),
            _ => None,
        }
    }

    /// Feedback reward, when the source carries one.
    pub fn reward(&self) -> Option<f64> {
        match &self.source {
            DocumentSource::Feedback { reward, .. } => *reward,
            _ => None,
        }
    }

    /// Metadata bag echoed back in query results.
    pub fn metadata(&self) -> Meta {
        let mut meta = Meta::new();
        meta.insert("tags".into(), Value::from(self.tags.iter().cloned().collect::<Vec<_>>().join(",")));
        meta.insert("weight".into(), Value::from(self.weight));
        match &self.source {
            DocumentSource::Feedback { signal, reward, action } => {
                if let Some(s) = signal { meta.insert("signal".into(), Value::from(s.clone())); }
                if let Some(r) = reward { meta.insert("reward".into(), Value::from(*r)); }
                if let Some(a) = action { meta.insert("action".into(), Value::from(a.clone())); }
            }
            DocumentSource::Lesson { severity, domain } => {
                if let Some(s) = severity { meta.insert("severity".into(), Value::from(s.clone())); }
                if let Some(d) = domain { meta.insert("domain".into(), Value::from(d.clone())); }
            }
            DocumentSource::Section { heading } => {
                meta.insert("heading".into(), Value::from(heading.clone()));
            }
        }
        meta
    }
}

/// Nearest-neighbour candidate returned by a vector store.
///
/// `distance` is store-specific but lower is always closer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorHit {
    pub document_id: DocumentId,
    pub distance: f64,
}

/// One ranked answer to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub document_id: DocumentId,
    pub table: String,
    pub kind: DocumentKind,
    pub title: String,
    pub combined_score: f64,
    pub distance: Option<f64>,
    pub bm25_component: Option<f64>,
    pub preview: String,
    pub metadata: Meta,
}

impl QueryResult {
    pub fn from_document(table: &str, doc: &Document, combined_score: f64, preview_chars: usize) -> Self {
        Self {
            document_id: doc.id.clone(),
            table: table.to_string(),
            kind: doc.kind,
            title: doc.title.clone().unwrap_or_else(|| preview(&doc.text, 50)),
            combined_score,
            distance: None,
            bm25_component: None,
            preview: preview(&doc.text, preview_chars),
            metadata: doc.metadata(),
        }
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_bm25(mut self, component: f64) -> Self {
        self.bm25_component = Some(component);
        self
    }
}

/// Whitespace-collapsed prefix of `text`, at most `max_chars` characters.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").chars().take(max_chars).collect()
}
