//! Normalization of heterogeneous memory records into [`Document`]s.
//!
//! Four source shapes are understood: JSONL feedback entries, the hook queue
//! of pending negative signals, JSON lesson files and markdown lesson notes
//! split on `## ` headings. Records that cannot be read are skipped, never
//! fatal.
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::MemoryLayout;
use crate::error::Result;
use crate::types::{Document, DocumentKind, DocumentSource, FEEDBACK_COLLECTION, LESSONS_COLLECTION};

const HIGH_WEIGHT: f64 = 1.2;
const SECTION_WEIGHT: f64 = 0.7;
const HOOK_QUEUE_WEIGHT: f64 = 0.6;

/// A snapshot of every indexable document, grouped by collection.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub feedback: Vec<Document>,
    pub lessons: Vec<Document>,
}

impl Corpus {
    pub fn new(feedback: Vec<Document>, lessons: Vec<Document>) -> Self {
        let mut corpus = Self { feedback: normalize(feedback), lessons: normalize(lessons) };
        sort_by_recency(&mut corpus.feedback);
        sort_by_recency(&mut corpus.lessons);
        corpus
    }

    /// Read every source under `layout`. Missing files contribute nothing.
    pub fn load(layout: &MemoryLayout) -> Result<Self> {
        let mut feedback = load_jsonl(&layout.feedback_log(), feedback_from_json)?;
        feedback.extend(load_jsonl(&layout.hook_queue(), hook_queue_from_json)?);
        let mut lessons = load_lessons_dir(&layout.lessons_dir())?;
        let md = layout.lessons_markdown();
        if md.exists() {
            lessons.extend(split_markdown_sections(&read_lossy(&md)?));
        }
        let corpus = Self::new(feedback, lessons);
        tracing::info!(feedback = corpus.feedback.len(), lessons = corpus.lessons.len(), "corpus loaded");
        Ok(corpus)
    }

    pub fn collections(&self) -> [(&'static str, &[Document]); 2] {
        [(FEEDBACK_COLLECTION, self.feedback.as_slice()), (LESSONS_COLLECTION, self.lessons.as_slice())]
    }

    pub fn len(&self) -> usize { self.feedback.len() + self.lessons.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Drop empty-text documents and duplicate ids, and reset unusable weights.
pub fn normalize(docs: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        if doc.text.trim().is_empty() {
            tracing::debug!(id = %doc.id, "dropping empty document");
            continue;
        }
        if !seen.insert(doc.id.clone()) {
            tracing::warn!(id = %doc.id, "duplicate document id, keeping first");
            continue;
        }
        if !doc.weight.is_finite() || doc.weight <= 0.0 {
            doc.weight = 1.0;
        }
        out.push(doc);
    }
    out
}

/// Newest first; undated documents keep their relative order at the end.
pub fn sort_by_recency(docs: &mut [Document]) {
    docs.sort_by(|a, b| match (a.timestamp.is_empty(), b.timestamp.is_empty()) {
        (false, false) => b.timestamp.cmp(&a.timestamp),
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (true, true) => std::cmp::Ordering::Equal,
    });
}

/// Read a JSONL file, turning each record into at most one document.
/// `parse` receives the record and the number of documents kept so far.
pub fn load_jsonl(path: &Path, parse: fn(&Value, usize) -> Option<Document>) -> Result<Vec<Document>> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let mut docs = Vec::new();
    for (line_no, line) in read_lossy(path)?.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                if let Some(doc) = parse(&value, docs.len()) {
                    docs.push(doc);
                }
            }
            Err(e) => tracing::debug!(line = line_no + 1, error = %e, "skipping malformed feedback record"),
        }
    }
    Ok(docs)
}

/// Normalize one feedback record; `ordinal` numbers records without an id.
/// Records whose context is a serialized hook event are dropped.
pub fn feedback_from_json(value: &Value, ordinal: usize) -> Option<Document> {
    let obj = value.as_object()?;
    let signal = str_field(value, "feedback").or_else(|| str_field(value, "signal"));
    let context = extract_human_context(obj.get("context"));
    if looks_like_machine_context(&context) {
        tracing::debug!(ordinal, "skipping feedback with machine-generated context");
        return None;
    }
    let tags = string_list(obj.get("tags"));
    let action = str_field(value, "actionType");

    let text = format!(
        "Feedback: {}\nContext: {}\nTags: {}\nAction: {}",
        signal.as_deref().unwrap_or("unknown"),
        context,
        tags.join(", "),
        action.as_deref().unwrap_or("unknown"),
    );
    let id = id_field(value).unwrap_or_else(|| format!("fb_{ordinal}"));
    let reward = obj.get("reward").and_then(number_like);

    let mut doc = Document::new(id, DocumentKind::Feedback, text)
        .with_tags(tags)
        .with_timestamp(str_field(value, "timestamp").unwrap_or_default())
        .with_source(DocumentSource::Feedback { signal, reward, action });
    if !context.is_empty() {
        doc = doc.with_title(context.chars().take(50).collect::<String>());
    }
    Some(doc)
}

/// Normalize one hook-queue entry. Only negative signals with a human
/// context are kept; they carry less weight than explicit feedback.
pub fn hook_queue_from_json(value: &Value, ordinal: usize) -> Option<Document> {
    let signal = str_field(value, "signal")?;
    if !signal.eq_ignore_ascii_case("negative") {
        return None;
    }
    let context = extract_human_context(value.get("context"));
    if context.is_empty() || looks_like_machine_context(&context) {
        return None;
    }
    let tags: Vec<String> = str_field(value, "domain")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .into_iter()
        .collect();
    let text = format!("Feedback: {signal}\nContext: {context}\nTags: {}\nAction: unknown", tags.join(", "));

    Some(
        Document::new(format!("pending_{ordinal}"), DocumentKind::Feedback, text)
            .with_title(context.chars().take(50).collect::<String>())
            .with_tags(tags)
            .with_timestamp(str_field(value, "timestamp").unwrap_or_default())
            .with_weight(HOOK_QUEUE_WEIGHT)
            .with_source(DocumentSource::Feedback { signal: Some(signal), reward: None, action: None }),
    )
}

/// Serialized hook metadata (transcript paths, session ids next to a cwd or
/// hook event name) rather than text a person wrote.
pub fn looks_like_machine_context(context: &str) -> bool {
    let t = context.trim();
    if t.contains("transcript_path") {
        return true;
    }
    t.starts_with('{')
        && (t.contains("session_id") || t.contains("sessionId"))
        && (t.contains("cwd") || t.contains("hook_event") || t.contains("hookEvent"))
}

pub fn load_lessons_dir(dir: &Path) -> Result<Vec<Document>> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();

    let mut docs = Vec::new();
    for path in files {
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let parsed = fs::read_to_string(&path)
            .map_err(crate::error::Error::from)
            .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(Into::into));
        match parsed {
            Ok(value) => {
                if let Some(doc) = lesson_from_json(&value, &stem) {
                    docs.push(doc);
                }
            }
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable lesson"),
        }
    }
    Ok(docs)
}

/// Normalize one lesson file; `fallback_id` is used when the record has no id.
pub fn lesson_from_json(value: &Value, fallback_id: &str) -> Option<Document> {
    let obj = value.as_object()?;
    let title = str_field(value, "title").unwrap_or_else(|| "Unknown".to_string());
    let severity = str_field(value, "severity").unwrap_or_else(|| "medium".to_string());
    let text = format!(
        "Title: {}\nWhat went wrong: {}\nPrevention: {}\nSeverity: {}",
        title,
        str_field(value, "whatWentWrong").unwrap_or_default(),
        str_field(value, "prevention").unwrap_or_default(),
        severity,
    );
    let weight = if is_high_severity(&severity) { HIGH_WEIGHT } else { 1.0 };
    let domain = str_field(value, "domain");

    Some(
        Document::new(id_field(value).unwrap_or_else(|| fallback_id.to_string()), DocumentKind::Lesson, text)
            .with_title(title)
            .with_tags(string_list(obj.get("tags")))
            .with_timestamp(str_field(value, "createdAt").unwrap_or_default())
            .with_weight(weight)
            .with_source(DocumentSource::Lesson { severity: Some(severity), domain }),
    )
}

/// Split markdown into `## ` sections. Text before the first heading belongs
/// to a "Lessons Learned" section; empty sections are skipped.
pub fn split_markdown_sections(markdown: &str) -> Vec<Document> {
    let mut chunks: Vec<(String, String)> = Vec::new();
    let mut title = "Lessons Learned".to_string();
    let mut buf: Vec<&str> = Vec::new();
    for line in markdown.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if !buf.is_empty() {
                chunks.push((title, buf.join("\n").trim().to_string()));
            }
            title = heading.trim().to_string();
            buf.clear();
        } else {
            buf.push(line);
        }
    }
    if !buf.is_empty() {
        chunks.push((title, buf.join("\n").trim().to_string()));
    }

    chunks
        .into_iter()
        .enumerate()
        .filter(|(_, (_, body))| !body.is_empty())
        .map(|(i, (heading, body))| {
            let weight = if is_high_severity(&heading) { HIGH_WEIGHT } else { SECTION_WEIGHT };
            Document::new(format!("lesson_{i}"), DocumentKind::Lesson, format!("{heading}\n{body}"))
                .with_title(heading.clone())
                .with_weight(weight)
                .with_source(DocumentSource::Section { heading })
        })
        .collect()
}

fn is_high_severity(label: &str) -> bool {
    let l = label.to_lowercase();
    l.contains("critical") || l.contains("high")
}

/// Hook instrumentation sometimes stores the whole event as a JSON string;
/// keep only the human prompt in that case.
fn extract_human_context(raw: Option<&Value>) -> String {
    let s = match raw {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.trim(),
        Some(other) => return other.to_string(),
    };
    if s.starts_with('{')
        && (s.contains("prompt") || s.contains("transcript_path") || s.contains("session_id") || s.contains("sessionId"))
    {
        if let Ok(obj) = serde_json::from_str::<Value>(s) {
            if let Some(prompt) = obj.get("prompt").and_then(Value::as_str).map(str::trim).filter(|p| !p.is_empty()) {
                return prompt.to_string();
            }
        }
    }
    s.to_string()
}

fn id_field(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => vec![],
    }
}

fn number_like(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}
