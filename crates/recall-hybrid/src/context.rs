//! Start-of-session digest: critical lessons, recent negative feedback, and
//! the reminders they imply.
use chrono::Utc;
use recall_core::corpus::Corpus;
use recall_core::types::{QueryResult, FEEDBACK_COLLECTION, LESSONS_COLLECTION};
use serde::Serialize;

use crate::engine::RetrievalEngine;

const LESSONS_QUERY: &str = "critical high severity error mistake";
const FEEDBACK_QUERY: &str = "negative thumbs down mistake error";
const CONTEXT_RESULTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct CriticalLesson {
    pub title: String,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NegativePattern {
    pub context: String,
    pub tags: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub timestamp: String,
    pub critical_lessons: Vec<CriticalLesson>,
    pub negative_patterns: Vec<NegativePattern>,
    pub recommendations: Vec<String>,
}

pub fn session_context(engine: &mut RetrievalEngine, corpus: &Corpus) -> SessionContext {
    let critical_lessons = engine
        .search(LESSONS_QUERY, &[(LESSONS_COLLECTION, corpus.lessons.as_slice())], CONTEXT_RESULTS)
        .iter()
        .filter_map(|r| {
            let severity = severity_of(r);
            matches!(severity.as_str(), "critical" | "high").then(|| CriticalLesson { title: r.title.clone(), severity })
        })
        .collect::<Vec<_>>();

    let negative_patterns = engine
        .search(FEEDBACK_QUERY, &[(FEEDBACK_COLLECTION, corpus.feedback.as_slice())], CONTEXT_RESULTS)
        .iter()
        .filter(|r| r.metadata.get("reward").and_then(|v| v.as_f64()).unwrap_or(0.0) < 0.0)
        .map(|r| NegativePattern {
            context: r.preview.chars().take(100).collect(),
            tags: r.metadata.get("tags").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        })
        .collect::<Vec<_>>();

    let recommendations = recommendations(&critical_lessons, &negative_patterns);
    SessionContext { timestamp: Utc::now().to_rfc3339(), critical_lessons, negative_patterns, recommendations }
}

/// Explicit severity, else one implied by a markdown heading, else "medium".
fn severity_of(result: &QueryResult) -> String {
    if let Some(s) = result.metadata.get("severity").and_then(|v| v.as_str()) {
        return s.to_lowercase();
    }
    let heading = result.metadata.get("heading").and_then(|v| v.as_str()).unwrap_or_default().to_lowercase();
    if heading.contains("critical") {
        "critical".into()
    } else if heading.contains("high") {
        "high".into()
    } else {
        "medium".into()
    }
}

fn recommendations(lessons: &[CriticalLesson], patterns: &[NegativePattern]) -> Vec<String> {
    let mut out = Vec::new();
    if !lessons.is_empty() {
        out.push("Review critical lessons before responding".to_string());
    }
    let tags = patterns.iter().map(|p| p.tags.as_str()).collect::<Vec<_>>().join(" ");
    for (needle, advice) in [
        ("spread", "Double-check spread calculations"),
        ("testing", "Remember to write tests (TDD)"),
        ("security", "Never commit tokens or secrets"),
    ] {
        if tags.contains(needle) {
            out.push(advice.to_string());
        }
    }
    out
}
