//! In-process fakes for the collaborator traits, used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Notify;

use curator_shared::{
    CuratorError, CuratorStore, ExtractionService, Paper, Result, SearchService, Topic, TopicId,
};

pub(crate) fn paper(id: &str, topic_id: &str, date: &str, score: u8) -> Paper {
    Paper {
        id: id.into(),
        topic_id: TopicId::from(topic_id),
        title: format!("Paper {id}"),
        authors: vec!["A. Author".into()],
        published_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("test date"),
        url: format!("https://arxiv.org/abs/{id}"),
        summary: "summary".into(),
        r#abstract: "abstract".into(),
        abstract_ja: None,
        engagement_score: score,
        engagement_reason: String::new(),
        impact_badge: Some("New Arrival".into()),
        citation_count: Some("0".into()),
        web_mention_count: Some("N/A".into()),
        image_url: None,
    }
}

pub(crate) fn topic(id: &str, title: &str) -> Topic {
    Topic {
        id: TopicId::from(id),
        title: title.into(),
        search_prompt: format!("latest work on {title}"),
        last_updated: None,
    }
}

/// JSON payload for one valid extraction element.
pub(crate) fn element(url: &str, date: &str, score: u32) -> serde_json::Value {
    serde_json::json!({
        "title": format!("Title for {url}"),
        "authors": ["A. Author"],
        "publishedDate": date,
        "url": url,
        "summary": "s",
        "abstract": "a",
        "abstractJa": "あ",
        "engagementScore": score,
        "citationCount": "1",
        "webMentionCount": "Academic only"
    })
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

pub(crate) struct FakeSearch {
    /// `None` echoes the prompt back as the search report.
    text: Option<String>,
    failing: AtomicBool,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl FakeSearch {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.into()),
            failing: AtomicBool::new(false),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reports the prompt it was given, so each topic gets its own report.
    pub fn echoing() -> Self {
        Self {
            text: None,
            ..Self::returning("")
        }
    }

    pub fn failing() -> Self {
        let search = Self::returning("");
        search.set_failing(true);
        search
    }

    /// Blocks inside `search` until the returned gate is notified.
    pub fn gated(text: &str) -> (Self, Arc<Notify>) {
        Self::returning(text).with_gate()
    }

    pub fn with_gate(self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let search = Self {
            gate: Some(gate.clone()),
            ..self
        };
        (search, gate)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchService for FakeSearch {
    async fn search(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CuratorError::Network("search unavailable".into()));
        }
        Ok(self.text.clone().unwrap_or_else(|| prompt.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

pub(crate) struct FakeExtractor {
    /// First route whose needle occurs in the instructions wins. No match
    /// means the service produced nothing.
    routes: Vec<(String, String)>,
    failing: bool,
    last_instructions: Mutex<String>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            routes: vec![(String::new(), payload.into())],
            ..Self::empty()
        }
    }

    pub fn with_elements(elements: Vec<serde_json::Value>) -> Self {
        Self::with_payload(serde_json::Value::Array(elements).to_string())
    }

    /// Answer with a different batch depending on what the instructions mention.
    pub fn routed(routes: Vec<(&str, Vec<serde_json::Value>)>) -> Self {
        Self {
            routes: routes
                .into_iter()
                .map(|(needle, elements)| {
                    (needle.to_string(), serde_json::Value::Array(elements).to_string())
                })
                .collect(),
            ..Self::empty()
        }
    }

    pub fn empty() -> Self {
        Self {
            routes: Vec::new(),
            failing: false,
            last_instructions: Mutex::new(String::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::empty()
        }
    }

    pub fn last_instructions(&self) -> String {
        self.last_instructions.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionService for FakeExtractor {
    async fn extract(
        &self,
        instructions: &str,
        _response_schema: &serde_json::Value,
    ) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_instructions.lock().unwrap() = instructions.to_string();
        if self.failing {
            return Err(CuratorError::Network("extraction unavailable".into()));
        }
        Ok(self
            .routes
            .iter()
            .find(|(needle, _)| instructions.contains(needle.as_str()))
            .map(|(_, payload)| payload.clone()))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MemoryStore {
    topics: Mutex<Vec<Topic>>,
    papers: Mutex<Vec<Paper>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn with(topics: Vec<Topic>, papers: Vec<Paper>) -> Self {
        Self {
            topics: Mutex::new(topics),
            papers: Mutex::new(papers),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored_papers(&self) -> Vec<Paper> {
        self.papers.lock().unwrap().clone()
    }

    pub fn stored_topics(&self) -> Vec<Topic> {
        self.topics.lock().unwrap().clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CuratorError::Storage("disk full".into()));
        }
        Ok(())
    }
}

fn upsert<T: Clone>(items: &mut Vec<T>, item: &T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(slot) => *slot = item.clone(),
        None => items.push(item.clone()),
    }
}

#[async_trait]
impl CuratorStore for MemoryStore {
    async fn list_topics(&self) -> Result<Vec<Topic>> {
        Ok(self.stored_topics())
    }

    async fn put_topic(&self, topic: &Topic) -> Result<()> {
        self.put_topics(std::slice::from_ref(topic)).await
    }

    async fn put_topics(&self, topics: &[Topic]) -> Result<()> {
        self.check_writable()?;
        let mut stored = self.topics.lock().unwrap();
        for t in topics {
            upsert(&mut stored, t, |e| e.id == t.id);
        }
        Ok(())
    }

    async fn delete_topic(&self, id: &TopicId) -> Result<()> {
        self.check_writable()?;
        self.topics.lock().unwrap().retain(|t| &t.id != id);
        Ok(())
    }

    async fn list_papers(&self) -> Result<Vec<Paper>> {
        Ok(self.stored_papers())
    }

    async fn put_paper(&self, paper: &Paper) -> Result<()> {
        self.put_papers(std::slice::from_ref(paper)).await
    }

    async fn put_papers(&self, papers: &[Paper]) -> Result<()> {
        self.check_writable()?;
        let mut stored = self.papers.lock().unwrap();
        for p in papers {
            upsert(&mut stored, p, |e| e.id == p.id);
        }
        Ok(())
    }

    async fn delete_paper(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.papers.lock().unwrap().retain(|p| p.id != id);
        Ok(())
    }

    async fn delete_papers_for_topic(&self, topic_id: &TopicId) -> Result<u64> {
        self.check_writable()?;
        let mut stored = self.papers.lock().unwrap();
        let before = stored.len();
        stored.retain(|p| &p.topic_id != topic_id);
        Ok((before - stored.len()) as u64)
    }

    async fn put_topic_papers(
        &self,
        topic_id: &TopicId,
        papers: &[Paper],
        stamped_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_writable()?;
        let mut topics = self.topics.lock().unwrap();
        let Some(topic) = topics.iter_mut().find(|t| &t.id == topic_id) else {
            return Ok(false);
        };
        topic.last_updated = Some(stamped_at);
        let mut stored = self.papers.lock().unwrap();
        for p in papers {
            upsert(&mut stored, p, |e| e.id == p.id);
        }
        Ok(true)
    }
}
