//! Contracts for the collaborators the curation pipeline depends on.
//!
//! The pipeline never talks to a concrete backend directly: the search and
//! extraction services, and the persistence substrate, are injected behind
//! these traits so the core can be exercised with in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Paper, Topic, TopicId};

/// Free-text search over the web. No structural contract on success beyond
/// "text describing candidate papers".
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, prompt: &str) -> Result<String>;
}

/// Text-to-structured-data extraction.
///
/// Returns the raw structured payload (JSON text) produced under
/// `response_schema`, or `None` when the service produced nothing. Decoding
/// the payload is the caller's job.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(
        &self,
        instructions: &str,
        response_schema: &serde_json::Value,
    ) -> Result<Option<String>>;
}

/// Keyed store per entity kind (topics, papers).
///
/// `put_*` operations are upserts keyed by id. `put_papers` / `put_topics`
/// must be atomic within their entity kind. No cross-entity transaction is
/// assumed.
#[async_trait]
pub trait CuratorStore: Send + Sync {
    async fn list_topics(&self) -> Result<Vec<Topic>>;
    async fn put_topic(&self, topic: &Topic) -> Result<()>;
    async fn put_topics(&self, topics: &[Topic]) -> Result<()>;
    async fn delete_topic(&self, id: &TopicId) -> Result<()>;

    async fn list_papers(&self) -> Result<Vec<Paper>>;
    async fn put_paper(&self, paper: &Paper) -> Result<()>;
    async fn put_papers(&self, papers: &[Paper]) -> Result<()>;
    async fn delete_paper(&self, id: &str) -> Result<()>;
    /// Delete every paper attributed to `topic_id`. Returns the number removed.
    async fn delete_papers_for_topic(&self, topic_id: &TopicId) -> Result<u64>;

    /// Stamp `topic_id` as updated at `stamped_at` and upsert `papers`, as one
    /// atomic write. Never creates the topic row: returns `Ok(false)` and
    /// writes nothing when the topic no longer exists.
    async fn put_topic_papers(
        &self,
        topic_id: &TopicId,
        papers: &[Paper],
        stamped_at: DateTime<Utc>,
    ) -> Result<bool>;
}
