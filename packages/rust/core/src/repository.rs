//! Paper repository: the durable store plus its in-memory cache.
//!
//! Every mutation goes through one async write lock and follows the same
//! order: write to the store, and only if that succeeds, update the cache. A
//! failed write leaves the cache exactly as it was, so the cache is never
//! ahead of durable state. The cache is never written back wholesale: the
//! store may be shared with other processes, and a stale cache must not undo
//! their deletions.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use curator_shared::{CuratorError, CuratorStore, Paper, Result, Topic, TopicId};

use crate::merge::{MergeStats, merge, merge_stats};

#[derive(Debug, Default)]
struct Collection {
    topics: Vec<Topic>,
    papers: Vec<Paper>,
}

/// Owner of the store handle and the cached topics and papers.
pub struct PaperRepository {
    store: Arc<dyn CuratorStore>,
    cache: RwLock<Collection>,
}

impl PaperRepository {
    /// Wrap a store. The cache starts empty; call [`load`](Self::load).
    pub fn new(store: Arc<dyn CuratorStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(Collection::default()),
        }
    }

    /// Create and load in one step.
    pub async fn open(store: Arc<dyn CuratorStore>) -> Result<Self> {
        let repo = Self::new(store);
        repo.load().await?;
        Ok(repo)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn topics(&self) -> Vec<Topic> {
        self.cache.read().await.topics.clone()
    }

    pub async fn topic(&self, id: &TopicId) -> Option<Topic> {
        self.cache
            .read()
            .await
            .topics
            .iter()
            .find(|t| &t.id == id)
            .cloned()
    }

    /// All papers, newest first.
    pub async fn papers(&self) -> Vec<Paper> {
        self.cache.read().await.papers.clone()
    }

    pub async fn papers_for_topic(&self, id: &TopicId) -> Vec<Paper> {
        self.cache
            .read()
            .await
            .papers
            .iter()
            .filter(|p| &p.topic_id == id)
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    /// Replace the cache with the store's contents.
    #[instrument(skip_all)]
    pub async fn load(&self) -> Result<()> {
        let mut cache = self.cache.write().await;
        let topics = self.store.list_topics().await?;
        let papers = self.store.list_papers().await?;
        // Normalize ordering through the merge path.
        let papers = merge(&papers, &[]);
        info!(topics = topics.len(), papers = papers.len(), "collection loaded");
        *cache = Collection { topics, papers };
        Ok(())
    }

    /// Create or update a topic.
    #[instrument(skip_all, fields(topic_id = %topic.id))]
    pub async fn save_topic(&self, topic: Topic) -> Result<()> {
        let mut cache = self.cache.write().await;
        self.store.put_topic(&topic).await?;
        match cache.topics.iter_mut().find(|t| t.id == topic.id) {
            Some(slot) => *slot = topic,
            None => cache.topics.push(topic),
        }
        debug!("topic saved");
        Ok(())
    }

    /// Delete a topic and every paper attributed to it. Returns the number of
    /// papers removed.
    #[instrument(skip_all, fields(topic_id = %id))]
    pub async fn delete_topic(&self, id: &TopicId) -> Result<u64> {
        let mut cache = self.cache.write().await;
        if !cache.topics.iter().any(|t| &t.id == id) {
            return Err(CuratorError::topic_not_found(id.as_str()));
        }

        // Papers first: a failure in between leaves a topic without papers,
        // never papers without a topic.
        let removed = self.store.delete_papers_for_topic(id).await?;
        self.store.delete_topic(id).await?;

        cache.papers.retain(|p| &p.topic_id != id);
        cache.topics.retain(|t| &t.id != id);
        info!(papers_removed = removed, "topic deleted");
        Ok(removed)
    }

    /// Merge a curated batch for `topic_id` into the collection and persist it.
    ///
    /// Only the incoming papers are written, together with the topic's
    /// freshness stamp. Other processes may share the store, so the merge is
    /// computed against a fresh read of it rather than against the cache, and
    /// the cache is rebuilt from that read. Rejected with
    /// [`CuratorError::TopicNotFound`] when the topic no longer exists in the
    /// store.
    #[instrument(skip_all, fields(topic_id = %topic_id, incoming = incoming.len()))]
    pub async fn merge_and_persist(
        &self,
        topic_id: &TopicId,
        incoming: Vec<Paper>,
    ) -> Result<MergeStats> {
        let mut cache = self.cache.write().await;
        let mut topics = self.store.list_topics().await?;
        let durable = self.store.list_papers().await?;

        let stamped_at = Utc::now();
        let written = if topics.iter().any(|t| &t.id == topic_id) {
            // The store re-checks inside its transaction.
            self.store
                .put_topic_papers(topic_id, &incoming, stamped_at)
                .await?
        } else {
            false
        };
        if !written {
            warn!("discarding batch for deleted topic");
            topics.retain(|t| &t.id != topic_id);
            *cache = Collection {
                topics,
                papers: merge(&durable, &[]),
            };
            return Err(CuratorError::topic_not_found(topic_id.as_str()));
        }

        let stats = merge_stats(&durable, &incoming);
        if let Some(slot) = topics.iter_mut().find(|t| &t.id == topic_id) {
            slot.last_updated = Some(stamped_at);
        }
        *cache = Collection {
            topics,
            papers: merge(&durable, &incoming),
        };

        info!(
            added = stats.added,
            replaced = stats.replaced,
            total = stats.total,
            "batch merged"
        );
        Ok(stats)
    }

    /// Remove one paper.
    #[instrument(skip_all, fields(paper_id = id))]
    pub async fn delete_paper(&self, id: &str) -> Result<bool> {
        let mut cache = self.cache.write().await;
        if !cache.papers.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        self.store.delete_paper(id).await?;
        cache.papers.retain(|p| p.id != id);
        Ok(true)
    }
}
