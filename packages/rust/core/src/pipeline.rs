//! Per-topic curation runs: search -> extraction -> merge-and-persist.
//!
//! Each topic gets its own state machine, kept in a [`PipelineRegistry`]:
//!
//! ```text
//! idle ──> searching ──> analyzing ──> complete
//!             │              │
//!             └──> error <───┘   (auto-reset to idle after a delay)
//! ```
//!
//! A run may start only from `idle`, `complete` or `error`. A start request
//! while the machine is busy is a no-op. Runs for different topics never
//! contend with each other.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use curator_shared::{
    CuratorError, ExtractionService, FetchStatus, PipelineConfig, PipelineState, Result,
    SearchService, Topic, TopicId,
};

use crate::extraction;
use crate::prompts;
use crate::repository::PaperRepository;

pub const ANALYZING_MESSAGE: &str = "Analyzing relevance & impact...";
pub const FAILED_MESSAGE: &str = "Update failed. Retrying later.";

fn searching_message(title: &str) -> String {
    format!("Scanning latest papers for \"{title}\"...")
}

/// What a refresh request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A run for this topic was already in flight; nothing was started.
    AlreadyRunning,
    /// The run found no candidates; the collection is unchanged.
    NothingNew,
    /// Candidates were merged and persisted.
    Merged {
        added: usize,
        replaced: usize,
        total: usize,
    },
    /// Search, extraction or persistence failed; the machine is in `error`.
    Failed { reason: String },
    /// The topic was deleted while the run was in flight; the batch was
    /// discarded.
    TopicRemoved,
    /// No topic with this id exists.
    UnknownTopic,
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => f.write_str("already running"),
            Self::NothingNew => f.write_str("no new papers"),
            Self::Merged {
                added,
                replaced,
                total,
            } => write!(f, "{added} added, {replaced} updated, {total} total"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::TopicRemoved => f.write_str("topic removed during run"),
            Self::UnknownTopic => f.write_str("unknown topic"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-topic machine
// ---------------------------------------------------------------------------

/// State of one topic's pipeline, published through a watch channel.
struct TopicMachine {
    state: watch::Sender<PipelineState>,
    /// Bumped on every start; a pending auto-reset only fires if no newer run
    /// has started since.
    generation: AtomicU64,
}

impl TopicMachine {
    fn new() -> Self {
        let (state, _) = watch::channel(PipelineState::default());
        Self {
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Atomically move to `searching` if a run may start. Returns the run's
    /// generation on success.
    fn try_start(&self, title: &str) -> Option<u64> {
        let mut generation = None;
        self.state.send_if_modified(|state| {
            if !state.status.can_start() {
                return false;
            }
            generation = Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            *state = PipelineState::new(FetchStatus::Searching, searching_message(title));
            true
        });
        generation
    }

    fn set(&self, status: FetchStatus, message: impl Into<String>) {
        self.state.send_replace(PipelineState::new(status, message));
    }

    /// Enter `error` and schedule the reset back to `idle`.
    fn fail(self: &Arc<Self>, generation: u64, delay: Duration) {
        self.set(FetchStatus::Error, FAILED_MESSAGE);
        let machine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            machine.state.send_if_modified(|state| {
                let current = machine.generation.load(Ordering::SeqCst);
                if state.status == FetchStatus::Error && current == generation {
                    *state = PipelineState::default();
                    true
                } else {
                    false
                }
            });
        });
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Drives curation runs and holds one state machine per topic.
pub struct PipelineRegistry {
    repository: Arc<PaperRepository>,
    search: Arc<dyn SearchService>,
    extractor: Arc<dyn ExtractionService>,
    config: PipelineConfig,
    machines: Mutex<HashMap<TopicId, Arc<TopicMachine>>>,
}

impl PipelineRegistry {
    pub fn new(
        repository: Arc<PaperRepository>,
        search: Arc<dyn SearchService>,
        extractor: Arc<dyn ExtractionService>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            repository,
            search,
            extractor,
            config,
            machines: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<PaperRepository> {
        &self.repository
    }

    fn machines(&self) -> std::sync::MutexGuard<'_, HashMap<TopicId, Arc<TopicMachine>>> {
        self.machines.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up the topic and get or create its machine. `None` for topics
    /// that do not exist, so the map only ever holds known topics.
    async fn attach(&self, id: &TopicId) -> Option<(Topic, Arc<TopicMachine>)> {
        self.repository.topic(id).await?;
        let machine = self
            .machines()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(TopicMachine::new()))
            .clone();

        // A removal between the lookup and the insert would leave an orphan.
        match self.repository.topic(id).await {
            Some(topic) => Some((topic, machine)),
            None => {
                self.machines().remove(id);
                None
            }
        }
    }

    /// Watch a topic's pipeline state. `None` for unknown topics.
    pub async fn subscribe(&self, id: &TopicId) -> Option<watch::Receiver<PipelineState>> {
        let (_, machine) = self.attach(id).await?;
        Some(machine.state.subscribe())
    }

    /// Current state of a topic's pipeline; `idle` for topics that never ran.
    pub fn state(&self, id: &TopicId) -> PipelineState {
        self.machines()
            .get(id)
            .map(|m| m.state.borrow().clone())
            .unwrap_or_default()
    }

    /// Delete a topic (and its papers) and drop its machine.
    pub async fn remove_topic(&self, id: &TopicId) -> Result<u64> {
        let removed = self.repository.delete_topic(id).await?;
        self.machines().remove(id);
        Ok(removed)
    }

    /// Reload the collection from the store and drop machines of topics that
    /// no longer exist there.
    #[instrument(skip_all)]
    pub async fn reload(&self) -> Result<()> {
        self.repository.load().await?;
        let known: HashSet<TopicId> = self
            .repository
            .topics()
            .await
            .into_iter()
            .map(|t| t.id)
            .collect();
        self.machines().retain(|id, _| known.contains(id));
        Ok(())
    }

    /// Run the pipeline once for a topic.
    #[instrument(skip_all, fields(topic_id = %id))]
    pub async fn refresh(&self, id: &TopicId) -> RunOutcome {
        let Some((topic, machine)) = self.attach(id).await else {
            warn!("refresh requested for unknown topic");
            return RunOutcome::UnknownTopic;
        };

        let Some(generation) = machine.try_start(&topic.title) else {
            debug!("run already in flight");
            return RunOutcome::AlreadyRunning;
        };
        info!(title = %topic.title, "run started");

        match self.execute(&topic, &machine).await {
            Ok(outcome) => {
                let message = match &outcome {
                    RunOutcome::Merged { added, .. } => format!("Found {added} new papers."),
                    RunOutcome::TopicRemoved => "Topic was removed.".to_string(),
                    _ => "No new papers found.".to_string(),
                };
                machine.set(FetchStatus::Complete, message);
                if outcome == RunOutcome::TopicRemoved {
                    self.machines().remove(id);
                }
                info!(%outcome, "run complete");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "run failed");
                machine.fail(generation, self.config.error_reset_delay);
                RunOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn execute(&self, topic: &Topic, machine: &TopicMachine) -> Result<RunOutcome> {
        // --- Phase 1: Search ---
        let raw = self
            .search
            .search(&prompts::search_instructions(&topic.search_prompt))
            .await?;

        // --- Phase 2: Extraction ---
        machine.set(FetchStatus::Analyzing, ANALYZING_MESSAGE);
        let candidates = extraction::curate(self.extractor.as_ref(), &topic.id, &raw).await?;
        if candidates.is_empty() {
            return Ok(RunOutcome::NothingNew);
        }

        // --- Phase 3: Merge & persist ---
        match self
            .repository
            .merge_and_persist(&topic.id, candidates)
            .await
        {
            Ok(stats) => Ok(RunOutcome::Merged {
                added: stats.added,
                replaced: stats.replaced,
                total: stats.total,
            }),
            Err(CuratorError::TopicNotFound { .. }) => Ok(RunOutcome::TopicRemoved),
            Err(e) => Err(e),
        }
    }

    /// Refresh every topic concurrently.
    pub async fn refresh_all(&self) -> Vec<(TopicId, RunOutcome)> {
        let topics = self.repository.topics().await;
        let runs = topics.iter().map(|t| async move {
            let outcome = self.refresh(&t.id).await;
            (t.id.clone(), outcome)
        });
        join_all(runs).await
    }
}
