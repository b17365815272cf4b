//! Periodic refresh of every topic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::pipeline::PipelineRegistry;

/// Refresh all topics every `period` until `shutdown` resolves. The first
/// round runs immediately, and every round starts from a fresh read of the
/// store. Returns the number of completed rounds.
///
/// A round in progress is never interrupted; shutdown is observed between
/// rounds.
pub async fn run_periodic<F>(registry: Arc<PipelineRegistry>, period: Duration, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut rounds = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(rounds, "scheduler stopping");
                break;
            }
            _ = ticker.tick() => {
                // Pick up topics added or removed by other processes.
                if let Err(e) = registry.reload().await {
                    warn!(error = %e, "reload failed; refreshing cached topics");
                }
                let outcomes = registry.refresh_all().await;
                rounds += 1;
                let failed = outcomes.iter().filter(|(_, o)| o.is_failure()).count();
                if failed > 0 {
                    warn!(round = rounds, topics = outcomes.len(), failed, "refresh round had failures");
                } else {
                    info!(round = rounds, topics = outcomes.len(), "refresh round complete");
                }
            }
        }
    }
    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::PaperRepository;
    use crate::testing::{FakeExtractor, FakeSearch, MemoryStore, topic};
    use curator_shared::{CuratorStore, PipelineConfig};

    #[tokio::test(start_paused = true)]
    async fn refreshes_on_each_tick_until_shutdown() {
        let search = Arc::new(FakeSearch::returning("report"));
        let store = Arc::new(MemoryStore::with(vec![topic("t1", "One")], vec![]));
        let repository = Arc::new(PaperRepository::open(store).await.unwrap());
        let registry = Arc::new(PipelineRegistry::new(
            repository,
            search.clone(),
            Arc::new(FakeExtractor::with_payload("[]")),
            PipelineConfig::default(),
        ));

        let period = Duration::from_secs(60);
        let shutdown = tokio::time::sleep(period * 2 + Duration::from_secs(1));
        let rounds = run_periodic(registry, period, shutdown).await;

        assert_eq!(rounds, 3);
        assert_eq!(search.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn each_round_sees_topics_added_elsewhere() {
        let search = Arc::new(FakeSearch::returning("report"));
        let store = Arc::new(MemoryStore::default());
        let repository = Arc::new(PaperRepository::open(store.clone()).await.unwrap());
        let registry = Arc::new(PipelineRegistry::new(
            repository,
            search.clone(),
            Arc::new(FakeExtractor::with_payload("[]")),
            PipelineConfig::default(),
        ));

        store.put_topic(&topic("t1", "One")).await.unwrap();
        let shutdown = tokio::time::sleep(Duration::from_secs(1));
        let rounds = run_periodic(registry, Duration::from_secs(60), shutdown).await;

        assert_eq!(rounds, 1);
        assert_eq!(search.calls(), 1);
    }
}
