//! Periodic memory cleanup.
//!
//! Uses tokio-cron-scheduler to sweep collaborator caches and evict the
//! in-memory index once it has outlived `ttl * stale_multiplier`. A sweep
//! never touches index contents, so it is safe alongside a build.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

use crate::cache::IndexCache;
use crate::error::{QuiverError, QuiverResult};
use crate::traits::{GraphOperations, TextSimilarity};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepReport {
    /// Age of the index copy that was dropped, if any.
    pub evicted_age: Option<Duration>,
}

impl SweepReport {
    pub fn evicted(&self) -> bool {
        self.evicted_age.is_some()
    }
}

/// What a sweep cleans.
#[derive(Clone)]
pub struct CleanupTargets {
    cache: IndexCache,
    similarity: Arc<dyn TextSimilarity>,
    graph: Option<Arc<dyn GraphOperations>>,
    max_index_age: Duration,
}

impl CleanupTargets {
    pub fn new(
        cache: IndexCache,
        similarity: Arc<dyn TextSimilarity>,
        graph: Option<Arc<dyn GraphOperations>>,
        max_index_age: Duration,
    ) -> Self {
        Self {
            cache,
            similarity,
            graph,
            max_index_age,
        }
    }

    /// Clear collaborator caches and evict an over-age index copy.
    pub async fn sweep(&self) -> SweepReport {
        self.similarity.clear_cache();
        if let Some(graph) = &self.graph {
            graph.clear_cache();
        }

        let evicted_age = self.cache.evict_older_than(self.max_index_age).await;
        match evicted_age {
            Some(age) => info!(
                age_secs = age.as_secs(),
                max_age_secs = self.max_index_age.as_secs(),
                "Evicted in-memory capability index"
            ),
            None => debug!("Memory sweep complete, index kept"),
        }
        SweepReport { evicted_age }
    }
}

/// Background cleanup task owned by the engine.
pub struct MemoryGuardian {
    scheduler: JobScheduler,
    interval: Duration,
}

impl MemoryGuardian {
    /// Schedule repeated sweeps and start the scheduler.
    pub async fn start(targets: CleanupTargets, interval: Duration) -> QuiverResult<Self> {
        let mut scheduler = JobScheduler::new().await.map_err(scheduler_error)?;

        let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let targets = targets.clone();
            Box::pin(async move {
                targets.sweep().await;
            })
        })
        .map_err(scheduler_error)?;

        scheduler.add(job).await.map_err(scheduler_error)?;
        if let Err(e) = scheduler.start().await {
            let _ = scheduler.shutdown().await;
            return Err(scheduler_error(e));
        }

        info!(interval_secs = interval.as_secs(), "Memory guardian started");
        Ok(Self {
            scheduler,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the scheduler.
    pub async fn stop(mut self) -> QuiverResult<()> {
        info!("Shutting down memory guardian");
        self.scheduler.shutdown().await.map_err(scheduler_error)
    }
}

fn scheduler_error(e: tokio_cron_scheduler::JobSchedulerError) -> QuiverError {
    QuiverError::internal(format!("cleanup scheduler: {e}"))
}
