//! Pipeline coordinator - run orchestration
//!
//! The coordinator owns one run from seeding to the final summary:
//! - validating the engine configuration
//! - claiming root tasks (and enumerating catalog pages) before any worker starts
//! - spawning the fetcher and extractor pools
//! - detecting termination through the outstanding-work counter
//! - draining, cancelling and joining the workers
//! - handing the summary to the sink

use crate::adapter::{SelectorAdapter, SiteAdapter};
use crate::config::{validate_engine, CatalogConfig, Config, EngineConfig};
use crate::crawler::catalog::enumerate_catalog_pages;
use crate::crawler::context::PipelineContext;
use crate::crawler::extractor::run_extractor;
use crate::crawler::fetcher::run_fetcher;
use crate::crawler::summary::RunSummary;
use crate::crawler::task::Task;
use crate::crawler::transport::{HttpTransport, Transport};
use crate::output::Sink;
use crate::state::RunState;
use crate::{HarvestError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Drives harvest runs over a transport, a site adapter and a sink
pub struct Coordinator {
    engine: EngineConfig,
    transport: Arc<dyn Transport>,
    adapter: Arc<dyn SiteAdapter>,
    sink: Arc<dyn Sink>,
    catalog: Option<CatalogConfig>,
    cancel: CancellationToken,
    state: RunState,
}

impl Coordinator {
    /// Creates a coordinator from its collaborators
    ///
    /// The engine configuration is validated when a run starts, not here.
    pub fn new(
        engine: EngineConfig,
        transport: Arc<dyn Transport>,
        adapter: Arc<dyn SiteAdapter>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            engine,
            transport,
            adapter,
            sink,
            catalog: None,
            cancel: CancellationToken::new(),
            state: RunState::Seeding,
        }
    }

    /// Creates a coordinator with the HTTP transport and the selector adapter
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `sink` - Where records go
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - The HTTP client or an adapter selector could not be built
    pub fn from_config(config: &Config, sink: Arc<dyn Sink>) -> Result<Self> {
        let transport = HttpTransport::new(&config.user_agent, &config.engine)?;
        let adapter = SelectorAdapter::from_config(&config.adapter)?;

        let coordinator = Self::new(
            config.engine.clone(),
            Arc::new(transport),
            Arc::new(adapter),
            sink,
        );
        Ok(coordinator.with_catalog(config.catalog.clone()))
    }

    /// Enumerates the catalog listing pages during seeding
    pub fn with_catalog(mut self, catalog: CatalogConfig) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Token that cancels the current and every later run of this coordinator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Run state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs the pipeline until all work is done or the run is cancelled
    ///
    /// Every run gets its own queue, seen-sets and counters. The returned
    /// summary is also handed to [`Sink::finish`].
    ///
    /// # Errors
    ///
    /// * `HarvestError::Config` - The engine configuration is invalid
    /// * `HarvestError::InvariantViolation` - The work counter underflowed
    /// * `HarvestError::Sink` - A sink error occurred with `sink-errors-fatal` set
    pub async fn run(&mut self, roots: Vec<Task>) -> Result<RunSummary> {
        let started_at = Utc::now();
        self.state = RunState::Seeding;
        validate_engine(&self.engine)?;

        tracing::info!(
            "Starting harvest: {} fetchers, {} extractors, queue capacity {}",
            self.engine.fetcher_concurrency,
            self.engine.extractor_concurrency,
            self.engine.queue_capacity
        );

        // Internal aborts cancel this run only, never the coordinator token
        let run_cancel = self.cancel.child_token();
        let ctx = Arc::new(PipelineContext::new(
            self.engine.clone(),
            run_cancel.clone(),
        ));

        let mut roots = roots;
        if let Some(catalog) = self.catalog.as_ref().filter(|c| c.listing_url.is_some()) {
            tokio::select! {
                biased;
                _ = run_cancel.cancelled() => {
                    tracing::info!("Run cancelled during catalog enumeration");
                }
                pages = enumerate_catalog_pages(
                    self.transport.as_ref(),
                    self.adapter.as_ref(),
                    catalog,
                    self.engine.per_task_timeout(),
                ) => roots.extend(pages),
            }
        }

        let offered = roots.len();
        let mut seeds = Vec::with_capacity(offered);
        for task in roots {
            if ctx.queue.claim(&task)? {
                seeds.push(task);
            }
        }
        tracing::info!(
            "Seeding {} root tasks ({} duplicates dropped)",
            seeds.len(),
            offered - seeds.len()
        );

        if seeds.is_empty() {
            tracing::info!("Nothing to harvest");
            ctx.queue.shutdown();
            self.transition(RunState::Done)?;
            return self
                .finish(&ctx, started_at, run_cancel.is_cancelled())
                .await;
        }

        self.transition(RunState::Running)?;
        let mut workers = self.spawn_workers(&ctx);

        for task in seeds {
            tokio::select! {
                biased;
                _ = run_cancel.cancelled() => break,
                pushed = ctx.queue.push(task) => {
                    if pushed.is_err() {
                        break;
                    }
                }
            }
        }

        let cancelled = tokio::select! {
            biased;
            _ = run_cancel.cancelled() => true,
            _ = ctx.counter.wait_for_zero() => false,
        };

        if !cancelled {
            self.transition(RunState::Draining)?;
            tokio::select! {
                _ = run_cancel.cancelled() => {}
                _ = ctx.in_flight.wait_for_zero() => {}
            }
            if let Err(e) = ctx.queue.close() {
                ctx.abort(e);
            }
        }

        let cancelled = run_cancel.is_cancelled();
        if cancelled {
            tracing::info!(
                "Run cancelled with {} tasks outstanding, stopping workers",
                ctx.counter.get()
            );
            ctx.queue.shutdown();
        }

        self.join_workers(&mut workers).await;
        self.transition(RunState::Done)?;
        self.finish(&ctx, started_at, cancelled).await
    }

    fn spawn_workers(&self, ctx: &Arc<PipelineContext>) -> JoinSet<()> {
        let (tx, rx) = mpsc::channel(self.engine.handoff_capacity());
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = JoinSet::new();

        for id in 0..self.engine.fetcher_concurrency {
            workers.spawn(run_fetcher(
                id,
                Arc::clone(ctx),
                Arc::clone(&self.transport),
                tx.clone(),
            ));
        }
        // Extractors see the channel close once the last fetcher exits
        drop(tx);

        for id in 0..self.engine.extractor_concurrency {
            workers.spawn(run_extractor(
                id,
                Arc::clone(ctx),
                Arc::clone(&self.adapter),
                Arc::clone(&self.sink),
                Arc::clone(&rx),
            ));
        }

        workers
    }

    /// Waits for every worker, aborting the rest after the grace period
    async fn join_workers(&self, workers: &mut JoinSet<()>) {
        let grace = self.engine.grace_period();
        let joined = tokio::time::timeout(grace, async {
            while let Some(result) = workers.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        tracing::error!("Worker panicked: {}", e);
                    }
                }
            }
        })
        .await;

        if joined.is_err() {
            tracing::warn!(
                "{} workers still busy after {:?}, aborting them",
                workers.len(),
                grace
            );
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }
    }

    async fn finish(
        &mut self,
        ctx: &PipelineContext,
        started_at: DateTime<Utc>,
        cancelled: bool,
    ) -> Result<RunSummary> {
        let summary = ctx.summary(started_at, cancelled);

        tracing::info!(
            "Harvest finished: {} records emitted, {} tasks completed, {} failed, {} duplicates dropped, {} abandoned",
            summary.records_emitted,
            summary.tasks_completed,
            summary.tasks_failed,
            summary.duplicates_dropped(),
            summary.tasks_abandoned
        );

        if let Err(e) = self.sink.finish(&summary).await {
            tracing::warn!("Sink failed to finish the run: {}", e);
            if self.engine.sink_errors_fatal {
                return Err(HarvestError::Sink(e));
            }
        }

        match ctx.take_fatal() {
            Some(fatal) => Err(fatal),
            None => Ok(summary),
        }
    }
}

/// Builds the discovery tasks listed under `[catalog] root-tasks`
pub fn root_tasks(catalog: &CatalogConfig) -> Vec<Task> {
    catalog.root_tasks.iter().map(Task::discovery).collect()
}
