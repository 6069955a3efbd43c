//! Process wiring shared by the server binary and the CLI.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use legisync_cache::CacheManager;
use legisync_core::config::AppConfig;
use legisync_core::result::AppResult;
use legisync_core::traits::{AdvisoryLock, CacheProvider};
use legisync_database::repositories::{
    BillRepository, CheckpointRepository, ExecutionRepository, ExpenseRepository,
    LegislatorRepository, VoteRepository,
};
use legisync_database::{CheckpointStore, DatabasePool, ExecutionStore, PgAdvisoryLock};
use legisync_upstream::CamaraClient;
use legisync_worker::jobs::{
    CacheAnalyticsRefresher, CleanupCheckpointsHandler, InvalidateCacheHandler,
    RefreshAnalyticsHandler, WarmCacheHandler,
};
use legisync_worker::{BackgroundJobProcessor, JobExecutor};

use crate::backfill::SmartBackfillService;
use crate::context::SyncContext;
use crate::cron::CronTriggers;
use crate::scheduler::SmartSchedulerService;
use crate::tasks::TaskRegistry;

/// Every long-lived component of a LegiSync process.
#[derive(Debug)]
pub struct SyncApp {
    /// Loaded configuration
    pub config: AppConfig,
    /// Database pool
    pub pool: DatabasePool,
    /// Configured cache provider
    pub cache: CacheManager,
    /// Durable execution history
    pub executions: Arc<dyn ExecutionStore>,
    /// Durable backfill checkpoints
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Background job processor, unless the worker is disabled
    pub processor: Option<Arc<BackgroundJobProcessor>>,
    /// In-flight orchestration runs
    pub tasks: Arc<TaskRegistry>,
    /// Historical backfill service
    pub backfill: SmartBackfillService,
    /// Periodic scheduler service
    pub scheduler: SmartSchedulerService,
    /// Stops background sweepers
    shutdown: CancellationToken,
}

impl SyncApp {
    /// Connect to the database and cache and build every service.
    ///
    /// Does not run migrations; call [`SyncApp::migrate`] for that.
    pub async fn build(config: AppConfig) -> AppResult<Self> {
        let shutdown = CancellationToken::new();

        info!("Connecting to database...");
        let pool = DatabasePool::connect(&config.database).await?;
        let pg = pool.pool().clone();

        info!(provider = %config.cache.provider, "Initializing cache...");
        let cache = CacheManager::new(&config.cache, shutdown.child_token()).await?;
        let cache_port: Arc<dyn CacheProvider> = Arc::new(cache.clone());

        let executions: Arc<dyn ExecutionStore> = Arc::new(ExecutionRepository::new(pg.clone()));
        let checkpoints: Arc<dyn CheckpointStore> = Arc::new(CheckpointRepository::new(pg.clone()));
        let legislators = Arc::new(LegislatorRepository::new(pg.clone()));
        let bills = Arc::new(BillRepository::new(pg.clone()));
        let expenses = Arc::new(ExpenseRepository::new(pg.clone()));
        let votes = Arc::new(VoteRepository::new(pg.clone()));
        let lock: Arc<dyn AdvisoryLock> = Arc::new(PgAdvisoryLock::new(pg));

        let processor = if config.worker.enabled {
            let mut executor = JobExecutor::new();
            executor.register(Arc::new(WarmCacheHandler::new(
                Arc::clone(&cache_port),
                legislators.clone(),
                bills.clone(),
                Duration::from_secs(config.cache.default_ttl_seconds),
            )));
            executor.register(Arc::new(InvalidateCacheHandler::new(Arc::clone(&cache_port))));
            executor.register(Arc::new(RefreshAnalyticsHandler::new(Arc::new(
                CacheAnalyticsRefresher::new(Arc::clone(&cache_port)),
            ))));
            executor.register(Arc::new(CleanupCheckpointsHandler::new(Arc::clone(&checkpoints))));
            Some(Arc::new(BackgroundJobProcessor::start(
                &config.worker,
                Arc::new(executor),
            )))
        } else {
            info!("Background worker disabled");
            None
        };

        let source = Arc::new(CamaraClient::new(&config.upstream)?);
        let ctx = Arc::new(SyncContext::new(
            source,
            legislators,
            bills,
            expenses,
            votes,
            Arc::clone(&cache_port),
            &config.upstream,
            config.scheduler.expense_workers,
        ));

        let tasks = Arc::new(TaskRegistry::new());
        let mut backfill = SmartBackfillService::new(
            Arc::clone(&ctx),
            Arc::clone(&executions),
            Arc::clone(&checkpoints),
            Arc::clone(&lock),
            Arc::clone(&tasks),
            config.backfill.clone(),
        );
        let mut scheduler = SmartSchedulerService::new(
            ctx,
            Arc::clone(&executions),
            lock,
            Arc::clone(&tasks),
            config.scheduler.clone(),
            &config.backfill,
        );
        if let Some(processor) = &processor {
            backfill = backfill.with_jobs(Arc::clone(processor));
            scheduler = scheduler.with_jobs(Arc::clone(processor));
        }

        info!("Services initialized");
        Ok(Self {
            config,
            pool,
            cache,
            executions,
            checkpoints,
            processor,
            tasks,
            backfill,
            scheduler,
            shutdown,
        })
    }

    /// Apply pending database migrations.
    pub async fn migrate(&self) -> AppResult<()> {
        info!("Running database migrations...");
        legisync_database::migration::run_migrations(self.pool.pool()).await?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Register and start the cron triggers.
    pub async fn start_triggers(&self) -> AppResult<CronTriggers> {
        let triggers = CronTriggers::new(self.scheduler.clone(), self.processor.clone()).await?;
        triggers
            .register(&self.config.scheduler, self.config.backfill.checkpoint_retention_days)
            .await?;
        triggers.start().await?;
        Ok(triggers)
    }

    /// Stop runs, drain the job queue, and close the pool.
    pub async fn shutdown(&self) {
        let grace = Duration::from_secs(self.config.worker.shutdown_grace_seconds);
        self.tasks.shutdown(grace).await;
        if let Some(processor) = &self.processor {
            processor.shutdown().await;
        }
        self.shutdown.cancel();
        self.pool.close().await;
        info!("Shutdown complete");
    }
}
