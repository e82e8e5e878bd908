//! Worker Runtime (C8). Two bounded-concurrency pools poll the durable
//! queue for their own job kinds (spec §5): a *general* pool for short
//! DB-bound work (notification cleanup) and a *k8s* pool for longer
//! external-cluster I/O (VM create/delete/power). Grounded on the
//! teacher's `engine_task::Task` trait (`run`/`cancel`/`cancel_checker`),
//! generalized here from one task per deployment to one task per polled
//! job and from synchronous threads to async pool permits.

mod notification_cleanup;
mod vm_create;
mod vm_delete;
mod vm_power;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::provider::VmProvider;
use crate::queue::{ClaimedJob, JobArgs, JobKind, JobQueue};

/// Thin hand-rolled cancellation signal (the teacher's `cancel_checker`
/// shape) so shutdown doesn't pull in `tokio-util` for one type.
mod tokio_util_sync {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Clone, Default)]
    pub struct CancellationToken(Arc<(AtomicBool, Notify)>);

    impl CancellationToken {
        pub fn new() -> Self {
            CancellationToken(Arc::new((AtomicBool::new(false), Notify::new())))
        }

        pub fn cancel(&self) {
            self.0 .0.store(true, Ordering::SeqCst);
            self.0 .1.notify_waiters();
        }

        pub fn is_cancelled(&self) -> bool {
            self.0 .0.load(Ordering::SeqCst)
        }

        pub async fn cancelled(&self) {
            if self.is_cancelled() {
                return;
            }
            self.0 .1.notified().await;
        }
    }
}

pub use tokio_util_sync::CancellationToken;

const GENERAL_KINDS: &[JobKind] = &[JobKind::NotificationCleanup];
const K8S_KINDS: &[JobKind] = &[JobKind::VmCreate, JobKind::VmDelete, JobKind::VmPower];

const POLL_IDLE_INTERVAL: Duration = Duration::from_millis(500);

pub struct WorkerRuntime {
    pool: PgPool,
    provider: Arc<dyn VmProvider>,
    general_permits: Arc<Semaphore>,
    k8s_permits: Arc<Semaphore>,
    k8s_operation_timeout: Duration,
    k8s_cluster_concurrency: usize,
    notification_retention_days: i64,
    cluster_permits: Mutex<HashMap<Uuid, Arc<Semaphore>>>,
}

impl WorkerRuntime {
    pub fn new(config: &EngineConfig, pool: PgPool, provider: Arc<dyn VmProvider>) -> Self {
        WorkerRuntime {
            pool,
            provider,
            general_permits: Arc::new(Semaphore::new(config.worker_general_pool_size)),
            k8s_permits: Arc::new(Semaphore::new(config.worker_k8s_pool_size)),
            k8s_operation_timeout: config.k8s_operation_timeout,
            k8s_cluster_concurrency: config.k8s_cluster_concurrency,
            notification_retention_days: config.notification_retention_days,
            cluster_permits: Mutex::new(HashMap::new()),
        }
    }

    /// A second, per-cluster cap layered under the k8s pool's overall cap
    /// (spec §5): the pool limits total in-flight external calls, this
    /// limits how many of them may target the same cluster at once, so one
    /// busy cluster can't starve calls to the others.
    fn cluster_permit(&self, cluster_id: Uuid) -> Arc<Semaphore> {
        let mut permits = self.cluster_permits.lock().unwrap_or_else(|e| e.into_inner());
        permits.entry(cluster_id).or_insert_with(|| Arc::new(Semaphore::new(self.k8s_cluster_concurrency))).clone()
    }

    /// Runs both poll loops until `shutdown` fires. Every acquired
    /// semaphore permit is held for the lifetime of exactly one spawned
    /// job task and released on all exit paths (including panics, via
    /// `Drop`) — the same guarantee the teacher's pool sizing comment
    /// describes for its general/k8s split (spec §5).
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let general = {
            let this = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { this.poll_loop(GENERAL_KINDS, this.general_permits.clone(), shutdown).await })
        };
        let k8s = {
            let this = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { this.poll_loop(K8S_KINDS, this.k8s_permits.clone(), shutdown).await })
        };

        let _ = tokio::join!(general, k8s);
    }

    async fn poll_loop(self: &Arc<Self>, kinds: &'static [JobKind], permits: Arc<Semaphore>, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }

            let permit = tokio::select! {
                _ = shutdown.cancelled() => return,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => return,
                },
            };

            match JobQueue::claim_next(&self.pool, kinds).await {
                Ok(Some(job)) => {
                    let this = self.clone();
                    tokio::spawn(async move {
                        this.execute(job).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(POLL_IDLE_INTERVAL) => {}
                    }
                }
                Err(err) => {
                    drop(permit);
                    tracing::error!(error = %err, "failed to poll job queue");
                    tokio::time::sleep(POLL_IDLE_INTERVAL).await;
                }
            }
        }
    }

    async fn execute(&self, job: ClaimedJob) {
        let _cluster_permit: Option<OwnedSemaphorePermit> = match self.resolve_cluster_id(&job.args).await {
            Ok(Some(cluster_id)) => self.cluster_permit(cluster_id).acquire_owned().await.ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::error!(job_id = %job.id, error = %err, "failed to resolve cluster for job, running without per-cluster cap");
                None
            }
        };

        let result = match &job.args {
            JobArgs::VmCreate(args) => {
                tokio::time::timeout(self.k8s_operation_timeout, vm_create::run(&self.pool, self.provider.as_ref(), args))
                    .await
                    .unwrap_or_else(|_| Err(crate::errors::EngineError::internal("vm create job timed out")))
            }
            JobArgs::VmDelete(args) => {
                tokio::time::timeout(self.k8s_operation_timeout, vm_delete::run(&self.pool, self.provider.as_ref(), args))
                    .await
                    .unwrap_or_else(|_| Err(crate::errors::EngineError::internal("vm delete job timed out")))
            }
            JobArgs::VmPower(args) => {
                tokio::time::timeout(self.k8s_operation_timeout, vm_power::run(&self.pool, self.provider.as_ref(), args))
                    .await
                    .unwrap_or_else(|_| Err(crate::errors::EngineError::internal("vm power job timed out")))
            }
            JobArgs::NotificationCleanup(_) => notification_cleanup::run(&self.pool, self.notification_retention_days).await,
        };

        self.finish(job, result).await;
    }

    /// Looks up the target cluster for jobs the k8s pool runs, so
    /// `execute` can acquire that cluster's permit before dispatching.
    /// `NotificationCleanup` touches no cluster and returns `None`.
    async fn resolve_cluster_id(&self, args: &JobArgs) -> EngineResult<Option<Uuid>> {
        use crate::store::{ApprovalTicketStore, VmStore};

        match args {
            JobArgs::VmCreate(a) => {
                let ticket = ApprovalTicketStore::get_by_event(&self.pool, a.event_id).await?;
                let vm = VmStore::get_by_ticket(&self.pool, ticket.id).await?;
                Ok(vm.cluster_id)
            }
            JobArgs::VmDelete(a) => {
                let ticket = ApprovalTicketStore::get_by_event(&self.pool, a.event_id).await?;
                let vm = VmStore::get_by_ticket(&self.pool, ticket.id).await?;
                Ok(vm.cluster_id)
            }
            JobArgs::VmPower(a) => {
                let event = crate::store::DomainEventStore::get(&self.pool, a.event_id).await?;
                match event.decode_payload() {
                    Ok(crate::events::payload::EventPayload::VmPower(p)) => Ok(Some(p.cluster_id)),
                    _ => Ok(None),
                }
            }
            JobArgs::NotificationCleanup(_) => Ok(None),
        }
    }

    async fn finish(&self, job: ClaimedJob, result: EngineResult<()>) {
        match result {
            Ok(()) => {
                if let Err(err) = JobQueue::complete(&self.pool, job.id).await {
                    tracing::error!(job_id = %job.id, error = %err, "failed to mark job complete");
                }
            }
            Err(err) => {
                tracing::warn!(job_id = %job.id, attempts = job.attempts, error = %err, "job failed");
                match JobQueue::fail(&self.pool, job.id, job.attempts, &err.message).await {
                    Ok(requeued) if !requeued => {
                        tracing::error!(job_id = %job.id, "job exhausted retries, marked dead");
                    }
                    Err(queue_err) => {
                        tracing::error!(job_id = %job.id, error = %queue_err, "failed to record job failure");
                    }
                    _ => {}
                }
            }
        }
    }
}
