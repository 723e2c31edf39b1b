use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex, Notify};
use uuid::Uuid;

use crate::models::job::{JobEvent, JobOutcome, OrderState, QueueStats, SubmitOutcome};
use crate::models::order::OrderJob;
use crate::services::pipeline::{JobError, OrderProcessor};

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct QueueState {
    /// FIFO of jobs waiting for the worker.
    pending: VecDeque<OrderJob>,
    /// Order currently owned by the worker (running or about to start).
    processing: Option<String>,
    /// Job handed to the worker but not yet picked up.
    ready: Option<OrderJob>,
    /// Orders that completed successfully. Failures are not recorded.
    done: HashSet<String>,
}

/// In-memory job queue drained by a single worker task.
///
/// Exactly one job executes at a time. Submitting never waits on job
/// execution: it only touches the shared state under the lock.
pub struct JobQueue {
    state: Mutex<QueueState>,
    wake: Notify,
    events: broadcast::Sender<JobEvent>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            events,
        }
    }

    /// Create a queue and spawn its worker on the current runtime.
    ///
    /// Orders whose bundle is already complete on disk start out done, so a
    /// restart does not reprocess them.
    pub fn start(processor: Arc<OrderProcessor>) -> Arc<Self> {
        let mut queue = Self::new();
        match processor.store().completed_orders() {
            Ok(ids) => {
                tracing::info!(completed = ids.len(), "Loaded completed orders from artifact directory");
                queue.state.get_mut().done.extend(ids);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to scan artifact directory"),
        }

        let queue = Arc::new(queue);
        tokio::spawn(Arc::clone(&queue).run(processor));
        queue
    }

    /// Hand a job to the queue.
    ///
    /// - order already done: nothing is scheduled ([`SubmitOutcome::Duplicate`])
    /// - worker busy: appended to the tail ([`SubmitOutcome::Queued`])
    /// - worker idle: starts right away ([`SubmitOutcome::Accepted`])
    pub async fn submit(&self, job: OrderJob) -> SubmitOutcome {
        metrics::counter!("order_jobs_submitted_total").increment(1);

        let mut state = self.state.lock().await;

        if state.done.contains(&job.order_id) {
            drop(state);
            metrics::counter!("order_jobs_duplicate_total").increment(1);
            tracing::info!(order_id = %job.order_id, "Order already completed, ignoring resubmission");
            return SubmitOutcome::Duplicate;
        }

        if state.processing.is_some() {
            tracing::info!(
                order_id = %job.order_id,
                attempt_id = %job.attempt_id,
                position = state.pending.len() + 1,
                "Worker busy, order queued"
            );
            state.pending.push_back(job);
            metrics::gauge!("order_queue_depth").set(state.pending.len() as f64);
            return SubmitOutcome::Queued;
        }

        tracing::info!(order_id = %job.order_id, attempt_id = %job.attempt_id, "Order accepted");
        state.processing = Some(job.order_id.clone());
        state.ready = Some(job);
        drop(state);

        self.wake.notify_one();
        SubmitOutcome::Accepted
    }

    pub async fn state_of(&self, order_id: &str) -> OrderState {
        let state = self.state.lock().await;
        if state.processing.as_deref() == Some(order_id) {
            OrderState::Processing
        } else if state.done.contains(order_id) {
            OrderState::Done
        } else if state.pending.iter().any(|job| job.order_id == order_id) {
            OrderState::Queued
        } else {
            OrderState::Unseen
        }
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        QueueStats {
            pending: state.pending.len(),
            processing: state.processing.clone(),
            completed: state.done.len(),
        }
    }

    /// Receive an event for every finished job attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Worker loop. Runs jobs one at a time, forever.
    ///
    /// Each job runs in its own task so that a panic is contained and
    /// reported as a failure; the loop always moves on to the next job.
    pub async fn run(self: Arc<Self>, processor: Arc<OrderProcessor>) {
        tracing::info!("Order worker started");
        loop {
            let job = self.next_job().await;
            let order_id = job.order_id.clone();
            let attempt_id = job.attempt_id;
            let wait_ms = (chrono::Utc::now() - job.queued_at).num_milliseconds();

            if processor.store().is_complete(&order_id).await {
                tracing::info!(order_id = %order_id, attempt_id = %attempt_id, "Artifacts already complete, skipping");
                metrics::counter!("order_jobs_duplicate_total").increment(1);
                self.finish(order_id, attempt_id, JobOutcome::Skipped).await;
                continue;
            }
            tracing::info!(order_id = %order_id, attempt_id = %attempt_id, wait_ms, "Processing order");

            let fresh = !processor.store().exists(&order_id).await;
            let started = Instant::now();
            let task_processor = Arc::clone(&processor);
            let result = match tokio::spawn(async move { task_processor.process(&job).await }).await {
                Ok(result) => result,
                Err(e) => {
                    // A panicking job skips its own cleanup.
                    processor.cleanup(&order_id, fresh).await;
                    Err(JobError::Panicked(e.to_string()))
                }
            };
            let elapsed = started.elapsed();
            metrics::histogram!("order_job_processing_seconds").record(elapsed.as_secs_f64());

            let outcome = match result {
                Ok(rect) => {
                    metrics::counter!("order_jobs_completed_total").increment(1);
                    tracing::info!(
                        order_id = %order_id,
                        attempt_id = %attempt_id,
                        duration_ms = elapsed.as_millis() as u64,
                        crop_width = rect.width,
                        crop_height = rect.height,
                        "Artifacts ready"
                    );
                    JobOutcome::Completed
                }
                Err(e) => {
                    metrics::counter!("order_jobs_failed_total").increment(1);
                    let step: &'static str = e.step().map_or("worker", Into::into);
                    tracing::error!(
                        order_id = %order_id,
                        attempt_id = %attempt_id,
                        step,
                        error = %e,
                        "Order job failed"
                    );
                    JobOutcome::Failed { error: e.to_string() }
                }
            };

            self.finish(order_id, attempt_id, outcome).await;
        }
    }

    async fn next_job(&self) -> OrderJob {
        loop {
            if let Some(job) = self.state.lock().await.ready.take() {
                return job;
            }
            self.wake.notified().await;
        }
    }

    /// Record the outcome and hand the next pending job to the worker.
    async fn finish(&self, order_id: String, attempt_id: Uuid, outcome: JobOutcome) {
        let mut skipped = Vec::new();
        {
            let mut state = self.state.lock().await;
            state.processing = None;
            if matches!(outcome, JobOutcome::Completed | JobOutcome::Skipped) {
                state.done.insert(order_id.clone());
            }

            // Attempts queued while an earlier attempt of the same order was
            // running must not touch its finished artifacts.
            while let Some(next) = state.pending.pop_front() {
                if state.done.contains(&next.order_id) {
                    skipped.push(next);
                    continue;
                }
                state.processing = Some(next.order_id.clone());
                state.ready = Some(next);
                break;
            }
            metrics::gauge!("order_queue_depth").set(state.pending.len() as f64);
        }

        self.publish(JobEvent {
            order_id,
            attempt_id,
            outcome,
        });
        for job in skipped {
            tracing::info!(order_id = %job.order_id, attempt_id = %job.attempt_id, "Order completed while queued, skipping");
            metrics::counter!("order_jobs_duplicate_total").increment(1);
            self.publish(JobEvent {
                order_id: job.order_id,
                attempt_id: job.attempt_id,
                outcome: JobOutcome::Skipped,
            });
        }
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is the normal case outside tests.
        let _ = self.events.send(event);
    }
}
