use serde::Serialize;
use strum::Display;
use uuid::Uuid;

/// Lifecycle of an order as seen by the in-process job queue.
///
/// Failed attempts are not remembered, so a failed order reports `Unseen`.
#[derive(Debug, Clone, Copy, Serialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderState {
    Unseen,
    Queued,
    Processing,
    Done,
}

/// Result of handing a job to the queue.
#[derive(Debug, Clone, Copy, Serialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmitOutcome {
    /// Worker was idle; the job starts right away.
    Accepted,
    /// Another job is running; the job waits its turn.
    Queued,
    /// The order already completed; nothing to do.
    Duplicate,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Failed { error: String },
    /// Dequeued after the order had already completed, in this run or an earlier one.
    Skipped,
}

/// Emitted once per finished job attempt.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub order_id: String,
    pub attempt_id: Uuid,
    pub outcome: JobOutcome,
}

impl JobEvent {
    pub fn is_completed(&self) -> bool {
        self.outcome == JobOutcome::Completed
    }
}

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: Option<String>,
    pub completed: usize,
}
