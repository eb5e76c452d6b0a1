use std::fmt;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MergeError, Result};

/// Interval between status polls unless the caller picks another.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Lifecycle state reported by the query engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    /// Accepted, waiting for capacity.
    Queued,
    /// Executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped before completion.
    Cancelled,
}

impl ExecutionState {
    /// True for `SUCCEEDED`, `FAILED`, and `CANCELLED`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Parse an engine state name such as `SUCCEEDED`, ignoring case.
    pub fn parse(state: &str) -> Option<Self> {
        match state.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" | "CANCELED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// A statement submission with its execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Statement text.
    pub statement: String,
    /// Default database for unqualified names.
    pub database: String,
    /// Result output location, e.g. an object-store prefix.
    pub output_location: Option<String>,
    /// Execution group (workgroup) to run under.
    pub workgroup: Option<String>,
}

/// Status returned by a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStatus {
    /// Current state.
    pub state: ExecutionState,
    /// Engine-supplied reason, usually present for failures.
    pub reason: Option<String>,
}

/// Query execution service.
///
/// Implementors own their session and credentials; the compiler never sees them.
pub trait QueryExecutor {
    /// Submit a statement and return the engine's execution id.
    fn submit(&self, request: &ExecutionRequest) -> Result<String>;

    /// Report the current status of an execution.
    fn poll(&self, execution_id: &str) -> Result<ExecutionStatus>;
}

/// Submit once and poll at a fixed interval until a terminal state.
///
/// `FAILED` and `CANCELLED` become [`MergeError::ExecutionFailed`] carrying the
/// engine's reason verbatim. Nothing is retried; a timeout, if wanted, belongs
/// to the executor.
pub fn run_statement<E: QueryExecutor + ?Sized>(
    executor: &E,
    request: &ExecutionRequest,
    poll_interval: Duration,
) -> Result<String> {
    let execution_id = executor.submit(request)?;
    info!(execution_id = %execution_id, database = %request.database, "submitted statement");

    loop {
        let status = executor.poll(&execution_id)?;
        match status.state {
            ExecutionState::Succeeded => {
                info!(execution_id = %execution_id, "statement succeeded");
                return Ok(execution_id);
            }
            ExecutionState::Failed | ExecutionState::Cancelled => {
                return Err(MergeError::ExecutionFailed {
                    execution_id,
                    state: status.state,
                    reason: status.reason.unwrap_or_default(),
                });
            }
            ExecutionState::Queued | ExecutionState::Running => {
                debug!(execution_id = %execution_id, state = %status.state, "waiting");
                thread::sleep(poll_interval);
            }
        }
    }
}
