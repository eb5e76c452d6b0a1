//! Error taxonomy for merge compilation and execution.

use thiserror::Error;

use crate::execution::gateway::ExecutionState;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Everything that can abort a merge run.
///
/// Configuration and schema variants are raised before any statement is
/// submitted. Reconciliation problems are never errors; they surface as
/// [`crate::generator::notice::Notice`] values instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    // Schema lookup
    /// The relation returned zero columns, usually a mistyped name.
    #[error("schema not found: {locator} returned zero columns")]
    SchemaNotFound {
        /// Rendered relation locator.
        locator: String,
    },

    /// The catalog provider failed to answer (transport, permissions).
    ///
    /// Raised by [`crate::schema::catalog::CatalogProvider`] implementations
    /// backed by a live catalog; the resolver passes it through unchanged.
    #[error("catalog lookup failed for {locator}: {reason}")]
    Catalog {
        /// Rendered relation locator.
        locator: String,
        /// Provider failure text.
        reason: String,
    },

    // Configuration
    /// A primary-key column is not a destination column.
    #[error("primary key {column:?} not found in destination schema {locator}")]
    PrimaryKeyNotInDestination {
        /// Offending key column.
        column: String,
        /// Rendered destination locator.
        locator: String,
    },

    /// No primary-key column was configured.
    #[error("at least one primary key column is required")]
    EmptyPrimaryKey,

    /// The window filter is empty or inverted.
    #[error("window end {end:?} must be after window start {start:?}")]
    InvalidWindow {
        /// Inclusive start bound as configured.
        start: String,
        /// Exclusive end bound as configured.
        end: String,
    },

    /// A window bound is not a date or timestamp.
    #[error("invalid window bound {value:?}: {reason}")]
    InvalidWindowBound {
        /// Bound as configured.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// A caller-supplied predicate or assignment expression does not parse.
    #[error("invalid SQL fragment {fragment:?}: {reason}")]
    InvalidFragment {
        /// Fragment as supplied.
        fragment: String,
        /// Parser message.
        reason: String,
    },

    /// A relation locator has no table part or too many parts.
    #[error("invalid relation locator {0:?}")]
    InvalidLocator(String),

    /// Malformed configuration input.
    #[error("invalid configuration: {0}")]
    Config(String),

    // Execution
    /// The execution service rejected the submission itself.
    #[error("failed to submit statement: {0}")]
    Submit(String),

    /// The engine reported FAILED or CANCELLED.
    #[error("statement {execution_id} ended with state {state}: {reason}")]
    ExecutionFailed {
        /// Engine execution id.
        execution_id: String,
        /// Terminal state observed.
        state: ExecutionState,
        /// Engine failure reason, verbatim.
        reason: String,
    },

    /// Reading configuration or writing output failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl MergeError {
    /// True for errors caused by caller configuration rather than the catalog
    /// or the engine.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::PrimaryKeyNotInDestination { .. }
                | Self::EmptyPrimaryKey
                | Self::InvalidWindow { .. }
                | Self::InvalidWindowBound { .. }
                | Self::InvalidFragment { .. }
                | Self::InvalidLocator(_)
                | Self::Config(_)
        )
    }
}

impl From<std::io::Error> for MergeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MergeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
