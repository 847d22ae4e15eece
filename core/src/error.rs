use crate::types::{EmployeeId, Month, RecordId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Upstream facts missing or not delivered in time. Recoverable:
    /// the caller retries after the data lands.
    #[error("Facts unavailable for {employee_id}/{month}: {reason}")]
    FactsUnavailable {
        employee_id: EmployeeId,
        month:       Month,
        reason:      String,
    },

    /// No tier covers the metric value. A configuration error, never
    /// silently defaulted to a zero tier.
    #[error("No tier in {department} rate table matches metric value {value}")]
    NoMatchingTier { department: String, value: String },

    /// Gapped, overlapping, or missing rate table.
    #[error("Rate table configuration error for {department}: {detail}")]
    TierConfiguration { department: String, detail: String },

    /// A recalculation for the same (employee, month) key is in flight.
    /// Recoverable: back off and re-read the now-current record.
    #[error("Recalculation already in progress for {key}")]
    ConcurrentRecalculation { key: String },

    #[error("Commission record not found: {record_id}")]
    RecordNotFound { record_id: RecordId },

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Actor '{actor}' lacks authority: {required} required")]
    InsufficientAuthority { actor: String, required: String },

    #[error("Invalid commission plan: {detail}")]
    InvalidPlan { detail: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
