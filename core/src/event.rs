//! Engine events and the notification seam.
//!
//! Every state change the engine makes is recorded in the persistent event
//! log and offered to the `NotificationSink`. The sink is fire-and-forget:
//! a delivery failure is logged, never rolled back into the computation.

use crate::error::EngineResult;
use crate::types::{EmployeeId, Month, RecordId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Every domain event the engine emits. Stable snake_case type names are
/// used for the event_type column in the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    CommissionRecalculated {
        record_id:   RecordId,
        employee_id: EmployeeId,
        month:       Month,
        total_commission: Decimal,
        superseded:  Option<RecordId>,
    },
    CommissionFlaggedForReview {
        record_id:   RecordId,
        employee_id: EmployeeId,
        month:       Month,
        variance_pct: Decimal,
    },
    CommissionApproved {
        record_id:   RecordId,
        employee_id: EmployeeId,
        month:       Month,
        actor:       String,
    },
    CommissionRejected {
        record_id:   RecordId,
        employee_id: EmployeeId,
        month:       Month,
        actor:       String,
        reason:      String,
    },
}

impl EngineEvent {
    /// Stable string name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            EngineEvent::CommissionRecalculated { .. }     => "commission_recalculated",
            EngineEvent::CommissionFlaggedForReview { .. } => "commission_flagged_for_review",
            EngineEvent::CommissionApproved { .. }         => "commission_approved",
            EngineEvent::CommissionRejected { .. }         => "commission_rejected",
        }
    }

    pub fn employee_id(&self) -> &EmployeeId {
        match self {
            EngineEvent::CommissionRecalculated { employee_id, .. }
            | EngineEvent::CommissionFlaggedForReview { employee_id, .. }
            | EngineEvent::CommissionApproved { employee_id, .. }
            | EngineEvent::CommissionRejected { employee_id, .. } => employee_id,
        }
    }

    pub fn month(&self) -> Month {
        match self {
            EngineEvent::CommissionRecalculated { month, .. }
            | EngineEvent::CommissionFlaggedForReview { month, .. }
            | EngineEvent::CommissionApproved { month, .. }
            | EngineEvent::CommissionRejected { month, .. } => *month,
        }
    }
}

/// One row in the persistent event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:          Option<i64>,
    pub employee_id: EmployeeId,
    pub month:       Month,
    pub event_type:  String,
    pub payload:     String,
    pub created_at:  String,
}

/// Delivery seam for the surrounding application's notification system.
pub trait NotificationSink: Send {
    fn notify(&self, event: &EngineEvent) -> EngineResult<()>;
}

/// Sink that drops everything, for callers with no notification system.
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _event: &EngineEvent) -> EngineResult<()> {
        Ok(())
    }
}
