//! Record lifecycle — the state machine and its transition guards.
//!
//! RULE: This module exclusively owns state transitions. The aggregator
//! produces values, the store executes writes, but only the lifecycle
//! manager decides what status a record may move to and who may move it.
//!
//! States: computed -> pending_approval -> {approved, rejected}.
//! `approved` is terminal for that record instance; `rejected` re-enters
//! only through a fresh recalculation, which creates a new record.

use crate::aggregator::CommissionRecord;
use crate::config::CommissionPlan;
use crate::error::{EngineError, EngineResult};
use crate::store::CommissionStore;
use crate::types::RecordId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Computed,
    PendingApproval,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Computed        => "computed",
            RecordStatus::PendingApproval => "pending_approval",
            RecordStatus::Approved        => "approved",
            RecordStatus::Rejected        => "rejected",
        }
    }

    /// The legal transitions of the state machine. Everything else is an
    /// `InvalidTransition` defect.
    pub fn can_transition_to(&self, to: RecordStatus) -> bool {
        matches!(
            (self, to),
            (RecordStatus::Computed, RecordStatus::PendingApproval)
                | (RecordStatus::Computed, RecordStatus::Approved)
                | (RecordStatus::PendingApproval, RecordStatus::Approved)
                | (RecordStatus::PendingApproval, RecordStatus::Rejected)
        )
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "computed"         => Ok(RecordStatus::Computed),
            "pending_approval" => Ok(RecordStatus::PendingApproval),
            "approved"         => Ok(RecordStatus::Approved),
            "rejected"         => Ok(RecordStatus::Rejected),
            other              => Err(format!("unknown record status: {other}")),
        }
    }
}

/// The pre-validated acting user, supplied by the caller's auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id:   String,
    pub role: ActorRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Clerk,
    Approver,
    Admin,
}

impl ActorRole {
    fn can_approve(&self) -> bool {
        matches!(self, ActorRole::Approver | ActorRole::Admin)
    }
}

/// Percentage deviation of a recomputed total from the superseded approved
/// total. A zero old total with any nonzero new total counts as infinite
/// deviation and always flags.
pub fn variance_pct(new_total: Decimal, old_total: Decimal) -> Option<Decimal> {
    if old_total == Decimal::ZERO {
        if new_total == Decimal::ZERO {
            return Some(Decimal::ZERO);
        }
        return None; // unbounded
    }
    Some(((new_total - old_total) / old_total * Decimal::ONE_HUNDRED).abs())
}

/// Owns every transition. Borrows the store for reads and status writes;
/// the record rows themselves are append-only.
pub struct LifecycleManager<'a> {
    store: &'a CommissionStore,
    plan:  &'a CommissionPlan,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(store: &'a CommissionStore, plan: &'a CommissionPlan) -> Self {
        Self { store, plan }
    }

    /// Decide the initial resting status of a freshly computed record and
    /// apply the variance check against the record it supersedes. Returns
    /// the variance percentage when the record was flagged.
    ///
    /// computed -> pending_approval when the plan requires sign-off or the
    /// variance threshold tripped; computed -> approved otherwise.
    pub fn settle_new_record(
        &self,
        record: &mut CommissionRecord,
        superseded: Option<&CommissionRecord>,
    ) -> EngineResult<Option<Decimal>> {
        debug_assert_eq!(record.status, RecordStatus::Computed);

        let mut flagged_variance = None;
        if let Some(old) = superseded {
            if old.status == RecordStatus::Approved {
                let exceeded = match variance_pct(record.total_commission, old.total_commission) {
                    Some(v) if v > self.plan.variance_threshold_pct => Some(v),
                    Some(_) => None,
                    // Old total was zero, new is nonzero: always review.
                    None => Some(Decimal::ONE_HUNDRED),
                };
                if let Some(v) = exceeded {
                    record.flagged_for_review = true;
                    flagged_variance = Some(v);
                    log::warn!(
                        "{}/{}: recomputation variance {v}% exceeds threshold {}%, flagged for review",
                        record.employee_id, record.month, self.plan.variance_threshold_pct
                    );
                }
            }
        }

        record.status = if self.plan.approval_required || record.flagged_for_review {
            RecordStatus::PendingApproval
        } else {
            RecordStatus::Approved
        };

        Ok(flagged_variance)
    }

    /// pending_approval -> approved. Requires approval authority; a record
    /// flagged for variance review requires an admin.
    pub fn approve(&self, record_id: &RecordId, actor: &Actor) -> EngineResult<CommissionRecord> {
        let record = self.load(record_id)?;
        self.guard_transition(&record, RecordStatus::Approved)?;
        self.guard_authority(&record, actor)?;

        self.store
            .update_decision(record_id, RecordStatus::Approved, &actor.id, None)?;
        log::info!(
            "{}/{}: record {record_id} approved by {}",
            record.employee_id, record.month, actor.id
        );
        self.load(record_id)
    }

    /// pending_approval -> rejected. The rejected record is never mutated
    /// back to computed; re-entry happens via a fresh recalculation.
    pub fn reject(
        &self,
        record_id: &RecordId,
        actor: &Actor,
        reason: &str,
    ) -> EngineResult<CommissionRecord> {
        let record = self.load(record_id)?;
        self.guard_transition(&record, RecordStatus::Rejected)?;
        self.guard_authority(&record, actor)?;

        self.store
            .update_decision(record_id, RecordStatus::Rejected, &actor.id, Some(reason))?;
        log::info!(
            "{}/{}: record {record_id} rejected by {}: {reason}",
            record.employee_id, record.month, actor.id
        );
        self.load(record_id)
    }

    fn load(&self, record_id: &RecordId) -> EngineResult<CommissionRecord> {
        self.store
            .get_record(record_id)?
            .ok_or_else(|| EngineError::RecordNotFound {
                record_id: record_id.clone(),
            })
    }

    fn guard_transition(
        &self,
        record: &CommissionRecord,
        to: RecordStatus,
    ) -> EngineResult<()> {
        if !record.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                from: record.status.to_string(),
                to:   to.to_string(),
            });
        }
        Ok(())
    }

    fn guard_authority(&self, record: &CommissionRecord, actor: &Actor) -> EngineResult<()> {
        if !actor.role.can_approve() {
            return Err(EngineError::InsufficientAuthority {
                actor:    actor.id.clone(),
                required: "approver".into(),
            });
        }
        if record.flagged_for_review && actor.role != ActorRole::Admin {
            return Err(EngineError::InsufficientAuthority {
                actor:    actor.id.clone(),
                required: "admin (record flagged for variance review)".into(),
            });
        }
        Ok(())
    }
}
