//! The commission engine — the recalculation trigger and query surface.
//!
//! CONTROL FLOW (fixed, documented):
//!   recalculate -> fact provider -> {tier resolver, bonus calculator,
//!   penalty evaluator} -> aggregator -> lifecycle manager (persist +
//!   settle state) -> event log + notification sink.
//!
//! RULES:
//!   - At most one concurrent recalculation per (employee, month) key,
//!     enforced by `KeyLocks` held from fact-fetch through persist.
//!   - Different keys run fully independently: the resolver, calculator,
//!     and evaluator are pure functions over their inputs.
//!   - The persist step is a single atomic write; a failed recalculation
//!     leaves no partial record.
//!   - Sink failures are logged, never rolled back into the computation.

use crate::aggregator::{aggregate, CommissionRecord};
use crate::bonus::{compute_bonuses, BonusRule};
use crate::config::CommissionPlan;
use crate::error::{EngineError, EngineResult};
use crate::event::{EngineEvent, EventLogEntry, NotificationSink};
use crate::facts::{FactProvider, TeamAggregateProvider, TeamAggregates};
use crate::lifecycle::{Actor, LifecycleManager};
use crate::penalty::compute_penalty_pct;
use crate::store::CommissionStore;
use crate::types::{round_money, EmployeeId, Month, RecordId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Per-key mutual exclusion for in-flight recalculations. Cloning shares
/// the underlying set, so a handle can be held across threads or processes
/// sharing one engine instance.
#[derive(Clone, Default)]
pub struct KeyLocks {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl KeyLocks {
    /// Claim a key or fail fast with `ConcurrentRecalculation`. The losing
    /// caller backs off and re-reads the now-current record.
    pub fn acquire(&self, key: &str) -> EngineResult<KeyGuard> {
        let mut held = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !held.insert(key.to_string()) {
            return Err(EngineError::ConcurrentRecalculation { key: key.to_string() });
        }
        Ok(KeyGuard {
            key:   key.to_string(),
            inner: Arc::clone(&self.inner),
        })
    }
}

/// RAII guard: releases the key on drop, including on the error paths out
/// of a recalculation.
pub struct KeyGuard {
    key:   String,
    inner: Arc<Mutex<HashSet<String>>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut held = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        held.remove(&self.key);
    }
}

pub struct CommissionEngine {
    plan:  CommissionPlan,
    store: CommissionStore,
    facts: Box<dyn FactProvider>,
    teams: Box<dyn TeamAggregateProvider>,
    sink:  Box<dyn NotificationSink>,
    locks: KeyLocks,
}

impl CommissionEngine {
    /// Build an engine over an already-migrated store. Validates the plan
    /// up front so tier configuration errors surface here, not mid-payout.
    pub fn new(
        plan: CommissionPlan,
        store: CommissionStore,
        facts: Box<dyn FactProvider>,
        teams: Box<dyn TeamAggregateProvider>,
        sink: Box<dyn NotificationSink>,
    ) -> EngineResult<Self> {
        plan.validate()?;
        Ok(Self {
            plan,
            store,
            facts,
            teams,
            sink,
            locks: KeyLocks::default(),
        })
    }

    /// A handle to the engine's per-key lock set. Used by callers that
    /// coordinate externally (and by tests simulating a racing trigger).
    pub fn lock_handle(&self) -> KeyLocks {
        self.locks.clone()
    }

    /// Recompute the commission for one (employee, month) key.
    ///
    /// Idempotent for unchanged facts and rate-table version: the new
    /// record's total_commission is bit-identical to the previous one.
    /// Always creates a new record; the previous current record (approved
    /// or not) is superseded, never mutated.
    pub fn recalculate(
        &self,
        employee_id: &EmployeeId,
        month: Month,
    ) -> EngineResult<CommissionRecord> {
        let key = format!("{employee_id}:{month}");
        let _guard = self.locks.acquire(&key)?;
        log::debug!("{key}: recalculation started");

        let facts = self.facts.get_facts(employee_id, month)?;
        let team = self.fetch_team_if_needed(&facts.team_id, month)?;

        let table = self
            .plan
            .rate_catalog
            .table_for(facts.department, month.first_day())?;
        let metric_value = self.plan.metric_for(facts.department).value_of(&facts);
        let tier = table.resolve_tier(metric_value)?;

        // Bonus percentage rules reference the base amount, so compute it
        // once here exactly as the aggregator will.
        let base_amount = round_money(tier.fixed_amount + metric_value * tier.percentage_rate);
        let bonuses = compute_bonuses(&self.plan.bonus_rules, &facts, team.as_ref(), base_amount);
        let penalty_pct = compute_penalty_pct(&self.plan.penalty_rules, &facts);

        let superseded = self.store.current_record(employee_id, month)?;
        let mut record = aggregate(
            employee_id,
            month,
            facts.department,
            metric_value,
            tier,
            bonuses,
            penalty_pct,
            superseded.as_ref().map(|r| r.record_id.clone()),
        );

        let lifecycle = LifecycleManager::new(&self.store, &self.plan);
        let flagged_variance = lifecycle.settle_new_record(&mut record, superseded.as_ref())?;

        self.store.insert_record(&record)?;

        self.emit(EngineEvent::CommissionRecalculated {
            record_id:   record.record_id.clone(),
            employee_id: employee_id.clone(),
            month,
            total_commission: record.total_commission,
            superseded:  record.supersedes_record_id.clone(),
        });
        if let Some(variance) = flagged_variance {
            self.emit(EngineEvent::CommissionFlaggedForReview {
                record_id:   record.record_id.clone(),
                employee_id: employee_id.clone(),
                month,
                variance_pct: variance,
            });
        }

        log::info!(
            "{key}: computed total {} (base {}, bonuses {}, penalty {}%), status {}",
            record.total_commission,
            record.base_amount,
            record.bonus_total,
            record.penalty_pct,
            record.status,
        );
        Ok(record)
    }

    /// Approve a pending record. Authorization semantics live in the
    /// lifecycle manager; this wrapper adds the event emission.
    pub fn approve(&self, record_id: &RecordId, actor: &Actor) -> EngineResult<CommissionRecord> {
        let lifecycle = LifecycleManager::new(&self.store, &self.plan);
        let record = lifecycle.approve(record_id, actor)?;
        self.emit(EngineEvent::CommissionApproved {
            record_id:   record.record_id.clone(),
            employee_id: record.employee_id.clone(),
            month:       record.month,
            actor:       actor.id.clone(),
        });
        Ok(record)
    }

    /// Reject a pending record with a reason.
    pub fn reject(
        &self,
        record_id: &RecordId,
        actor: &Actor,
        reason: &str,
    ) -> EngineResult<CommissionRecord> {
        let lifecycle = LifecycleManager::new(&self.store, &self.plan);
        let record = lifecycle.reject(record_id, actor, reason)?;
        self.emit(EngineEvent::CommissionRejected {
            record_id:   record.record_id.clone(),
            employee_id: record.employee_id.clone(),
            month:       record.month,
            actor:       actor.id.clone(),
            reason:      reason.to_string(),
        });
        Ok(record)
    }

    // ── Read-only query surface (dashboards) ───────────────────

    pub fn monthly_commission(
        &self,
        employee_id: &EmployeeId,
        month: Month,
    ) -> EngineResult<Option<CommissionRecord>> {
        self.store.current_record(employee_id, month)
    }

    /// Chronological history including superseded records, for audit.
    pub fn commission_history(
        &self,
        employee_id: &EmployeeId,
    ) -> EngineResult<Vec<CommissionRecord>> {
        self.store.history(employee_id)
    }

    pub fn events_for(
        &self,
        employee_id: &EmployeeId,
        month: Month,
    ) -> EngineResult<Vec<EventLogEntry>> {
        self.store.events_for(employee_id, month)
    }

    pub fn plan(&self) -> &CommissionPlan {
        &self.plan
    }

    // ── Internals ──────────────────────────────────────────────

    /// Fetch team aggregates only when a team-scoped bonus rule is active
    /// and the employee belongs to a team.
    fn fetch_team_if_needed(
        &self,
        team_id: &Option<String>,
        month: Month,
    ) -> EngineResult<Option<TeamAggregates>> {
        let team_scoped = self
            .plan
            .bonus_rules
            .iter()
            .any(|r| matches!(r, BonusRule::TeamLead { .. }));
        match (team_scoped, team_id) {
            (true, Some(id)) => Ok(Some(self.teams.get_team_facts(id, month)?)),
            _ => Ok(None),
        }
    }

    /// Record the event in the persistent log and offer it to the sink.
    /// Neither failure aborts the already-persisted computation: the log
    /// write is reported loudly, the sink is fire-and-forget.
    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.store.append_event(&event) {
            log::error!("event log write failed for {}: {e}", event.type_name());
        }
        if let Err(e) = self.sink.notify(&event) {
            log::warn!("notification sink failed for {}: {e}", event.type_name());
        }
    }
}
