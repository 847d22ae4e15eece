//! Commission aggregation — composes tier amount, bonuses, and penalty
//! into one immutable, human-auditable record.
//!
//! RULE: The aggregator produces values. It never touches persisted state;
//! the lifecycle manager owns every status transition and the store owns
//! every write.

use crate::lifecycle::RecordStatus;
use crate::tiers::RateTier;
use crate::types::{round_money, Department, EmployeeId, Month, RecordId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The immutable result of one computation. Records are superseded, never
/// mutated or deleted: a recomputation creates a fresh record linked via
/// `supersedes_record_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub record_id:   RecordId,
    pub employee_id: EmployeeId,
    pub month:       Month,
    pub department:  Department,

    /// Metric the tier was resolved against (invoice total for dispatch,
    /// configured lead metric for sales).
    pub metric_value: Decimal,
    pub tier_applied: RateTier,

    pub base_amount:     Decimal,
    pub bonus_breakdown: BTreeMap<String, Decimal>,
    pub bonus_total:     Decimal,
    pub penalty_pct:     Decimal,
    pub total_commission: Decimal,

    pub status: RecordStatus,
    /// Set when the delta against the superseded approved record exceeds
    /// the plan's variance threshold; approval then needs an admin.
    pub flagged_for_review: bool,
    pub decided_by:       Option<String>,
    pub rejection_reason: Option<String>,

    pub computed_at: DateTime<Utc>,
    pub supersedes_record_id: Option<RecordId>,
}

/// Compose an unsaved record from already-evaluated parts.
///
/// base = fixed + metric * rate
/// gross = base + Σ bonuses (each pre-rounded by the calculator)
/// total = max(0, gross * (1 - penalty/100))
///
/// All arithmetic is fixed-point Decimal so recomputation over the same
/// inputs is bit-identical.
pub fn aggregate(
    employee_id: &EmployeeId,
    month: Month,
    department: Department,
    metric_value: Decimal,
    tier: &RateTier,
    bonuses: BTreeMap<String, Decimal>,
    penalty_pct: Decimal,
    supersedes: Option<RecordId>,
) -> CommissionRecord {
    debug_assert!(
        penalty_pct >= Decimal::ZERO && penalty_pct <= Decimal::ONE_HUNDRED,
        "penalty evaluator contract violated: {penalty_pct}"
    );

    let base_amount = round_money(tier.fixed_amount + metric_value * tier.percentage_rate);
    let bonus_total: Decimal = bonuses.values().copied().sum();
    let gross = base_amount + bonus_total;

    let retained = Decimal::ONE - penalty_pct / Decimal::ONE_HUNDRED;
    let total = round_money(gross * retained).max(Decimal::ZERO);

    CommissionRecord {
        record_id:   Uuid::new_v4().to_string(),
        employee_id: employee_id.clone(),
        month,
        department,
        metric_value,
        tier_applied: tier.clone(),
        base_amount,
        bonus_breakdown: bonuses,
        bonus_total,
        penalty_pct,
        total_commission: total,
        status: RecordStatus::Computed,
        flagged_for_review: false,
        decided_by:       None,
        rejection_reason: None,
        computed_at: Utc::now(),
        supersedes_record_id: supersedes,
    }
}
