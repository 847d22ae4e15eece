//! The commission plan — every configurable input to the engine: rate
//! tables, bonus rules, penalty rules, department metrics, and the
//! approval policy. Loaded from a JSON file in the data directory, with a
//! built-in default plan used by tests and as the runner's fallback.

use crate::bonus::BonusRule;
use crate::error::{EngineError, EngineResult};
use crate::facts::PerformanceFacts;
use crate::penalty::PenaltyRule;
use crate::tiers::{RateCatalog, RateTable, RateTier};
use crate::types::Department;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Which performance metric the tier is resolved against for a department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    InvoiceTotal,
    ActiveLeads,
    CompletedLoads,
}

impl MetricKind {
    pub fn value_of(&self, facts: &PerformanceFacts) -> Decimal {
        match self {
            MetricKind::InvoiceTotal   => facts.invoice_total,
            MetricKind::ActiveLeads    => Decimal::from(facts.active_leads),
            MetricKind::CompletedLoads => Decimal::from(facts.completed_loads),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionPlan {
    /// When true, every freshly computed record waits in pending_approval
    /// for an approver; when false, unflagged records auto-approve.
    pub approval_required: bool,

    /// Percentage deviation from the superseded approved total above which
    /// a recomputation is flagged for admin review.
    pub variance_threshold_pct: Decimal,

    pub metrics:       HashMap<Department, MetricKind>,
    pub rate_catalog:  RateCatalog,
    pub bonus_rules:   Vec<BonusRule>,
    pub penalty_rules: Vec<PenaltyRule>,
}

impl CommissionPlan {
    /// Load a plan from a JSON file and validate it.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| EngineError::InvalidPlan {
            detail: format!("cannot read {}: {e}", path.display()),
        })?;
        let plan: CommissionPlan = serde_json::from_str(&raw)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Validate the plan up front so configuration errors surface at load
    /// time, not mid-computation.
    pub fn validate(&self) -> EngineResult<()> {
        self.rate_catalog.validate()?;
        if self.variance_threshold_pct < Decimal::ZERO {
            return Err(EngineError::InvalidPlan {
                detail: format!(
                    "variance threshold must be non-negative, got {}",
                    self.variance_threshold_pct
                ),
            });
        }
        for rule in &self.penalty_rules {
            let pct = match rule {
                PenaltyRule::AttendanceMiss { pct }
                | PenaltyRule::QualityMiss { pct }
                | PenaltyRule::TargetMiss { pct } => *pct,
            };
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(EngineError::InvalidPlan {
                    detail: format!("penalty {} out of [0, 100]: {pct}", rule.name()),
                });
            }
        }
        Ok(())
    }

    /// Metric used for a department. Departments without an explicit entry
    /// fall back to invoice total.
    pub fn metric_for(&self, department: Department) -> MetricKind {
        self.metrics
            .get(&department)
            .copied()
            .unwrap_or(MetricKind::InvoiceTotal)
    }

    /// The built-in default plan: dispatch on invoice total with the
    /// standard three-bracket table, sales on active leads, own-lead and
    /// team bonuses, attendance/quality penalties.
    pub fn default_plan() -> Self {
        let jan_2025 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let dispatch_table = RateTable {
            department:     Department::Dispatch,
            effective_from: jan_2025,
            effective_to:   None,
            tiers: vec![
                RateTier {
                    lower: dec!(0),
                    upper: Some(dec!(10000)),
                    fixed_amount:    dec!(0),
                    percentage_rate: dec!(0.05),
                },
                RateTier {
                    lower: dec!(10000),
                    upper: Some(dec!(20000)),
                    fixed_amount:    dec!(500),
                    percentage_rate: dec!(0.06),
                },
                RateTier {
                    lower: dec!(20000),
                    upper: None,
                    fixed_amount:    dec!(1200),
                    percentage_rate: dec!(0.07),
                },
            ],
        };

        let sales_table = RateTable {
            department:     Department::Sales,
            effective_from: jan_2025,
            effective_to:   None,
            tiers: vec![
                RateTier {
                    lower: dec!(0),
                    upper: Some(dec!(50)),
                    fixed_amount:    dec!(0),
                    percentage_rate: dec!(8),
                },
                RateTier {
                    lower: dec!(50),
                    upper: Some(dec!(120)),
                    fixed_amount:    dec!(400),
                    percentage_rate: dec!(10),
                },
                RateTier {
                    lower: dec!(120),
                    upper: None,
                    fixed_amount:    dec!(1100),
                    percentage_rate: dec!(12),
                },
            ],
        };

        let mut metrics = HashMap::new();
        metrics.insert(Department::Dispatch, MetricKind::InvoiceTotal);
        metrics.insert(Department::Sales, MetricKind::ActiveLeads);

        CommissionPlan {
            approval_required:      true,
            variance_threshold_pct: dec!(15),
            metrics,
            rate_catalog: RateCatalog {
                tables: vec![dispatch_table, sales_table],
            },
            bonus_rules: vec![
                BonusRule::OwnLead { amount_per_lead: dec!(50) },
                BonusRule::NewLead { amount_per_lead: dec!(25) },
                BonusRule::FirstTwoWeeks { pct_of_base: dec!(10) },
                BonusRule::ActiveTrucks { amount_per_load: dec!(5), min_loads: 20 },
                BonusRule::TeamLead { amount: dec!(200) },
            ],
            penalty_rules: vec![
                PenaltyRule::AttendanceMiss { pct: dec!(10) },
                PenaltyRule::QualityMiss { pct: dec!(5) },
            ],
        }
    }
}
