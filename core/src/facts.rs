//! Raw performance facts and the provider seams.
//!
//! RULE: The engine never fabricates facts. Facts come from the upstream
//! CRM/dispatch modules through the `FactProvider` trait, and team-wide
//! aggregates through `TeamAggregateProvider`. The engine performs no
//! cross-employee aggregation itself.

use crate::error::EngineResult;
use crate::types::{Department, EmployeeId, Month, TeamId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The immutable input snapshot for one (employee, month) computation.
///
/// Counts and totals are whatever the upstream modules recorded for the
/// month; the engine does not second-guess them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceFacts {
    pub employee_id: EmployeeId,
    pub month:       Month,
    pub department:  Department,
    #[serde(default)]
    pub team_id:     Option<TeamId>,

    // Lead counts by origin
    #[serde(default)]
    pub active_leads:   u32,
    #[serde(default)]
    pub inbound_leads:  u32,
    #[serde(default)]
    pub outbound_leads: u32,
    #[serde(default)]
    pub new_leads:      u32,
    #[serde(default)]
    pub own_leads:      u32,

    // Dispatch volume
    #[serde(default)]
    pub completed_loads: u32,
    #[serde(default)]
    pub invoice_total:   Decimal,

    // Flags
    #[serde(default)]
    pub team_target_met:        bool,
    #[serde(default)]
    pub tenure_under_two_weeks: bool,
    #[serde(default = "default_true")]
    pub attendance_complete:    bool,
    #[serde(default = "default_true")]
    pub quality_standards_met:  bool,
}

fn default_true() -> bool {
    true
}

/// Team-wide projection consumed by team-scoped bonus rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAggregates {
    pub team_id: TeamId,
    pub month:   Month,
    pub team_target_met: bool,
    #[serde(default)]
    pub active_trucks:      u32,
    #[serde(default)]
    pub team_invoice_total: Decimal,
}

/// Read-only accessor for raw performance facts.
///
/// Implementations must bound the fetch (network/database timeout) and
/// return `EngineError::FactsUnavailable` on expiry or missing data rather
/// than blocking the caller — the engine holds the per-key recalculation
/// lock for the duration of this call.
pub trait FactProvider: Send {
    fn get_facts(&self, employee_id: &EmployeeId, month: Month)
        -> EngineResult<PerformanceFacts>;
}

/// Read-only accessor for team-wide aggregates. Same timeout contract as
/// `FactProvider`.
pub trait TeamAggregateProvider: Send {
    fn get_team_facts(&self, team_id: &TeamId, month: Month)
        -> EngineResult<TeamAggregates>;
}
