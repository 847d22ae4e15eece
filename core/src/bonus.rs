//! Bonus rules — independent, composable, order-insensitive.
//!
//! RULE: No bonus may read another bonus's output. Every rule is evaluated
//! against the same immutable facts snapshot (plus a read-only team
//! projection where the rule is team-scoped). An inapplicable rule
//! contributes 0, never an error.

use crate::facts::{PerformanceFacts, TeamAggregates};
use crate::types::round_money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of bonus kinds, each carrying its own typed parameters.
/// Adding a kind means adding a variant — the match in `evaluate` is
/// exhaustive, so the compiler flags every site that needs updating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BonusRule {
    /// Per lead the employee sourced themselves.
    OwnLead { amount_per_lead: Decimal },

    /// Per lead newly acquired this month.
    NewLead { amount_per_lead: Decimal },

    /// Percentage of the base amount while tenure is under two weeks.
    FirstTwoWeeks { pct_of_base: Decimal },

    /// Per completed load, once the month's completed-load count reaches
    /// the threshold.
    ActiveTrucks { amount_per_load: Decimal, min_loads: u32 },

    /// Flat amount when the team's collective target is met.
    TeamLead { amount: Decimal },
}

impl BonusRule {
    /// Stable name used as the breakdown key and in the audit trail.
    pub fn name(&self) -> &'static str {
        match self {
            BonusRule::OwnLead { .. }       => "own_lead",
            BonusRule::NewLead { .. }       => "new_lead",
            BonusRule::FirstTwoWeeks { .. } => "first_two_weeks",
            BonusRule::ActiveTrucks { .. }  => "active_trucks",
            BonusRule::TeamLead { .. }      => "team_lead",
        }
    }

    /// Evaluate this rule in isolation. Returns the unrounded amount;
    /// the calculator rounds each result before summation.
    fn evaluate(
        &self,
        facts: &PerformanceFacts,
        team: Option<&TeamAggregates>,
        base_amount: Decimal,
    ) -> Decimal {
        match self {
            BonusRule::OwnLead { amount_per_lead } => {
                *amount_per_lead * Decimal::from(facts.own_leads)
            }
            BonusRule::NewLead { amount_per_lead } => {
                *amount_per_lead * Decimal::from(facts.new_leads)
            }
            BonusRule::FirstTwoWeeks { pct_of_base } => {
                if facts.tenure_under_two_weeks {
                    base_amount * *pct_of_base / Decimal::ONE_HUNDRED
                } else {
                    Decimal::ZERO
                }
            }
            BonusRule::ActiveTrucks { amount_per_load, min_loads } => {
                if facts.completed_loads >= *min_loads {
                    *amount_per_load * Decimal::from(facts.completed_loads)
                } else {
                    Decimal::ZERO
                }
            }
            BonusRule::TeamLead { amount } => {
                // Team-scoped: needs the collective target flag from the
                // aggregate projection, not the employee's own flag.
                match team {
                    Some(t) if t.team_target_met => *amount,
                    _ => Decimal::ZERO,
                }
            }
        }
    }
}

/// Evaluate every rule against the same snapshot and return the breakdown,
/// bonus name -> amount rounded to currency precision. Zero-amount entries
/// are kept so the audit trail shows which rules were in the active set.
pub fn compute_bonuses(
    rules: &[BonusRule],
    facts: &PerformanceFacts,
    team: Option<&TeamAggregates>,
    base_amount: Decimal,
) -> BTreeMap<String, Decimal> {
    rules
        .iter()
        .map(|rule| {
            let amount = round_money(rule.evaluate(facts, team, base_amount));
            (rule.name().to_string(), amount)
        })
        .collect()
}
