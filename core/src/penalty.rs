//! Penalty rules — additive percentage reductions, clamped to [0, 100].
//!
//! RULE: the evaluator never returns a value outside [0, 100]. The clamp
//! happens here, before the aggregator applies the reduction.

use crate::facts::PerformanceFacts;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The closed set of penalty kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PenaltyRule {
    /// Attendance record incomplete for the month.
    AttendanceMiss { pct: Decimal },

    /// Quality standards not met.
    QualityMiss { pct: Decimal },

    /// Team target missed.
    TargetMiss { pct: Decimal },
}

impl PenaltyRule {
    pub fn name(&self) -> &'static str {
        match self {
            PenaltyRule::AttendanceMiss { .. } => "attendance_miss",
            PenaltyRule::QualityMiss { .. }    => "quality_miss",
            PenaltyRule::TargetMiss { .. }     => "target_miss",
        }
    }

    fn applies(&self, facts: &PerformanceFacts) -> bool {
        match self {
            PenaltyRule::AttendanceMiss { .. } => !facts.attendance_complete,
            PenaltyRule::QualityMiss { .. }    => !facts.quality_standards_met,
            PenaltyRule::TargetMiss { .. }     => !facts.team_target_met,
        }
    }

    fn pct(&self) -> Decimal {
        match self {
            PenaltyRule::AttendanceMiss { pct }
            | PenaltyRule::QualityMiss { pct }
            | PenaltyRule::TargetMiss { pct } => *pct,
        }
    }
}

/// Stack all applicable penalties additively and clamp to [0, 100].
pub fn compute_penalty_pct(rules: &[PenaltyRule], facts: &PerformanceFacts) -> Decimal {
    let total: Decimal = rules
        .iter()
        .filter(|r| r.applies(facts))
        .map(|r| r.pct())
        .sum();
    total.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Department, Month};
    use rust_decimal_macros::dec;

    fn facts(attendance: bool, quality: bool, target: bool) -> PerformanceFacts {
        PerformanceFacts {
            employee_id: "emp-1".into(),
            month:       Month::new(2025, 5).unwrap(),
            department:  Department::Dispatch,
            team_id:     None,
            active_leads:   0,
            inbound_leads:  0,
            outbound_leads: 0,
            new_leads:      0,
            own_leads:      0,
            completed_loads: 0,
            invoice_total:   Decimal::ZERO,
            team_target_met:        target,
            tenure_under_two_weeks: false,
            attendance_complete:    attendance,
            quality_standards_met:  quality,
        }
    }

    #[test]
    fn no_conditions_met_means_zero() {
        let rules = vec![
            PenaltyRule::AttendanceMiss { pct: dec!(10) },
            PenaltyRule::QualityMiss { pct: dec!(5) },
        ];
        assert_eq!(compute_penalty_pct(&rules, &facts(true, true, true)), dec!(0));
    }

    #[test]
    fn penalties_stack_additively() {
        let rules = vec![
            PenaltyRule::AttendanceMiss { pct: dec!(10) },
            PenaltyRule::QualityMiss { pct: dec!(5) },
            PenaltyRule::TargetMiss { pct: dec!(3) },
        ];
        assert_eq!(
            compute_penalty_pct(&rules, &facts(false, false, true)),
            dec!(15)
        );
        assert_eq!(
            compute_penalty_pct(&rules, &facts(false, false, false)),
            dec!(18)
        );
    }

    #[test]
    fn combined_percentage_is_clamped_at_100() {
        let rules = vec![
            PenaltyRule::AttendanceMiss { pct: dec!(60) },
            PenaltyRule::QualityMiss { pct: dec!(70) },
        ];
        assert_eq!(
            compute_penalty_pct(&rules, &facts(false, false, true)),
            dec!(100)
        );
    }
}
