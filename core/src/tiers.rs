//! Versioned rate tables and tier resolution.
//!
//! Tables are versioned by effective date so historical recomputation
//! reproduces the exact tier the employee was under at the time, not
//! today's table. A gap in a table is a configuration error — it blocks
//! computation and is surfaced to the administrator, never defaulted.

use crate::error::{EngineError, EngineResult};
use crate::types::Department;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One bracket of a metric range: fixed amount plus percentage rate.
/// Matching is lower-inclusive / upper-exclusive; `upper = None` marks the
/// top tier, inclusive of infinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTier {
    pub lower: Decimal,
    #[serde(default)]
    pub upper: Option<Decimal>,
    pub fixed_amount:    Decimal,
    pub percentage_rate: Decimal,
}

impl RateTier {
    pub fn matches(&self, value: Decimal) -> bool {
        if value < self.lower {
            return false;
        }
        match self.upper {
            Some(upper) => value < upper,
            None        => true,
        }
    }
}

/// An ordered tier list for one department, in force for a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    pub department:     Department,
    pub effective_from: NaiveDate,
    #[serde(default)]
    pub effective_to:   Option<NaiveDate>,
    pub tiers:          Vec<RateTier>,
}

impl RateTable {
    /// Check contiguity and coverage: first tier starts at 0, every upper
    /// bound equals the next lower bound, and only the last tier is open.
    pub fn validate(&self) -> EngineResult<()> {
        let fail = |detail: String| {
            Err(EngineError::TierConfiguration {
                department: self.department.to_string(),
                detail,
            })
        };

        if self.tiers.is_empty() {
            return fail("table has no tiers".into());
        }
        if self.tiers[0].lower != Decimal::ZERO {
            return fail(format!(
                "first tier starts at {}, expected 0",
                self.tiers[0].lower
            ));
        }
        for window in self.tiers.windows(2) {
            let (cur, next) = (&window[0], &window[1]);
            match cur.upper {
                None => {
                    return fail(format!(
                        "tier starting at {} is open-ended but not last",
                        cur.lower
                    ));
                }
                Some(upper) if upper != next.lower => {
                    return fail(format!(
                        "gap or overlap between {upper} and {}",
                        next.lower
                    ));
                }
                Some(upper) if upper <= cur.lower => {
                    return fail(format!(
                        "empty tier: [{}, {upper})",
                        cur.lower
                    ));
                }
                Some(_) => {}
            }
        }
        if let Some(upper) = self.tiers.last().and_then(|t| t.upper) {
            return fail(format!(
                "top tier ending at {upper} leaves values above it uncovered"
            ));
        }
        Ok(())
    }

    pub fn in_force_on(&self, date: NaiveDate) -> bool {
        if date < self.effective_from {
            return false;
        }
        match self.effective_to {
            Some(to) => date < to,
            None     => true,
        }
    }

    /// Resolve the single tier matching a non-negative metric value.
    pub fn resolve_tier(&self, value: Decimal) -> EngineResult<&RateTier> {
        self.tiers
            .iter()
            .find(|t| t.matches(value))
            .ok_or_else(|| EngineError::NoMatchingTier {
                department: self.department.to_string(),
                value:      value.to_string(),
            })
    }
}

/// All configured rate tables, indexed by department and effective date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateCatalog {
    pub tables: Vec<RateTable>,
}

impl RateCatalog {
    /// Validate every table up front. Called once at plan load.
    pub fn validate(&self) -> EngineResult<()> {
        for table in &self.tables {
            table.validate()?;
        }
        Ok(())
    }

    /// The table in force for a department on a given date.
    /// When date ranges overlap, the most recently effective table wins.
    pub fn table_for(
        &self,
        department: Department,
        date: NaiveDate,
    ) -> EngineResult<&RateTable> {
        self.tables
            .iter()
            .filter(|t| t.department == department && t.in_force_on(date))
            .max_by_key(|t| t.effective_from)
            .ok_or_else(|| EngineError::TierConfiguration {
                department: department.to_string(),
                detail:     format!("no rate table in force on {date}"),
            })
    }
}
