//! Shared primitive types used across the entire engine.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stable, unique identifier for an employee, assigned upstream.
pub type EmployeeId = String;

/// A stable, unique identifier for a team.
pub type TeamId = String;

/// The canonical commission record identifier (UUID v4, as text).
pub type RecordId = String;

/// The departments the engine computes commission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Sales,
    Dispatch,
    Hr,
    Finance,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Sales    => "sales",
            Department::Dispatch => "dispatch",
            Department::Hr       => "hr",
            Department::Finance  => "finance",
        }
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales"    => Ok(Department::Sales),
            "dispatch" => Ok(Department::Dispatch),
            "hr"       => Ok(Department::Hr),
            "finance"  => Ok(Department::Finance),
            other      => Err(format!("unknown department: {other}")),
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar month key, formatted as "YYYY-MM".
///
/// The engine has no ambient "current month" state: every operation takes an
/// explicit (employee, month) key, and rate tables are resolved against the
/// first day of this month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    pub year:  i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range: {month}"));
        }
        Ok(Self { year, month })
    }

    /// First calendar day of the month, used for rate-table versioning.
    pub fn first_day(&self) -> NaiveDate {
        // Months are validated on construction, so day 1 always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid month key (expected YYYY-MM): {s}"))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid year in month key: {s}"))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month in month key: {s}"))?;
        Month::new(year, month)
    }
}

impl TryFrom<String> for Month {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Month> for String {
    fn from(m: Month) -> String {
        m.to_string()
    }
}

/// Round to currency precision: 2 decimal places, half-up (midpoint away
/// from zero). The single rounding rule used everywhere in the engine —
/// each bonus is rounded through this before summation, as are the base
/// amount and the final total.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn month_roundtrips_through_display_and_parse() {
        let m: Month = "2025-05".parse().unwrap();
        assert_eq!(m, Month::new(2025, 5).unwrap());
        assert_eq!(m.to_string(), "2025-05");
        assert_eq!(m.first_day(), NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
    }

    #[test]
    fn month_rejects_garbage() {
        assert!("2025".parse::<Month>().is_err());
        assert!("2025-13".parse::<Month>().is_err());
        assert!("2025-00".parse::<Month>().is_err());
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
    }
}
