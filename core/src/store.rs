//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database. Every other module goes
//! through `CommissionStore` methods — nothing else executes SQL.
//!
//! Money columns are TEXT holding canonical Decimal strings, so totals
//! read back bit-identical to what was computed. Records are append-only:
//! superseding marks the previous row non-current inside the same
//! transaction that inserts the new row.

use crate::aggregator::CommissionRecord;
use crate::error::EngineResult;
use crate::event::{EngineEvent, EventLogEntry};
use crate::lifecycle::RecordStatus;
use crate::tiers::RateTier;
use crate::types::{EmployeeId, Month, RecordId};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

pub struct CommissionStore {
    conn: Connection,
}

impl CommissionStore {
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_commission.sql"))?;
        self.conn
            .execute_batch(include_str!("../../migrations/002_event_log.sql"))?;
        Ok(())
    }

    // ── Commission records ─────────────────────────────────────

    /// Persist a new record, superseding any current record for the same
    /// (employee, month) in the same transaction. The persist step is the
    /// single atomic write of a recalculation.
    pub fn insert_record(&self, record: &CommissionRecord) -> EngineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE commission_record SET is_current = 0
             WHERE employee_id = ?1 AND month = ?2 AND is_current = 1",
            params![record.employee_id, record.month.to_string()],
        )?;
        tx.execute(
            "INSERT INTO commission_record (
                record_id, employee_id, month, department, metric_value,
                tier_lower, tier_upper, tier_fixed_amount, tier_percentage_rate,
                base_amount, bonus_breakdown, bonus_total, penalty_pct,
                total_commission, status, flagged_for_review,
                decided_by, rejection_reason, computed_at,
                supersedes_record_id, is_current
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, 1)",
            params![
                record.record_id,
                record.employee_id,
                record.month.to_string(),
                record.department.as_str(),
                record.metric_value.to_string(),
                record.tier_applied.lower.to_string(),
                record.tier_applied.upper.map(|u| u.to_string()),
                record.tier_applied.fixed_amount.to_string(),
                record.tier_applied.percentage_rate.to_string(),
                record.base_amount.to_string(),
                serde_json::to_string(&record.bonus_breakdown)?,
                record.bonus_total.to_string(),
                record.penalty_pct.to_string(),
                record.total_commission.to_string(),
                record.status.as_str(),
                record.flagged_for_review as i32,
                record.decided_by.as_deref(),
                record.rejection_reason.as_deref(),
                record.computed_at.to_rfc3339(),
                record.supersedes_record_id.as_deref(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_record(&self, record_id: &RecordId) -> EngineResult<Option<CommissionRecord>> {
        self.conn
            .query_row(
                &format!("{RECORD_SELECT} WHERE record_id = ?1"),
                params![record_id],
                record_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    /// The current (non-superseded) record for one (employee, month).
    pub fn current_record(
        &self,
        employee_id: &EmployeeId,
        month: Month,
    ) -> EngineResult<Option<CommissionRecord>> {
        self.conn
            .query_row(
                &format!(
                    "{RECORD_SELECT}
                     WHERE employee_id = ?1 AND month = ?2 AND is_current = 1"
                ),
                params![employee_id, month.to_string()],
                record_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Full chronological history including superseded records, for audit.
    pub fn history(&self, employee_id: &EmployeeId) -> EngineResult<Vec<CommissionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT}
             WHERE employee_id = ?1
             ORDER BY month ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![employee_id], record_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Apply a lifecycle decision. Only called by the lifecycle manager.
    pub fn update_decision(
        &self,
        record_id: &RecordId,
        status: RecordStatus,
        decided_by: &str,
        rejection_reason: Option<&str>,
    ) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE commission_record
             SET status = ?1, decided_by = ?2, rejection_reason = ?3
             WHERE record_id = ?4",
            params![status.as_str(), decided_by, rejection_reason, record_id],
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &EngineEvent) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO engine_event_log (employee_id, month, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.employee_id(),
                event.month().to_string(),
                event.type_name(),
                serde_json::to_string(event)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for(
        &self,
        employee_id: &EmployeeId,
        month: Month,
    ) -> EngineResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, employee_id, month, event_type, payload, created_at
             FROM engine_event_log
             WHERE employee_id = ?1 AND month = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![employee_id, month.to_string()], |row| {
            Ok(EventLogEntry {
                id:          Some(row.get(0)?),
                employee_id: row.get(1)?,
                month:       parse_col(row, 2)?,
                event_type:  row.get(3)?,
                payload:     row.get(4)?,
                created_at:  row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

const RECORD_SELECT: &str = "SELECT record_id, employee_id, month, department, metric_value,
        tier_lower, tier_upper, tier_fixed_amount, tier_percentage_rate,
        base_amount, bonus_breakdown, bonus_total, penalty_pct,
        total_commission, status, flagged_for_review,
        decided_by, rejection_reason, computed_at, supersedes_record_id
 FROM commission_record";

fn record_row_mapper(row: &Row<'_>) -> rusqlite::Result<CommissionRecord> {
    let upper: Option<String> = row.get(6)?;
    let breakdown_json: String = row.get(10)?;
    let breakdown: BTreeMap<String, Decimal> = serde_json::from_str(&breakdown_json)
        .map_err(|e| conversion_err(10, e.to_string()))?;

    Ok(CommissionRecord {
        record_id:   row.get(0)?,
        employee_id: row.get(1)?,
        month:       parse_col(row, 2)?,
        department:  parse_col(row, 3)?,
        metric_value: dec_col(row, 4)?,
        tier_applied: RateTier {
            lower: dec_col(row, 5)?,
            upper: match upper {
                Some(u) => Some(
                    Decimal::from_str(&u).map_err(|e| conversion_err(6, e.to_string()))?,
                ),
                None => None,
            },
            fixed_amount:    dec_col(row, 7)?,
            percentage_rate: dec_col(row, 8)?,
        },
        base_amount:     dec_col(row, 9)?,
        bonus_breakdown: breakdown,
        bonus_total:     dec_col(row, 11)?,
        penalty_pct:     dec_col(row, 12)?,
        total_commission: dec_col(row, 13)?,
        status: parse_col(row, 14)?,
        flagged_for_review: row.get::<_, i32>(15)? != 0,
        decided_by:       row.get(16)?,
        rejection_reason: row.get(17)?,
        computed_at: {
            let raw: String = row.get(18)?;
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| conversion_err(18, e.to_string()))?
                .with_timezone(&Utc)
        },
        supersedes_record_id: row.get(19)?,
    })
}

fn dec_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_err(idx, e.to_string()))
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: ToString,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: T::Err| conversion_err(idx, e.to_string()))
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}
