//! Commission calculation engine.
//!
//! Converts raw monthly performance facts (leads handled, invoices issued,
//! loads completed) into a final payable commission amount per employee:
//! tiered rate tables, stacking bonuses, penalty adjustments, and an
//! approval/recalculation lifecycle with full supersede history.
//!
//! The engine is a library-level component invoked in-process by the
//! surrounding ERP. Auth, fact production, and notification delivery are
//! collaborator seams (`FactProvider`, `TeamAggregateProvider`,
//! `NotificationSink`); persistence of the engine's own records is SQLite
//! via `CommissionStore`.

pub mod aggregator;
pub mod bonus;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod facts;
pub mod lifecycle;
pub mod penalty;
pub mod store;
pub mod tiers;
pub mod types;

pub use aggregator::CommissionRecord;
pub use config::CommissionPlan;
pub use engine::CommissionEngine;
pub use error::{EngineError, EngineResult};
pub use lifecycle::{Actor, ActorRole, RecordStatus};
pub use types::{Department, EmployeeId, Month, RecordId};
