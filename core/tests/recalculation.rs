//! Recalculation trigger behavior: worked examples, idempotence, history
//! preservation, supersede links, concurrency, and failure modes.

mod common;

use commission_core::bonus::BonusRule;
use commission_core::config::CommissionPlan;
use commission_core::error::EngineError;
use commission_core::lifecycle::{Actor, ActorRole, RecordStatus};
use commission_core::penalty::PenaltyRule;
use common::*;
use rust_decimal_macros::dec;

/// Plan for the worked dispatch example: three brackets, a $50 own-lead
/// bonus, a 10% attendance penalty.
fn worked_example_plan() -> CommissionPlan {
    let mut plan = CommissionPlan::default_plan();
    plan.bonus_rules = vec![BonusRule::OwnLead { amount_per_lead: dec!(50) }];
    plan.penalty_rules = vec![PenaltyRule::AttendanceMiss { pct: dec!(10) }];
    plan
}

fn approver() -> Actor {
    Actor { id: "mgr-1".into(), role: ActorRole::Approver }
}

#[test]
fn worked_dispatch_example_through_the_full_path() {
    let engine = build_engine(
        worked_example_plan(),
        StubFacts::new().with(dispatch_facts("emp-9", may())),
        StubTeams::new(),
        RecordingSink::new(),
    );

    let record = engine.recalculate(&"emp-9".to_string(), may()).unwrap();

    // Tier matched is the 10000-20000 bracket.
    assert_eq!(record.tier_applied.lower, dec!(10000));
    assert_eq!(record.base_amount, dec!(1604.00));
    assert_eq!(record.bonus_breakdown["own_lead"], dec!(150.00));
    assert_eq!(record.penalty_pct, dec!(0));
    assert_eq!(record.total_commission, dec!(1754.00));
    assert_eq!(record.status, RecordStatus::PendingApproval);
}

#[test]
fn attendance_penalty_reduces_the_worked_example() {
    let mut facts = dispatch_facts("emp-9", may());
    facts.attendance_complete = false;

    let engine = build_engine(
        worked_example_plan(),
        StubFacts::new().with(facts),
        StubTeams::new(),
        RecordingSink::new(),
    );

    let record = engine.recalculate(&"emp-9".to_string(), may()).unwrap();
    assert_eq!(record.penalty_pct, dec!(10));
    assert_eq!(record.total_commission, dec!(1578.60));
}

#[test]
fn recalculation_is_idempotent_for_unchanged_facts() {
    let engine = example_engine("emp-9");
    let emp = "emp-9".to_string();

    let first = engine.recalculate(&emp, may()).unwrap();
    let second = engine.recalculate(&emp, may()).unwrap();

    assert_eq!(first.total_commission, second.total_commission);
    // Bit-identical, not merely numerically equal.
    assert_eq!(
        first.total_commission.to_string(),
        second.total_commission.to_string()
    );
    assert_ne!(first.record_id, second.record_id);
}

#[test]
fn history_grows_by_exactly_one_per_recalculation() {
    let engine = example_engine("emp-9");
    let emp = "emp-9".to_string();

    for expected_len in 1..=4 {
        engine.recalculate(&emp, may()).unwrap();
        assert_eq!(engine.commission_history(&emp).unwrap().len(), expected_len);
    }
}

#[test]
fn recalculating_an_approved_record_supersedes_without_mutating_it() {
    let engine = build_engine(
        worked_example_plan(),
        StubFacts::new().with(dispatch_facts("emp-9", may())),
        StubTeams::new(),
        RecordingSink::new(),
    );
    let emp = "emp-9".to_string();

    let original = engine.recalculate(&emp, may()).unwrap();
    engine.approve(&original.record_id, &approver()).unwrap();

    let superseding = engine.recalculate(&emp, may()).unwrap();

    // Unchanged facts: identical total, fresh record, link back.
    assert_eq!(superseding.total_commission, original.total_commission);
    assert_eq!(
        superseding.supersedes_record_id.as_deref(),
        Some(original.record_id.as_str())
    );
    assert!(!superseding.flagged_for_review);

    // The approved predecessor is still there, still approved.
    let history = engine.commission_history(&emp).unwrap();
    assert_eq!(history.len(), 2);
    let old = history
        .iter()
        .find(|r| r.record_id == original.record_id)
        .unwrap();
    assert_eq!(old.status, RecordStatus::Approved);

    // The query surface serves the superseding record as current.
    let current = engine.monthly_commission(&emp, may()).unwrap().unwrap();
    assert_eq!(current.record_id, superseding.record_id);
}

#[test]
fn missing_facts_produce_a_typed_error_and_no_record() {
    let engine = example_engine("emp-9");
    let ghost = "emp-nobody".to_string();

    let err = engine.recalculate(&ghost, may()).unwrap_err();
    assert!(matches!(err, EngineError::FactsUnavailable { .. }));
    assert!(engine.monthly_commission(&ghost, may()).unwrap().is_none());
    assert!(engine.commission_history(&ghost).unwrap().is_empty());
}

#[test]
fn racing_recalculation_for_the_same_key_is_rejected() {
    let engine = example_engine("emp-9");
    let emp = "emp-9".to_string();

    let guard = engine.lock_handle().acquire("emp-9:2025-05").unwrap();
    let err = engine.recalculate(&emp, may()).unwrap_err();
    assert!(matches!(err, EngineError::ConcurrentRecalculation { .. }));

    // A different key is unaffected, and the key frees on drop.
    engine.lock_handle().acquire("emp-8:2025-05").unwrap();
    drop(guard);
    engine.recalculate(&emp, may()).unwrap();
}

#[test]
fn notification_failure_does_not_roll_back_the_computation() {
    let engine = build_engine(
        worked_example_plan(),
        StubFacts::new().with(dispatch_facts("emp-9", may())),
        StubTeams::new(),
        FailingSink,
    );
    let emp = "emp-9".to_string();

    let record = engine.recalculate(&emp, may()).unwrap();
    assert_eq!(record.total_commission, dec!(1754.00));
    assert!(engine.monthly_commission(&emp, may()).unwrap().is_some());
    // The persistent event log still recorded the recalculation.
    let events = engine.events_for(&emp, may()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "commission_recalculated");
}

#[test]
fn events_are_logged_and_delivered_in_order() {
    let sink = RecordingSink::new();
    let engine = build_engine(
        worked_example_plan(),
        StubFacts::new().with(dispatch_facts("emp-9", may())),
        StubTeams::new(),
        sink.clone(),
    );
    let emp = "emp-9".to_string();

    let record = engine.recalculate(&emp, may()).unwrap();
    engine.approve(&record.record_id, &approver()).unwrap();

    let logged: Vec<String> = engine
        .events_for(&emp, may())
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(logged, ["commission_recalculated", "commission_approved"]);
    assert_eq!(
        sink.event_types(),
        ["commission_recalculated", "commission_approved"]
    );
}

#[test]
fn removing_one_bonus_rule_shifts_the_total_by_exactly_that_bonus() {
    let mut facts = dispatch_facts("emp-9", may());
    facts.new_leads = 2;

    let full = CommissionPlan::default_plan();
    let mut without_new_lead = CommissionPlan::default_plan();
    without_new_lead
        .bonus_rules
        .retain(|r| !matches!(r, BonusRule::NewLead { .. }));

    let engine_full = build_engine(
        full,
        StubFacts::new().with(facts.clone()),
        StubTeams::new(),
        RecordingSink::new(),
    );
    let engine_reduced = build_engine(
        without_new_lead,
        StubFacts::new().with(facts),
        StubTeams::new(),
        RecordingSink::new(),
    );

    let emp = "emp-9".to_string();
    let with_bonus = engine_full.recalculate(&emp, may()).unwrap();
    let without_bonus = engine_reduced.recalculate(&emp, may()).unwrap();

    let new_lead_amount = with_bonus.bonus_breakdown["new_lead"];
    assert_eq!(new_lead_amount, dec!(50.00));
    assert_eq!(
        with_bonus.total_commission - without_bonus.total_commission,
        new_lead_amount
    );
    assert_eq!(with_bonus.base_amount, without_bonus.base_amount);
    assert_eq!(with_bonus.penalty_pct, without_bonus.penalty_pct);
}
