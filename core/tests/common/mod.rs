//! Shared test fixtures: in-memory engines wired to stub providers.

// Each test binary compiles this module; not every binary uses every helper.
#![allow(dead_code)]

use commission_core::config::CommissionPlan;
use commission_core::engine::CommissionEngine;
use commission_core::error::{EngineError, EngineResult};
use commission_core::event::{EngineEvent, NotificationSink};
use commission_core::facts::{
    FactProvider, PerformanceFacts, TeamAggregateProvider, TeamAggregates,
};
use commission_core::store::CommissionStore;
use commission_core::types::{Department, EmployeeId, Month, TeamId};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct StubFacts {
    facts: HashMap<(EmployeeId, Month), PerformanceFacts>,
}

impl StubFacts {
    pub fn new() -> Self {
        Self { facts: HashMap::new() }
    }

    pub fn with(mut self, facts: PerformanceFacts) -> Self {
        self.facts
            .insert((facts.employee_id.clone(), facts.month), facts);
        self
    }
}

impl FactProvider for StubFacts {
    fn get_facts(
        &self,
        employee_id: &EmployeeId,
        month: Month,
    ) -> EngineResult<PerformanceFacts> {
        self.facts
            .get(&(employee_id.clone(), month))
            .cloned()
            .ok_or_else(|| EngineError::FactsUnavailable {
                employee_id: employee_id.clone(),
                month,
                reason: "no activity recorded".into(),
            })
    }
}

/// Fact source whose contents can be swapped mid-test, to model upstream
/// fact changes between recalculations.
#[derive(Clone, Default)]
pub struct SharedFacts {
    inner: Arc<Mutex<HashMap<(EmployeeId, Month), PerformanceFacts>>>,
}

impl SharedFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, facts: PerformanceFacts) {
        self.inner
            .lock()
            .unwrap()
            .insert((facts.employee_id.clone(), facts.month), facts);
    }
}

impl FactProvider for SharedFacts {
    fn get_facts(
        &self,
        employee_id: &EmployeeId,
        month: Month,
    ) -> EngineResult<PerformanceFacts> {
        self.inner
            .lock()
            .unwrap()
            .get(&(employee_id.clone(), month))
            .cloned()
            .ok_or_else(|| EngineError::FactsUnavailable {
                employee_id: employee_id.clone(),
                month,
                reason: "no activity recorded".into(),
            })
    }
}

pub struct StubTeams {
    teams: HashMap<(TeamId, Month), TeamAggregates>,
}

impl StubTeams {
    pub fn new() -> Self {
        Self { teams: HashMap::new() }
    }

    pub fn with(mut self, aggregates: TeamAggregates) -> Self {
        self.teams
            .insert((aggregates.team_id.clone(), aggregates.month), aggregates);
        self
    }
}

impl TeamAggregateProvider for StubTeams {
    fn get_team_facts(&self, team_id: &TeamId, month: Month) -> EngineResult<TeamAggregates> {
        self.teams
            .get(&(team_id.clone(), month))
            .cloned()
            .ok_or_else(|| EngineError::FactsUnavailable {
                employee_id: team_id.clone(),
                month,
                reason: "no team aggregates recorded".into(),
            })
    }
}

/// Sink that remembers every event it was offered.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.type_name())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &EngineEvent) -> EngineResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Sink that always fails delivery. Recalculation must still succeed.
pub struct FailingSink;

impl NotificationSink for FailingSink {
    fn notify(&self, _event: &EngineEvent) -> EngineResult<()> {
        Err(anyhow::anyhow!("smtp relay down").into())
    }
}

/// The worked dispatch example: invoice total 18,400, 22 loads, 3 own
/// leads, clean attendance.
pub fn dispatch_facts(employee_id: &str, month: Month) -> PerformanceFacts {
    PerformanceFacts {
        employee_id: employee_id.to_string(),
        month,
        department:  Department::Dispatch,
        team_id:     None,
        active_leads:   0,
        inbound_leads:  0,
        outbound_leads: 0,
        new_leads:      0,
        own_leads:      3,
        completed_loads: 22,
        invoice_total:   dec!(18400),
        team_target_met:        true,
        tenure_under_two_weeks: false,
        attendance_complete:    true,
        quality_standards_met:  true,
    }
}

pub fn may() -> Month {
    Month::new(2025, 5).unwrap()
}

pub fn build_engine(
    plan: CommissionPlan,
    facts: impl FactProvider + 'static,
    teams: impl TeamAggregateProvider + 'static,
    sink: impl NotificationSink + 'static,
) -> CommissionEngine {
    let store = CommissionStore::in_memory().unwrap();
    store.migrate().unwrap();
    CommissionEngine::new(plan, store, Box::new(facts), Box::new(teams), Box::new(sink))
        .unwrap()
}

/// Default-plan engine preloaded with the worked dispatch example.
pub fn example_engine(employee_id: &str) -> CommissionEngine {
    build_engine(
        CommissionPlan::default_plan(),
        StubFacts::new().with(dispatch_facts(employee_id, may())),
        StubTeams::new(),
        RecordingSink::new(),
    )
}
