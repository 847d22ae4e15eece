//! payout-runner: headless driver for the commission engine.
//!
//! Usage:
//!   payout-runner --db payouts.db --data-dir ./data --employee emp-9 --month 2025-05
//!   payout-runner --db payouts.db --data-dir ./data --history emp-9
//!   payout-runner --db payouts.db --approve <record-id> --actor admin-1:admin
//!   payout-runner --db payouts.db --reject <record-id> --actor mgr-1:approver --reason "..."

use anyhow::{anyhow, bail, Context, Result};
use commission_core::config::CommissionPlan;
use commission_core::engine::CommissionEngine;
use commission_core::error::{EngineError, EngineResult};
use commission_core::event::{EngineEvent, NotificationSink};
use commission_core::facts::{
    FactProvider, PerformanceFacts, TeamAggregateProvider, TeamAggregates,
};
use commission_core::lifecycle::{Actor, ActorRole};
use commission_core::store::CommissionStore;
use commission_core::types::{EmployeeId, Month, TeamId};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Facts file shape: a flat export from the CRM/dispatch modules.
#[derive(serde::Deserialize, Default)]
struct FactsFile {
    #[serde(default)]
    facts: Vec<PerformanceFacts>,
    #[serde(default)]
    teams: Vec<TeamAggregates>,
}

/// File-backed provider for both facts and team aggregates.
#[derive(Clone)]
struct FileFactProvider {
    facts: HashMap<(EmployeeId, Month), PerformanceFacts>,
    teams: HashMap<(TeamId, Month), TeamAggregates>,
}

impl FileFactProvider {
    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read facts file {}", path.display()))?;
        let file: FactsFile = serde_json::from_str(&raw)?;
        Ok(Self {
            facts: file
                .facts
                .into_iter()
                .map(|f| ((f.employee_id.clone(), f.month), f))
                .collect(),
            teams: file
                .teams
                .into_iter()
                .map(|t| ((t.team_id.clone(), t.month), t))
                .collect(),
        })
    }

    fn empty() -> Self {
        Self {
            facts: HashMap::new(),
            teams: HashMap::new(),
        }
    }
}

impl FactProvider for FileFactProvider {
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
                reason: "not present in facts export".into(),
            })
    }
}

impl TeamAggregateProvider for FileFactProvider {
    fn get_team_facts(&self, team_id: &TeamId, month: Month) -> EngineResult<TeamAggregates> {
        self.teams
            .get(&(team_id.clone(), month))
            .cloned()
            .ok_or_else(|| EngineError::FactsUnavailable {
                employee_id: team_id.clone(),
                month,
                reason: "team not present in facts export".into(),
            })
    }
}

/// Stdout sink: prints each event as one JSON line, for piping into the
/// surrounding tooling.
struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn notify(&self, event: &EngineEvent) -> EngineResult<()> {
        println!("event: {}", serde_json::to_string(event)?);
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");

    let store = CommissionStore::open(db).map_err(|e| anyhow!("open {db}: {e}"))?;
    store.migrate()?;

    let plan_path = Path::new(data_dir).join("commission_plan.json");
    let plan = if plan_path.exists() {
        CommissionPlan::load(&plan_path)?
    } else {
        log::info!("no plan at {}, using built-in default", plan_path.display());
        CommissionPlan::default_plan()
    };

    let facts_path = Path::new(data_dir).join("facts.json");
    let provider = if facts_path.exists() {
        FileFactProvider::load(&facts_path)?
    } else {
        log::warn!("no facts export at {}", facts_path.display());
        FileFactProvider::empty()
    };

    let engine = CommissionEngine::new(
        plan,
        store,
        Box::new(provider.clone()),
        Box::new(provider),
        Box::new(StdoutSink),
    )?;

    if let Some(record_id) = flag_value(&args, "--approve") {
        let actor = parse_actor(&args)?;
        let record = engine.approve(&record_id.to_string(), &actor)?;
        println!("approved {} -> {}", record.record_id, record.status);
        return Ok(());
    }

    if let Some(record_id) = flag_value(&args, "--reject") {
        let actor = parse_actor(&args)?;
        let reason = flag_value(&args, "--reason").unwrap_or("rejected via payout-runner");
        let record = engine.reject(&record_id.to_string(), &actor, reason)?;
        println!("rejected {} -> {}", record.record_id, record.status);
        return Ok(());
    }

    if let Some(employee) = flag_value(&args, "--history") {
        let history = engine.commission_history(&employee.to_string())?;
        println!("history for {employee}: {} record(s)", history.len());
        for r in history {
            println!(
                "  {}  {}  total {:>12}  {}{}",
                r.month,
                r.record_id,
                r.total_commission,
                r.status,
                if r.flagged_for_review { "  [review]" } else { "" },
            );
        }
        return Ok(());
    }

    // Default action: recalculate one (employee, month) key.
    let employee = flag_value(&args, "--employee")
        .ok_or_else(|| anyhow!("--employee required (or use --history/--approve/--reject)"))?;
    let month: Month = flag_value(&args, "--month")
        .ok_or_else(|| anyhow!("--month required"))?
        .parse()
        .map_err(|e| anyhow!("{e}"))?;

    let record = engine.recalculate(&employee.to_string(), month)?;
    print_record(&record);
    Ok(())
}

fn print_record(record: &commission_core::CommissionRecord) {
    println!("commission for {}/{}", record.employee_id, record.month);
    println!("  department:  {}", record.department);
    println!(
        "  tier:        [{}, {})  fixed {} + {} rate",
        record.tier_applied.lower,
        record
            .tier_applied
            .upper
            .map(|u| u.to_string())
            .unwrap_or_else(|| "inf".into()),
        record.tier_applied.fixed_amount,
        record.tier_applied.percentage_rate,
    );
    println!("  base:        {}", record.base_amount);
    for (name, amount) in &record.bonus_breakdown {
        println!("  bonus {name}: {amount}");
    }
    println!("  penalty:     {}%", record.penalty_pct);
    println!("  total:       {}", record.total_commission);
    println!("  status:      {}", record.status);
    println!("  record id:   {}", record.record_id);
    if let Some(prev) = &record.supersedes_record_id {
        println!("  supersedes:  {prev}");
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Actor flag format: "<id>:<role>", e.g. "admin-1:admin".
fn parse_actor(args: &[String]) -> Result<Actor> {
    let raw = flag_value(args, "--actor").unwrap_or("runner:admin");
    let (id, role) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("--actor must be <id>:<role>, got {raw}"))?;
    let role = match role {
        "clerk"    => ActorRole::Clerk,
        "approver" => ActorRole::Approver,
        "admin"    => ActorRole::Admin,
        other      => bail!("unknown role: {other}"),
    };
    Ok(Actor { id: id.to_string(), role })
}
