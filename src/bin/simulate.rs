use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use shared_fate_server::constants::{format_run_time, MAX_ABSORPTION, MAX_FOOD, MAX_SATURATION};
use shared_fate_server::guard::SyncState;
use shared_fate_server::settings::{DifficultyTier, MaxHealthMode, Settings};
use shared_fate_server::sim::{BotDriver, SimEvent, SimHost};
use shared_fate_server::types::{Notice, RunOutcome, RunPhase};
use shared_fate_server::RunContext;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, default_value_t = 5)]
    runs: usize,
    #[arg(long, default_value_t = 4)]
    participants: usize,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 20 * 60 * 10)]
    max_ticks: u64,
    #[arg(long)]
    half_heart: bool,
    #[arg(long)]
    difficulty: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    seed: u64,
    participants: usize,
    settings: Settings,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u64,
    participants: usize,
    outcome: String,
    #[serde(rename = "elapsedTicks")]
    elapsed_ticks: u64,
    #[serde(rename = "runTime")]
    run_time: String,
    #[serde(rename = "generationTicks")]
    generation_ticks: u64,
    #[serde(rename = "usedFallbackSpawn")]
    used_fallback_spawn: bool,
    #[serde(rename = "damageNotices")]
    damage_notices: usize,
    #[serde(rename = "forcedJumps")]
    forced_jumps: usize,
    #[serde(rename = "minHealth")]
    min_health: f32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct SimulationSummary {
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageElapsedTicks")]
    average_elapsed_ticks: u64,
    #[serde(rename = "outcomeCounts")]
    outcome_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let scenarios = match resolve_scenarios(&cli) {
        Ok(scenarios) => scenarios,
        Err(message) => {
            error!(%message, "invalid arguments");
            std::process::exit(2);
        }
    };
    let started_at = now_iso();
    let mut results = Vec::new();

    for scenario in &scenarios {
        info!(
            scenario = %scenario.name,
            seed = scenario.seed,
            participants = scenario.participants,
            "scenario started"
        );
        let result = run_scenario(scenario, cli.max_ticks);
        for anomaly in &result.anomalies {
            warn!(scenario = %scenario.name, %anomaly, "anomaly detected");
        }
        info!(
            scenario = %scenario.name,
            outcome = %result.outcome,
            run_time = %result.run_time,
            "scenario finished"
        );
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(err) => error!(%err, "failed to serialize scenario result"),
        }
        results.push(result);
    }

    let summary = build_summary(started_at, now_iso(), results);
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(err) = write_summary(path, &summary) {
            error!(%err, path = %path.display(), "summary write failed");
            std::process::exit(2);
        }
    }
    info!(
        scenarios = summary.scenario_count,
        anomalies = summary.anomaly_count,
        average_elapsed_ticks = summary.average_elapsed_ticks,
        "simulation finished"
    );

    if summary.anomaly_count > 0 {
        std::process::exit(1);
    }
}

fn resolve_scenarios(cli: &Cli) -> Result<Vec<Scenario>, String> {
    let difficulty = match cli.difficulty.as_deref() {
        None => DifficultyTier::default(),
        Some(raw) => DifficultyTier::parse(raw).ok_or_else(|| format!("unknown difficulty {raw}"))?,
    };
    let base_seed = cli.seed.unwrap_or_else(rand::random);
    let participants = cli.participants.clamp(1, 64);
    let max_health_mode = if cli.half_heart {
        MaxHealthMode::HalfHeart
    } else {
        MaxHealthMode::Standard
    };

    Ok((0..cli.runs.max(1))
        .map(|index| {
            let seed = base_seed.wrapping_add(index as u64);
            Scenario {
                name: format!("run-{}", index + 1),
                seed,
                participants,
                settings: Settings {
                    max_health_mode,
                    difficulty,
                    seed: Some(seed),
                    ..Settings::default()
                },
            }
        })
        .collect())
}

fn run_scenario(scenario: &Scenario, max_ticks: u64) -> ScenarioResultLine {
    let ctx = RunContext::new();
    let mut host = SimHost::with_participants(scenario.settings, scenario.participants);
    let mut bots = BotDriver::new(scenario.seed);
    let mut anomalies = Vec::new();
    let mut seen = HashSet::new();

    if let Err(err) = ctx.start_run(&mut host) {
        push_anomaly(&mut anomalies, &mut seen, format!("start failed: {err}"));
    }

    let mut generation_ticks = 0;
    let mut min_health = ctx.vitals().max_health;
    let mut outcome = None;
    for _ in 0..max_ticks {
        ctx.tick(&mut host);
        if ctx.phase() == RunPhase::GeneratingWorld {
            generation_ticks += 1;
        }
        bots.step(&ctx, &mut host);
        ctx.end_tick(&mut host);

        for message in check_invariants(&ctx) {
            push_anomaly(&mut anomalies, &mut seen, message);
        }
        min_health = min_health.min(ctx.vitals().health);

        if let Some(summary) = ctx.take_finished_run() {
            outcome = Some(summary.outcome);
            break;
        }
        if ctx.phase() == RunPhase::Idle {
            break;
        }
    }

    let damage_notices = host
        .notices
        .iter()
        .filter(|notice| matches!(notice, Notice::DamageShared { .. }))
        .count();
    let forced_jumps = host
        .events
        .iter()
        .filter(|event| matches!(event, SimEvent::ForcedJump { .. }))
        .count();
    let used_fallback_spawn = host
        .notices
        .iter()
        .any(|notice| matches!(notice, Notice::NoSpawnFound { .. }));

    ScenarioResultLine {
        scenario: scenario.name.clone(),
        seed: scenario.seed,
        participants: scenario.participants,
        outcome: outcome_key(outcome),
        elapsed_ticks: ctx.elapsed_ticks(),
        run_time: format_run_time(ctx.elapsed_ticks()),
        generation_ticks,
        used_fallback_spawn,
        damage_notices,
        forced_jumps,
        min_health,
        anomalies,
    }
}

fn check_invariants(ctx: &RunContext) -> Vec<String> {
    let vitals = ctx.vitals();
    let mut problems = Vec::new();
    if !(0.0..=vitals.max_health).contains(&vitals.health) {
        problems.push(format!("health {} outside 0..={}", vitals.health, vitals.max_health));
    }
    if !(0..=MAX_FOOD).contains(&vitals.hunger) {
        problems.push(format!("hunger {} out of range", vitals.hunger));
    }
    if !(0.0..=MAX_SATURATION).contains(&vitals.saturation) {
        problems.push(format!("saturation {} out of range", vitals.saturation));
    }
    if !(0.0..=MAX_ABSORPTION).contains(&vitals.absorption) {
        problems.push(format!("absorption {} out of range", vitals.absorption));
    }
    if vitals.health == 0.0 && ctx.phase() == RunPhase::Running {
        problems.push("health depleted while still running".to_string());
    }
    if ctx.sync_state() != SyncState::Idle {
        problems.push("guard still held after tick".to_string());
    }
    problems
}

fn push_anomaly(anomalies: &mut Vec<String>, seen: &mut HashSet<String>, message: String) {
    if seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn outcome_key(outcome: Option<RunOutcome>) -> String {
    match outcome {
        Some(RunOutcome::Victory) => "victory",
        Some(RunOutcome::Defeat) => "defeat",
        None => "timeout",
    }
    .to_string()
}

fn build_summary(
    started_at: String,
    finished_at: String,
    scenarios: Vec<ScenarioResultLine>,
) -> SimulationSummary {
    let scenario_count = scenarios.len();
    let total_ticks: u64 = scenarios.iter().map(|result| result.elapsed_ticks).sum();
    let average_elapsed_ticks = if scenario_count == 0 {
        0
    } else {
        total_ticks / scenario_count as u64
    };
    let mut outcome_counts = BTreeMap::new();
    for result in &scenarios {
        *outcome_counts.entry(result.outcome.clone()).or_insert(0) += 1;
    }
    SimulationSummary {
        started_at,
        finished_at,
        scenario_count,
        anomaly_count: scenarios.iter().map(|result| result.anomalies.len()).sum(),
        average_elapsed_ticks,
        outcome_counts,
        scenarios,
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_summary(path: &Path, summary: &SimulationSummary) -> io::Result<()> {
    let text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(runs: usize, seed: u64) -> Cli {
        Cli {
            runs,
            participants: 3,
            seed: Some(seed),
            max_ticks: 2_000,
            half_heart: false,
            difficulty: None,
            summary_out: None,
        }
    }

    fn make_result(outcome: &str, elapsed_ticks: u64) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            participants: 3,
            outcome: outcome.to_string(),
            elapsed_ticks,
            run_time: format_run_time(elapsed_ticks),
            generation_ticks: 1,
            used_fallback_spawn: false,
            damage_notices: 0,
            forced_jumps: 0,
            min_health: 20.0,
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn scenarios_use_consecutive_seeds() {
        let scenarios = resolve_scenarios(&cli(3, 10)).expect("valid cli");
        let seeds: Vec<u64> = scenarios.iter().map(|scenario| scenario.seed).collect();
        assert_eq!(seeds, vec![10, 11, 12]);
        assert_eq!(scenarios[2].settings.seed, Some(12));
    }

    #[test]
    fn unknown_difficulty_is_rejected() {
        let mut args = cli(1, 1);
        args.difficulty = Some("brutal".to_string());
        assert!(resolve_scenarios(&args).is_err());
    }

    #[test]
    fn build_summary_counts_outcomes() {
        let summary = build_summary(
            "a".to_string(),
            "b".to_string(),
            vec![make_result("victory", 600), make_result("defeat", 200)],
        );
        assert_eq!(summary.average_elapsed_ticks, 400);
        assert_eq!(summary.outcome_counts.get("victory"), Some(&1));
        assert_eq!(summary.outcome_counts.get("defeat"), Some(&1));
    }

    #[test]
    fn simulated_run_keeps_invariants() {
        let scenarios = resolve_scenarios(&cli(1, 77)).expect("valid cli");
        let result = run_scenario(&scenarios[0], 2_000);
        assert!(result.anomalies.is_empty(), "{:?}", result.anomalies);
        assert!(result.min_health >= 0.0);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("missing").join("summary.json");
        let summary = build_summary("a".to_string(), "b".to_string(), Vec::new());
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_deduplicates_messages() {
        let mut anomalies = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut seen, "same".to_string());
        push_anomaly(&mut anomalies, &mut seen, "same".to_string());
        assert_eq!(anomalies.len(), 1);
    }
}
