use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::format_run_time;
use crate::types::{RunOutcome, RunSummary};

const MAX_STORED_RUNS: usize = 500;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredRun {
    #[serde(rename = "finishedAt", alias = "finished_at")]
    finished_at: String,
    outcome: RunOutcome,
    seed: u64,
    #[serde(rename = "elapsedTicks", alias = "elapsed_ticks")]
    elapsed_ticks: u64,
    #[serde(rename = "participantCount", alias = "participant_count")]
    participant_count: usize,
    #[serde(rename = "maxHealth", alias = "max_health")]
    max_health: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u8,
    runs: Vec<StoredRun>,
}

#[derive(Clone, Debug, Deserialize)]
struct HistoryFileRaw {
    version: u8,
    runs: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(rename = "finishedAt")]
    pub finished_at: String,
    pub outcome: RunOutcome,
    pub seed: u64,
    #[serde(rename = "runTime")]
    pub run_time: String,
    #[serde(rename = "participantCount")]
    pub participant_count: usize,
    #[serde(rename = "maxHealth")]
    pub max_health: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct HistoryResponse {
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
    #[serde(rename = "totalRuns")]
    pub total_runs: usize,
    pub victories: usize,
    #[serde(rename = "bestVictoryTime")]
    pub best_victory_time: Option<String>,
    pub recent: Vec<HistoryEntry>,
}

pub struct RunHistoryStore {
    file_path: PathBuf,
    runs: Vec<StoredRun>,
}

impl RunHistoryStore {
    pub fn new(file_path: PathBuf) -> Self {
        let runs = load_runs(&file_path);
        Self { file_path, runs }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn record_run(&mut self, summary: &RunSummary) {
        self.runs.push(StoredRun {
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            outcome: summary.outcome,
            seed: summary.seed,
            elapsed_ticks: summary.elapsed_ticks,
            participant_count: summary.participant_count,
            max_health: summary.max_health,
        });
        if self.runs.len() > MAX_STORED_RUNS {
            let excess = self.runs.len() - MAX_STORED_RUNS;
            self.runs.drain(..excess);
        }
        self.save();
    }

    pub fn best_victory_ticks(&self) -> Option<u64> {
        self.runs
            .iter()
            .filter(|run| run.outcome == RunOutcome::Victory)
            .map(|run| run.elapsed_ticks)
            .min()
    }

    pub fn build_response(&self, requested_limit: Option<usize>) -> HistoryResponse {
        let limit = requested_limit.unwrap_or(10).clamp(1, 100);
        let recent = self
            .runs
            .iter()
            .rev()
            .take(limit)
            .map(|run| HistoryEntry {
                finished_at: run.finished_at.clone(),
                outcome: run.outcome,
                seed: run.seed,
                run_time: format_run_time(run.elapsed_ticks),
                participant_count: run.participant_count,
                max_health: run.max_health,
            })
            .collect();
        HistoryResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            total_runs: self.runs.len(),
            victories: self
                .runs
                .iter()
                .filter(|run| run.outcome == RunOutcome::Victory)
                .count(),
            best_victory_time: self.best_victory_ticks().map(format_run_time),
            recent,
        }
    }

    fn save(&self) {
        if let Some(parent) = self.file_path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                warn!(%error, dir = %parent.display(), "failed to create history dir");
                return;
            }
        }

        let payload = HistoryFile {
            version: 1,
            runs: self.runs.clone(),
        };
        match serde_json::to_string_pretty(&payload) {
            Ok(text) => {
                if let Err(error) = fs::write(&self.file_path, text) {
                    warn!(%error, path = %self.file_path.display(), "failed to write history");
                }
            }
            Err(error) => {
                warn!(%error, path = %self.file_path.display(), "failed to serialize history");
            }
        }
    }
}

fn load_runs(path: &Path) -> Vec<StoredRun> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(%error, path = %path.display(), "failed to read history");
            }
            return Vec::new();
        }
    };
    let parsed = match serde_json::from_str::<HistoryFileRaw>(&text) {
        Ok(value) if value.version == 1 => value,
        Ok(value) => {
            warn!(version = value.version, path = %path.display(), "unsupported history version");
            return Vec::new();
        }
        Err(error) => {
            warn!(%error, path = %path.display(), "failed to parse history");
            return Vec::new();
        }
    };

    let mut runs = Vec::with_capacity(parsed.runs.len());
    for (index, raw) in parsed.runs.into_iter().enumerate() {
        let run: StoredRun = match serde_json::from_value(raw) {
            Ok(run) => run,
            Err(error) => {
                warn!(%error, index, "skipping malformed history entry");
                continue;
            }
        };
        if DateTime::parse_from_rfc3339(&run.finished_at).is_err() {
            warn!(index, finished_at = %run.finished_at, "skipping entry with bad timestamp");
            continue;
        }
        if !run.max_health.is_finite() || run.max_health <= 0.0 {
            continue;
        }
        runs.push(run);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(outcome: RunOutcome, elapsed_ticks: u64) -> RunSummary {
        RunSummary {
            outcome,
            seed: 7,
            elapsed_ticks,
            participant_count: 3,
            max_health: 20.0,
        }
    }

    #[test]
    fn record_run_persists_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("history.json");
        let mut store = RunHistoryStore::new(path.clone());
        store.record_run(&summary(RunOutcome::Defeat, 400));
        store.record_run(&summary(RunOutcome::Victory, 1_500));

        let reloaded = RunHistoryStore::new(path);
        assert_eq!(reloaded.len(), 2);
        let response = reloaded.build_response(None);
        assert_eq!(response.total_runs, 2);
        assert_eq!(response.victories, 1);
        assert_eq!(response.recent[0].outcome, RunOutcome::Victory);
        assert_eq!(response.recent[0].run_time, "01:15.0");
        assert!(DateTime::parse_from_rfc3339(&response.recent[0].finished_at).is_ok());
    }

    #[test]
    fn best_victory_ignores_defeats() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RunHistoryStore::new(dir.path().join("history.json"));
        store.record_run(&summary(RunOutcome::Defeat, 10));
        assert_eq!(store.best_victory_ticks(), None);
        store.record_run(&summary(RunOutcome::Victory, 900));
        store.record_run(&summary(RunOutcome::Victory, 600));
        assert_eq!(store.best_victory_ticks(), Some(600));
        assert_eq!(
            store.build_response(None).best_victory_time.as_deref(),
            Some("00:30.0")
        );
    }

    #[test]
    fn load_keeps_valid_entries_when_invalid_entries_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        let raw = r#"{
  "version": 1,
  "runs": [
    {
      "finishedAt": "2026-01-02T03:04:05.000Z",
      "outcome": "victory",
      "seed": 1,
      "elapsedTicks": 200,
      "participantCount": 2,
      "maxHealth": 20.0
    },
    { "finishedAt": "yesterday", "outcome": "defeat", "seed": 2,
      "elapsedTicks": 5, "participantCount": 1, "maxHealth": 20.0 },
    { "outcome": "defeat" }
  ]
}"#;
        fs::write(&path, raw).expect("write file");

        let store = RunHistoryStore::new(path);
        assert_eq!(store.len(), 1);
        assert_eq!(store.best_victory_ticks(), Some(200));
    }

    #[test]
    fn unsupported_version_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        fs::write(&path, r#"{"version": 9, "runs": []}"#).expect("write file");
        assert!(RunHistoryStore::new(path).is_empty());
    }

    #[test]
    fn build_response_limits_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RunHistoryStore::new(dir.path().join("history.json"));
        for ticks in 1..=3 {
            store.record_run(&summary(RunOutcome::Defeat, ticks));
        }
        assert_eq!(store.build_response(Some(0)).recent.len(), 1);
        assert_eq!(store.build_response(Some(2)).recent.len(), 2);
        assert_eq!(store.build_response(Some(999)).recent.len(), 3);
    }
}
