use tracing::{debug, error, info, warn};

use super::utils::{eligible_participants, push_vitals};
use super::*;
use crate::constants::{FALLBACK_SPAWN, RESTART_HINT_DELAY_TICKS, SPAWN_PRELOAD_RADIUS};
use crate::error::RunError;
use crate::types::ParticipantMode;

impl RunContext {
    /// Begins provisioning a fresh world. Rejected while a run is generating
    /// or running. A finished run first drops back to `Idle`, which is where
    /// a world-provider failure leaves it.
    pub fn start_run<H: Host + ?Sized>(&self, host: &mut H) -> Result<(), RunError> {
        let phase = self.phase.get();
        if matches!(phase, RunPhase::Running | RunPhase::GeneratingWorld) {
            warn!(?phase, "start_run rejected, a run is already in progress");
            return Err(RunError::RunInProgress { phase });
        }
        if phase == RunPhase::GameOver {
            self.return_to_idle();
        }

        let settings = host.settings();
        let seed = settings.seed.unwrap_or_else(rand::random);
        host.broadcast(&Notice::Generating);

        let handle = match host.create_ephemeral_world_set(seed, settings.difficulty) {
            Ok(handle) => handle,
            Err(err) => {
                error!(%err, seed, "world provider failed, run not started");
                return Err(err.into());
            }
        };

        if let Some(stale) = self.orphaned_world.take() {
            // Left over from a run that never reached Running.
            if let Err(err) = host.destroy(stale) {
                warn!(%err, ?stale, "failed to destroy stale world");
            }
        }
        self.orphaned_world.set(self.world.replace(Some(handle)));

        self.settings.set(settings);
        self.vitals
            .borrow_mut()
            .reset(max_health_for(settings.max_health_mode));
        *self.spawn_search.borrow_mut() = Some(SpawnSearchState::new());
        self.seed.set(Some(seed));
        self.finished_run.borrow_mut().take();
        self.generation_started_tick.set(self.tick.get());

        for id in host.participants() {
            host.set_mode(&id, ParticipantMode::Observing);
        }

        self.phase.set(RunPhase::GeneratingWorld);
        info!(seed, ?handle, difficulty = ?settings.difficulty, "world generation started");
        Ok(())
    }

    // The world handle survives so the next run deletes it once running.
    fn return_to_idle(&self) {
        let max_health = max_health_for(self.settings.get().max_health_mode);
        self.vitals.borrow_mut().reset(max_health);
        self.accumulators.borrow_mut().reset();
        *self.spawn_search.borrow_mut() = None;
        self.effects.borrow_mut().reset();
        self.jumps.borrow_mut().reset();
        self.tasks.borrow_mut().clear();
        self.outcome.set(None);
        self.elapsed_ticks.set(0);
        self.participant_count.set(0);
        self.phase.set(RunPhase::Idle);
        debug!("finished run cleared");
    }

    pub(super) fn transition_to_running<H: Host + ?Sized>(&self, host: &mut H) {
        let found = self
            .spawn_search
            .borrow_mut()
            .take()
            .and_then(|search| search.found());
        let ground = match found {
            Some(ground) => ground,
            None => {
                warn!(fallback = ?FALLBACK_SPAWN, "no safe spawn found");
                host.broadcast(&Notice::NoSpawnFound {
                    fallback: FALLBACK_SPAWN,
                });
                FALLBACK_SPAWN
            }
        };

        match self.world.get() {
            Some(handle) => host.preload_area(handle, ground, SPAWN_PRELOAD_RADIUS),
            None => warn!("no active world to preload, spawning at fallback"),
        }

        let participants = host.participants();
        let eligible = eligible_participants(host);
        host.assign_roles(&eligible);

        let spawn = ground.standing_position();
        let vitals = self.vitals.borrow().snapshot();
        {
            let _pass = self.guard.try_acquire();
            for id in &participants {
                host.reset_participant(id);
                host.teleport(id, spawn);
                if host.is_eligible(id) {
                    push_vitals(host, id, &vitals);
                    host.set_mode(id, ParticipantMode::Playing);
                } else {
                    host.set_mode(id, ParticipantMode::Observing);
                }
            }
        }

        if let Some(orphan) = self.orphaned_world.take() {
            match host.destroy(orphan) {
                Ok(()) => info!(?orphan, "previous world deleted"),
                Err(err) => warn!(%err, ?orphan, "failed to delete previous world"),
            }
        }

        self.participant_count.set(eligible.len());
        self.elapsed_ticks.set(0);
        self.phase.set(RunPhase::Running);
        host.broadcast(&Notice::RunStarted { spawn: ground });
        info!(
            x = ground.x,
            y = ground.y,
            z = ground.z,
            participants = eligible.len(),
            "run started"
        );
    }

    pub fn trigger_game_over<H: Host + ?Sized>(&self, host: &mut H) {
        self.finish_run(host, RunOutcome::Defeat);
    }

    pub fn complete_objective<H: Host + ?Sized>(&self, host: &mut H) {
        self.finish_run(host, RunOutcome::Victory);
    }

    pub(super) fn finish_run<H: Host + ?Sized>(&self, host: &mut H, outcome: RunOutcome) {
        if self.phase.get() != RunPhase::Running {
            return;
        }
        // Set first so nested hooks fired by the calls below see a finished run.
        self.phase.set(RunPhase::GameOver);
        self.outcome.set(Some(outcome));

        for id in eligible_participants(host) {
            host.set_mode(&id, ParticipantMode::Observing);
            host.play_terminal_feedback(&id, outcome);
        }

        let elapsed = self.elapsed_ticks.get();
        host.broadcast(&Notice::RunEnded {
            outcome,
            run_time: format_run_time(elapsed),
        });
        self.tasks.borrow_mut().schedule_after(
            self.tick.get(),
            RESTART_HINT_DELAY_TICKS,
            DeferredTask::BroadcastRestartHint,
        );

        let summary = RunSummary {
            outcome,
            seed: self.seed.get().unwrap_or_default(),
            elapsed_ticks: elapsed,
            participant_count: self.participant_count.get(),
            max_health: self.vitals.borrow().max_health(),
        };
        *self.finished_run.borrow_mut() = Some(summary);
        info!(?outcome, elapsed_ticks = elapsed, "run finished");
    }

    pub fn on_participant_joined<H: Host + ?Sized>(&self, host: &mut H, id: &str) {
        match self.phase.get() {
            RunPhase::Idle => {}
            RunPhase::GeneratingWorld | RunPhase::GameOver => {
                host.set_mode(id, ParticipantMode::Observing);
            }
            RunPhase::Running => {
                if !host.is_eligible(id) {
                    host.set_mode(id, ParticipantMode::Observing);
                    return;
                }
                let Some(_pass) = self.guard.try_acquire() else {
                    return;
                };
                let vitals = self.vitals.borrow().snapshot();
                push_vitals(host, id, &vitals);
                host.set_mode(id, ParticipantMode::Playing);
            }
        }
    }
}
