use std::cell::{Cell, RefCell};

use tracing::{debug, warn};

use crate::accumulator::{AccumulatorCategory, NormalizationAccumulators};
use crate::constants::{
    format_run_time, max_health_for, DRIFT_CORRECTION_INTERVAL_TICKS,
    GENERATION_PROGRESS_INTERVAL_TICKS, TIMER_DISPLAY_INTERVAL_TICKS,
};
use crate::effects::{EffectArbitrator, SplashKey};
use crate::guard::{ReentrancyGuard, SyncState};
use crate::host::Host;
use crate::jumps::JumpCoordinator;
use crate::scheduler::TickQueue;
use crate::settings::Settings;
use crate::spawn_search::SpawnSearchState;
use crate::types::{Notice, RunOutcome, RunPhase, RunStatus, RunSummary, WorldHandle};
use crate::vitals::{SharedVitalState, VitalSnapshot};

mod arbitration;
mod lifecycle;
mod sync;
mod utils;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeferredTask {
    ResolveSplash(SplashKey),
    ResolveJumps,
    ClearFanOutKeys,
    BroadcastRestartHint,
}

/// Explicit per-run context handed to every hook.
///
/// All entry points take `&self` and a host; state sits behind `Cell` and
/// `RefCell` so a host may call back into the same context from inside a
/// mutation. Borrows are never held across host calls.
#[derive(Debug)]
pub struct RunContext {
    phase: Cell<RunPhase>,
    settings: Cell<Settings>,
    vitals: RefCell<SharedVitalState>,
    accumulators: RefCell<NormalizationAccumulators>,
    guard: ReentrancyGuard,
    spawn_search: RefCell<Option<SpawnSearchState>>,
    effects: RefCell<EffectArbitrator>,
    jumps: RefCell<JumpCoordinator>,
    tasks: RefCell<TickQueue<DeferredTask>>,
    world: Cell<Option<WorldHandle>>,
    orphaned_world: Cell<Option<WorldHandle>>,
    seed: Cell<Option<u64>>,
    tick: Cell<u64>,
    generation_started_tick: Cell<u64>,
    elapsed_ticks: Cell<u64>,
    participant_count: Cell<usize>,
    outcome: Cell<Option<RunOutcome>>,
    finished_run: RefCell<Option<RunSummary>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        let settings = Settings::default();
        Self {
            phase: Cell::new(RunPhase::Idle),
            settings: Cell::new(settings),
            vitals: RefCell::new(SharedVitalState::new(max_health_for(
                settings.max_health_mode,
            ))),
            accumulators: RefCell::new(NormalizationAccumulators::new()),
            guard: ReentrancyGuard::new(),
            spawn_search: RefCell::new(None),
            effects: RefCell::new(EffectArbitrator::new()),
            jumps: RefCell::new(JumpCoordinator::new()),
            tasks: RefCell::new(TickQueue::new()),
            world: Cell::new(None),
            orphaned_world: Cell::new(None),
            seed: Cell::new(None),
            tick: Cell::new(0),
            generation_started_tick: Cell::new(0),
            elapsed_ticks: Cell::new(0),
            participant_count: Cell::new(0),
            outcome: Cell::new(None),
            finished_run: RefCell::new(None),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase.get()
    }

    pub fn is_active(&self) -> bool {
        self.phase.get() == RunPhase::Running
    }

    pub fn is_generating(&self) -> bool {
        self.phase.get() == RunPhase::GeneratingWorld
    }

    pub fn vitals(&self) -> VitalSnapshot {
        self.vitals.borrow().snapshot()
    }

    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick.get()
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks.get()
    }

    pub fn world(&self) -> Option<WorldHandle> {
        self.world.get()
    }

    pub fn sync_state(&self) -> SyncState {
        self.guard.state()
    }

    pub fn pending_fraction(&self, category: AccumulatorCategory) -> f64 {
        self.accumulators.borrow().pending(category)
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            phase: self.phase.get(),
            tick: self.tick.get(),
            elapsed_ticks: self.elapsed_ticks.get(),
            run_time: format_run_time(self.elapsed_ticks.get()),
            vitals: self.vitals(),
            search_progress: self
                .spawn_search
                .borrow()
                .as_ref()
                .map(SpawnSearchState::progress),
            outcome: self.outcome.get(),
            seed: self.seed.get(),
        }
    }

    pub fn take_finished_run(&self) -> Option<RunSummary> {
        self.finished_run.borrow_mut().take()
    }

    pub fn tick<H: Host + ?Sized>(&self, host: &mut H) {
        let tick = self.tick.get() + 1;
        self.tick.set(tick);
        self.jumps.borrow_mut().observe_tick(tick);

        let due = self.tasks.borrow_mut().take_due(tick);
        for task in due {
            self.run_task(host, task);
        }

        match self.phase.get() {
            RunPhase::GeneratingWorld => self.advance_spawn_search(host),
            RunPhase::Running => self.advance_running(host),
            RunPhase::Idle | RunPhase::GameOver => {}
        }
    }

    /// Drains the end-of-tick queue exactly once per tick. Tasks queued while
    /// draining still belong to this tick and run in the same call.
    pub fn end_tick<H: Host + ?Sized>(&self, host: &mut H) {
        loop {
            let tasks = self.tasks.borrow_mut().take_end_of_tick();
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                self.run_task(host, task);
            }
        }
        let dropped = self
            .effects
            .borrow_mut()
            .drop_stale_splashes(self.tick.get() + 1);
        if dropped > 0 {
            debug!(dropped, "discarded splash events left from this tick");
        }
    }

    fn run_task<H: Host + ?Sized>(&self, host: &mut H, task: DeferredTask) {
        match task {
            DeferredTask::ResolveSplash(key) => self.resolve_splash(host, key),
            DeferredTask::ResolveJumps => self.resolve_jumps_at_tick_end(host),
            DeferredTask::ClearFanOutKeys => self.effects.borrow_mut().clear_fan_out_keys(),
            DeferredTask::BroadcastRestartHint => {
                if self.phase.get() == RunPhase::GameOver {
                    host.broadcast(&Notice::RestartHint);
                }
            }
        }
    }

    fn advance_spawn_search<H: Host + ?Sized>(&self, host: &mut H) {
        let Some(handle) = self.world.get() else {
            warn!("generating without an active world, using fallback spawn");
            self.transition_to_running(host);
            return;
        };

        let mut search = self
            .spawn_search
            .borrow_mut()
            .take()
            .unwrap_or_default();
        let finished = search.process_step(&*host, handle);
        let progress = search.progress();
        *self.spawn_search.borrow_mut() = Some(search);

        if finished {
            self.transition_to_running(host);
            return;
        }

        let since = self
            .tick
            .get()
            .saturating_sub(self.generation_started_tick.get());
        if since > 0 && since.is_multiple_of(GENERATION_PROGRESS_INTERVAL_TICKS) {
            let text = format!("Searching for a spawn point... {progress:.0}%");
            for id in host.participants() {
                host.status_text(&id, &text);
            }
        }
    }

    fn advance_running<H: Host + ?Sized>(&self, host: &mut H) {
        let elapsed = self.elapsed_ticks.get() + 1;
        self.elapsed_ticks.set(elapsed);

        if elapsed.is_multiple_of(TIMER_DISPLAY_INTERVAL_TICKS) {
            let text = format_run_time(elapsed);
            for id in host.participants() {
                host.status_text(&id, &text);
            }
        }
        if self.tick.get().is_multiple_of(DRIFT_CORRECTION_INTERVAL_TICKS) {
            self.periodic_drift_correction(host);
        }
    }
}
