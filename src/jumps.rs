use std::collections::BTreeSet;

use crate::types::ParticipantId;

#[derive(Clone, Debug, Default)]
pub struct JumpCoordinator {
    tick: u64,
    resolved: bool,
    natural: BTreeSet<ParticipantId>,
    forced: BTreeSet<ParticipantId>,
}

impl JumpCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_tick(&self) -> u64 {
        self.tick
    }

    pub fn natural_jumpers(&self) -> &BTreeSet<ParticipantId> {
        &self.natural
    }

    pub fn forced_jumpers(&self) -> &BTreeSet<ParticipantId> {
        &self.forced
    }

    /// Rolls the record over to `tick`, unless the previous tick still has
    /// natural jumps waiting for their resolution pass.
    pub fn observe_tick(&mut self, tick: u64) {
        if tick <= self.tick {
            return;
        }
        if !self.resolved && !self.natural.is_empty() {
            return;
        }
        self.tick = tick;
        self.resolved = false;
        self.natural.clear();
        self.forced.clear();
    }

    pub fn record_natural(&mut self, tick: u64, participant: &str) -> bool {
        self.observe_tick(tick);
        self.natural.insert(participant.to_string());
        !self.resolved
    }

    pub fn resolve(&mut self, eligible: &[ParticipantId]) -> Vec<ParticipantId> {
        if self.natural.is_empty() {
            self.resolved = true;
            return Vec::new();
        }
        let mut to_force = Vec::new();
        for id in eligible {
            if self.natural.contains(id) || self.forced.contains(id) {
                continue;
            }
            self.forced.insert(id.clone());
            to_force.push(id.clone());
        }
        self.resolved = true;
        to_force
    }
}
