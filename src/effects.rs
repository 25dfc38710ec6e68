use std::collections::{BTreeMap, HashSet};

use crate::types::{EffectKind, EffectPayload, ParticipantId, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SplashKey {
    pub kind: EffectKind,
    pub amplifier: u8,
    pub tick: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FanOutKey {
    pub kind: EffectKind,
    pub duration_ticks: u32,
    pub amplifier: u8,
}

impl From<&EffectPayload> for FanOutKey {
    fn from(effect: &EffectPayload) -> Self {
        Self {
            kind: effect.kind,
            duration_ticks: effect.duration_ticks,
            amplifier: effect.amplifier,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PendingSplashEvent {
    pub registrants: Vec<(ParticipantId, Vec3)>,
    pub payload: EffectPayload,
    pub resolved: bool,
}

impl PendingSplashEvent {
    /// The accepted registrant closest to the centroid of every registered
    /// position, including registrants that are no longer accepted.
    /// Ties keep the earliest registrant.
    pub fn select_recipient(&self, accept: impl Fn(&str) -> bool) -> Option<&ParticipantId> {
        let centroid = centroid(self.registrants.iter().map(|(_, pos)| *pos))?;
        let mut best: Option<(&ParticipantId, f64)> = None;
        for (id, pos) in self.registrants.iter().filter(|(id, _)| accept(id.as_str())) {
            let dist = pos.distance_squared(&centroid);
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((id, dist)),
            }
        }
        best.map(|(id, _)| id)
    }
}

pub fn centroid(positions: impl Iterator<Item = Vec3>) -> Option<Vec3> {
    let mut sum = Vec3::default();
    let mut count = 0usize;
    for pos in positions {
        sum.x += pos.x;
        sum.y += pos.y;
        sum.z += pos.z;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f64;
    Some(Vec3::new(sum.x / n, sum.y / n, sum.z / n))
}

#[derive(Clone, Debug, Default)]
pub struct EffectArbitrator {
    pending: BTreeMap<SplashKey, PendingSplashEvent>,
    fanned_out: HashSet<FanOutKey>,
}

impl EffectArbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.fanned_out.clear();
    }

    pub fn register_splash(
        &mut self,
        key: SplashKey,
        participant: &str,
        position: Vec3,
        payload: EffectPayload,
    ) -> bool {
        let mut created = false;
        let event = self.pending.entry(key).or_insert_with(|| {
            created = true;
            PendingSplashEvent {
                registrants: Vec::new(),
                payload,
                resolved: false,
            }
        });
        match event.registrants.iter_mut().find(|(id, _)| id == participant) {
            Some(entry) => entry.1 = position,
            None => event.registrants.push((participant.to_string(), position)),
        }
        created
    }

    pub fn pending_splash(&self, key: &SplashKey) -> Option<&PendingSplashEvent> {
        self.pending.get(key)
    }

    pub fn pending_splash_mut(&mut self, key: &SplashKey) -> Option<&mut PendingSplashEvent> {
        self.pending.get_mut(key)
    }

    /// Events never outlive their tick, resolved or not.
    pub fn drop_stale_splashes(&mut self, current_tick: u64) -> usize {
        let before = self.pending.len();
        self.pending.retain(|key, _| key.tick >= current_tick);
        before - self.pending.len()
    }

    pub fn claim_fan_out(&mut self, effect: &EffectPayload) -> bool {
        self.fanned_out.insert(FanOutKey::from(effect))
    }

    pub fn has_fan_out_keys(&self) -> bool {
        !self.fanned_out.is_empty()
    }

    pub fn clear_fan_out_keys(&mut self) {
        self.fanned_out.clear();
    }
}
