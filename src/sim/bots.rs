use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::SimHost;
use crate::engine::RunContext;
use crate::host::ParticipantRegistry;
use crate::types::{DamageCause, EffectKind, EffectPayload, EffectSource, Vec3};

const DAMAGE_CHANCE: f64 = 0.015;
const REGEN_CHANCE: f64 = 0.05;
const DRAIN_CHANCE: f64 = 0.03;
const EAT_CHANCE: f64 = 0.004;
const JUMP_CHANCE: f64 = 0.02;
const POISON_CHANCE: f64 = 0.01;
const SPLASH_CHANCE: f64 = 0.003;
const DURATION_EFFECT_CHANCE: f64 = 0.002;
const WANDER_STEP: f64 = 0.6;

const DAMAGE_CAUSES: [DamageCause; 6] = [
    DamageCause::Attack,
    DamageCause::Projectile,
    DamageCause::Fall,
    DamageCause::Fire,
    DamageCause::Drowning,
    DamageCause::Explosion,
];

/// Drives simulated participants the way a game client would: mutate local
/// state first, then fire the matching hook.
#[derive(Debug)]
pub struct BotDriver {
    rng: StdRng,
    objective_chance: f64,
}

impl BotDriver {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            objective_chance: 0.0005,
        }
    }

    pub fn with_objective_chance(mut self, chance: f64) -> Self {
        self.objective_chance = chance.clamp(0.0, 1.0);
        self
    }

    pub fn step(&mut self, ctx: &RunContext, host: &mut SimHost) {
        if !ctx.is_active() {
            return;
        }
        let ids = host.participants();
        for id in &ids {
            if !ctx.is_active() {
                return;
            }
            if !host.is_eligible(id) {
                continue;
            }
            self.wander(host, id);
            self.act(ctx, host, id);
        }

        if ctx.is_active() && self.rng.random_bool(SPLASH_CHANCE) {
            self.throw_splash(ctx, host, &ids);
        }
        if ctx.is_active() && self.rng.random_bool(self.objective_chance) {
            ctx.complete_objective(host);
        }
    }

    fn wander(&mut self, host: &mut SimHost, id: &str) {
        let dx = self.rng.random_range(-WANDER_STEP..=WANDER_STEP);
        let dz = self.rng.random_range(-WANDER_STEP..=WANDER_STEP);
        if let Some(participant) = host.participant_mut(id) {
            participant.position.x += dx;
            participant.position.z += dz;
        }
    }

    fn act(&mut self, ctx: &RunContext, host: &mut SimHost, id: &str) {
        if self.rng.random_bool(DAMAGE_CHANCE) {
            let cause = DAMAGE_CAUSES[self.rng.random_range(0..DAMAGE_CAUSES.len())];
            let amount = f32::from(self.rng.random_range(1u8..=6));
            let local = (host.health(id) - amount).max(0.0);
            host.set_health(id, local);
            ctx.on_health_changed(host, id, local, cause);
        }
        if self.rng.random_bool(POISON_CHANCE) {
            let local = (host.health(id) - 1.0).max(0.0);
            host.set_health(id, local);
            ctx.on_health_changed(host, id, local, DamageCause::Poison);
        }
        if self.rng.random_bool(REGEN_CHANCE) {
            let local = host.health(id) + 1.0;
            host.set_health(id, local);
            ctx.on_natural_regen(host, id, 1.0);
        }
        if self.rng.random_bool(DRAIN_CHANCE) {
            let saturation_delta = 0.5;
            let local = (host.saturation(id) - saturation_delta).max(0.0);
            host.set_saturation(id, local);
            let food_delta = i32::from(self.rng.random_bool(0.3));
            if food_delta > 0 {
                let food = host.hunger(id) - food_delta;
                host.set_hunger(id, food);
            }
            ctx.on_natural_hunger_drain(host, id, food_delta, saturation_delta);
        }
        if self.rng.random_bool(EAT_CHANCE) {
            let food = (host.hunger(id) + 6).min(20);
            let saturation = host.saturation(id) + 7.2;
            host.set_hunger(id, food);
            host.set_saturation(id, saturation);
            ctx.on_hunger_changed(host, id, food, saturation);
        }
        if self.rng.random_bool(JUMP_CHANCE) {
            ctx.on_natural_jump(host, id);
        }
        if self.rng.random_bool(DURATION_EFFECT_CHANCE) {
            let effect = EffectPayload {
                kind: EffectKind::Speed,
                amplifier: self.rng.random_range(0..=1),
                duration_ticks: 600,
            };
            if ctx.on_duration_effect_applied(host, id, &effect) {
                host.apply_effect(id, &effect);
            }
        }
    }

    fn throw_splash(&mut self, ctx: &RunContext, host: &mut SimHost, ids: &[String]) {
        let kind = if self.rng.random_bool(0.7) {
            EffectKind::InstantHealth
        } else {
            EffectKind::InstantDamage
        };
        let effect = EffectPayload {
            kind,
            amplifier: 0,
            duration_ticks: 1,
        };
        let Some(center) = ids.first().map(|id| host.position(id)) else {
            return;
        };
        for id in ids {
            if within_splash(host.position(id), center) {
                let allowed = ctx.on_instant_effect_applied(host, id, &effect, EffectSource::Splash);
                if allowed {
                    host.apply_effect(id, &effect);
                }
            }
        }
    }
}

fn within_splash(position: Vec3, center: Vec3) -> bool {
    position.distance_squared(&center) <= 16.0
}
