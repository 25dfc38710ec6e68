use tracing::debug;

use super::utils::{drifted, eligible_others, eligible_participants, push_vitals, to_hearts};
use super::*;
use crate::constants::{ABSORPTION_NOISE_THRESHOLD, HUNGER_EPSILON};
use crate::types::DamageCause;

impl RunContext {
    fn accepts_hook<H: Host + ?Sized>(&self, host: &H, actor: &str) -> bool {
        self.phase.get() == RunPhase::Running && !self.guard.is_held() && host.is_eligible(actor)
    }

    pub fn on_health_changed<H: Host + ?Sized>(
        &self,
        host: &mut H,
        actor: &str,
        new_health: f32,
        cause: DamageCause,
    ) {
        if !self.accepts_hook(host, actor) {
            return;
        }
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };

        if cause.is_periodic() {
            self.apply_periodic_damage(host, actor, new_health);
            return;
        }

        let (old, shared) = {
            let mut vitals = self.vitals.borrow_mut();
            let old = vitals.health();
            (old, vitals.set_health(new_health))
        };
        if shared <= 0.0 {
            self.finish_run(host, RunOutcome::Defeat);
            return;
        }
        if drifted(new_health, shared) {
            host.set_health(actor, shared);
        }

        let others = eligible_others(host, actor);
        if shared < old {
            let delta = old - shared;
            for id in &others {
                host.apply_synthetic_damage(id, delta);
                host.set_health(id, shared);
            }
            if self.settings.get().features.damage_notices {
                let notice = Notice::DamageShared {
                    actor: host.display_name(actor),
                    hearts: to_hearts(delta),
                    cause,
                };
                host.broadcast(&notice);
            }
        } else if shared > old {
            for id in &others {
                host.set_health(id, shared);
            }
        }
    }

    fn apply_periodic_damage<H: Host + ?Sized>(&self, host: &mut H, actor: &str, new_health: f32) {
        let old = self.vitals.borrow().health();
        let raw = old - new_health;
        if raw <= 0.0 {
            return;
        }
        let count = eligible_participants(host).len();
        let flushed = self.accumulators.borrow_mut().accumulate(
            AccumulatorCategory::PeriodicDamage,
            f64::from(raw),
            count,
        );
        let Some(amount) = flushed else {
            // Fraction still pending: keep the actor on the shared value.
            host.set_health(actor, old);
            return;
        };

        let amount = amount as f32;
        let shared = self.vitals.borrow_mut().damage(amount);
        debug!(actor, amount, shared, "periodic damage flushed");
        if shared <= 0.0 {
            self.finish_run(host, RunOutcome::Defeat);
            return;
        }
        for id in eligible_participants(host) {
            if id != actor {
                host.apply_synthetic_damage(&id, amount);
            }
            host.set_health(&id, shared);
        }
    }

    pub fn on_healed<H: Host + ?Sized>(&self, host: &mut H, actor: &str, new_health: f32) {
        if !self.accepts_hook(host, actor) {
            return;
        }
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };

        let (old, shared) = {
            let mut vitals = self.vitals.borrow_mut();
            let old = vitals.health();
            if new_health <= old {
                return;
            }
            (old, vitals.set_health(new_health))
        };
        if drifted(new_health, shared) {
            host.set_health(actor, shared);
        }
        if shared > old {
            for id in eligible_others(host, actor) {
                host.set_health(&id, shared);
            }
        }
    }

    pub fn on_natural_regen<H: Host + ?Sized>(&self, host: &mut H, actor: &str, amount: f32) {
        self.normalized_heal(host, actor, amount, AccumulatorCategory::Regen);
    }

    pub fn on_regeneration_effect_heal<H: Host + ?Sized>(
        &self,
        host: &mut H,
        actor: &str,
        amount: f32,
    ) {
        self.normalized_heal(host, actor, amount, AccumulatorCategory::EffectRegen);
    }

    /// Divides a per-player heal by the eligible count so the party heals at
    /// one player's rate, flushing whole half-points into the shared pool.
    fn normalized_heal<H: Host + ?Sized>(
        &self,
        host: &mut H,
        actor: &str,
        amount: f32,
        category: AccumulatorCategory,
    ) {
        if !self.accepts_hook(host, actor) {
            return;
        }
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };

        let (before, full) = {
            let vitals = self.vitals.borrow();
            (vitals.health(), vitals.is_full_health())
        };
        if full || amount <= 0.0 {
            host.set_health(actor, before);
            return;
        }

        let count = eligible_participants(host).len();
        let flushed =
            self.accumulators
                .borrow_mut()
                .accumulate(category, f64::from(amount), count);
        let Some(heal) = flushed else {
            host.set_health(actor, before);
            return;
        };

        let shared = self.vitals.borrow_mut().heal(heal as f32);
        debug!(actor, ?category, heal, shared, "normalized heal flushed");
        for id in eligible_participants(host) {
            host.set_health(&id, shared);
        }
    }

    pub fn on_absorption_changed<H: Host + ?Sized>(&self, host: &mut H, actor: &str, value: f32) {
        if !self.accepts_hook(host, actor) {
            return;
        }
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };

        let shared = {
            let mut vitals = self.vitals.borrow_mut();
            if (value - vitals.absorption()).abs() <= ABSORPTION_NOISE_THRESHOLD {
                return;
            }
            vitals.set_absorption(value)
        };
        if drifted(value, shared) {
            host.set_absorption(actor, shared);
        }
        for id in eligible_others(host, actor) {
            host.set_absorption(&id, shared);
        }
    }

    pub fn on_hunger_changed<H: Host + ?Sized>(
        &self,
        host: &mut H,
        actor: &str,
        food: i32,
        saturation: f32,
    ) {
        if !self.settings.get().features.share_hunger || !self.accepts_hook(host, actor) {
            return;
        }
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };

        let (shared_food, shared_saturation) = {
            let mut vitals = self.vitals.borrow_mut();
            let food_changed = food != vitals.hunger();
            let saturation_changed = (saturation - vitals.saturation()).abs() > HUNGER_EPSILON;
            if !food_changed && !saturation_changed {
                return;
            }
            (vitals.set_hunger(food), vitals.set_saturation(saturation))
        };
        if food != shared_food || drifted(saturation, shared_saturation) {
            host.set_hunger(actor, shared_food);
            host.set_saturation(actor, shared_saturation);
        }
        for id in eligible_others(host, actor) {
            host.set_hunger(&id, shared_food);
            host.set_saturation(&id, shared_saturation);
        }
    }

    pub fn on_natural_hunger_drain<H: Host + ?Sized>(
        &self,
        host: &mut H,
        actor: &str,
        food_delta: i32,
        saturation_delta: f32,
    ) {
        if !self.settings.get().features.share_hunger || !self.accepts_hook(host, actor) {
            return;
        }
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };

        let count = eligible_participants(host).len();
        let (food_flush, saturation_flush) = {
            let mut accumulators = self.accumulators.borrow_mut();
            let food = if food_delta > 0 {
                accumulators.accumulate(AccumulatorCategory::Hunger, f64::from(food_delta), count)
            } else {
                None
            };
            let saturation = if saturation_delta > 0.0 {
                accumulators.accumulate(
                    AccumulatorCategory::Saturation,
                    f64::from(saturation_delta),
                    count,
                )
            } else {
                None
            };
            (food, saturation)
        };

        if food_flush.is_none() && saturation_flush.is_none() {
            let vitals = self.vitals.borrow().snapshot();
            host.set_hunger(actor, vitals.hunger);
            host.set_saturation(actor, vitals.saturation);
            return;
        }

        let snapshot = {
            let mut vitals = self.vitals.borrow_mut();
            if let Some(food) = food_flush {
                let hunger = vitals.hunger();
                vitals.set_hunger(hunger - food.round() as i32);
            }
            if let Some(saturation) = saturation_flush {
                let current = vitals.saturation();
                vitals.set_saturation(current - saturation as f32);
            }
            vitals.snapshot()
        };
        debug!(actor, ?food_flush, ?saturation_flush, "hunger drain flushed");
        for id in eligible_participants(host) {
            host.set_hunger(&id, snapshot.hunger);
            host.set_saturation(&id, snapshot.saturation);
        }
    }

    /// Force-corrects any eligible participant whose local vitals drifted
    /// from the shared pool. Runs every `DRIFT_CORRECTION_INTERVAL_TICKS`.
    pub fn periodic_drift_correction<H: Host + ?Sized>(&self, host: &mut H) {
        if self.phase.get() != RunPhase::Running {
            return;
        }
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };

        let shared = self.vitals.borrow().snapshot();
        let share_hunger = self.settings.get().features.share_hunger;
        let mut corrected = 0usize;
        for id in eligible_participants(host) {
            let health_off = drifted(host.health(&id), shared.health);
            let absorption_off = drifted(host.absorption(&id), shared.absorption);
            let hunger_off = share_hunger
                && (host.hunger(&id) != shared.hunger
                    || drifted(host.saturation(&id), shared.saturation));
            if health_off {
                host.set_health(&id, shared.health);
            }
            if absorption_off {
                host.set_absorption(&id, shared.absorption);
            }
            if hunger_off {
                host.set_hunger(&id, shared.hunger);
                host.set_saturation(&id, shared.saturation);
            }
            if health_off || absorption_off || hunger_off {
                corrected += 1;
            }
        }
        if corrected > 0 {
            debug!(corrected, "drift corrected");
        }
    }

    pub fn resync_participant<H: Host + ?Sized>(&self, host: &mut H, id: &str) {
        if !self.accepts_hook(host, id) {
            return;
        }
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };
        let shared = self.vitals.borrow().snapshot();
        push_vitals(host, id, &shared);
    }
}
