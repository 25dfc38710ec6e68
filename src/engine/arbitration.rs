use tracing::{debug, info};

use super::utils::{eligible_others, eligible_participants};
use super::*;
use crate::constants::instant_effect_magnitude;
use crate::types::{EffectKind, EffectPayload, EffectSource};

impl RunContext {
    /// Area instant effects are always blocked on arrival and registered; the
    /// end-of-tick pass hands the effect to exactly one registrant.
    pub fn on_instant_effect_applied<H: Host + ?Sized>(
        &self,
        host: &mut H,
        participant: &str,
        effect: &EffectPayload,
        source: EffectSource,
    ) -> bool {
        if self.guard.is_held() {
            return true;
        }
        if self.phase.get() != RunPhase::Running
            || !self.settings.get().features.splash_arbitration
            || !source.is_area()
            || !effect.kind.is_instant()
            || !host.is_eligible(participant)
        {
            return true;
        }

        let key = SplashKey {
            kind: effect.kind,
            amplifier: effect.amplifier,
            tick: self.tick.get(),
        };
        let position = host.position(participant);
        let first = self
            .effects
            .borrow_mut()
            .register_splash(key, participant, position, *effect);
        if first {
            self.tasks
                .borrow_mut()
                .defer_to_end_of_tick(DeferredTask::ResolveSplash(key));
        }
        false
    }

    pub(super) fn resolve_splash<H: Host + ?Sized>(&self, host: &mut H, key: SplashKey) {
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };
        let event = {
            let mut effects = self.effects.borrow_mut();
            let Some(event) = effects.pending_splash_mut(&key) else {
                return;
            };
            if event.resolved {
                return;
            }
            event.resolved = true;
            event.clone()
        };
        if self.phase.get() != RunPhase::Running {
            return;
        }
        let Some(recipient) = event.select_recipient(|id| host.is_eligible(id)).cloned() else {
            debug!(?key, "no eligible registrant left for splash");
            return;
        };
        let payload = event.payload;
        let registrants = event.registrants.len();

        let shared = {
            let mut vitals = self.vitals.borrow_mut();
            match payload.kind {
                EffectKind::InstantHealth => {
                    vitals.heal(instant_effect_magnitude(4.0, payload.amplifier))
                }
                EffectKind::InstantDamage => {
                    vitals.damage(instant_effect_magnitude(6.0, payload.amplifier))
                }
                _ => vitals.health(),
            }
        };
        info!(
            recipient = %recipient,
            kind = ?payload.kind,
            registrants,
            shared,
            "splash resolved to one recipient"
        );

        host.show_effect_feedback(&recipient, payload.kind);
        if payload.kind == EffectKind::InstantDamage {
            host.apply_synthetic_damage(&recipient, instant_effect_magnitude(6.0, payload.amplifier));
        }
        host.set_health(&recipient, shared);

        if shared <= 0.0 {
            self.finish_run(host, RunOutcome::Defeat);
            return;
        }
        for id in eligible_others(host, &recipient) {
            host.set_health(&id, shared);
        }
    }

    pub fn on_duration_effect_applied<H: Host + ?Sized>(
        &self,
        host: &mut H,
        participant: &str,
        effect: &EffectPayload,
    ) -> bool {
        if self.guard.is_held()
            || self.phase.get() != RunPhase::Running
            || !self.settings.get().features.share_effects
            || effect.kind.is_instant()
            || !host.is_eligible(participant)
        {
            return true;
        }

        if !self.effects.borrow_mut().claim_fan_out(effect) {
            return true;
        }
        self.tasks
            .borrow_mut()
            .defer_to_end_of_tick(DeferredTask::ClearFanOutKeys);

        let Some(_pass) = self.guard.try_acquire() else {
            return true;
        };
        let others = eligible_others(host, participant);
        debug!(
            participant,
            kind = ?effect.kind,
            recipients = others.len(),
            "fanning out duration effect"
        );
        for id in others {
            host.apply_effect(&id, effect);
        }
        true
    }

    pub fn on_natural_jump<H: Host + ?Sized>(&self, host: &mut H, participant: &str) {
        if self.guard.is_held()
            || self.phase.get() != RunPhase::Running
            || !self.settings.get().features.shared_jumps
            || !host.is_eligible(participant)
        {
            return;
        }
        let pending = self
            .jumps
            .borrow_mut()
            .record_natural(self.tick.get(), participant);
        if pending {
            self.tasks
                .borrow_mut()
                .defer_to_end_of_tick(DeferredTask::ResolveJumps);
        }
    }

    pub fn resolve_jumps_at_tick_end<H: Host + ?Sized>(&self, host: &mut H) {
        if self.phase.get() != RunPhase::Running {
            return;
        }
        // Taken before resolving so a held guard leaves the record untouched.
        let Some(_pass) = self.guard.try_acquire() else {
            return;
        };
        let eligible = eligible_participants(host);
        let to_force = self.jumps.borrow_mut().resolve(&eligible);
        if to_force.is_empty() {
            return;
        }
        for id in &to_force {
            host.force_jump(id);
        }
        debug!(forced = to_force.len(), "jumps mirrored");
    }
}
