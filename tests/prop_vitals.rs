//! Property-based tests for the shared vital pool.

use proptest::prelude::*;

use shared_fate_server::constants::{MAX_ABSORPTION, MAX_FOOD, MAX_SATURATION};
use shared_fate_server::host::ParticipantRegistry;
use shared_fate_server::settings::{MaxHealthMode, Settings};
use shared_fate_server::sim::SimHost;
use shared_fate_server::spawn_search::SpawnSearchState;
use shared_fate_server::types::{DamageCause, EffectKind, EffectPayload, EffectSource, RunPhase};
use shared_fate_server::RunContext;

#[derive(Clone, Debug)]
enum Op {
    Damage { who: usize, amount: f32, poison: bool },
    Heal { who: usize, amount: f32 },
    Regen { who: usize, amount: f32 },
    Absorb { who: usize, value: f32 },
    Eat { who: usize, food: i32, saturation: f32 },
    Drain { who: usize, food: i32, saturation: f32 },
    Splash { damage: bool, amplifier: u8 },
    Tick,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 0.0f32..30.0, any::<bool>())
            .prop_map(|(who, amount, poison)| Op::Damage { who, amount, poison }),
        (0usize..3, 0.0f32..30.0).prop_map(|(who, amount)| Op::Heal { who, amount }),
        (0usize..3, 0.0f32..4.0).prop_map(|(who, amount)| Op::Regen { who, amount }),
        (0usize..3, -5.0f32..40.0).prop_map(|(who, value)| Op::Absorb { who, value }),
        (0usize..3, -5i32..30, -5.0f32..30.0)
            .prop_map(|(who, food, saturation)| Op::Eat { who, food, saturation }),
        (0usize..3, 0i32..4, 0.0f32..3.0)
            .prop_map(|(who, food, saturation)| Op::Drain { who, food, saturation }),
        (any::<bool>(), 0u8..3).prop_map(|(damage, amplifier)| Op::Splash { damage, amplifier }),
        Just(Op::Tick),
    ]
}

fn running(settings: Settings) -> (RunContext, SimHost) {
    let ctx = RunContext::new();
    let mut host = SimHost::with_participants(settings, 3);
    ctx.start_run(&mut host).unwrap();
    for _ in 0..=SpawnSearchState::new().worst_case_steps() {
        if ctx.is_active() {
            break;
        }
        ctx.tick(&mut host);
        ctx.end_tick(&mut host);
    }
    (ctx, host)
}

fn apply(ctx: &RunContext, host: &mut SimHost, op: &Op) {
    let id = |who: usize| format!("p{}", who + 1);
    match *op {
        Op::Damage { who, amount, poison } => {
            let id = id(who);
            let local = host.health(&id) - amount;
            host.set_health(&id, local);
            let cause = if poison { DamageCause::Poison } else { DamageCause::Attack };
            ctx.on_health_changed(host, &id, local, cause);
        }
        Op::Heal { who, amount } => {
            let id = id(who);
            let local = host.health(&id) + amount;
            host.set_health(&id, local);
            ctx.on_healed(host, &id, local);
        }
        Op::Regen { who, amount } => ctx.on_natural_regen(host, &id(who), amount),
        Op::Absorb { who, value } => ctx.on_absorption_changed(host, &id(who), value),
        Op::Eat { who, food, saturation } => {
            ctx.on_hunger_changed(host, &id(who), food, saturation)
        }
        Op::Drain { who, food, saturation } => {
            ctx.on_natural_hunger_drain(host, &id(who), food, saturation)
        }
        Op::Splash { damage, amplifier } => {
            let effect = EffectPayload {
                kind: if damage { EffectKind::InstantDamage } else { EffectKind::InstantHealth },
                amplifier,
                duration_ticks: 1,
            };
            for who in 0..3 {
                ctx.on_instant_effect_applied(host, &id(who), &effect, EffectSource::Splash);
            }
        }
        Op::Tick => {
            ctx.end_tick(host);
            ctx.tick(host);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every reachable pool stays in range, and an empty pool always ends the run.
    #[test]
    fn prop_vitals_stay_bounded(
        ops in prop::collection::vec(op(), 1..60),
        half_heart in any::<bool>()
    ) {
        let settings = Settings {
            seed: Some(11),
            max_health_mode: if half_heart { MaxHealthMode::HalfHeart } else { MaxHealthMode::Standard },
            ..Settings::default()
        };
        let (ctx, mut host) = running(settings);
        prop_assert_eq!(ctx.phase(), RunPhase::Running);

        for op in &ops {
            apply(&ctx, &mut host, op);
            let vitals = ctx.vitals();
            prop_assert!(vitals.health >= 0.0 && vitals.health <= vitals.max_health);
            prop_assert!((0..=MAX_FOOD).contains(&vitals.hunger));
            prop_assert!(vitals.saturation >= 0.0 && vitals.saturation <= MAX_SATURATION);
            prop_assert!(vitals.absorption >= 0.0 && vitals.absorption <= MAX_ABSORPTION);
            if vitals.health == 0.0 {
                prop_assert_eq!(ctx.phase(), RunPhase::GameOver);
            }
        }
    }

    /// N participants regenerating `h` each heal the pool by `h`, not `N * h`.
    #[test]
    fn prop_regen_is_normalized(rounds in 1usize..8) {
        let settings = Settings { seed: Some(3), ..Settings::default() };
        let (ctx, mut host) = running(settings);
        host.set_health("p1", 10.0);
        ctx.on_health_changed(&mut host, "p1", 10.0, DamageCause::Attack);
        prop_assert_eq!(ctx.vitals().health, 10.0);

        for _ in 0..rounds {
            for who in 1..=3 {
                ctx.on_natural_regen(&mut host, &format!("p{who}"), 1.0);
            }
        }

        let gained = ctx.vitals().health - 10.0;
        prop_assert!((gained - rounds as f32).abs() < 1e-3);
    }
}
