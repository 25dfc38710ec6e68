use crate::settings::MaxHealthMode;
use crate::types::BlockPos;

pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const MAX_FOOD: i32 = 20;
pub const MAX_SATURATION: f32 = 20.0;
pub const MAX_ABSORPTION: f32 = 20.0;
pub const START_SATURATION: f32 = 5.0;

pub const HEALTH_FLUSH_THRESHOLD: f64 = 0.5;
pub const FOOD_FLUSH_THRESHOLD: f64 = 1.0;
pub const SATURATION_FLUSH_THRESHOLD: f64 = 0.1;
pub const FLUSH_EPSILON: f64 = 1e-6;

pub const ABSORPTION_NOISE_THRESHOLD: f32 = 0.1;
pub const HUNGER_EPSILON: f32 = 0.01;
pub const DRIFT_TOLERANCE: f32 = 0.01;
pub const DRIFT_CORRECTION_INTERVAL_TICKS: u64 = 20;

pub const SPAWN_SEARCH_STEP: i32 = 32;
pub const SPAWN_SEARCH_MAX_RADIUS: i32 = 500;
pub const SPAWN_PROBES_PER_TICK: usize = 5;
pub const SURFACE_MIN_Y: i32 = 62;
pub const SURFACE_MAX_Y: i32 = 200;
pub const FALLBACK_SPAWN: BlockPos = BlockPos { x: 0, y: 64, z: 0 };
pub const SPAWN_PRELOAD_RADIUS: i32 = 48;

pub const GENERATION_PROGRESS_INTERVAL_TICKS: u64 = 40;
pub const TIMER_DISPLAY_INTERVAL_TICKS: u64 = TICK_RATE as u64;
pub const RESTART_HINT_DELAY_TICKS: u64 = 60;

pub fn max_health_for(mode: MaxHealthMode) -> f32 {
    match mode {
        MaxHealthMode::Standard => 20.0,
        MaxHealthMode::HalfHeart => 1.0,
    }
}

/// Instant health heals `4 * 2^amplifier`, instant damage deals `6 * 2^amplifier`.
pub fn instant_effect_magnitude(base: f32, amplifier: u8) -> f32 {
    base * f32::powi(2.0, i32::from(amplifier.min(30)))
}

pub fn format_run_time(elapsed_ticks: u64) -> String {
    let elapsed_ms = elapsed_ticks.saturating_mul(TICK_MS);
    let minutes = elapsed_ms / 60_000;
    let seconds = (elapsed_ms / 1_000) % 60;
    let tenths = (elapsed_ms / 100) % 10;
    format!("{minutes:02}:{seconds:02}.{tenths}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_time_uses_minutes_seconds_and_tenths() {
        assert_eq!(format_run_time(0), "00:00.0");
        assert_eq!(format_run_time(21), "00:01.0");
        assert_eq!(format_run_time(20 * 75 + 3), "01:15.1");
    }

    #[test]
    fn instant_magnitude_doubles_per_amplifier() {
        assert_eq!(instant_effect_magnitude(4.0, 0), 4.0);
        assert_eq!(instant_effect_magnitude(4.0, 1), 8.0);
        assert_eq!(instant_effect_magnitude(6.0, 2), 24.0);
    }
}
