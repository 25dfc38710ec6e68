use serde::Serialize;

use crate::constants::{MAX_ABSORPTION, MAX_FOOD, MAX_SATURATION, START_SATURATION};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VitalSnapshot {
    pub health: f32,
    #[serde(rename = "maxHealth")]
    pub max_health: f32,
    pub hunger: i32,
    pub saturation: f32,
    pub absorption: f32,
}

/// The authoritative pool every eligible participant mirrors.
///
/// Setters clamp into range and ignore NaN, so no write can leave a field
/// outside its bounds.
#[derive(Clone, Debug)]
pub struct SharedVitalState {
    health: f32,
    max_health: f32,
    hunger: i32,
    saturation: f32,
    absorption: f32,
}

impl SharedVitalState {
    pub fn new(max_health: f32) -> Self {
        let max_health = if max_health.is_finite() {
            max_health.max(1.0)
        } else {
            1.0
        };
        Self {
            health: max_health,
            max_health,
            hunger: MAX_FOOD,
            saturation: START_SATURATION,
            absorption: 0.0,
        }
    }

    pub fn reset(&mut self, max_health: f32) {
        *self = Self::new(max_health);
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn hunger(&self) -> i32 {
        self.hunger
    }

    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    pub fn absorption(&self) -> f32 {
        self.absorption
    }

    pub fn is_depleted(&self) -> bool {
        self.health <= 0.0
    }

    pub fn is_full_health(&self) -> bool {
        self.health >= self.max_health
    }

    pub fn set_health(&mut self, value: f32) -> f32 {
        if !value.is_nan() {
            self.health = value.clamp(0.0, self.max_health);
        }
        self.health
    }

    pub fn heal(&mut self, amount: f32) -> f32 {
        self.set_health(self.health + amount.max(0.0))
    }

    pub fn damage(&mut self, amount: f32) -> f32 {
        self.set_health(self.health - amount.max(0.0))
    }

    pub fn set_hunger(&mut self, value: i32) -> i32 {
        self.hunger = value.clamp(0, MAX_FOOD);
        self.hunger
    }

    pub fn set_saturation(&mut self, value: f32) -> f32 {
        if !value.is_nan() {
            self.saturation = value.clamp(0.0, MAX_SATURATION);
        }
        self.saturation
    }

    pub fn set_absorption(&mut self, value: f32) -> f32 {
        if !value.is_nan() {
            self.absorption = value.clamp(0.0, MAX_ABSORPTION);
        }
        self.absorption
    }

    pub fn snapshot(&self) -> VitalSnapshot {
        VitalSnapshot {
            health: self.health,
            max_health: self.max_health,
            hunger: self.hunger,
            saturation: self.saturation,
            absorption: self.absorption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_run_start_values() {
        let mut vitals = SharedVitalState::new(20.0);
        vitals.damage(7.0);
        vitals.set_hunger(3);
        vitals.set_saturation(0.0);
        vitals.set_absorption(4.0);

        vitals.reset(1.0);
        assert_eq!(vitals.health(), 1.0);
        assert_eq!(vitals.max_health(), 1.0);
        assert_eq!(vitals.hunger(), 20);
        assert_eq!(vitals.saturation(), 5.0);
        assert_eq!(vitals.absorption(), 0.0);
    }

    #[test]
    fn setters_clamp_and_ignore_nan() {
        let mut vitals = SharedVitalState::new(20.0);
        assert_eq!(vitals.set_health(35.0), 20.0);
        assert_eq!(vitals.set_health(-3.0), 0.0);
        assert!(vitals.is_depleted());
        assert_eq!(vitals.set_health(f32::NAN), 0.0);
        assert_eq!(vitals.set_hunger(99), 20);
        assert_eq!(vitals.set_hunger(-1), 0);
        assert_eq!(vitals.set_saturation(25.0), 20.0);
        assert_eq!(vitals.set_absorption(-1.0), 0.0);
        assert_eq!(vitals.heal(-5.0), 0.0);
    }
}
