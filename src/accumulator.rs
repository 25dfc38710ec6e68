use std::collections::BTreeMap;

use crate::constants::{
    FLUSH_EPSILON, FOOD_FLUSH_THRESHOLD, HEALTH_FLUSH_THRESHOLD, SATURATION_FLUSH_THRESHOLD,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccumulatorCategory {
    Regen,
    EffectRegen,
    PeriodicDamage,
    Hunger,
    Saturation,
}

impl AccumulatorCategory {
    pub fn threshold(self) -> f64 {
        match self {
            Self::Regen | Self::EffectRegen | Self::PeriodicDamage => HEALTH_FLUSH_THRESHOLD,
            Self::Hunger => FOOD_FLUSH_THRESHOLD,
            Self::Saturation => SATURATION_FLUSH_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct NormalizationAccumulators {
    pending: BTreeMap<AccumulatorCategory, f64>,
}

impl NormalizationAccumulators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn pending(&self, category: AccumulatorCategory) -> f64 {
        self.pending.get(&category).copied().unwrap_or(0.0)
    }

    /// Adds `raw_amount / participant_count` and returns the whole multiple of
    /// the category threshold that became flushable, keeping the residue.
    pub fn accumulate(
        &mut self,
        category: AccumulatorCategory,
        raw_amount: f64,
        participant_count: usize,
    ) -> Option<f64> {
        if !raw_amount.is_finite() || raw_amount <= 0.0 {
            return None;
        }
        let divisor = participant_count.max(1) as f64;
        let threshold = category.threshold();
        let fraction = self.pending.entry(category).or_insert(0.0);
        *fraction += raw_amount / divisor;

        let units = ((*fraction + FLUSH_EPSILON) / threshold).floor();
        if units < 1.0 {
            return None;
        }
        let flushed = units * threshold;
        *fraction = (*fraction - flushed).max(0.0);
        Some(flushed)
    }
}
