use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxHealthMode {
    #[default]
    Standard,
    HalfHeart,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Peaceful,
    Easy,
    #[default]
    Normal,
    Hard,
}

impl DifficultyTier {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "peaceful" => Some(Self::Peaceful),
            "easy" => Some(Self::Easy),
            "normal" => Some(Self::Normal),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    #[serde(rename = "shareHunger", alias = "share_hunger")]
    pub share_hunger: bool,
    #[serde(rename = "shareEffects", alias = "share_effects")]
    pub share_effects: bool,
    #[serde(rename = "sharedJumps", alias = "shared_jumps")]
    pub shared_jumps: bool,
    #[serde(rename = "splashArbitration", alias = "splash_arbitration")]
    pub splash_arbitration: bool,
    #[serde(rename = "damageNotices", alias = "damage_notices")]
    pub damage_notices: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            share_hunger: true,
            share_effects: true,
            shared_jumps: true,
            splash_arbitration: true,
            damage_notices: true,
        }
    }
}

/// Read once per run at `start_run`; later edits only apply to the next run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "maxHealthMode", alias = "max_health_mode")]
    pub max_health_mode: MaxHealthMode,
    pub difficulty: DifficultyTier,
    pub seed: Option<u64>,
    pub features: FeatureToggles,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = Settings::from_json(r#"{ "difficulty": "hard" }"#).expect("parse");
        assert_eq!(settings.difficulty, DifficultyTier::Hard);
        assert_eq!(settings.max_health_mode, MaxHealthMode::Standard);
        assert_eq!(settings.seed, None);
        assert!(settings.features.shared_jumps);
    }

    #[test]
    fn feature_toggles_accept_snake_case_aliases() {
        let settings = Settings::from_json(
            r#"{ "max_health_mode": "half_heart", "features": { "shared_jumps": false } }"#,
        )
        .expect("parse");
        assert_eq!(settings.max_health_mode, MaxHealthMode::HalfHeart);
        assert!(!settings.features.shared_jumps);
        assert!(settings.features.share_hunger);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            Settings::from_json("{ nope"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "seed": 42 }"#).expect("write");
        let settings = Settings::load(&path).expect("load");
        assert_eq!(settings.seed, Some(42));

        let missing = Settings::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(SettingsError::Read { .. })));
    }
}
