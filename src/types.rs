use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vitals::VitalSnapshot;

pub type ParticipantId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    GeneratingWorld,
    Running,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Victory,
    Defeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorldHandle(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn above(&self, dy: i32) -> Self {
        Self {
            x: self.x,
            y: self.y + dy,
            z: self.z,
        }
    }

    pub fn standing_position(&self) -> Vec3 {
        Vec3::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 1.0,
            f64::from(self.z) + 0.5,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Air,
    Solid,
    Water,
    Lava,
    Ice,
    Vegetation,
}

impl BlockKind {
    pub fn is_safe_ground(self) -> bool {
        self == Self::Solid
    }

    pub fn is_clear(self) -> bool {
        self == Self::Air
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Plains,
    Forest,
    Desert,
    Mountains,
    Snowy,
    Swamp,
    Beach,
    River,
    Ocean,
    DeepOcean,
}

impl Biome {
    pub fn is_ocean(self) -> bool {
        matches!(self, Self::Ocean | Self::DeepOcean)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageCause {
    Attack,
    Projectile,
    Fall,
    Fire,
    Lava,
    Drowning,
    Starvation,
    Explosion,
    Magic,
    Poison,
    Wither,
    Other,
}

impl DamageCause {
    /// Damage-over-time causes that tick once per participant and must be normalized.
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Poison | Self::Wither)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    InstantHealth,
    InstantDamage,
    Regeneration,
    Poison,
    Wither,
    Speed,
    Slowness,
    Strength,
    Weakness,
    FireResistance,
    Absorption,
}

impl EffectKind {
    pub fn is_instant(self) -> bool {
        matches!(self, Self::InstantHealth | Self::InstantDamage)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSource {
    Drink,
    Splash,
    Lingering,
    Beacon,
    Other,
}

impl EffectSource {
    pub fn is_area(self) -> bool {
        matches!(self, Self::Splash | Self::Lingering)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EffectPayload {
    pub kind: EffectKind,
    pub amplifier: u8,
    #[serde(rename = "durationTicks")]
    pub duration_ticks: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantMode {
    Observing,
    Playing,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    Generating,
    NoSpawnFound {
        fallback: BlockPos,
    },
    RunStarted {
        spawn: BlockPos,
    },
    DamageShared {
        actor: String,
        hearts: f32,
        cause: DamageCause,
    },
    RunEnded {
        outcome: RunOutcome,
        #[serde(rename = "runTime")]
        run_time: String,
    },
    RestartHint,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Generating => write!(f, "Generating a new world, please wait..."),
            Notice::NoSpawnFound { fallback } => write!(
                f,
                "No safe spawn found, using fallback {} {} {}",
                fallback.x, fallback.y, fallback.z
            ),
            Notice::RunStarted { spawn } => {
                write!(f, "Run started at {} {} {}", spawn.x, spawn.y, spawn.z)
            }
            Notice::DamageShared { actor, hearts, .. } => {
                write!(f, "{actor} took {hearts:.1} hearts of damage")
            }
            Notice::RunEnded { outcome, run_time } => match outcome {
                RunOutcome::Victory => write!(f, "Victory! Final time {run_time}"),
                RunOutcome::Defeat => write!(f, "Everyone died. Time {run_time}"),
            },
            Notice::RestartHint => write!(f, "Start a new run to try again"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunStatus {
    pub phase: RunPhase,
    pub tick: u64,
    #[serde(rename = "elapsedTicks")]
    pub elapsed_ticks: u64,
    #[serde(rename = "runTime")]
    pub run_time: String,
    pub vitals: VitalSnapshot,
    #[serde(rename = "searchProgress")]
    pub search_progress: Option<f32>,
    pub outcome: Option<RunOutcome>,
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub seed: u64,
    #[serde(rename = "elapsedTicks")]
    pub elapsed_ticks: u64,
    #[serde(rename = "participantCount")]
    pub participant_count: usize,
    #[serde(rename = "maxHealth")]
    pub max_health: f32,
}
