//! Contracts the host environment implements for the run core.
//!
//! The core never reaches into the host; it only calls these traits. A host
//! is free to fire hooks back into the same `RunContext` from inside any
//! mutator, the reentrancy guard turns those nested calls into no-ops.

use crate::error::HostError;
use crate::settings::{DifficultyTier, Settings};
use crate::types::{
    Biome, BlockKind, BlockPos, EffectKind, EffectPayload, Notice, ParticipantId,
    ParticipantMode, RunOutcome, Vec3, WorldHandle,
};

pub trait WorldProvider {
    fn create_ephemeral_world_set(
        &mut self,
        seed: u64,
        difficulty: DifficultyTier,
    ) -> Result<WorldHandle, HostError>;

    fn destroy(&mut self, handle: WorldHandle) -> Result<(), HostError>;

    /// Y of the topmost non-air block, `None` when the column is unavailable.
    fn top_surface_height(&self, handle: WorldHandle, x: i32, z: i32) -> Option<i32>;

    fn block_kind_at(&self, handle: WorldHandle, pos: BlockPos) -> BlockKind;

    fn biome_at(&self, handle: WorldHandle, x: i32, z: i32) -> Biome;

    fn preload_area(&mut self, _handle: WorldHandle, _center: BlockPos, _radius: i32) {}
}

pub trait ParticipantRegistry {
    fn participants(&self) -> Vec<ParticipantId>;

    fn display_name(&self, id: &str) -> String {
        id.to_string()
    }

    fn is_eligible(&self, id: &str) -> bool;

    fn health(&self, id: &str) -> f32;
    fn hunger(&self, id: &str) -> i32;
    fn saturation(&self, id: &str) -> f32;
    fn absorption(&self, id: &str) -> f32;
    fn position(&self, id: &str) -> Vec3;

    fn set_health(&mut self, id: &str, value: f32);
    fn set_hunger(&mut self, id: &str, value: i32);
    fn set_saturation(&mut self, id: &str, value: f32);
    fn set_absorption(&mut self, id: &str, value: f32);

    /// Client-side hurt feedback (flash, sound). Health is force-set separately.
    fn apply_synthetic_damage(&mut self, id: &str, amount: f32);

    fn show_effect_feedback(&mut self, _id: &str, _kind: EffectKind) {}

    fn apply_effect(&mut self, id: &str, effect: &EffectPayload);

    fn force_jump(&mut self, id: &str);

    fn set_mode(&mut self, id: &str, mode: ParticipantMode);

    fn teleport(&mut self, id: &str, position: Vec3);
}

pub trait PresentationSink {
    fn broadcast(&mut self, notice: &Notice);

    fn status_text(&mut self, id: &str, text: &str);

    fn play_terminal_feedback(&mut self, _id: &str, _outcome: RunOutcome) {}
}

pub trait PlayerReset {
    fn reset_participant(&mut self, id: &str);
}

pub trait RoleAssigner {
    fn assign_roles(&mut self, _participants: &[ParticipantId]) {}
}

pub trait SettingsProvider {
    fn settings(&self) -> Settings;
}

pub trait Host:
    WorldProvider + ParticipantRegistry + PresentationSink + PlayerReset + RoleAssigner + SettingsProvider
{
}

impl<T> Host for T where
    T: WorldProvider
        + ParticipantRegistry
        + PresentationSink
        + PlayerReset
        + RoleAssigner
        + SettingsProvider
{
}
