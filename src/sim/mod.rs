//! In-process host used by the server, the simulator and the engine tests.

use std::collections::BTreeMap;

use crate::constants::{MAX_FOOD, START_SATURATION};
use crate::error::HostError;
use crate::host::{
    ParticipantRegistry, PlayerReset, PresentationSink, RoleAssigner, SettingsProvider,
    WorldProvider,
};
use crate::settings::{DifficultyTier, Settings};
use crate::types::{
    Biome, BlockKind, BlockPos, EffectKind, EffectPayload, Notice, ParticipantId,
    ParticipantMode, RunOutcome, Vec3, WorldHandle,
};

mod bots;
pub mod world;

pub use bots::BotDriver;
pub use world::{SimTerrain, SimWorldProvider};

#[derive(Clone, Debug, PartialEq)]
pub struct SimParticipant {
    pub name: String,
    pub eligible: bool,
    pub health: f32,
    pub hunger: i32,
    pub saturation: f32,
    pub absorption: f32,
    pub position: Vec3,
    pub mode: ParticipantMode,
    pub effects: Vec<EffectPayload>,
    pub role: Option<String>,
}

impl SimParticipant {
    pub fn new(name: &str, position: Vec3) -> Self {
        Self {
            name: name.to_string(),
            eligible: true,
            health: 20.0,
            hunger: MAX_FOOD,
            saturation: START_SATURATION,
            absorption: 0.0,
            position,
            mode: ParticipantMode::Observing,
            effects: Vec::new(),
            role: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    SyntheticDamage { id: ParticipantId, amount: f32 },
    EffectFeedback { id: ParticipantId, kind: EffectKind },
    EffectApplied { id: ParticipantId, effect: EffectPayload },
    ForcedJump { id: ParticipantId },
    TerminalFeedback { id: ParticipantId, outcome: RunOutcome },
    Reset { id: ParticipantId },
}

#[derive(Clone, Debug, Default)]
pub struct SimHost {
    pub world: SimWorldProvider,
    pub participants: BTreeMap<ParticipantId, SimParticipant>,
    pub settings: Settings,
    pub notices: Vec<Notice>,
    pub status_texts: Vec<(ParticipantId, String)>,
    pub events: Vec<SimEvent>,
}

impl SimHost {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_participants(settings: Settings, count: usize) -> Self {
        let mut host = Self::new(settings);
        for index in 0..count {
            let id = format!("p{}", index + 1);
            host.add_participant(&id, Vec3::new(index as f64 * 2.0, 64.0, 0.0));
        }
        host
    }

    pub fn add_participant(&mut self, id: &str, position: Vec3) {
        self.participants
            .insert(id.to_string(), SimParticipant::new(id, position));
    }

    pub fn remove_participant(&mut self, id: &str) -> Option<SimParticipant> {
        self.participants.remove(id)
    }

    pub fn participant(&self, id: &str) -> Option<&SimParticipant> {
        self.participants.get(id)
    }

    pub fn participant_mut(&mut self, id: &str) -> Option<&mut SimParticipant> {
        self.participants.get_mut(id)
    }

    pub fn set_eligible(&mut self, id: &str, eligible: bool) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.eligible = eligible;
        }
    }

    pub fn forced_jumps(&self, id: &str) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SimEvent::ForcedJump { id: target } if target == id))
            .count()
    }

    pub fn synthetic_damage_to(&self, id: &str) -> Vec<f32> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SimEvent::SyntheticDamage { id: target, amount } if target == id => Some(*amount),
                _ => None,
            })
            .collect()
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }

    pub fn clear_log(&mut self) {
        self.notices.clear();
        self.status_texts.clear();
        self.events.clear();
    }
}

impl WorldProvider for SimHost {
    fn create_ephemeral_world_set(
        &mut self,
        seed: u64,
        difficulty: DifficultyTier,
    ) -> Result<WorldHandle, HostError> {
        self.world.create(seed, difficulty)
    }

    fn destroy(&mut self, handle: WorldHandle) -> Result<(), HostError> {
        self.world.destroy(handle)
    }

    fn top_surface_height(&self, handle: WorldHandle, x: i32, z: i32) -> Option<i32> {
        self.world
            .terrain(handle)
            .map(|terrain| terrain.top_surface_height(x, z))
    }

    fn block_kind_at(&self, handle: WorldHandle, pos: BlockPos) -> BlockKind {
        self.world
            .terrain(handle)
            .map_or(BlockKind::Air, |terrain| terrain.block_kind_at(pos))
    }

    fn biome_at(&self, handle: WorldHandle, x: i32, z: i32) -> Biome {
        self.world
            .terrain(handle)
            .map_or(Biome::Ocean, |terrain| terrain.biome_at(x, z))
    }

    fn preload_area(&mut self, handle: WorldHandle, center: BlockPos, _radius: i32) {
        self.world.preload(handle, center);
    }
}

impl ParticipantRegistry for SimHost {
    fn participants(&self) -> Vec<ParticipantId> {
        self.participants.keys().cloned().collect()
    }

    fn display_name(&self, id: &str) -> String {
        self.participants
            .get(id)
            .map_or_else(|| id.to_string(), |participant| participant.name.clone())
    }

    fn is_eligible(&self, id: &str) -> bool {
        self.participants
            .get(id)
            .is_some_and(|participant| participant.eligible)
    }

    fn health(&self, id: &str) -> f32 {
        self.participants.get(id).map_or(0.0, |p| p.health)
    }

    fn hunger(&self, id: &str) -> i32 {
        self.participants.get(id).map_or(0, |p| p.hunger)
    }

    fn saturation(&self, id: &str) -> f32 {
        self.participants.get(id).map_or(0.0, |p| p.saturation)
    }

    fn absorption(&self, id: &str) -> f32 {
        self.participants.get(id).map_or(0.0, |p| p.absorption)
    }

    fn position(&self, id: &str) -> Vec3 {
        self.participants
            .get(id)
            .map_or_else(Vec3::default, |p| p.position)
    }

    fn set_health(&mut self, id: &str, value: f32) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.health = value;
        }
    }

    fn set_hunger(&mut self, id: &str, value: i32) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.hunger = value;
        }
    }

    fn set_saturation(&mut self, id: &str, value: f32) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.saturation = value;
        }
    }

    fn set_absorption(&mut self, id: &str, value: f32) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.absorption = value;
        }
    }

    fn apply_synthetic_damage(&mut self, id: &str, amount: f32) {
        self.events.push(SimEvent::SyntheticDamage {
            id: id.to_string(),
            amount,
        });
    }

    fn show_effect_feedback(&mut self, id: &str, kind: EffectKind) {
        self.events.push(SimEvent::EffectFeedback {
            id: id.to_string(),
            kind,
        });
    }

    fn apply_effect(&mut self, id: &str, effect: &EffectPayload) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.effects.push(*effect);
        }
        self.events.push(SimEvent::EffectApplied {
            id: id.to_string(),
            effect: *effect,
        });
    }

    fn force_jump(&mut self, id: &str) {
        self.events.push(SimEvent::ForcedJump { id: id.to_string() });
    }

    fn set_mode(&mut self, id: &str, mode: ParticipantMode) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.mode = mode;
        }
    }

    fn teleport(&mut self, id: &str, position: Vec3) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.position = position;
        }
    }
}

impl PresentationSink for SimHost {
    fn broadcast(&mut self, notice: &Notice) {
        self.notices.push(notice.clone());
    }

    fn status_text(&mut self, id: &str, text: &str) {
        self.status_texts.push((id.to_string(), text.to_string()));
    }

    fn play_terminal_feedback(&mut self, id: &str, outcome: RunOutcome) {
        self.events.push(SimEvent::TerminalFeedback {
            id: id.to_string(),
            outcome,
        });
    }
}

impl PlayerReset for SimHost {
    fn reset_participant(&mut self, id: &str) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.effects.clear();
        }
        self.events.push(SimEvent::Reset { id: id.to_string() });
    }
}

impl RoleAssigner for SimHost {
    fn assign_roles(&mut self, participants: &[ParticipantId]) {
        for (index, id) in participants.iter().enumerate() {
            if let Some(participant) = self.participants.get_mut(id) {
                participant.role = Some(if index == 0 { "leader" } else { "runner" }.to_string());
            }
        }
    }
}

impl SettingsProvider for SimHost {
    fn settings(&self) -> Settings {
        self.settings
    }
}
