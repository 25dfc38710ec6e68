use crate::constants::DRIFT_TOLERANCE;
use crate::host::Host;
use crate::types::ParticipantId;
use crate::vitals::VitalSnapshot;

pub(super) fn eligible_participants<H: Host + ?Sized>(host: &H) -> Vec<ParticipantId> {
    host.participants()
        .into_iter()
        .filter(|id| host.is_eligible(id))
        .collect()
}

pub(super) fn eligible_others<H: Host + ?Sized>(host: &H, actor: &str) -> Vec<ParticipantId> {
    host.participants()
        .into_iter()
        .filter(|id| id != actor && host.is_eligible(id))
        .collect()
}

pub(super) fn push_vitals<H: Host + ?Sized>(host: &mut H, id: &str, vitals: &VitalSnapshot) {
    host.set_health(id, vitals.health);
    host.set_hunger(id, vitals.hunger);
    host.set_saturation(id, vitals.saturation);
    host.set_absorption(id, vitals.absorption);
}

/// NaN on either side counts as drifted.
pub(super) fn drifted(local: f32, shared: f32) -> bool {
    !((local - shared).abs() <= DRIFT_TOLERANCE)
}

pub(super) fn to_hearts(amount: f32) -> f32 {
    amount / 2.0
}
