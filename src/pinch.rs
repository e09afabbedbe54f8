// src/pinch.rs
use crate::config::{PinchConfig, VolumeConfig};
use crate::landmarks::*;
use crate::pose::{Openness, PoseState};
use crate::zone::{Zone, ZoneVolumes};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinchState {
    pub active: bool,
    /// Locked for the lifetime of one activation.
    pub zone_at_activation: Option<Zone>,
    pub reference_tip_y: Option<f64>,
}

impl PinchState {
    fn release(&mut self) {
        self.active = false;
        self.zone_at_activation = None;
        self.reference_tip_y = None;
    }
}

/// Thumb-index closeness, 1 touching to 0 at `reference_factor` hand scales apart.
pub fn pinch_amount(landmarks: &[Landmark; LANDMARK_COUNT], reference_factor: f64) -> f64 {
    let d = planar_distance(&landmarks[THUMB_TIP], &landmarks[INDEX_TIP]);
    let denom = (reference_factor * hand_scale(landmarks)).max(SCALE_EPSILON);
    (1.0 - d / denom).clamp(0.0, 1.0)
}

/// Thumb counts double: it drifts less than the index tip while dragging.
pub fn weighted_tip_y(landmarks: &[Landmark; LANDMARK_COUNT]) -> f64 {
    (2.0 * landmarks[THUMB_TIP].y + landmarks[INDEX_TIP].y) / 3.0
}

/// Pinch-and-drag volume control, one Schmitt trigger per hand.
#[derive(Debug, Clone)]
pub struct PinchController {
    pinch: PinchConfig,
    volume: VolumeConfig,
    zone_bands: [f64; 2],
    states: PerHand<PinchState>,
}

impl PinchController {
    pub fn new(pinch: PinchConfig, volume: VolumeConfig, zone_bands: [f64; 2]) -> Self {
        Self {
            pinch,
            volume,
            zone_bands,
            states: PerHand::default(),
        }
    }

    pub fn state(&self, hand: Handedness) -> &PinchState {
        &self.states[hand]
    }

    pub fn is_active(&self, hand: Handedness) -> bool {
        self.states[hand].active
    }

    fn suppressed(&self, hand: Handedness, pose: &PoseState, now: u64) -> bool {
        if pose.is_fist() {
            return true;
        }
        // the play gesture opens the hand, which looks like a pinch release
        hand == Handedness::Right
            && pose
                .last_open_at
                .map_or(false, |t| now.saturating_sub(t) < self.pinch.open_cooldown_ms)
    }

    /// Process one frame for `sample.handedness`. Returns the zone level when a
    /// drag moved it.
    pub fn update(
        &mut self,
        sample: &HandSample,
        openness: &Openness,
        pose: &PoseState,
        now: u64,
        volumes: &mut ZoneVolumes,
    ) -> Option<(Zone, f64)> {
        let hand = sample.handedness;
        if self.suppressed(hand, pose, now) {
            return None;
        }

        let landmarks = &sample.landmarks;
        let state = &mut self.states[hand];
        let mut level = None;

        if state.active {
            // folding into a fist means the user is leaving the drag
            if openness.open_count() <= self.pinch.release_open_count {
                state.release();
                info!("{} pinch OFF (fingers folded)", hand.as_str());
                return None;
            }
            level = drag(state, landmarks, &self.volume, self.zone_bands, volumes);
        }

        let amount = pinch_amount(landmarks, self.pinch.reference_factor);

        if !state.active && amount >= self.pinch.on {
            let zone = Zone::of_hand(landmarks, self.zone_bands);
            state.active = true;
            state.zone_at_activation = Some(zone);
            state.reference_tip_y = Some(weighted_tip_y(landmarks));
            info!("{} pinch ON in zone {}", hand.as_str(), zone.as_str());
            return level;
        }

        if state.active && amount <= self.pinch.off {
            state.release();
            info!("{} pinch OFF", hand.as_str());
        }

        level
    }
}

fn drag(
    state: &mut PinchState,
    landmarks: &[Landmark; LANDMARK_COUNT],
    volume: &VolumeConfig,
    zone_bands: [f64; 2],
    volumes: &mut ZoneVolumes,
) -> Option<(Zone, f64)> {
    let tip_y = weighted_tip_y(landmarks);
    let reference = match state.reference_tip_y {
        Some(r) => r,
        None => {
            state.reference_tip_y = Some(tip_y);
            return None;
        }
    };

    // image y grows downward, so raising the hand is positive
    let dy_norm = (reference - tip_y) / hand_scale(landmarks);
    state.reference_tip_y = Some(tip_y);
    if dy_norm.abs() < volume.deadband {
        return None;
    }

    let zone = state
        .zone_at_activation
        .unwrap_or_else(|| Zone::of_hand(landmarks, zone_bands));
    let db = volumes.adjust(zone, dy_norm * volume.db_per_unit);
    debug!("zone {} -> {:.2} dB", zone.as_str(), db);
    Some((zone, db))
}
