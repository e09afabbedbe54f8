// src/zone.rs
use crate::config::VolumeConfig;
use crate::landmarks::{Landmark, LANDMARK_COUNT, PALM_POINTS};
use serde::{Deserialize, Serialize};

/// Horizontal screen region, one per audio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Left, Zone::Center, Zone::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Left => "Left",
            Zone::Center => "Center",
            Zone::Right => "Right",
        }
    }

    /// Boundaries are inclusive on the left side of each band.
    pub fn classify(center_x: f64, bands: [f64; 2]) -> Zone {
        if center_x <= bands[0] {
            Zone::Left
        } else if center_x <= bands[1] {
            Zone::Center
        } else {
            Zone::Right
        }
    }

    pub fn of_hand(landmarks: &[Landmark; LANDMARK_COUNT], bands: [f64; 2]) -> Zone {
        Zone::classify(hand_center_x(landmarks), bands)
    }
}

/// x of the wrist + MCP centroid.
pub fn hand_center_x(landmarks: &[Landmark; LANDMARK_COUNT]) -> f64 {
    PALM_POINTS.iter().map(|&i| landmarks[i].x).sum::<f64>() / PALM_POINTS.len() as f64
}

/// Mixer level per zone, in dB. Lives for the whole session; gestures and
/// track changes never reset it.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneVolumes {
    db: [f64; 3],
    min_db: f64,
    max_db: f64,
}

impl ZoneVolumes {
    pub fn new(config: &VolumeConfig) -> Self {
        Self {
            db: [0.0_f64.clamp(config.min_db, config.max_db); 3],
            min_db: config.min_db,
            max_db: config.max_db,
        }
    }

    pub fn get(&self, zone: Zone) -> f64 {
        self.db[zone as usize]
    }

    /// Add `delta_db`, clamp to range, store and return the new level.
    pub fn adjust(&mut self, zone: Zone, delta_db: f64) -> f64 {
        let next = (self.get(zone) + delta_db).clamp(self.min_db, self.max_db);
        self.db[zone as usize] = next;
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (Zone, f64)> + '_ {
        Zone::ALL.iter().map(move |&z| (z, self.get(z)))
    }
}
