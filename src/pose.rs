// src/pose.rs
use crate::config::PoseConfig;
use crate::landmarks::*;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Finger order in an [`Openness`] vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb = 0,
    Index = 1,
    Middle = 2,
    Ring = 3,
    Pinky = 4,
}

/// (MCP, PIP, TIP) per finger. The thumb uses MCP, IP, TIP.
const FINGER_CHAINS: [(usize, usize, usize); 5] = [
    (THUMB_MCP, THUMB_IP, THUMB_TIP),
    (INDEX_MCP, INDEX_PIP, INDEX_TIP),
    (MIDDLE_MCP, MIDDLE_PIP, MIDDLE_TIP),
    (RING_MCP, RING_PIP, RING_TIP),
    (PINKY_MCP, PINKY_PIP, PINKY_TIP),
];

/// A finger counts as open at or above this openness.
pub const OPEN_THRESHOLD: f64 = 0.5;

/// Linear map of `value` from `[lo, hi]` onto `[0, 1]`, clamped.
/// A degenerate range maps to 0.5.
pub fn map01(value: f64, lo: f64, hi: f64) -> f64 {
    if hi == lo {
        return 0.5;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Interior angle at `b` in degrees, between b→a and b→c in the image plane.
pub fn angle_at(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    let v1 = a.xy() - b.xy();
    let v2 = c.xy() - b.xy();
    let n1 = v1.norm().max(SCALE_EPSILON);
    let n2 = v2.norm().max(SCALE_EPSILON);
    let cos = (v1.dot(&v2) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Per-frame extension score of each finger, 0 curled to 1 straight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Openness(pub [f64; 5]);

impl Openness {
    pub fn measure(landmarks: &[Landmark; LANDMARK_COUNT], config: &PoseConfig) -> Self {
        let center: Vector2<f64> = palm_center(landmarks);
        let scale = hand_scale(landmarks);

        let mut scores = [0.0; 5];
        for (score, &(mcp, pip, tip)) in scores.iter_mut().zip(FINGER_CHAINS.iter()) {
            let dist_norm = (landmarks[tip].xy() - center).norm() / scale;
            let dist_score = map01(dist_norm, config.dist_closed, config.dist_open);

            let angle = angle_at(&landmarks[mcp], &landmarks[pip], &landmarks[tip]);
            let ang_score = map01(angle, config.angle_closed, config.angle_open);

            *score = config.w_dist * dist_score + config.w_ang * ang_score;
        }
        Openness(scores)
    }

    pub fn score(&self, finger: Finger) -> f64 {
        self.0[finger as usize]
    }

    pub fn is_open(&self, finger: Finger) -> bool {
        self.score(finger) >= OPEN_THRESHOLD
    }

    pub fn open_count(&self) -> usize {
        self.0.iter().filter(|&&s| s >= OPEN_THRESHOLD).count()
    }

    /// Thumb and pinky out, the three middle fingers folded.
    pub fn is_shaka(&self) -> bool {
        self.is_open(Finger::Thumb)
            && self.is_open(Finger::Pinky)
            && !self.is_open(Finger::Index)
            && !self.is_open(Finger::Middle)
            && !self.is_open(Finger::Ring)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PoseLabel {
    Fist,
    Open,
}

impl PoseLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoseLabel::Fist => "FIST",
            PoseLabel::Open => "OPEN",
        }
    }
}

/// Hysteretic FIST/OPEN label for one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseState {
    pub label: PoseLabel,
    pub last_open_at: Option<u64>,
}

impl Default for PoseState {
    fn default() -> Self {
        Self {
            label: PoseLabel::Open,
            last_open_at: None,
        }
    }
}

impl PoseState {
    /// Apply one frame's open-finger count. Returns the new label only when it changed.
    ///
    /// 0 open fingers forces FIST, 4 or more forces OPEN, 1 to 3 keeps the current label.
    pub fn update(&mut self, open_count: usize, now: u64) -> Option<PoseLabel> {
        let next = match open_count {
            0 => PoseLabel::Fist,
            n if n >= 4 => PoseLabel::Open,
            _ => self.label,
        };
        if next == self.label {
            return None;
        }
        self.label = next;
        if next == PoseLabel::Open {
            self.last_open_at = Some(now);
        }
        Some(next)
    }

    pub fn is_fist(&self) -> bool {
        self.label == PoseLabel::Fist
    }
}
