// src/landmarks.rs
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

pub const LANDMARK_COUNT: usize = 21;

/// Wrist plus the four finger MCPs. Used for the palm centre and the zone centroid.
pub const PALM_POINTS: [usize; 5] = [WRIST, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

/// Lower bound for every normalisation denominator.
pub const SCALE_EPSILON: f64 = 1e-6;

/// x, y in normalized image coordinates, z relative depth.
pub type Landmark = Vector3<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn opposite(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }
}

/// One detected hand in one frame, already keyed by corrected handedness.
#[derive(Debug, Clone, PartialEq)]
pub struct HandSample {
    pub landmarks: [Landmark; LANDMARK_COUNT],
    pub handedness: Handedness,
    pub confidence: f64,
}

impl HandSample {
    pub fn point(&self, index: usize) -> Landmark {
        self.landmarks[index]
    }

    pub fn scale(&self) -> f64 {
        hand_scale(&self.landmarks)
    }
}

/// Distance in the image plane. Depth is too noisy to use for gestures.
pub fn planar_distance(a: &Landmark, b: &Landmark) -> f64 {
    (a.xy() - b.xy()).norm()
}

/// Wrist to middle-finger MCP, never below [`SCALE_EPSILON`].
pub fn hand_scale(landmarks: &[Landmark; LANDMARK_COUNT]) -> f64 {
    planar_distance(&landmarks[WRIST], &landmarks[MIDDLE_MCP]).max(SCALE_EPSILON)
}

/// Mean of wrist and the four MCPs, in the image plane.
pub fn palm_center(landmarks: &[Landmark; LANDMARK_COUNT]) -> Vector2<f64> {
    let sum = PALM_POINTS
        .iter()
        .fold(Vector2::zeros(), |acc, &i| acc + landmarks[i].xy());
    sum / PALM_POINTS.len() as f64
}

/// Fixed two-slot storage for per-hand state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerHand<T> {
    pub left: T,
    pub right: T,
}

impl<T> PerHand<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }
}

impl<T> Index<Handedness> for PerHand<T> {
    type Output = T;

    fn index(&self, hand: Handedness) -> &T {
        match hand {
            Handedness::Left => &self.left,
            Handedness::Right => &self.right,
        }
    }
}

impl<T> IndexMut<Handedness> for PerHand<T> {
    fn index_mut(&mut self, hand: Handedness) -> &mut T {
        match hand {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(points: &[(f64, f64)]) -> [Landmark; LANDMARK_COUNT] {
        let mut lms = [Landmark::zeros(); LANDMARK_COUNT];
        for (i, (x, y)) in points.iter().enumerate() {
            lms[i] = Landmark::new(*x, *y, 0.0);
        }
        lms
    }

    #[test]
    fn hand_scale_uses_wrist_and_middle_mcp() {
        let mut lms = [Landmark::zeros(); LANDMARK_COUNT];
        lms[WRIST] = Landmark::new(0.5, 0.8, 0.0);
        lms[MIDDLE_MCP] = Landmark::new(0.5, 0.5, 0.3);
        assert!((hand_scale(&lms) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn hand_scale_is_positive_for_coincident_points() {
        let lms = flat(&[(0.4, 0.4); LANDMARK_COUNT]);
        assert!(hand_scale(&lms) > 0.0);
        assert_eq!(hand_scale(&lms), SCALE_EPSILON);
    }

    #[test]
    fn palm_center_averages_five_points() {
        let mut lms = [Landmark::zeros(); LANDMARK_COUNT];
        for (k, &i) in PALM_POINTS.iter().enumerate() {
            lms[i] = Landmark::new(k as f64, 2.0 * k as f64, 9.0);
        }
        let c = palm_center(&lms);
        assert!((c.x - 2.0).abs() < 1e-12);
        assert!((c.y - 4.0).abs() < 1e-12);
    }

    #[test]
    fn per_hand_indexes_by_handedness() {
        let mut slots = PerHand::new(1, 2);
        slots[Handedness::Right] += 10;
        assert_eq!(slots[Handedness::Left], 1);
        assert_eq!(slots[Handedness::Right], 12);
        assert_eq!(Handedness::Left.opposite(), Handedness::Right);
    }
}
