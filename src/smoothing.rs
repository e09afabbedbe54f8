// src/smoothing.rs
use crate::landmarks::{HandSample, Handedness, Landmark, PerHand, LANDMARK_COUNT};

/// Per-handedness exponential smoothing of raw landmark sets.
///
/// A slot is seeded unsmoothed by its first observation and left untouched
/// (stale) on frames where that hand is missing.
#[derive(Debug, Clone)]
pub struct FrameNormalizer {
    alpha: f64,
    flip_handedness: bool,
    slots: PerHand<Option<[Landmark; LANDMARK_COUNT]>>,
}

impl FrameNormalizer {
    pub fn new(alpha: f64, flip_handedness: bool) -> Self {
        Self {
            alpha,
            flip_handedness,
            slots: PerHand::default(),
        }
    }

    /// Undo camera mirroring. Must run before any per-hand lookup.
    pub fn correct_handedness(&self, raw: Handedness) -> Handedness {
        if self.flip_handedness {
            raw.opposite()
        } else {
            raw
        }
    }

    /// Blend a raw detection into its slot and return the smoothed sample.
    pub fn observe(
        &mut self,
        raw_handedness: Handedness,
        confidence: f64,
        raw: &[Landmark; LANDMARK_COUNT],
    ) -> HandSample {
        let handedness = self.correct_handedness(raw_handedness);
        let smoothed = match &self.slots[handedness] {
            Some(prev) => blend(prev, raw, self.alpha),
            None => *raw,
        };
        self.slots[handedness] = Some(smoothed);

        HandSample {
            landmarks: smoothed,
            handedness,
            confidence,
        }
    }

    pub fn smoothed(&self, hand: Handedness) -> Option<&[Landmark; LANDMARK_COUNT]> {
        self.slots[hand].as_ref()
    }
}

fn blend(
    prev: &[Landmark; LANDMARK_COUNT],
    curr: &[Landmark; LANDMARK_COUNT],
    alpha: f64,
) -> [Landmark; LANDMARK_COUNT] {
    let mut out = *prev;
    for (o, (p, c)) in out.iter_mut().zip(prev.iter().zip(curr.iter())) {
        *o = p + (c - p) * alpha;
    }
    out
}
