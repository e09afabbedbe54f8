// src/synthetic.rs
//
// Deterministic hand shapes for tests and the demo run when no --replay trace
// is given. Shapes are laid out in hand units (wrist at the origin, middle MCP
// one unit up) and then rotated, scaled and placed in image coordinates.

use crate::landmarks::*;
use crate::source::{LandmarkSource, RawFrame, RawHand};
use anyhow::Result;
use nalgebra::Vector2;

const MCPS: [(usize, (f64, f64)); 4] = [
    (INDEX_MCP, (-0.30, -0.95)),
    (MIDDLE_MCP, (0.0, -1.0)),
    (RING_MCP, (0.25, -0.95)),
    (PINKY_MCP, (0.45, -0.85)),
];

/// Palm centre of the layout above: mean of the wrist and the four MCPs.
const PALM: (f64, f64) = (0.08, -0.75);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Open,
    Fist,
    /// Thumb-index pinch with the given horizontal tip gap in hand units.
    Pinch(f64),
    Shaka,
}

/// Builds a 21-point hand with known openness.
#[derive(Debug, Clone)]
pub struct HandBuilder {
    wrist: Vector2<f64>,
    scale: f64,
    rotation: f64,
    shape: Shape,
}

impl HandBuilder {
    /// Hand with its wrist at (`x`, `y`) in image coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            wrist: Vector2::new(x, y),
            scale: 0.15,
            rotation: 0.0,
            shape: Shape::Open,
        }
    }

    /// Wrist to middle-MCP distance in image units.
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn offset(mut self, dx: f64, dy: f64) -> Self {
        self.wrist += Vector2::new(dx, dy);
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.wrist = Vector2::new(x, y);
        self
    }

    /// In-plane rotation (rad) about the middle MCP. Preserves every openness
    /// score and turns the jog needle by exactly this angle.
    pub fn rotate(mut self, angle: f64) -> Self {
        self.rotation = angle;
        self
    }

    pub fn open(mut self) -> Self {
        self.shape = Shape::Open;
        self
    }

    pub fn fist(mut self) -> Self {
        self.shape = Shape::Fist;
        self
    }

    pub fn pinch(mut self, gap: f64) -> Self {
        self.shape = Shape::Pinch(gap);
        self
    }

    pub fn shaka(mut self) -> Self {
        self.shape = Shape::Shaka;
        self
    }

    pub fn build(&self) -> [Landmark; LANDMARK_COUNT] {
        let mut pts = [Vector2::<f64>::zeros(); LANDMARK_COUNT];
        pts[THUMB_CMC] = Vector2::new(-0.35, -0.25);
        for &(i, (x, y)) in MCPS.iter() {
            pts[i] = Vector2::new(x, y);
        }

        let (thumb_open, fingers_open) = match self.shape {
            Shape::Open => (true, [true; 4]),
            Shape::Fist => (false, [false; 4]),
            Shape::Pinch(_) => (true, [false, true, true, true]),
            Shape::Shaka => (true, [false, false, false, true]),
        };

        for (k, &(mcp, _)) in MCPS.iter().enumerate() {
            let base = pts[mcp];
            let (pip, dip, tip) = if fingers_open[k] {
                (
                    base + Vector2::new(0.0, -0.45),
                    base + Vector2::new(0.0, -0.7),
                    base + Vector2::new(0.0, -0.9),
                )
            } else {
                let pip = base + Vector2::new(0.0, -0.3);
                let tip = base + (palm() - base) * 0.8;
                (pip, (pip + tip) / 2.0, tip)
            };
            pts[mcp + 1] = pip;
            pts[mcp + 2] = dip;
            pts[mcp + 3] = tip;
        }

        if thumb_open {
            pts[THUMB_MCP] = Vector2::new(-0.6, -0.45);
            pts[THUMB_IP] = Vector2::new(-0.8, -0.65);
            pts[THUMB_TIP] = Vector2::new(-1.0, -0.85);
        } else {
            pts[THUMB_MCP] = Vector2::new(-0.6, -0.45);
            pts[THUMB_IP] = Vector2::new(-0.75, -0.6);
            pts[THUMB_TIP] = pts[THUMB_MCP] + (palm() - pts[THUMB_MCP]) * 0.8;
        }

        if let Shape::Pinch(gap) = self.shape {
            // index hooks over toward the thumb, thumb tip sits `gap` to its left
            let index_tip = Vector2::new(-0.6, -1.05);
            pts[INDEX_PIP] = Vector2::new(-0.5, -1.25);
            pts[INDEX_PIP + 1] = Vector2::new(-0.58, -1.2);
            pts[INDEX_TIP] = index_tip;
            pts[THUMB_IP] = Vector2::new(-0.75, -0.75);
            pts[THUMB_TIP] = index_tip - Vector2::new(gap, 0.0);
        }

        let pivot = pts[MIDDLE_MCP];
        let (sin, cos) = self.rotation.sin_cos();
        let mut out = [Landmark::zeros(); LANDMARK_COUNT];
        for (o, p) in out.iter_mut().zip(pts.iter()) {
            let r = p - pivot;
            let turned = Vector2::new(r.x * cos - r.y * sin, r.x * sin + r.y * cos) + pivot;
            let img = self.wrist + turned * self.scale;
            *o = Landmark::new(img.x, img.y, 0.0);
        }
        out
    }

    pub fn raw(&self, handedness: Handedness) -> RawHand {
        RawHand {
            handedness,
            score: 0.95,
            landmarks: self.build().iter().map(|p| [p.x, p.y, p.z]).collect(),
        }
    }
}

fn palm() -> Vector2<f64> {
    Vector2::new(PALM.0, PALM.1)
}

/// One scripted step: a hand shape held or interpolated for `frames` frames.
#[derive(Debug, Clone)]
pub struct Segment {
    pub frames: usize,
    pub hand: Option<(Handedness, HandBuilder, HandBuilder)>,
}

impl Segment {
    pub fn hold(frames: usize, hand: Handedness, shape: HandBuilder) -> Self {
        Self {
            frames,
            hand: Some((hand, shape.clone(), shape)),
        }
    }

    /// Linear move of the wrist and rotation from `from` to `to`; shape follows `to`.
    pub fn sweep(frames: usize, hand: Handedness, from: HandBuilder, to: HandBuilder) -> Self {
        Self {
            frames,
            hand: Some((hand, from, to)),
        }
    }

    pub fn empty(frames: usize) -> Self {
        Self { frames, hand: None }
    }
}

/// Replays a list of segments at a fixed frame interval. Handedness in the
/// frames is what the camera reports, so pass raw labels.
pub struct ScriptedSource {
    segments: Vec<Segment>,
    frame_ms: f64,
    segment: usize,
    frame_in_segment: usize,
    emitted: u64,
}

impl ScriptedSource {
    pub fn new(segments: Vec<Segment>, target_fps: f64) -> Self {
        Self {
            segments,
            frame_ms: 1000.0 / target_fps,
            segment: 0,
            frame_in_segment: 0,
            emitted: 0,
        }
    }

    /// Play, pause, play, swipe left, drag the left channel up, jog, release.
    /// Labels are pre-mirrored for a selfie camera (`flip_handedness = true`).
    pub fn demo(target_fps: f64) -> Self {
        let right = Handedness::Left; // mirrored
        let left = Handedness::Right;
        let open = HandBuilder::new(0.75, 0.75).open();
        let parked = open.clone().at(0.35, 0.75);
        let segments = vec![
            Segment::empty(5),
            Segment::hold(10, right, open.clone()),
            Segment::hold(10, right, open.clone().fist()),
            Segment::hold(10, right, open.clone()),
            Segment::hold(20, right, open.clone()),
            Segment::sweep(5, right, open.clone(), parked.clone()),
            Segment::hold(15, right, parked.clone()),
            Segment::empty(5),
            Segment::hold(10, left, HandBuilder::new(0.15, 0.8).pinch(0.1)),
            Segment::sweep(
                15,
                left,
                HandBuilder::new(0.15, 0.8).pinch(0.1),
                HandBuilder::new(0.15, 0.6).pinch(0.1),
            ),
            Segment::hold(5, left, HandBuilder::new(0.15, 0.6).pinch(0.9)),
            Segment::empty(5),
            Segment::hold(10, right, parked.clone().shaka()),
            Segment::sweep(20, right, parked.clone().shaka(), parked.clone().shaka().rotate(1.2)),
            Segment::hold(5, right, parked.clone().shaka().rotate(1.2)),
            Segment::hold(10, right, parked.clone().rotate(1.2)),
        ];
        Self::new(segments, target_fps)
    }

    pub fn total_frames(&self) -> usize {
        self.segments.iter().map(|s| s.frames).sum()
    }
}

fn lerp_builder(from: &HandBuilder, to: &HandBuilder, t: f64) -> HandBuilder {
    let mut b = to.clone();
    b.wrist = from.wrist + (to.wrist - from.wrist) * t;
    b.rotation = from.rotation + (to.rotation - from.rotation) * t;
    b.scale = from.scale + (to.scale - from.scale) * t;
    b
}

impl LandmarkSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        while let Some(seg) = self.segments.get(self.segment) {
            if self.frame_in_segment < seg.frames {
                break;
            }
            self.segment += 1;
            self.frame_in_segment = 0;
        }
        let seg = match self.segments.get(self.segment) {
            Some(s) => s,
            None => return Ok(None),
        };

        let hands = match &seg.hand {
            Some((handedness, from, to)) => {
                let t = if seg.frames > 1 {
                    self.frame_in_segment as f64 / (seg.frames - 1) as f64
                } else {
                    1.0
                };
                vec![lerp_builder(from, to, t).raw(*handedness)]
            }
            None => Vec::new(),
        };

        let frame = RawFrame {
            timestamp_ms: Some((self.emitted as f64 * self.frame_ms).round() as u64),
            hands,
        };
        self.frame_in_segment += 1;
        self.emitted += 1;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("scripted demo ({} frames)", self.total_frames())
    }
}
