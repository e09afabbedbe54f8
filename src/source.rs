// src/source.rs
//
// Perception side of the loop. A source hands over whatever the landmark
// model detected this tick; it never sees detector state.

use crate::landmarks::{Handedness, Landmark, LANDMARK_COUNT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One detection as reported by the model, handedness not yet corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHand {
    pub handedness: Handedness,
    #[serde(default = "default_score")]
    pub score: f64,
    pub landmarks: Vec<[f64; 3]>,
}

fn default_score() -> f64 {
    1.0
}

impl RawHand {
    /// Fixed-size landmark array, or `None` when the model returned a
    /// different point count.
    pub fn to_landmarks(&self) -> Option<[Landmark; LANDMARK_COUNT]> {
        if self.landmarks.len() != LANDMARK_COUNT {
            return None;
        }
        let mut out = [Landmark::zeros(); LANDMARK_COUNT];
        for (o, p) in out.iter_mut().zip(self.landmarks.iter()) {
            *o = Landmark::new(p[0], p[1], p[2]);
        }
        Some(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Capture time in ms, if the source knows it.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    #[serde(default)]
    pub hands: Vec<RawHand>,
}

impl RawFrame {
    pub fn empty() -> Self {
        Self::default()
    }
}

pub trait LandmarkSource {
    /// Next detection result. `Ok(None)` ends the run.
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;

    fn describe(&self) -> String {
        "landmark source".to_string()
    }
}

/// Replays a recorded JSON-lines trace, one frame per line.
pub struct ReplaySource<R> {
    reader: R,
    origin: PathBuf,
    line_no: usize,
    buf: String,
}

impl ReplaySource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open trace {}", path.display()))?;
        Ok(Self::from_reader(BufReader::new(file), path))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn from_reader(reader: R, origin: impl AsRef<Path>) -> Self {
        Self {
            reader,
            origin: origin.as_ref().to_path_buf(),
            line_no: 0,
            buf: String::new(),
        }
    }

    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> LandmarkSource for ReplaySource<R> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_line(&mut self.buf)
                .with_context(|| format!("reading {}", self.origin.display()))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }

            let mut frame = match serde_json::from_str::<RawFrame>(line) {
                Ok(f) => f,
                Err(e) => {
                    warn!(
                        "{}:{}: skipping malformed frame: {}",
                        self.origin.display(),
                        self.line_no,
                        e
                    );
                    return Ok(Some(RawFrame::empty()));
                }
            };

            let before = frame.hands.len();
            frame.hands.retain(|h| h.landmarks.len() == LANDMARK_COUNT);
            if frame.hands.len() != before {
                debug!(
                    "{}:{}: dropped {} hand(s) without {} landmarks",
                    self.origin.display(),
                    self.line_no,
                    before - frame.hands.len(),
                    LANDMARK_COUNT
                );
            }
            return Ok(Some(frame));
        }
    }

    fn describe(&self) -> String {
        format!("trace {}", self.origin.display())
    }
}
