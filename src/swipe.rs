// src/swipe.rs
use crate::config::SwipeConfig;
use crate::events::TrackDirection;
use crate::landmarks::*;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipePhase {
    Idle,
    Arming,
    Cooldown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwipeState {
    pub phase: SwipePhase,
    pub last_x: Option<f64>,
    pub last_y: Option<f64>,
    pub last_t: u64,
    pub velocity_ema: f64,
    pub accumulated_dx: f64,
    pub accumulated_dy: f64,
    pub armed_at: u64,
    pub cooldown_until: u64,
}

impl Default for SwipeState {
    fn default() -> Self {
        Self {
            phase: SwipePhase::Idle,
            last_x: None,
            last_y: None,
            last_t: 0,
            velocity_ema: 0.0,
            accumulated_dx: 0.0,
            accumulated_dy: 0.0,
            armed_at: 0,
            cooldown_until: 0,
        }
    }
}

impl SwipeState {
    fn remember(&mut self, x: f64, y: f64, now: u64) {
        self.last_x = Some(x);
        self.last_y = Some(y);
        self.last_t = now;
    }
}

/// Midpoint of the index and middle MCPs, in image coordinates.
pub fn swipe_anchor(landmarks: &[Landmark; LANDMARK_COUNT]) -> (f64, f64) {
    let a = landmarks[INDEX_MCP];
    let b = landmarks[MIDDLE_MCP];
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Fast horizontal flick of the right hand.
#[derive(Debug, Clone)]
pub struct SwipeDetector {
    config: SwipeConfig,
    state: SwipeState,
}

impl SwipeDetector {
    pub fn new(config: SwipeConfig) -> Self {
        Self {
            config,
            state: SwipeState::default(),
        }
    }

    pub fn state(&self) -> &SwipeState {
        &self.state
    }

    pub fn phase(&self) -> SwipePhase {
        self.state.phase
    }

    /// Landmark front end for [`SwipeDetector::step`].
    pub fn update(
        &mut self,
        landmarks: &[Landmark; LANDMARK_COUNT],
        fist: bool,
        pinching: bool,
        now: u64,
    ) -> Option<TrackDirection> {
        let (x, y) = swipe_anchor(landmarks);
        self.step(x, y, hand_scale(landmarks), fist, pinching, now)
    }

    /// Advance the state machine with one anchor position. No transitions
    /// happen while the hand is a fist or pinching.
    pub fn step(
        &mut self,
        x: f64,
        y: f64,
        scale: f64,
        fist: bool,
        pinching: bool,
        now: u64,
    ) -> Option<TrackDirection> {
        if fist || pinching {
            return None;
        }

        let cfg = &self.config;
        let st = &mut self.state;
        let (last_x, last_y) = match (st.last_x, st.last_y) {
            (Some(lx), Some(ly)) => (lx, ly),
            _ => {
                st.remember(x, y, now);
                st.velocity_ema = 0.0;
                return None;
            }
        };

        let scale = scale.max(SCALE_EPSILON);
        let dt = (now.saturating_sub(st.last_t) as f64 / 1000.0).max(1e-3);
        let dx = (x - last_x) / scale;
        let dy = (y - last_y) / scale;
        let vx = dx / dt;

        let a = cfg.ema_alpha;
        st.velocity_ema = if st.velocity_ema == 0.0 {
            vx
        } else {
            st.velocity_ema * (1.0 - a) + vx * a
        };

        let mut fired = None;
        match st.phase {
            SwipePhase::Cooldown => {
                // position is still tracked so leaving cooldown has no velocity spike
                if now > st.cooldown_until {
                    st.phase = SwipePhase::Idle;
                    debug!("swipe cooldown over");
                }
            }
            SwipePhase::Idle => {
                if st.velocity_ema.abs() > cfg.v_on {
                    st.phase = SwipePhase::Arming;
                    st.armed_at = now;
                    st.accumulated_dx = 0.0;
                    st.accumulated_dy = 0.0;
                    debug!("swipe arming at v={:.2}", st.velocity_ema);
                }
            }
            SwipePhase::Arming => {
                st.accumulated_dx += dx;
                st.accumulated_dy += dy;

                if st.velocity_ema.abs() <= cfg.v_on {
                    debug!("swipe aborted: speed lost");
                    st.phase = SwipePhase::Idle;
                } else if st.accumulated_dy.abs() > cfg.y_limit {
                    debug!("swipe aborted: vertical drift {:.2}", st.accumulated_dy);
                    st.phase = SwipePhase::Idle;
                } else if now.saturating_sub(st.armed_at) > cfg.arming_window_ms {
                    debug!("swipe aborted: arming window elapsed");
                    st.phase = SwipePhase::Idle;
                } else if st.accumulated_dx.abs() >= cfg.d_min {
                    let leftward = (st.accumulated_dx < 0.0) != cfg.flip_dir;
                    let direction = if leftward {
                        TrackDirection::Next
                    } else {
                        TrackDirection::Previous
                    };
                    info!(
                        "swipe {} -> {} track",
                        if leftward { "LEFT" } else { "RIGHT" },
                        direction.as_str()
                    );

                    st.phase = SwipePhase::Cooldown;
                    st.cooldown_until = now.saturating_add(cfg.cooldown_ms);
                    st.accumulated_dx = 0.0;
                    st.accumulated_dy = 0.0;
                    fired = Some(direction);
                }
            }
        }

        st.remember(x, y, now);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE: f64 = 0.2;

    fn detector() -> SwipeDetector {
        SwipeDetector::new(SwipeConfig::default())
    }

    /// Feed frames 10 ms apart moving `step_dx`/`step_dy` hand scales per frame.
    fn flick(
        det: &mut SwipeDetector,
        start: (f64, f64),
        t0: u64,
        frames: usize,
        step_dx: f64,
        step_dy: f64,
    ) -> Vec<(u64, TrackDirection)> {
        let mut out = Vec::new();
        for i in 0..frames {
            let x = start.0 + i as f64 * step_dx * SCALE;
            let y = start.1 + i as f64 * step_dy * SCALE;
            let t = t0 + 10 * i as u64;
            if let Some(d) = det.step(x, y, SCALE, false, false, t) {
                out.push((t, d));
            }
        }
        out
    }

    #[test]
    fn leftward_flick_fires_next_once() {
        let mut det = detector();
        let fired = flick(&mut det, (0.7, 0.5), 1_000, 6, -0.125, 0.025);
        assert_eq!(fired, vec![(1_050, TrackDirection::Next)]);
        assert_eq!(det.phase(), SwipePhase::Cooldown);
        assert_eq!(det.state().cooldown_until, 1_450);
    }

    #[test]
    fn rightward_flick_fires_previous() {
        let mut det = detector();
        let fired = flick(&mut det, (0.3, 0.5), 0, 6, 0.125, 0.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, TrackDirection::Previous);
    }

    #[test]
    fn flip_dir_swaps_direction() {
        let mut det = SwipeDetector::new(SwipeConfig {
            flip_dir: true,
            ..SwipeConfig::default()
        });
        let fired = flick(&mut det, (0.7, 0.5), 0, 6, -0.125, 0.0);
        assert_eq!(fired[0].1, TrackDirection::Previous);
    }

    #[test]
    fn cooldown_blocks_second_flick() {
        let mut det = detector();
        flick(&mut det, (0.7, 0.5), 0, 6, -0.125, 0.0);
        // starts 100 ms after the trigger, well inside the 400 ms cooldown
        let second = flick(&mut det, (0.7, 0.5), 150, 10, -0.125, 0.0);
        assert!(second.is_empty());
        assert_eq!(det.phase(), SwipePhase::Cooldown);
    }

    #[test]
    fn cooldown_expires_back_to_idle() {
        let mut det = detector();
        flick(&mut det, (0.7, 0.5), 0, 6, -0.125, 0.0);
        det.step(0.5, 0.5, SCALE, false, false, 600);
        assert_eq!(det.phase(), SwipePhase::Idle);
    }

    #[test]
    fn cooldown_deadline_saturates_near_clock_end() {
        let mut det = SwipeDetector::new(SwipeConfig {
            cooldown_ms: 60_000,
            ..SwipeConfig::default()
        });
        let fired = flick(&mut det, (0.7, 0.5), u64::MAX - 100, 6, -0.125, 0.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(det.state().cooldown_until, u64::MAX);
    }

    #[test]
    fn vertical_drift_aborts_arming() {
        let mut det = detector();
        let fired = flick(&mut det, (0.7, 0.5), 0, 8, -0.05, 0.4);
        assert!(fired.is_empty());
    }

    #[test]
    fn slow_drift_never_arms() {
        let mut det = detector();
        // 0.005 scales per 10 ms = 0.5 scales/s, below v_on
        let fired = flick(&mut det, (0.7, 0.5), 0, 100, -0.005, 0.0);
        assert!(fired.is_empty());
        assert_eq!(det.phase(), SwipePhase::Idle);
    }

    #[test]
    fn arming_window_timeout_aborts() {
        let mut det = detector();
        let mut fired = Vec::new();
        // 0.05 scales every 40 ms is 1.25 scales/s, just above v_on
        for i in 0..10u64 {
            let x = 0.7 - i as f64 * 0.1 * SCALE * 0.5;
            if let Some(d) = det.step(x, 0.5, SCALE, false, false, i * 40) {
                fired.push(d);
            }
            if i == 5 {
                assert_eq!(det.phase(), SwipePhase::Arming);
            }
            if i == 6 {
                assert_eq!(det.phase(), SwipePhase::Idle);
            }
        }
        // reaching d_min would take 8 frames, far past the 180 ms window
        assert!(fired.is_empty());
    }

    #[test]
    fn fist_or_pinch_freezes_state() {
        let mut det = detector();
        det.step(0.7, 0.5, SCALE, false, false, 0);
        let before = det.state().clone();
        assert_eq!(det.step(0.1, 0.5, SCALE, true, false, 10), None);
        assert_eq!(det.step(0.1, 0.5, SCALE, false, true, 20), None);
        assert_eq!(*det.state(), before);
    }
}
