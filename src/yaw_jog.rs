// src/yaw_jog.rs
use crate::config::YawJogConfig;
use crate::landmarks::*;
use crate::pose::Openness;
use std::f64::consts::PI;
use tracing::debug;

/// Wrap an angle difference into [-π, π].
pub fn wrap_pi(mut a: f64) -> f64 {
    while a > PI {
        a -= 2.0 * PI;
    }
    while a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Thumb tip relative to the middle MCP, the jog "needle".
pub fn jog_vector(landmarks: &[Landmark; LANDMARK_COUNT]) -> nalgebra::Vector2<f64> {
    landmarks[THUMB_TIP].xy() - landmarks[MIDDLE_MCP].xy()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct YawJogState {
    pub active: bool,
    pub last_theta: Option<f64>,
    pub last_t: u64,
    pub velocity_ema: f64,
    /// True while a jog is in progress; the release event fires on its falling edge.
    pub shaking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JogOutput {
    Rate(f64),
    Released,
}

/// Shaka-gated angular velocity to playback rate, right hand only.
#[derive(Debug, Clone)]
pub struct YawJogDetector {
    config: YawJogConfig,
    state: YawJogState,
}

impl YawJogDetector {
    pub fn new(config: YawJogConfig) -> Self {
        Self {
            config,
            state: YawJogState::default(),
        }
    }

    pub fn state(&self) -> &YawJogState {
        &self.state
    }

    pub fn is_shaking(&self) -> bool {
        self.state.shaking
    }

    pub fn update(
        &mut self,
        landmarks: &[Landmark; LANDMARK_COUNT],
        openness: &Openness,
        pinching: bool,
        now: u64,
    ) -> Option<JogOutput> {
        if pinching {
            return None;
        }
        let v = jog_vector(landmarks);
        let theta = v.y.atan2(v.x);
        let radius = v.norm() / hand_scale(landmarks);
        self.step(theta, radius, openness.is_shaka(), now)
    }

    /// One frame given the needle angle (rad) and its length in hand scales.
    pub fn step(&mut self, theta: f64, radius: f64, gate: bool, now: u64) -> Option<JogOutput> {
        let cfg = &self.config;
        let st = &mut self.state;

        if !gate {
            // re-anchor so reopening the gate does not read as a jump
            st.last_theta = Some(theta);
            st.last_t = now;
            st.velocity_ema = 0.0;
            st.active = false;
            if st.shaking {
                st.shaking = false;
                debug!("jog released");
                return Some(JogOutput::Released);
            }
            return None;
        }

        // a short needle turns tiny tip jitter into large angles
        if radius < cfg.min_radius {
            return None;
        }

        let last_theta = match st.last_theta {
            Some(t) => t,
            None => {
                st.last_theta = Some(theta);
                st.last_t = now;
                st.velocity_ema = 0.0;
                return None;
            }
        };

        let dt = (now.saturating_sub(st.last_t) as f64 / 1000.0).max(1e-3);
        let mut omega = wrap_pi(theta - last_theta) / dt;
        if cfg.flip_dir {
            omega = -omega;
        }

        let a = cfg.ema_alpha;
        st.velocity_ema = if st.velocity_ema == 0.0 {
            omega
        } else {
            st.velocity_ema * (1.0 - a) + omega * a
        };

        let rate = if st.velocity_ema.abs() < cfg.deadband_vel {
            0.0
        } else {
            (cfg.gain * st.velocity_ema).clamp(cfg.min_rate, cfg.max_rate)
        };

        st.active = true;
        st.shaking = true;
        st.last_theta = Some(theta);
        st.last_t = now;

        if rate != 0.0 {
            debug!("jog rate {:.2}x", rate);
            Some(JogOutput::Rate(rate))
        } else {
            None
        }
    }
}
