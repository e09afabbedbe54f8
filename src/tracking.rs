// src/tracking.rs
use crate::config::{ConfigError, GestureConfig};
use crate::events::{ControlEvent, StampedEvent};
use crate::landmarks::{Handedness, PerHand};
use crate::pinch::PinchController;
use crate::pose::{Openness, PoseLabel, PoseState};
use crate::smoothing::FrameNormalizer;
use crate::source::RawHand;
use crate::swipe::SwipeDetector;
use crate::yaw_jog::{JogOutput, YawJogDetector};
use crate::zone::ZoneVolumes;
use tracing::{debug, info};

/// The whole recognition pipeline for one camera. Owns every piece of
/// detector state; callers only see the events a tick returns.
pub struct GestureTracker {
    config: GestureConfig,
    normalizer: FrameNormalizer,
    poses: PerHand<PoseState>,
    pinch: PinchController,
    volumes: ZoneVolumes,
    swipe: SwipeDetector,
    yaw_jog: YawJogDetector,
    frames: u64,
}

impl GestureTracker {
    pub fn new(config: GestureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            normalizer: FrameNormalizer::new(config.smoothing_alpha, config.flip_handedness),
            poses: PerHand::default(),
            pinch: PinchController::new(
                config.pinch.clone(),
                config.volume.clone(),
                config.zone_bands,
            ),
            volumes: ZoneVolumes::new(&config.volume),
            swipe: SwipeDetector::new(config.swipe.clone()),
            yaw_jog: YawJogDetector::new(config.yaw_jog.clone()),
            frames: 0,
            config,
        })
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn volumes(&self) -> &ZoneVolumes {
        &self.volumes
    }

    pub fn pose(&self, hand: Handedness) -> &PoseState {
        &self.poses[hand]
    }

    pub fn pinch(&self) -> &PinchController {
        &self.pinch
    }

    pub fn swipe(&self) -> &SwipeDetector {
        &self.swipe
    }

    pub fn yaw_jog(&self) -> &YawJogDetector {
        &self.yaw_jog
    }

    pub fn normalizer(&self) -> &FrameNormalizer {
        &self.normalizer
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Run one tick. `now` must be strictly greater than the previous call's.
    ///
    /// Hands missing from `hands` keep their state untouched. Events are
    /// returned in the order they were produced, after every detector has
    /// seen the frame.
    pub fn process_frame(&mut self, now: u64, hands: &[RawHand]) -> Vec<StampedEvent> {
        self.frames += 1;
        let mut events = Vec::new();
        let mut seen = PerHand::new(false, false);

        for raw in hands {
            let handedness = self.normalizer.correct_handedness(raw.handedness);
            if seen[handedness] {
                debug!("dropping second {} hand in frame", handedness.as_str());
                continue;
            }
            let landmarks = match raw.to_landmarks() {
                Some(l) => l,
                None => {
                    debug!("dropping hand with {} landmarks", raw.landmarks.len());
                    continue;
                }
            };
            seen[handedness] = true;

            let sample = self.normalizer.observe(raw.handedness, raw.score, &landmarks);
            let hand = sample.handedness;
            let openness = Openness::measure(&sample.landmarks, &self.config.pose);

            if let Some(label) = self.poses[hand].update(openness.open_count(), now) {
                if hand == Handedness::Right {
                    match label {
                        PoseLabel::Fist => info!("FIST -> Pause"),
                        PoseLabel::Open => info!("OPEN -> Play"),
                    }
                    events.push(stamp(now, ControlEvent::Pose { state: label }));
                } else {
                    debug!("{} pose {}", hand.as_str(), label.as_str());
                }
            }

            if let Some((zone, db)) =
                self.pinch
                    .update(&sample, &openness, &self.poses[hand], now, &mut self.volumes)
            {
                events.push(stamp(now, ControlEvent::ZoneVolume { zone, db }));
            }

            if hand != Handedness::Right {
                continue;
            }

            let pinching = self.pinch.is_active(Handedness::Right);
            let fist = self.poses[Handedness::Right].is_fist();

            if let Some(direction) = self.swipe.update(&sample.landmarks, fist, pinching, now) {
                events.push(stamp(now, ControlEvent::Track { direction }));
            }

            match self.yaw_jog.update(&sample.landmarks, &openness, pinching, now) {
                Some(JogOutput::Rate(rate)) => {
                    events.push(stamp(now, ControlEvent::PlaybackRate { rate }))
                }
                Some(JogOutput::Released) => events.push(stamp(now, ControlEvent::GestureReleased)),
                None => {}
            }
        }

        events
    }
}

fn stamp(at_ms: u64, event: ControlEvent) -> StampedEvent {
    StampedEvent { at_ms, event }
}
