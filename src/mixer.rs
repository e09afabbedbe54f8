// src/mixer.rs
//
// Player-side model of what the control events do: stem levels, transport,
// playlist position and the signed playback rate with its glide back to 1x.
// No audio is produced; the state is what a real engine would be told.

use crate::events::{ControlEvent, DeliveryError, EventSink, StampedEvent, TrackDirection};
use crate::pose::PoseLabel;
use crate::zone::Zone;
use tracing::{debug, info};

pub const MIN_ABS_RATE: f64 = 0.001;
pub const MAX_ABS_RATE: f64 = 4.0;
pub const GLIDE_MS: f64 = 900.0;
/// A jog signal weaker than this does not interrupt a glide.
pub const RESUME_THRESHOLD: f64 = 0.2;
pub const RELEASE_IGNORE_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stem {
    Beat,
    Vocals,
    Chords,
}

impl Stem {
    pub const ALL: [Stem; 3] = [Stem::Beat, Stem::Vocals, Stem::Chords];

    pub fn for_zone(zone: Zone) -> Stem {
        match zone {
            Zone::Left => Stem::Beat,
            Zone::Center => Stem::Vocals,
            Zone::Right => Stem::Chords,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stem::Beat => "beat",
            Stem::Vocals => "vocals",
            Stem::Chords => "chords",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Playing,
    Paused,
}

fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

/// Sign is kept, magnitude is clamped to what the engine accepts.
fn clamp_signed(rate: f64) -> f64 {
    let sign = if rate < 0.0 { -1.0 } else { 1.0 };
    sign * rate.abs().clamp(MIN_ABS_RATE, MAX_ABS_RATE)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GlideLeg {
    from: f64,
    to: f64,
    start: u64,
    duration: f64,
}

impl GlideLeg {
    fn value_at(&self, now: u64) -> (f64, bool) {
        if now >= self.end() {
            return (self.to, true);
        }
        let t = (now.saturating_sub(self.start) as f64 / self.duration).min(1.0);
        (self.from + (self.to - self.from) * ease_out_cubic(t), false)
    }

    fn end(&self) -> u64 {
        self.start + self.duration.round() as u64
    }
}

/// Either one leg, or a slow-down to near zero followed by a speed-up on the
/// other sign so direction never flips at speed.
#[derive(Debug, Clone, PartialEq)]
struct Glide {
    legs: Vec<GlideLeg>,
}

impl Glide {
    fn new(from: f64, to: f64, start: u64) -> Self {
        let same_sign = (from < 0.0) == (to < 0.0);
        if same_sign {
            return Glide {
                legs: vec![GlideLeg { from, to, start, duration: GLIDE_MS }],
            };
        }
        let first_ms = (GLIDE_MS * 0.35).max(120.0);
        let from_sign = if from < 0.0 { -1.0 } else { 1.0 };
        let first = GlideLeg {
            from,
            to: from_sign * MIN_ABS_RATE,
            start,
            duration: first_ms,
        };
        let second = GlideLeg {
            from: -from_sign * MIN_ABS_RATE,
            to,
            start: first.end(),
            duration: GLIDE_MS - first_ms,
        };
        Glide { legs: vec![first, second] }
    }

    /// Rate at `now` and whether the glide is over.
    fn sample(&self, now: u64) -> (f64, bool) {
        for (i, leg) in self.legs.iter().enumerate() {
            let last = i + 1 == self.legs.len();
            if now < leg.end() || last {
                let (v, done) = leg.value_at(now);
                return (v, done && last);
            }
        }
        (1.0, true)
    }
}

#[derive(Debug, Clone)]
pub struct MixerModel {
    playlist: Vec<String>,
    track: usize,
    transport: Transport,
    stem_db: [f64; 3],
    signed_rate: f64,
    glide: Option<Glide>,
    ignore_weak_until: u64,
    position_ms: f64,
    last_tick: Option<u64>,
}

impl MixerModel {
    pub fn new(playlist: Vec<String>) -> Self {
        Self {
            playlist,
            track: 0,
            transport: Transport::Playing,
            stem_db: [0.0; 3],
            signed_rate: 1.0,
            glide: None,
            ignore_weak_until: 0,
            position_ms: 0.0,
            last_tick: None,
        }
    }

    pub fn track_index(&self) -> usize {
        self.track
    }

    pub fn current_track(&self) -> Option<&str> {
        self.playlist.get(self.track).map(String::as_str)
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn stem_db(&self, stem: Stem) -> f64 {
        self.stem_db[stem as usize]
    }

    pub fn signed_rate(&self) -> f64 {
        self.signed_rate
    }

    pub fn is_gliding(&self) -> bool {
        self.glide.is_some()
    }

    pub fn position_ms(&self) -> f64 {
        self.position_ms
    }

    fn apply_rate(&mut self, rate: f64) {
        self.signed_rate = clamp_signed(rate);
    }

    fn step_track(&mut self, direction: TrackDirection) {
        let len = self.playlist.len().max(1);
        self.track = match direction {
            TrackDirection::Next => (self.track + 1) % len,
            TrackDirection::Previous => (self.track + len - 1) % len,
        };
        // stem levels carry over to the new track
        self.position_ms = 0.0;
        self.transport = Transport::Playing;
        info!("now playing {}", self.current_track().unwrap_or("-"));
    }

    fn on_rate(&mut self, rate: f64, now: u64) {
        let weak = rate.abs() < RESUME_THRESHOLD;
        if weak && (now < self.ignore_weak_until || self.glide.is_some()) {
            return;
        }
        self.glide = None;
        self.apply_rate(rate);
    }

    fn on_release(&mut self, now: u64) {
        self.ignore_weak_until = now + RELEASE_IGNORE_MS;
        self.glide = Some(Glide::new(self.signed_rate, 1.0, now));
        debug!("gliding from {:.3}x back to 1x", self.signed_rate);
    }

    pub fn apply(&mut self, event: &StampedEvent) {
        let now = event.at_ms;
        match &event.event {
            ControlEvent::Pose { state } => {
                self.transport = match state {
                    PoseLabel::Fist => Transport::Paused,
                    PoseLabel::Open => Transport::Playing,
                };
            }
            ControlEvent::ZoneVolume { zone, db } => {
                let stem = Stem::for_zone(*zone);
                self.stem_db[stem as usize] = *db;
                debug!("{} stem at {:.1} dB", stem.as_str(), db);
            }
            ControlEvent::Track { direction } => self.step_track(*direction),
            ControlEvent::PlaybackRate { rate } => self.on_rate(*rate, now),
            ControlEvent::GestureReleased => self.on_release(now),
        }
    }

    /// Advance the glide and the transport position to `now`.
    pub fn advance(&mut self, now: u64) {
        if let Some((rate, done)) = self.glide.as_ref().map(|g| g.sample(now)) {
            self.apply_rate(rate);
            if done {
                self.glide = None;
            }
        }

        if let Some(last) = self.last_tick {
            if self.transport == Transport::Playing {
                let dt = now.saturating_sub(last) as f64;
                self.position_ms = (self.position_ms + dt * self.signed_rate).max(0.0);
            }
        }
        self.last_tick = Some(now);
    }
}

impl EventSink for MixerModel {
    fn deliver(&mut self, event: &StampedEvent) -> Result<(), DeliveryError> {
        self.apply(event);
        Ok(())
    }

    fn name(&self) -> &str {
        "mixer"
    }

    fn tick(&mut self, now: u64) {
        self.advance(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer() -> MixerModel {
        MixerModel::new(vec!["a".into(), "b".into(), "c".into()])
    }

    fn send(m: &mut MixerModel, at_ms: u64, event: ControlEvent) {
        m.deliver(&StampedEvent { at_ms, event }).unwrap();
    }

    #[test]
    fn zones_route_to_stems() {
        let mut m = mixer();
        send(&mut m, 0, ControlEvent::ZoneVolume { zone: Zone::Left, db: 3.0 });
        send(&mut m, 0, ControlEvent::ZoneVolume { zone: Zone::Center, db: -6.0 });
        send(&mut m, 0, ControlEvent::ZoneVolume { zone: Zone::Right, db: -12.0 });
        assert_eq!(m.stem_db(Stem::Beat), 3.0);
        assert_eq!(m.stem_db(Stem::Vocals), -6.0);
        assert_eq!(m.stem_db(Stem::Chords), -12.0);
    }

    #[test]
    fn pose_drives_transport() {
        let mut m = mixer();
        send(&mut m, 0, ControlEvent::Pose { state: PoseLabel::Fist });
        assert_eq!(m.transport(), Transport::Paused);
        m.advance(0);
        m.advance(500);
        assert_eq!(m.position_ms(), 0.0);
        send(&mut m, 500, ControlEvent::Pose { state: PoseLabel::Open });
        m.advance(500);
        m.advance(600);
        assert_eq!(m.transport(), Transport::Playing);
        assert!((m.position_ms() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn track_wraps_and_keeps_levels() {
        let mut m = mixer();
        send(&mut m, 0, ControlEvent::ZoneVolume { zone: Zone::Left, db: 4.0 });
        m.advance(0);
        m.advance(1_000);
        send(&mut m, 1_000, ControlEvent::Track { direction: TrackDirection::Previous });
        assert_eq!(m.current_track(), Some("c"));
        assert_eq!(m.position_ms(), 0.0);
        assert_eq!(m.stem_db(Stem::Beat), 4.0);
        send(&mut m, 1_100, ControlEvent::Track { direction: TrackDirection::Next });
        assert_eq!(m.track_index(), 0);
    }

    #[test]
    fn rate_is_clamped_and_keeps_sign() {
        let mut m = mixer();
        send(&mut m, 0, ControlEvent::PlaybackRate { rate: 9.0 });
        assert_eq!(m.signed_rate(), MAX_ABS_RATE);
        send(&mut m, 10, ControlEvent::PlaybackRate { rate: -0.0001 });
        assert_eq!(m.signed_rate(), -MIN_ABS_RATE);
    }

    #[test]
    fn release_glides_back_with_ease_out() {
        let mut m = mixer();
        send(&mut m, 0, ControlEvent::PlaybackRate { rate: 2.0 });
        send(&mut m, 100, ControlEvent::GestureReleased);
        assert!(m.is_gliding());
        m.advance(550);
        // halfway in time, 87.5 % of the way in value
        assert!((m.signed_rate() - 1.125).abs() < 1e-9);
        m.advance(1_000);
        assert_eq!(m.signed_rate(), 1.0);
        assert!(!m.is_gliding());
    }

    #[test]
    fn reverse_glide_passes_through_near_zero() {
        let mut m = mixer();
        send(&mut m, 0, ControlEvent::PlaybackRate { rate: -2.0 });
        send(&mut m, 100, ControlEvent::GestureReleased);
        m.advance(257);
        assert!(m.signed_rate() < 0.0);
        // first leg lasts 315 ms
        m.advance(415);
        assert_eq!(m.signed_rate(), MIN_ABS_RATE);
        m.advance(700);
        assert!(m.signed_rate() > MIN_ABS_RATE && m.signed_rate() < 1.0);
        m.advance(1_000);
        assert_eq!(m.signed_rate(), 1.0);
        assert!(!m.is_gliding());
    }

    #[test]
    fn weak_signals_do_not_interrupt_glide() {
        let mut m = mixer();
        send(&mut m, 0, ControlEvent::PlaybackRate { rate: 2.0 });
        send(&mut m, 100, ControlEvent::GestureReleased);
        send(&mut m, 200, ControlEvent::PlaybackRate { rate: 0.1 });
        assert!(m.is_gliding());
        send(&mut m, 220, ControlEvent::PlaybackRate { rate: -0.5 });
        assert!(!m.is_gliding());
        assert_eq!(m.signed_rate(), -0.5);

        // after the glide and the ignore window, weak signals apply
        send(&mut m, 2_000, ControlEvent::PlaybackRate { rate: 0.1 });
        assert_eq!(m.signed_rate(), 0.1);
    }
}
