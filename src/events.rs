// src/events.rs
//
// Outbound side of the pipeline. Sinks are send-only; a failing consumer is
// logged and skipped, it never reaches back into detector state.

use crate::pose::PoseLabel;
use crate::zone::Zone;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackDirection {
    Next,
    Previous,
}

impl TrackDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackDirection::Next => "next",
            TrackDirection::Previous => "previous",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    /// Right-hand pose changed; FIST pauses, OPEN plays.
    Pose { state: PoseLabel },
    ZoneVolume { zone: Zone, db: f64 },
    Track { direction: TrackDirection },
    /// Signed playback rate from the jog gesture.
    PlaybackRate { rate: f64 },
    /// The jog gesture ended.
    GestureReleased,
}

impl ControlEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlEvent::Pose { .. } => "pose",
            ControlEvent::ZoneVolume { .. } => "zone_volume",
            ControlEvent::Track { .. } => "track",
            ControlEvent::PlaybackRate { .. } => "playback_rate",
            ControlEvent::GestureReleased => "gesture_released",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: ControlEvent,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("event consumer disconnected")]
    Disconnected,
    #[error("event rejected: {0}")]
    Rejected(String),
}

/// Anything that accepts control events.
pub trait EventSink {
    fn deliver(&mut self, event: &StampedEvent) -> Result<(), DeliveryError>;

    fn name(&self) -> &str {
        "sink"
    }

    /// Called once per loop tick after the tick's events, for consumers that
    /// animate between events.
    fn tick(&mut self, _now: u64) {}
}

/// Deliver to one sink, logging a failure instead of passing it on.
/// Returns whether the sink took the event.
pub fn deliver_logged<S: EventSink + ?Sized>(sink: &mut S, event: &StampedEvent) -> bool {
    match sink.deliver(event) {
        Ok(()) => true,
        Err(e) => {
            warn!("{} dropped {} event: {}", sink.name(), event.event.kind(), e);
            false
        }
    }
}

/// Deliver a batch, logging and dropping failures.
pub fn dispatch(sink: &mut dyn EventSink, events: &[StampedEvent]) -> usize {
    events.iter().filter(|e| deliver_logged(&mut *sink, e)).count()
}

/// Forwards to another thread over `mpsc`.
pub struct ChannelSink {
    tx: Sender<StampedEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<StampedEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn deliver(&mut self, event: &StampedEvent) -> Result<(), DeliveryError> {
        self.tx
            .send(event.clone())
            .map_err(|_| DeliveryError::Disconnected)
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Writes each event to the log, the way a console-only consumer would.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver(&mut self, event: &StampedEvent) -> Result<(), DeliveryError> {
        match &event.event {
            ControlEvent::Pose { state: PoseLabel::Fist } => info!("[{}] Pause", event.at_ms),
            ControlEvent::Pose { state: PoseLabel::Open } => info!("[{}] Play", event.at_ms),
            ControlEvent::ZoneVolume { zone, db } => {
                info!("[{}] {} -> {:.1} dB", event.at_ms, zone.as_str(), db)
            }
            ControlEvent::Track { direction } => {
                info!("[{}] {} track", event.at_ms, direction.as_str())
            }
            ControlEvent::PlaybackRate { rate } => info!("[{}] jog rate {:.2}x", event.at_ms, rate),
            ControlEvent::GestureReleased => info!("[{}] jog released", event.at_ms),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Sends every event to each inner sink; one failing sink does not stop the rest.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanOut {
    fn deliver(&mut self, event: &StampedEvent) -> Result<(), DeliveryError> {
        for sink in self.sinks.iter_mut() {
            deliver_logged(sink.as_mut(), event);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "fan-out"
    }

    fn tick(&mut self, now: u64) {
        for sink in self.sinks.iter_mut() {
            sink.tick(now);
        }
    }
}

/// Keeps every delivered event in memory.
#[derive(Debug, Default)]
pub struct Collector {
    pub events: Vec<StampedEvent>,
}

impl EventSink for Collector {
    fn deliver(&mut self, event: &StampedEvent) -> Result<(), DeliveryError> {
        self.events.push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "collector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn stamped(at_ms: u64, event: ControlEvent) -> StampedEvent {
        StampedEvent { at_ms, event }
    }

    struct Broken;

    impl EventSink for Broken {
        fn deliver(&mut self, _event: &StampedEvent) -> Result<(), DeliveryError> {
            Err(DeliveryError::Rejected("window closed".into()))
        }
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(stamped(
            42,
            ControlEvent::ZoneVolume { zone: Zone::Left, db: -3.5 },
        ))
        .unwrap();
        assert_eq!(json["type"], "zone_volume");
        assert_eq!(json["zone"], "Left");
        assert_eq!(json["db"], -3.5);
        assert_eq!(json["at_ms"], 42);

        let pose = serde_json::to_value(ControlEvent::Pose { state: PoseLabel::Fist }).unwrap();
        assert_eq!(pose["state"], "FIST");
        let track =
            serde_json::to_value(ControlEvent::Track { direction: TrackDirection::Next }).unwrap();
        assert_eq!(track["direction"], "next");
    }

    #[test]
    fn disconnected_channel_is_swallowed() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        let events = vec![stamped(1, ControlEvent::GestureReleased)];
        assert_eq!(dispatch(&mut sink, &events), 0);
    }

    #[test]
    fn channel_delivers_in_order() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ChannelSink::new(tx);
        let events = vec![
            stamped(1, ControlEvent::Pose { state: PoseLabel::Open }),
            stamped(2, ControlEvent::PlaybackRate { rate: 0.5 }),
        ];
        assert_eq!(dispatch(&mut sink, &events), 2);
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got, events);
    }

    #[test]
    fn fan_out_skips_failing_sink() {
        let (tx, rx) = mpsc::channel();
        let mut fan = FanOut::new()
            .with(Box::new(Broken))
            .with(Box::new(ChannelSink::new(tx)));
        assert_eq!(fan.len(), 2);
        let events = vec![stamped(5, ControlEvent::Track { direction: TrackDirection::Previous })];
        assert_eq!(dispatch(&mut fan, &events), 1);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn failing_sink_does_not_starve_the_next() {
        let mut broken = Broken;
        let mut kept = Collector::default();
        let event = stamped(7, ControlEvent::PlaybackRate { rate: -1.0 });
        assert!(!deliver_logged(&mut broken, &event));
        assert!(deliver_logged(&mut kept, &event));
        assert_eq!(kept.events, vec![event]);
    }
}
