// src/runner.rs
use crate::events::{dispatch, EventSink};
use crate::source::LandmarkSource;
use crate::tracking::GestureTracker;
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const METRICS_WINDOW: usize = 30;

/// Turns raw clock readings into strictly increasing timestamps.
#[derive(Debug, Clone, Default)]
pub struct MonotonicStamp {
    last: Option<u64>,
}

impl MonotonicStamp {
    pub fn new() -> Self {
        Self::default()
    }

    /// `reading`, or one past the previous stamp if the clock stalled or went back.
    pub fn next(&mut self, reading: u64) -> u64 {
        let stamp = match self.last {
            Some(prev) if reading <= prev => prev + 1,
            _ => reading,
        };
        self.last = Some(stamp);
        stamp
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }
}

#[derive(Debug, Clone)]
pub struct LoopMetrics {
    pub avg_fps: f32,
    /// Seconds per tick, perception included.
    pub avg_processing_time: f32,
    pub frames: u64,
    pub frames_with_hands: u64,
    pub events: u64,
    pub source_errors: u64,
    tick_times: VecDeque<f32>,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self {
            avg_fps: 0.0,
            avg_processing_time: 0.0,
            frames: 0,
            frames_with_hands: 0,
            events: 0,
            source_errors: 0,
            tick_times: VecDeque::with_capacity(METRICS_WINDOW),
        }
    }

    pub fn record_tick(&mut self, elapsed: f32) {
        self.tick_times.push_front(elapsed);
        if self.tick_times.len() > METRICS_WINDOW {
            self.tick_times.pop_back();
        }
        self.avg_processing_time =
            self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
    }

    pub fn window_len(&self) -> usize {
        self.tick_times.len()
    }
}

impl Default for LoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Sleep to hold the tracker's target FPS. Off for offline replay.
    pub pace: bool,
    pub max_frames: Option<u64>,
}

/// Poll `source` until it runs dry, `stop` is set or the frame limit is hit.
///
/// Each tick: one `next_frame`, one tracker pass, then the tick's events go
/// to `sink`. A source error counts as a tick with no hands.
pub fn run_loop(
    source: &mut dyn LandmarkSource,
    tracker: &mut GestureTracker,
    sink: &mut dyn EventSink,
    options: &RunOptions,
    stop: &AtomicBool,
) -> Result<LoopMetrics> {
    let interval = Duration::from_secs_f64(tracker.config().frame_interval_ms() / 1000.0);
    let origin = Instant::now();
    let mut clock = MonotonicStamp::new();
    let mut metrics = LoopMetrics::new();
    let mut next_deadline = origin;

    info!("tracking from {}", source.describe());

    while !stop.load(Ordering::Relaxed) {
        if let Some(limit) = options.max_frames {
            if metrics.frames >= limit {
                debug!("frame limit {} reached", limit);
                break;
            }
        }

        if options.pace {
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            }
            next_deadline += interval;
        }

        let tick_start = Instant::now();
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("perception failed: {:#}", e);
                metrics.source_errors += 1;
                Default::default()
            }
        };

        let reading = frame
            .timestamp_ms
            .unwrap_or_else(|| origin.elapsed().as_millis() as u64);
        let now = clock.next(reading);

        let events = tracker.process_frame(now, &frame.hands);
        dispatch(sink, &events);
        sink.tick(now);

        metrics.frames += 1;
        if !frame.hands.is_empty() {
            metrics.frames_with_hands += 1;
        }
        metrics.events += events.len() as u64;
        metrics.record_tick(tick_start.elapsed().as_secs_f32());
    }

    info!(
        "stopped after {} frames ({} with hands, {} events), {:.1} fps avg",
        metrics.frames, metrics.frames_with_hands, metrics.events, metrics.avg_fps
    );
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GestureConfig;
    use crate::events::Collector;
    use crate::landmarks::Handedness;
    use crate::source::RawFrame;
    use crate::synthetic::HandBuilder;
    use anyhow::anyhow;

    struct Scripted(VecDeque<Result<Option<RawFrame>>>);

    impl LandmarkSource for Scripted {
        fn next_frame(&mut self) -> Result<Option<RawFrame>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    fn frame(t: Option<u64>, hands: Vec<crate::source::RawHand>) -> Result<Option<RawFrame>> {
        Ok(Some(RawFrame { timestamp_ms: t, hands }))
    }

    fn tracker() -> GestureTracker {
        GestureTracker::new(GestureConfig {
            smoothing_alpha: 1.0,
            flip_handedness: false,
            ..GestureConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn stamps_never_repeat_or_go_back() {
        let mut clock = MonotonicStamp::new();
        let out: Vec<u64> = [10, 10, 5, 30, 29, 31].iter().map(|&r| clock.next(r)).collect();
        assert_eq!(out, vec![10, 11, 12, 30, 31, 32]);
        assert_eq!(clock.last(), Some(32));
    }

    #[test]
    fn metrics_window_is_bounded() {
        let mut m = LoopMetrics::new();
        for _ in 0..50 {
            m.record_tick(0.01);
        }
        m.record_tick(0.04);
        assert_eq!(m.window_len(), METRICS_WINDOW);
        assert!((m.avg_processing_time - 0.011).abs() < 1e-4);
    }

    #[test]
    fn source_error_is_an_empty_tick() {
        let fist = HandBuilder::new(0.7, 0.6).fist().raw(Handedness::Right);
        let mut src = Scripted(VecDeque::from(vec![
            Err(anyhow!("camera hiccup")),
            frame(Some(40), vec![fist]),
        ]));
        let mut t = tracker();
        let mut sink = Collector::default();
        let stop = AtomicBool::new(false);
        let m = run_loop(&mut src, &mut t, &mut sink, &RunOptions::default(), &stop).unwrap();

        assert_eq!(m.frames, 2);
        assert_eq!(m.source_errors, 1);
        assert_eq!(m.frames_with_hands, 1);
        assert_eq!(m.events, 1);
        assert_eq!(sink.events.len(), 1);
        assert!(sink.events[0].at_ms >= 40);
    }

    #[test]
    fn stale_trace_timestamps_are_bumped() {
        let open = HandBuilder::new(0.7, 0.6).raw(Handedness::Right);
        let fist = HandBuilder::new(0.7, 0.6).fist().raw(Handedness::Right);
        let mut src = Scripted(VecDeque::from(vec![
            frame(Some(100), vec![open]),
            frame(Some(100), vec![fist]),
        ]));
        let mut t = tracker();
        let mut sink = Collector::default();
        let stop = AtomicBool::new(false);
        run_loop(&mut src, &mut t, &mut sink, &RunOptions::default(), &stop).unwrap();
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].at_ms, 101);
    }

    #[test]
    fn stop_flag_and_frame_limit_end_the_loop() {
        let frames = (0..10).map(|i| frame(Some(i * 33), vec![])).collect();
        let mut src = Scripted(frames);
        let mut t = tracker();
        let mut sink = Collector::default();
        let limited = RunOptions { pace: false, max_frames: Some(4) };
        let m = run_loop(&mut src, &mut t, &mut sink, &limited, &AtomicBool::new(false)).unwrap();
        assert_eq!(m.frames, 4);

        let stop = AtomicBool::new(true);
        let m = run_loop(&mut src, &mut t, &mut sink, &RunOptions::default(), &stop).unwrap();
        assert_eq!(m.frames, 0);
    }
}
