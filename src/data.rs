// src/data.rs
use crate::events::{ControlEvent, DeliveryError, EventSink, StampedEvent};
use crate::zone::{Zone, ZoneVolumes};
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use directories::UserDirs;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct EventRecord {
    at_ms: u64,
    kind: &'static str,
    state: Option<&'static str>,
    zone: Option<&'static str>,
    db: Option<f64>,
    direction: Option<&'static str>,
    rate: Option<f64>,
}

impl EventRecord {
    fn from_event(event: &StampedEvent) -> Self {
        let mut record = EventRecord {
            at_ms: event.at_ms,
            kind: event.event.kind(),
            state: None,
            zone: None,
            db: None,
            direction: None,
            rate: None,
        };
        match &event.event {
            ControlEvent::Pose { state } => record.state = Some(state.as_str()),
            ControlEvent::ZoneVolume { zone, db } => {
                record.zone = Some(zone.as_str());
                record.db = Some(*db);
            }
            ControlEvent::Track { direction } => record.direction = Some(direction.as_str()),
            ControlEvent::PlaybackRate { rate } => record.rate = Some(*rate),
            ControlEvent::GestureReleased => {}
        }
        record
    }
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session: String,
    pub total_events: usize,
    pub first_ms: Option<u64>,
    pub last_ms: Option<u64>,
    pub counts: BTreeMap<&'static str, usize>,
    /// Last level seen per zone; zones never dragged keep the starting level.
    pub zone_db: BTreeMap<&'static str, f64>,
}

/// `Documents/GestureMixer`, or `./output` when there is no user directory.
pub fn default_output_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|d| d.join("GestureMixer")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

/// Records every event of a run for export after the loop stops.
pub struct SessionLog {
    output_dir: PathBuf,
    session_name: String,
    events: Vec<StampedEvent>,
}

impl SessionLog {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name
            .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            events: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn events(&self) -> &[StampedEvent] {
        &self.events
    }

    pub fn record(&mut self, event: StampedEvent) {
        self.events.push(event);
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("events.csv");
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let file = File::create(&csv_path)
            .with_context(|| format!("creating {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);
        for event in &self.events {
            writer.serialize(EventRecord::from_event(event))?;
        }
        writer.flush()?;

        info!("wrote {} events to {}", self.events.len(), csv_path.display());
        Ok(csv_path)
    }

    /// Counts per event kind and the final level of every zone. `start`
    /// supplies the levels zones had before any drag.
    pub fn summary(&self, start: &ZoneVolumes) -> SessionSummary {
        let mut counts = BTreeMap::new();
        let mut zone_db: BTreeMap<&'static str, f64> =
            start.iter().map(|(z, db)| (z.as_str(), db)).collect();

        for event in &self.events {
            *counts.entry(event.event.kind()).or_insert(0) += 1;
            if let ControlEvent::ZoneVolume { zone, db } = &event.event {
                zone_db.insert(zone.as_str(), *db);
            }
        }

        SessionSummary {
            session: self.session_name.clone(),
            total_events: self.events.len(),
            first_ms: self.events.first().map(|e| e.at_ms),
            last_ms: self.events.last().map(|e| e.at_ms),
            counts,
            zone_db,
        }
    }

    pub fn export_summary(&self, start: &ZoneVolumes) -> Result<PathBuf> {
        let path = self.session_dir().join("summary.json");
        std::fs::create_dir_all(self.session_dir())
            .with_context(|| format!("creating {}", self.session_dir().display()))?;
        let json = serde_json::to_string_pretty(&self.summary(start))?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote summary to {}", path.display());
        Ok(path)
    }

    pub fn last_level(&self, zone: Zone) -> Option<f64> {
        self.events.iter().rev().find_map(|e| match e.event {
            ControlEvent::ZoneVolume { zone: z, db } if z == zone => Some(db),
            _ => None,
        })
    }
}

impl EventSink for SessionLog {
    fn deliver(&mut self, event: &StampedEvent) -> Result<(), DeliveryError> {
        self.record(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "session-log"
    }
}
