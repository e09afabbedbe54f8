// src/config.rs
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Every threshold the detectors use. Missing keys in a JSON file fall back
/// to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// EMA weight of the newest landmark frame (1.0 disables smoothing).
    pub smoothing_alpha: f64,
    /// Swap Left/Right from the detector; a mirrored selfie camera needs this.
    pub flip_handedness: bool,
    pub target_fps: f64,
    /// Two x boundaries splitting [0,1] into Left/Center/Right.
    pub zone_bands: [f64; 2],
    pub pose: PoseConfig,
    pub pinch: PinchConfig,
    pub volume: VolumeConfig,
    pub swipe: SwipeConfig,
    pub yaw_jog: YawJogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub dist_open: f64,
    pub dist_closed: f64,
    /// Degrees. A straight finger reads close to 180.
    pub angle_open: f64,
    pub angle_closed: f64,
    pub w_dist: f64,
    pub w_ang: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinchConfig {
    pub on: f64,
    pub off: f64,
    /// Tip distance (in hand scales) that maps to a pinch value of 0.
    pub reference_factor: f64,
    /// Right hand ignores pinches for this long after opening.
    pub open_cooldown_ms: u64,
    /// An active pinch releases once open fingers drop to this count or below.
    pub release_open_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub min_db: f64,
    pub max_db: f64,
    /// dB change for a drag of one hand scale.
    pub db_per_unit: f64,
    pub deadband: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwipeConfig {
    pub ema_alpha: f64,
    /// Hand scales per second.
    pub v_on: f64,
    pub d_min: f64,
    pub y_limit: f64,
    pub arming_window_ms: u64,
    pub cooldown_ms: u64,
    pub flip_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YawJogConfig {
    pub ema_alpha: f64,
    /// rad/s
    pub deadband_vel: f64,
    pub gain: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub min_radius: f64,
    pub flip_dir: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.35,
            flip_handedness: true,
            target_fps: 30.0,
            zone_bands: [0.33, 0.66],
            pose: PoseConfig::default(),
            pinch: PinchConfig::default(),
            volume: VolumeConfig::default(),
            swipe: SwipeConfig::default(),
            yaw_jog: YawJogConfig::default(),
        }
    }
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            dist_open: 0.48,
            dist_closed: 0.28,
            angle_open: 160.0,
            angle_closed: 80.0,
            w_dist: 0.7,
            w_ang: 0.3,
        }
    }
}

impl Default for PinchConfig {
    fn default() -> Self {
        Self {
            on: 0.5,
            off: 0.1,
            reference_factor: 0.6,
            open_cooldown_ms: 1000,
            release_open_count: 2,
        }
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            min_db: -50.0,
            max_db: 10.0,
            db_per_unit: 20.0,
            deadband: 0.02,
        }
    }
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.35,
            v_on: 1.0,
            d_min: 0.4,
            y_limit: 0.75,
            arming_window_ms: 180,
            cooldown_ms: 400,
            flip_dir: false,
        }
    }
}

impl Default for YawJogConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.45,
            deadband_vel: 0.15,
            gain: 1.0,
            min_rate: -2.0,
            max_rate: 2.0,
            min_radius: 0.12,
            flip_dir: false,
        }
    }
}

/// Longest window or cooldown a detector accepts.
pub const MAX_WINDOW_MS: u64 = 60_000;
/// Accepted pacing range for `target_fps`.
pub const FPS_RANGE: std::ops::RangeInclusive<f64> = 1.0..=240.0;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} is not a finite number")))
    }
}

fn unit_open_closed(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} must be in (0, 1]")))
    }
}

fn unit_closed(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} must be in [0, 1]")))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} must be positive")))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} must not be negative")))
    }
}

fn window_ms(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value <= MAX_WINDOW_MS {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} ms exceeds {MAX_WINDOW_MS} ms")))
    }
}

fn ordered(field: &'static str, lo: f64, hi: f64) -> Result<(), ConfigError> {
    finite(field, lo)?;
    finite(field, hi)?;
    if lo < hi {
        Ok(())
    } else {
        Err(invalid(field, format!("lower bound {lo} must be below upper bound {hi}")))
    }
}

impl GestureConfig {
    /// Read a JSON file and validate it. Range errors surface here, not per frame.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GestureConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_open_closed("smoothing_alpha", self.smoothing_alpha)?;
        finite("target_fps", self.target_fps)?;
        if !FPS_RANGE.contains(&self.target_fps) {
            return Err(invalid(
                "target_fps",
                format!(
                    "{} must be in [{}, {}]",
                    self.target_fps,
                    FPS_RANGE.start(),
                    FPS_RANGE.end()
                ),
            ));
        }

        let [b1, b2] = self.zone_bands;
        ordered("zone_bands", b1, b2)?;
        if b1 <= 0.0 || b2 >= 1.0 {
            return Err(invalid("zone_bands", "bands must satisfy 0 < b1 < b2 < 1"));
        }

        let pose = &self.pose;
        ordered("pose.dist_closed", pose.dist_closed, pose.dist_open)?;
        ordered("pose.angle_closed", pose.angle_closed, pose.angle_open)?;
        non_negative("pose.w_dist", pose.w_dist)?;
        non_negative("pose.w_ang", pose.w_ang)?;
        if (pose.w_dist + pose.w_ang - 1.0).abs() > 1e-6 {
            return Err(invalid(
                "pose.w_dist",
                format!("weights must sum to 1, got {}", pose.w_dist + pose.w_ang),
            ));
        }

        let pinch = &self.pinch;
        unit_closed("pinch.on", pinch.on)?;
        unit_closed("pinch.off", pinch.off)?;
        ordered("pinch.off", pinch.off, pinch.on)?;
        window_ms("pinch.open_cooldown_ms", pinch.open_cooldown_ms)?;
        positive("pinch.reference_factor", pinch.reference_factor)?;
        if pinch.release_open_count >= 5 {
            return Err(invalid(
                "pinch.release_open_count",
                "must be below 5 or every pinch releases immediately",
            ));
        }

        let volume = &self.volume;
        ordered("volume.min_db", volume.min_db, volume.max_db)?;
        finite("volume.db_per_unit", volume.db_per_unit)?;
        non_negative("volume.deadband", volume.deadband)?;

        let swipe = &self.swipe;
        unit_open_closed("swipe.ema_alpha", swipe.ema_alpha)?;
        positive("swipe.v_on", swipe.v_on)?;
        positive("swipe.d_min", swipe.d_min)?;
        positive("swipe.y_limit", swipe.y_limit)?;
        if swipe.arming_window_ms == 0 {
            return Err(invalid("swipe.arming_window_ms", "must be positive"));
        }
        window_ms("swipe.arming_window_ms", swipe.arming_window_ms)?;
        window_ms("swipe.cooldown_ms", swipe.cooldown_ms)?;

        let jog = &self.yaw_jog;
        unit_open_closed("yaw_jog.ema_alpha", jog.ema_alpha)?;
        non_negative("yaw_jog.deadband_vel", jog.deadband_vel)?;
        finite("yaw_jog.gain", jog.gain)?;
        ordered("yaw_jog.min_rate", jog.min_rate, jog.max_rate)?;
        non_negative("yaw_jog.min_radius", jog.min_radius)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        GestureConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let json = r#"{ "flip_handedness": false, "pinch": { "on": 0.6 } }"#;
        let config: GestureConfig = serde_json::from_str(json).unwrap();
        assert!(!config.flip_handedness);
        assert_eq!(config.pinch.on, 0.6);
        assert_eq!(config.pinch.off, 0.1);
        assert_eq!(config.swipe, SwipeConfig::default());
    }

    #[test]
    fn inverted_pinch_thresholds_are_rejected() {
        let mut config = GestureConfig::default();
        config.pinch.on = 0.1;
        config.pinch.off = 0.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "pinch.off", .. }));
    }

    #[test]
    fn out_of_unit_range_is_rejected() {
        let mut config = GestureConfig::default();
        config.pinch.on = 1.5;
        assert!(config.validate().is_err());

        let mut config = GestureConfig::default();
        config.smoothing_alpha = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zone_bands_must_be_ordered_inside_unit() {
        let mut config = GestureConfig::default();
        config.zone_bands = [0.7, 0.3];
        assert!(config.validate().is_err());
        config.zone_bands = [0.0, 0.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn pose_weights_must_sum_to_one() {
        let mut config = GestureConfig::default();
        config.pose.w_ang = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn runaway_windows_are_rejected() {
        let mut config = GestureConfig::default();
        config.swipe.cooldown_ms = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "swipe.cooldown_ms", .. }));

        let mut config = GestureConfig::default();
        config.swipe.arming_window_ms = MAX_WINDOW_MS + 1;
        assert!(config.validate().is_err());

        let mut config = GestureConfig::default();
        config.pinch.open_cooldown_ms = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = GestureConfig::default();
        config.swipe.cooldown_ms = MAX_WINDOW_MS;
        config.validate().unwrap();
    }

    #[test]
    fn target_fps_must_be_practical() {
        for fps in [1e-20, 0.5, 0.0, -30.0, 241.0, f64::INFINITY] {
            let mut config = GestureConfig::default();
            config.target_fps = fps;
            let err = config.validate().unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { field: "target_fps", .. }), "{fps}");
        }
        let mut config = GestureConfig::default();
        config.target_fps = 240.0;
        config.validate().unwrap();
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut config = GestureConfig::default();
        config.volume.db_per_unit = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = std::env::temp_dir().join(format!("gesture_mixer_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{ "target_fps": 60 }"#).unwrap();
        let config = GestureConfig::load(&good).unwrap();
        assert_eq!(config.target_fps, 60.0);

        let bad = dir.join("bad.json");
        std::fs::write(&bad, r#"{ "volume": { "min_db": 5, "max_db": -5 } }"#).unwrap();
        assert!(matches!(
            GestureConfig::load(&bad),
            Err(ConfigError::Invalid { .. })
        ));

        let broken = dir.join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            GestureConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));

        assert!(matches!(
            GestureConfig::load(dir.join("missing.json")),
            Err(ConfigError::Io { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
