//! TUG timer configuration
//!
//! Loaded from tugtrack.toml (working directory) with env-var overrides.
//! Env format: TUGTRACK__SECTION__KEY (double underscore separators).

use serde::{Deserialize, Serialize};

use crate::error::TugError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TugConfig {
    #[serde(default)]
    pub tug: TugThresholds,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TugThresholds {
    /// Distance each walk segment must cover.
    #[serde(default = "default_walk_distance")]
    pub walk_distance_m: f64,
    /// Physical hip-to-hip separation used to derive the pixel scale.
    #[serde(default = "default_hip_separation")]
    pub hip_separation_m: f64,
    /// Hip angle at or below which standing up has started.
    #[serde(default = "default_stand_start_angle")]
    pub stand_start_angle_deg: f64,
    /// Hip angle above which the subject is upright.
    #[serde(default = "default_stand_end_angle")]
    pub stand_end_angle_deg: f64,
    /// Hip angle at or below which the subject is seated again.
    #[serde(default = "default_sit_down_angle")]
    pub sit_down_angle_deg: f64,
    #[serde(default = "default_turn_angle")]
    pub turn_angle_deg: f64,
    /// Minimum keypoint score for points feeding phase decisions.
    #[serde(default)]
    pub joint_confidence: f64,
}

fn default_walk_distance() -> f64 {
    0.8
}
fn default_hip_separation() -> f64 {
    0.35
}
fn default_stand_start_angle() -> f64 {
    160.0
}
fn default_stand_end_angle() -> f64 {
    175.0
}
fn default_sit_down_angle() -> f64 {
    155.0
}
fn default_turn_angle() -> f64 {
    120.0
}

impl Default for TugThresholds {
    fn default() -> Self {
        Self {
            walk_distance_m: default_walk_distance(),
            hip_separation_m: default_hip_separation(),
            stand_start_angle_deg: default_stand_start_angle(),
            stand_end_angle_deg: default_stand_end_angle(),
            sit_down_angle_deg: default_sit_down_angle(),
            turn_angle_deg: default_turn_angle(),
            joint_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
    #[serde(default = "default_display_delta")]
    pub display_delta_mps: f64,
}

fn default_update_interval() -> u64 {
    200
}
fn default_display_delta() -> f64 {
    0.1
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval(),
            display_delta_mps: default_display_delta(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    /// Overall pose score below which the whole frame is dropped.
    #[serde(default = "default_min_pose")]
    pub min_pose: f64,
    /// Per-keypoint score for the recorded and speed-tracked point.
    #[serde(default = "default_min_keypoint")]
    pub min_keypoint: f64,
}

fn default_min_pose() -> f64 {
    0.5
}
fn default_min_keypoint() -> f64 {
    0.8
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            min_pose: default_min_pose(),
            min_keypoint: default_min_keypoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    /// Also write a `.json` report next to the CSV.
    #[serde(default)]
    pub write_json: bool,
}

fn default_output_path() -> String {
    "tug_data.csv".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            write_json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// JSON Lines pose stream; stdin when unset.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    16
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl TugConfig {
    pub fn validate(&self) -> Result<(), TugError> {
        let t = &self.tug;
        if t.walk_distance_m <= 0.0 {
            return Err(TugError::Config("tug.walk_distance_m must be positive".into()));
        }
        if t.hip_separation_m <= 0.0 {
            return Err(TugError::Config("tug.hip_separation_m must be positive".into()));
        }
        for (name, angle) in [
            ("stand_start_angle_deg", t.stand_start_angle_deg),
            ("stand_end_angle_deg", t.stand_end_angle_deg),
            ("sit_down_angle_deg", t.sit_down_angle_deg),
            ("turn_angle_deg", t.turn_angle_deg),
        ] {
            if !(0.0..=180.0).contains(&angle) {
                return Err(TugError::Config(format!("tug.{name} must lie in [0, 180]")));
            }
        }
        for (name, score) in [
            ("tug.joint_confidence", t.joint_confidence),
            ("confidence.min_pose", self.confidence.min_pose),
            ("confidence.min_keypoint", self.confidence.min_keypoint),
        ] {
            if !(0.0..=1.0).contains(&score) {
                return Err(TugError::Config(format!("{name} must lie in [0, 1]")));
            }
        }
        if self.sampler.update_interval_ms == 0 {
            return Err(TugError::Config("sampler.update_interval_ms must be positive".into()));
        }
        if self.source.channel_capacity == 0 {
            return Err(TugError::Config("source.channel_capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Load configuration from tugtrack.toml + environment variable overrides.
///
/// Search order:
///   1. ./tugtrack.toml (working directory)
///   2. Environment variables: TUGTRACK__TUG__WALK_DISTANCE_M, etc.
pub fn load_config() -> Result<TugConfig, config::ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("tugtrack").required(false))
        .add_source(
            config::Environment::with_prefix("TUGTRACK")
                .separator("__")
                .try_parsing(true),
        );

    let settings = builder.build()?;
    settings.try_deserialize::<TugConfig>()
}

pub fn default_config() -> TugConfig {
    TugConfig::default()
}
