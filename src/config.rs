use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{MotionvidError, Result};

/// Hard upper bound on the motion evaluation block
pub const MAX_BLOCK_SIZE: usize = 10_000;

/// Largest simulated frame edge in pixels
pub const MAX_SIMULATION_DIMENSION: u32 = 8192;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionvidConfig {
    pub motion: MotionConfig,
    pub output: OutputConfig,
    pub session: SessionConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionConfig {
    /// Number of frames aggregated into one motion verdict
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Minimum number of frames a recording segment lasts
    #[serde(default = "default_min_hold_frames")]
    pub min_hold_frames: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    /// Directory receiving motion segments
    #[serde(default = "default_save_directory")]
    pub save_directory: String,

    /// Destination used while no motion is being recorded
    #[serde(default = "default_destination")]
    pub default_destination: String,

    /// File extension for segment files
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Timezone for segment timestamps ("local" or an IANA name)
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Write a JSON sidecar next to every closed segment
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Stop after this many milliseconds of run time
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Stop after this many frames
    #[serde(default)]
    pub frame_limit: Option<u64>,

    /// Map SIGUSR1/SIGUSR2 to manual trigger/graceful stop
    #[serde(default = "default_signal")]
    pub signal: bool,

    /// Read Enter/x keypresses as manual trigger/graceful stop
    #[serde(default = "default_keypress")]
    pub keypress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimulationConfig {
    /// Simulated frame rate
    #[serde(default = "default_simulation_fps")]
    pub fps: u32,

    /// Simulated frame size (width, height)
    #[serde(default = "default_simulation_resolution")]
    pub resolution: (u32, u32),

    /// Frames flagged with motion in each cycle
    #[serde(default = "default_motion_on_frames")]
    pub motion_on_frames: u32,

    /// Frames without motion in each cycle
    #[serde(default = "default_motion_off_frames")]
    pub motion_off_frames: u32,
}

impl SessionConfig {
    /// Run-time limit; zero means unlimited
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Frame-count limit; zero means unlimited
    pub fn frame_limit(&self) -> Option<u64> {
        self.frame_limit.filter(|frames| *frames > 0)
    }
}

impl SimulationConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

impl MotionvidConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from_file("motionvid.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("motion.block_size", default_block_size() as i64)?
            .set_default("motion.min_hold_frames", default_min_hold_frames())?
            .set_default("output.save_directory", default_save_directory())?
            .set_default("output.default_destination", default_destination())?
            .set_default("output.extension", default_extension())?
            .set_default("output.timezone", default_timezone())?
            .set_default("output.save_metadata", default_save_metadata())?
            .set_default("session.signal", default_signal())?
            .set_default("session.keypress", default_keypress())?
            .set_default("simulation.fps", default_simulation_fps())?
            .set_default(
                "simulation.resolution",
                vec![
                    default_simulation_resolution().0,
                    default_simulation_resolution().1,
                ],
            )?
            .set_default("simulation.motion_on_frames", default_motion_on_frames())?
            .set_default("simulation.motion_off_frames", default_motion_off_frames())?
            .add_source(File::with_name(&path_str).required(false))
            // MOTIONVID_MOTION__BLOCK_SIZE=40 overrides motion.block_size
            .add_source(
                Environment::with_prefix("MOTIONVID")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: MotionvidConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.motion.block_size == 0 {
            return Err(MotionvidError::invalid_config(
                "Motion block_size must be greater than 0",
            ));
        }

        if self.motion.block_size > MAX_BLOCK_SIZE {
            return Err(MotionvidError::invalid_config(format!(
                "Motion block_size {} exceeds the maximum of {}",
                self.motion.block_size, MAX_BLOCK_SIZE
            )));
        }

        if self.motion.min_hold_frames == 0 {
            return Err(MotionvidError::invalid_config(
                "Motion min_hold_frames must be greater than 0",
            ));
        }

        if self.output.save_directory.trim().is_empty() {
            return Err(MotionvidError::invalid_config(
                "Output save_directory must not be empty",
            ));
        }

        if self.output.default_destination.trim().is_empty() {
            return Err(MotionvidError::invalid_config(
                "Output default_destination must not be empty",
            ));
        }

        if self.output.extension.trim().is_empty() {
            return Err(MotionvidError::invalid_config(
                "Output extension must not be empty",
            ));
        }

        if self.simulation.fps == 0 {
            return Err(MotionvidError::invalid_config(
                "Simulation fps must be greater than 0",
            ));
        }

        let (width, height) = self.simulation.resolution;
        if width == 0
            || height == 0
            || width > MAX_SIMULATION_DIMENSION
            || height > MAX_SIMULATION_DIMENSION
        {
            return Err(MotionvidError::invalid_config(format!(
                "Simulation resolution {}x{} must be between 1x1 and {}x{}",
                width, height, MAX_SIMULATION_DIMENSION, MAX_SIMULATION_DIMENSION
            )));
        }

        Ok(())
    }
}

impl Default for MotionvidConfig {
    fn default() -> Self {
        Self {
            motion: MotionConfig {
                block_size: default_block_size(),
                min_hold_frames: default_min_hold_frames(),
            },
            output: OutputConfig {
                save_directory: default_save_directory(),
                default_destination: default_destination(),
                extension: default_extension(),
                timezone: default_timezone(),
                save_metadata: default_save_metadata(),
            },
            session: SessionConfig {
                timeout_ms: None,
                frame_limit: None,
                signal: default_signal(),
                keypress: default_keypress(),
            },
            simulation: SimulationConfig {
                fps: default_simulation_fps(),
                resolution: default_simulation_resolution(),
                motion_on_frames: default_motion_on_frames(),
                motion_off_frames: default_motion_off_frames(),
            },
        }
    }
}

// Default value functions
fn default_block_size() -> usize {
    20
}
fn default_min_hold_frames() -> u32 {
    50
}

fn default_save_directory() -> String {
    "./motion".to_string()
}
fn default_destination() -> String {
    "-".to_string()
}
fn default_extension() -> String {
    "h264".to_string()
}
fn default_timezone() -> String {
    "local".to_string()
}
fn default_save_metadata() -> bool {
    false
}

fn default_signal() -> bool {
    true
}
fn default_keypress() -> bool {
    false
}

fn default_simulation_fps() -> u32 {
    30
}
fn default_simulation_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_motion_on_frames() -> u32 {
    30
}
fn default_motion_off_frames() -> u32 {
    150
}
