use crate::config::OutputConfig;
use crate::error::Result;
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Label appended to every segment timestamp
pub const SEGMENT_LABEL: &str = "motionmov";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Timezone used to render segment timestamps
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NamingZone {
    Local,
    Named(Tz),
}

impl NamingZone {
    /// Parse "local" or an IANA timezone name, falling back to UTC
    pub fn resolve(name: &str) -> Self {
        if name.eq_ignore_ascii_case("local") {
            return NamingZone::Local;
        }
        match name.parse::<Tz>() {
            Ok(tz) => NamingZone::Named(tz),
            Err(_) => {
                warn!("Invalid segment timezone '{}', falling back to UTC", name);
                NamingZone::Named(chrono_tz::UTC)
            }
        }
    }

    fn format(&self, at: DateTime<Utc>) -> String {
        match self {
            NamingZone::Local => at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
            NamingZone::Named(tz) => at.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// One motion-triggered recording and its destination file
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// File name, e.g. `2024-03-05_14-07-09-motionmov.h264`
    pub name: String,
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub frames_encoded: u64,
}

/// Derives segment destinations from the save directory and a timestamp
#[derive(Debug, Clone)]
pub struct SegmentNamer {
    save_directory: String,
    extension: String,
    zone: NamingZone,
}

impl SegmentNamer {
    pub fn new<S: Into<String>>(save_directory: S, extension: S, zone: NamingZone) -> Self {
        Self {
            save_directory: save_directory.into(),
            extension: extension.into(),
            zone,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(
            config.save_directory.clone(),
            config.extension.clone(),
            NamingZone::resolve(&config.timezone),
        )
    }

    /// Segment for a recording starting at `at`
    pub fn name_at(&self, at: DateTime<Utc>) -> Segment {
        let name = format!("{}-{}.{}", self.zone.format(at), SEGMENT_LABEL, self.extension);
        let path = PathBuf::from(format!("{}/{}", self.save_directory, name));

        debug!("Generated segment destination {}", path.display());

        Segment {
            name,
            path,
            started_at: at,
            stopped_at: None,
            frames_encoded: 0,
        }
    }

    /// Segment for a recording starting now
    pub fn next(&self) -> Segment {
        self.name_at(Utc::now())
    }

    /// Create the save directory if it does not exist yet
    pub fn ensure_directory(&self) -> Result<()> {
        std::fs::create_dir_all(&self.save_directory)?;
        Ok(())
    }

    pub fn save_directory(&self) -> &str {
        &self.save_directory
    }
}
