use super::Segment;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Sidecar written next to a closed segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub name: String,
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub frames_encoded: u64,
    pub block_size: usize,
    pub min_hold_frames: u32,
}

impl SegmentMetadata {
    pub fn new(segment: &Segment, block_size: usize, min_hold_frames: u32) -> Self {
        Self {
            name: segment.name.clone(),
            path: segment.path.clone(),
            started_at: segment.started_at,
            stopped_at: segment.stopped_at,
            frames_encoded: segment.frames_encoded,
            block_size,
            min_hold_frames,
        }
    }
}

/// Write `<segment path>.json`; returns the sidecar path
pub fn save_metadata(metadata: &SegmentMetadata) -> Result<PathBuf> {
    let mut sidecar = metadata.path.clone().into_os_string();
    sidecar.push(".json");
    let sidecar = PathBuf::from(sidecar);

    let metadata_json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(&sidecar, metadata_json)?;

    debug!("Saved segment metadata to {}", sidecar.display());
    Ok(sidecar)
}
