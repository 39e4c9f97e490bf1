use serde::{Deserialize, Serialize};

use super::format::MixFormat;

/// Facts about a finished recording, written as a JSON sidecar next to
/// the audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub duration_secs: f64,
    pub frames: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_bytes: u64,
    pub checksum: String,
}

impl RecordingSummary {
    /// Build a summary from the writer's running totals.
    pub fn new(format: &MixFormat, frames: u64, file_path: &str, checksum: &str) -> Self {
        let duration_secs = frames as f64 / format.samples_per_sec as f64;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: file_path.to_string(),
            duration_secs,
            frames,
            sample_rate: format.samples_per_sec,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
            data_bytes: frames * format.bytes_per_frame() as u64,
            checksum: checksum.to_string(),
        }
    }
}
