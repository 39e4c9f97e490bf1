//! Recording summary sidecar: `{recording}.metadata.json` next to the
//! audio file, plus the SHA-256 digest recorded inside it.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::summary::RecordingSummary;

fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write the summary as a JSON sidecar file.
pub fn write_summary(summary: &RecordingSummary, recording_path: &Path) -> Result<(), CaptureError> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| CaptureError::Io(format!("failed to serialize summary: {}", e)))?;
    fs::write(sidecar_path(recording_path), json).map_err(CaptureError::io)?;
    Ok(())
}

/// Read a summary back from its sidecar file.
pub fn read_summary(recording_path: &Path) -> Result<RecordingSummary, CaptureError> {
    let json = fs::read_to_string(sidecar_path(recording_path)).map_err(CaptureError::io)?;
    serde_json::from_str(&json).map_err(|e| CaptureError::Io(format!("failed to parse summary: {}", e)))
}

/// Compute the SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data = fs::read(path).map_err(CaptureError::io)?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::MixFormat;

    #[test]
    fn sha256_of_known_bytes() {
        let path = std::env::temp_dir().join("waverec_sidecar_digest");
        fs::write(&path, b"abc").unwrap();

        let digest = sha256_file(&path).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        fs::remove_file(&path).ok();
    }

    #[test]
    fn sidecar_lands_next_to_recording() {
        let recording = std::env::temp_dir().join("waverec_sidecar_test.wav");
        let fmt = MixFormat::pcm(48000, 2, 16);
        let summary = RecordingSummary::new(&fmt, 480, &recording.to_string_lossy(), "feed");

        write_summary(&summary, &recording).unwrap();
        let loaded = read_summary(&recording).unwrap();
        assert_eq!(loaded, summary);

        fs::remove_file(recording.with_extension("metadata.json")).ok();
    }
}
