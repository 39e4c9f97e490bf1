use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::container::riff::RiffWavHeader;
use crate::models::error::CaptureError;
use crate::models::format::MixFormat;
use crate::models::packet::Packet;
use crate::models::summary::RecordingSummary;
use crate::session::progress::ConsoleProgress;
use crate::session::shutdown::ShutdownCoordinator;
use crate::storage::sidecar;
use crate::traits::audio_sink::AudioSink;
use crate::traits::progress_sink::ProgressSink;

/// Streaming WAV file writer.
///
/// Writes a placeholder header when the format arrives, appends packet data
/// with a flush after every packet (so a crash loses at most the unflushed
/// tail), and back-patches the two header size fields once the total frame
/// count is known. Dropping the writer finalizes it if nothing else did.
///
/// `copy_data`'s return value is the stop-propagation channel: it reports
/// the negated stop flag back to the capture loop after every packet.
pub struct WavWriter {
    path: PathBuf,
    file: File,
    header: Option<RiffWavHeader>,
    bytes_per_frame: u16,
    sample_rate: u32,
    frames_written: u64,
    finalized: bool,
    coordinator: Arc<ShutdownCoordinator>,
    progress: Box<dyn ProgressSink>,
}

impl WavWriter {
    /// Create or truncate the destination file.
    pub fn create(path: impl Into<PathBuf>, coordinator: Arc<ShutdownCoordinator>) -> Result<Self, CaptureError> {
        Self::with_progress(path, coordinator, Box::new(ConsoleProgress))
    }

    /// Create with a custom progress sink.
    pub fn with_progress(
        path: impl Into<PathBuf>,
        coordinator: Arc<ShutdownCoordinator>,
        progress: Box<dyn ProgressSink>,
    ) -> Result<Self, CaptureError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(CaptureError::io)?;
            }
        }
        let file = File::create(&path).map_err(CaptureError::io)?;
        Ok(Self {
            path,
            file,
            header: None,
            bytes_per_frame: 0,
            sample_rate: 0,
            frames_written: 0,
            finalized: false,
            coordinator,
            progress,
        })
    }

    /// Total frames persisted so far. Monotonic; only `copy_data` advances it.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn data_bytes(&self) -> u64 {
        self.frames_written * self.bytes_per_frame as u64
    }

    /// Elapsed audio time implied by the running frame count.
    fn elapsed(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames_written as f64 / self.sample_rate as f64)
    }

    /// Summarize the finished recording, checksumming the file on disk.
    pub fn summary(&self) -> Result<RecordingSummary, CaptureError> {
        let header = self.header.as_ref().ok_or(CaptureError::NotInitialized)?;
        let checksum = sidecar::sha256_file(&self.path)?;
        Ok(RecordingSummary::new(
            header.format(),
            self.frames_written,
            &self.path.to_string_lossy(),
            &checksum,
        ))
    }
}

impl AudioSink for WavWriter {
    fn set_format(&mut self, format: &MixFormat) -> Result<(), CaptureError> {
        let header = RiffWavHeader::new(format.clone());
        self.file.write_all(&header.encode(0)).map_err(CaptureError::io)?;
        self.file.flush().map_err(CaptureError::io)?;

        self.bytes_per_frame = format.bytes_per_frame();
        self.sample_rate = format.samples_per_sec;
        self.header = Some(header);
        Ok(())
    }

    fn copy_data(&mut self, packet: Packet<'_>) -> Result<bool, CaptureError> {
        if self.header.is_none() {
            return Err(CaptureError::NotInitialized);
        }

        self.frames_written += packet.frames as u64;
        let byte_len = packet.byte_len(self.bytes_per_frame);
        match packet.samples {
            Some(data) => {
                debug_assert_eq!(data.len() as u64, byte_len);
                self.file.write_all(data).map_err(CaptureError::io)?;
            }
            // Silence carries no buffer; synthesize the zero bytes.
            None => {
                io::copy(&mut io::repeat(0).take(byte_len), &mut self.file).map_err(CaptureError::io)?;
            }
        }
        self.file.flush().map_err(CaptureError::io)?;

        self.progress.on_advance(self.elapsed());
        Ok(!self.coordinator.stop_requested())
    }

    fn finalize(&mut self) -> Result<(), CaptureError> {
        if self.finalized {
            return Ok(());
        }
        // No format negotiated: nothing was written, nothing to patch.
        let Some(header) = self.header.as_ref() else {
            self.finalized = true;
            return Ok(());
        };

        let data_size = self.data_bytes() as u32;
        self.file.seek(SeekFrom::Start(0)).map_err(CaptureError::io)?;
        self.file.write_all(&header.encode(data_size)).map_err(CaptureError::io)?;
        self.file.seek(SeekFrom::End(0)).map_err(CaptureError::io)?;
        self.file.flush().map_err(CaptureError::io)?;

        self.finalized = true;
        Ok(())
    }
}

impl Drop for WavWriter {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.finalize() {
                log::warn!("failed to finalize {} on drop: {}", self.path.display(), e);
            }
        }
    }
}
