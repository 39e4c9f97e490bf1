//! # waverec-core
//!
//! Platform-agnostic core of the waverec recorder.
//!
//! Pulls packets from an abstract capture device, streams them into a WAV
//! container whose header is back-patched once the total frame count is
//! known, and coordinates a race-free shutdown between the capture loop and
//! an asynchronous stop request. Platform backends (Windows WASAPI)
//! implement the `CaptureDevice` trait and plug into the generic
//! `CaptureLoop`.
//!
//! ## Architecture
//!
//! ```text
//! waverec-core (this crate)
//! ├── traits/       ← CaptureDevice, AudioSink, ProgressSink
//! ├── models/       ← CaptureError, MixFormat, Packet, CaptureState, RecordingSummary
//! ├── container/    ← RIFF/WAV header layout
//! ├── session/      ← CaptureSession, CaptureLoop, ShutdownCoordinator, progress
//! └── storage/      ← WavWriter, summary sidecar
//! ```

pub mod container;
pub mod models;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use container::riff::RiffWavHeader;
pub use models::error::CaptureError;
pub use models::format::MixFormat;
pub use models::packet::Packet;
pub use models::state::CaptureState;
pub use models::summary::RecordingSummary;
pub use session::capture_loop::CaptureLoop;
pub use session::capture_session::CaptureSession;
pub use session::progress::{format_elapsed, ConsoleProgress, NullProgress};
pub use session::shutdown::ShutdownCoordinator;
pub use storage::wav_writer::WavWriter;
pub use traits::audio_sink::AudioSink;
pub use traits::capture_device::{CaptureDevice, PacketDrain, Poll};
pub use traits::progress_sink::ProgressSink;
