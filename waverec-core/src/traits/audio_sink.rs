use crate::models::error::CaptureError;
use crate::models::format::MixFormat;
use crate::models::packet::Packet;

/// Destination for captured audio.
///
/// One production implementation ([`WavWriter`]) plus test doubles. The
/// capture loop drives the whole lifecycle through this seam: format once,
/// data repeatedly, finalize exactly once at the end (finalize must be
/// idempotent — the writer's drop guard may race a normal shutdown).
///
/// [`WavWriter`]: crate::storage::wav_writer::WavWriter
pub trait AudioSink {
    /// Record the negotiated format. Called once, before any `copy_data`.
    fn set_format(&mut self, format: &MixFormat) -> Result<(), CaptureError>;

    /// Persist one packet.
    ///
    /// Returns `Ok(false)` when the session should end — the sink, not the
    /// device, owns the stop decision because it can observe the external
    /// stop signal.
    fn copy_data(&mut self, packet: Packet<'_>) -> Result<bool, CaptureError>;

    /// Finish the output so it is valid for readers. Idempotent.
    fn finalize(&mut self) -> Result<(), CaptureError>;
}
