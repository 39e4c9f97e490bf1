use std::time::Duration;

use crate::models::error::CaptureError;
use crate::models::format::MixFormat;
use crate::models::packet::Packet;

/// Consumer callback handed one packet during [`CaptureDevice::read_packet`].
///
/// Returns `Ok(true)` to keep streaming, `Ok(false)` to end the session.
pub type PacketDrain<'a> = &'a mut dyn FnMut(Packet<'_>) -> Result<bool, CaptureError>;

/// Interface to a platform audio endpoint.
///
/// Implemented by the WASAPI backend and by scripted devices in tests. The
/// contract is pull-based: the session queries queued frame counts and
/// drains one packet at a time. Buffer leases are scoped — `read_packet`
/// acquires the device buffer, hands a borrowed [`Packet`] to the drain
/// closure, and releases the buffer on every exit path, drain errors
/// included. Nothing else may hold onto the packet's memory.
pub trait CaptureDevice {
    /// Query the endpoint's native mix format.
    fn mix_format(&mut self) -> Result<MixFormat, CaptureError>;

    /// Initialize the shared buffer for roughly `buffer_duration` of audio
    /// in the given format.
    fn initialize(&mut self, buffer_duration: Duration, format: &MixFormat) -> Result<(), CaptureError>;

    /// Frame capacity the device actually allocated.
    fn buffer_frame_count(&mut self) -> Result<u32, CaptureError>;

    /// Begin streaming into the shared buffer.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// End streaming. Implementations tolerate a stop without a prior start.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Frames in the next queued packet; 0 when nothing is queued.
    fn next_packet_frames(&mut self) -> Result<u32, CaptureError>;

    /// Acquire the next queued packet, pass it to `drain`, release it.
    ///
    /// Returns the drain's continue/stop decision. Only called after
    /// [`next_packet_frames`] reported a non-empty queue.
    ///
    /// [`next_packet_frames`]: CaptureDevice::next_packet_frames
    fn read_packet(&mut self, drain: PacketDrain<'_>) -> Result<bool, CaptureError>;
}

/// Outcome of one poll of the shared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Nothing queued; sleep one cadence and retry.
    Empty,
    /// One packet was drained and released.
    Delivered {
        /// `false` when the sink asked to end the session.
        keep_going: bool,
    },
}
