use std::time::Duration;

use crate::models::error::CaptureError;
use crate::models::format::MixFormat;
use crate::traits::capture_device::{CaptureDevice, PacketDrain, Poll};

/// Shared-buffer duration requested from the device: one second of audio.
/// The device may allocate more or less; the poll cadence is derived from
/// what it actually allocated.
pub const REQUESTED_BUFFER_DURATION: Duration = Duration::from_secs(1);

/// Device negotiation wrapper exposing a pull-based packet source.
///
/// `open` performs the whole negotiation — mix-format query, shared-buffer
/// initialization, buffer-size readback — and fixes the poll cadence at
/// half the actual buffer duration, balancing stop latency against poll
/// overhead. After `start`, callers alternate `poll` and cadence sleeps.
pub struct CaptureSession<D: CaptureDevice> {
    device: D,
    format: Option<MixFormat>,
    poll_cadence: Duration,
    started: bool,
}

impl<D: CaptureDevice> CaptureSession<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            format: None,
            poll_cadence: Duration::ZERO,
            started: false,
        }
    }

    /// Negotiate with the device and return the session format.
    pub fn open(&mut self) -> Result<MixFormat, CaptureError> {
        let format = self.device.mix_format()?;
        self.device.initialize(REQUESTED_BUFFER_DURATION, &format)?;

        let buffer_frames = self.device.buffer_frame_count()?;
        let actual = Duration::from_secs_f64(buffer_frames as f64 / format.samples_per_sec as f64);
        self.poll_cadence = actual / 2;

        log::info!(
            "negotiated {} Hz, {} ch, {} bit; buffer {} frames, poll cadence {:?}",
            format.samples_per_sec,
            format.channels,
            format.bits_per_sample,
            buffer_frames,
            self.poll_cadence,
        );

        self.format = Some(format.clone());
        Ok(format)
    }

    /// Recommended sleep between polls: half the actual buffer duration.
    pub fn poll_cadence(&self) -> Duration {
        self.poll_cadence
    }

    pub fn format(&self) -> Option<&MixFormat> {
        self.format.as_ref()
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.device.start()?;
        self.started = true;
        Ok(())
    }

    /// Stop the device's streaming. Safe on a session that never started.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.device.stop()
    }

    /// Poll the shared buffer once.
    ///
    /// Delivers at most one packet to `drain`; the device buffer is
    /// released before this returns, whatever the drain decided.
    pub fn poll(&mut self, drain: PacketDrain<'_>) -> Result<Poll, CaptureError> {
        if self.device.next_packet_frames()? == 0 {
            return Ok(Poll::Empty);
        }
        let keep_going = self.device.read_packet(drain)?;
        Ok(Poll::Delivered { keep_going })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::packet::Packet;

    /// Minimal device: fixed format, one queued packet.
    struct OnePacketDevice {
        buffer_frames: u32,
        queued: bool,
    }

    impl OnePacketDevice {
        fn new() -> Self {
            Self {
                buffer_frames: 48000,
                queued: true,
            }
        }
    }

    impl CaptureDevice for OnePacketDevice {
        fn mix_format(&mut self) -> Result<MixFormat, CaptureError> {
            Ok(MixFormat::pcm(48000, 2, 16))
        }

        fn initialize(&mut self, _d: Duration, _f: &MixFormat) -> Result<(), CaptureError> {
            Ok(())
        }

        fn buffer_frame_count(&mut self) -> Result<u32, CaptureError> {
            Ok(self.buffer_frames)
        }

        fn start(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
            Ok(if self.queued { 4 } else { 0 })
        }

        fn read_packet(&mut self, drain: PacketDrain<'_>) -> Result<bool, CaptureError> {
            self.queued = false;
            let data = [0u8; 16];
            drain(Packet::samples(4, &data))
        }
    }

    #[test]
    fn cadence_is_half_the_actual_buffer() {
        let mut session = CaptureSession::new(OnePacketDevice::new());
        session.open().unwrap();
        // 48000 frames at 48 kHz is one second; cadence is half that.
        assert_eq!(session.poll_cadence(), Duration::from_millis(500));
    }

    #[test]
    fn poll_delivers_then_reports_empty() {
        let mut session = CaptureSession::new(OnePacketDevice::new());
        session.open().unwrap();

        let mut seen = 0u32;
        let outcome = session
            .poll(&mut |packet| {
                seen += packet.frames;
                Ok(true)
            })
            .unwrap();
        assert_eq!(outcome, Poll::Delivered { keep_going: true });
        assert_eq!(seen, 4);

        let outcome = session.poll(&mut |_| Ok(true)).unwrap();
        assert_eq!(outcome, Poll::Empty);
    }

    #[test]
    fn stop_without_start_is_tolerated() {
        let mut session = CaptureSession::new(OnePacketDevice::new());
        session.stop().unwrap();
    }
}
