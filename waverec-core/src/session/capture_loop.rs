use std::sync::Arc;
use std::thread;

use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::session::capture_session::CaptureSession;
use crate::session::shutdown::ShutdownCoordinator;
use crate::traits::audio_sink::AudioSink;
use crate::traits::capture_device::{CaptureDevice, Poll};

/// Orchestrates one recording session from negotiation to finalize.
///
/// Drives the `Idle → Negotiating → Streaming → Draining → Finalized`
/// machine. Streaming drains every queued packet before sleeping one poll
/// cadence, so the loop catches up after a long gap instead of letting the
/// shared buffer back up. Two things end the stream: the sink returning
/// `false` from `copy_data` (it observed the stop flag) and a device
/// failure. Both exits pass through `Draining` — the device is stopped and
/// the file finalized no matter how streaming ended — and `run` signals the
/// shutdown rendezvous on every path, startup failures included, so a
/// blocked stop requester is never stranded.
pub struct CaptureLoop<D: CaptureDevice, S: AudioSink> {
    session: CaptureSession<D>,
    sink: S,
    coordinator: Arc<ShutdownCoordinator>,
    state: CaptureState,
}

impl<D: CaptureDevice, S: AudioSink> CaptureLoop<D, S> {
    pub fn new(session: CaptureSession<D>, sink: S, coordinator: Arc<ShutdownCoordinator>) -> Self {
        Self {
            session,
            sink,
            coordinator,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Recover the sink (to summarize the recording) after the run.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Record until stopped, then drain and finalize.
    pub fn run(&mut self) -> Result<(), CaptureError> {
        let result = self.run_to_drained();
        self.state = CaptureState::Finalized;
        self.coordinator.mark_completed();

        match &result {
            Ok(()) => log::info!("recording stopped by request"),
            Err(e) => log::error!("recording stopped on error: {}", e),
        }
        result
    }

    fn run_to_drained(&mut self) -> Result<(), CaptureError> {
        self.state = CaptureState::Negotiating;
        let streamed = self.negotiate_and_stream();

        // Draining runs on the error path too: stop the device, then
        // finalize, so the partial file stays loadable. Both calls are
        // no-ops when the failure predates them.
        self.state = CaptureState::Draining;
        let stopped = self.session.stop();
        let finalized = self.sink.finalize();
        streamed.and(stopped).and(finalized)
    }

    fn negotiate_and_stream(&mut self) -> Result<(), CaptureError> {
        let format = self.session.open()?;
        self.sink.set_format(&format)?;

        // A stop that arrived before streaming began: drain the empty
        // session right away.
        if self.coordinator.stop_requested() {
            return Ok(());
        }

        self.state = CaptureState::Streaming;
        self.session.start()?;
        self.stream()
    }

    fn stream(&mut self) -> Result<(), CaptureError> {
        loop {
            // Drain everything currently queued before sleeping.
            loop {
                let Self { session, sink, .. } = self;
                match session.poll(&mut |packet| sink.copy_data(packet))? {
                    Poll::Empty => break,
                    Poll::Delivered { keep_going: false } => return Ok(()),
                    Poll::Delivered { keep_going: true } => {}
                }
            }

            if self.coordinator.stop_requested() {
                return Ok(());
            }
            thread::sleep(self.session.poll_cadence());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use crate::models::format::MixFormat;
    use crate::models::packet::Packet;
    use crate::session::progress::NullProgress;
    use crate::storage::wav_writer::WavWriter;
    use crate::traits::capture_device::PacketDrain;

    enum Step {
        Samples(u32, Vec<u8>),
        Silence(u32),
        Empty,
        Fail,
    }

    /// Counters observable after the device has been moved into the loop.
    #[derive(Default)]
    struct Probe {
        acquired: AtomicU32,
        released: AtomicU32,
        stops: AtomicU32,
    }

    /// Plays back a fixed script, then reports an idle queue forever.
    struct ScriptedDevice {
        steps: VecDeque<Step>,
        buffer_frames: u32,
        probe: Arc<Probe>,
    }

    impl ScriptedDevice {
        fn new(steps: Vec<Step>) -> (Self, Arc<Probe>) {
            let probe = Arc::new(Probe::default());
            let device = Self {
                steps: steps.into(),
                // 96 frames at 48 kHz: 1 ms poll cadence keeps tests fast.
                buffer_frames: 96,
                probe: Arc::clone(&probe),
            };
            (device, probe)
        }
    }

    impl CaptureDevice for ScriptedDevice {
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
            self.probe.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
            match self.steps.front() {
                Some(Step::Samples(frames, _)) | Some(Step::Silence(frames)) => Ok(*frames),
                Some(Step::Empty) => {
                    self.steps.pop_front();
                    Ok(0)
                }
                Some(Step::Fail) => {
                    self.steps.pop_front();
                    Err(CaptureError::Protocol("packet size query failed".into()))
                }
                None => Ok(0),
            }
        }

        fn read_packet(&mut self, drain: PacketDrain<'_>) -> Result<bool, CaptureError> {
            self.probe.acquired.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.pop_front().expect("read_packet with empty queue");
            let result = match &step {
                Step::Samples(frames, data) => drain(Packet::samples(*frames, data)),
                Step::Silence(frames) => drain(Packet::silence(*frames)),
                _ => unreachable!("read_packet on a non-packet step"),
            };
            // Release happens whatever the drain decided.
            self.probe.released.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    /// Sink that records calls and can end the session on a given packet.
    struct StubSink {
        formats: u32,
        packets: Vec<u32>,
        finalizes: u32,
        stop_on_packet: Option<usize>,
        fail_on_packet: Option<usize>,
    }

    impl StubSink {
        fn new() -> Self {
            Self {
                formats: 0,
                packets: Vec::new(),
                finalizes: 0,
                stop_on_packet: None,
                fail_on_packet: None,
            }
        }
    }

    impl AudioSink for StubSink {
        fn set_format(&mut self, _format: &MixFormat) -> Result<(), CaptureError> {
            self.formats += 1;
            Ok(())
        }

        fn copy_data(&mut self, packet: Packet<'_>) -> Result<bool, CaptureError> {
            self.packets.push(packet.frames);
            if self.fail_on_packet == Some(self.packets.len()) {
                return Err(CaptureError::Io("disk full".into()));
            }
            Ok(self.stop_on_packet != Some(self.packets.len()))
        }

        fn finalize(&mut self) -> Result<(), CaptureError> {
            self.finalizes += 1;
            Ok(())
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("waverec_loop_test_{}", name))
    }

    fn writer(path: &PathBuf, coordinator: &Arc<ShutdownCoordinator>) -> WavWriter {
        WavWriter::with_progress(path, Arc::clone(coordinator), Box::new(NullProgress)).unwrap()
    }

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn sink_stop_ends_session_after_drain() {
        let (device, probe) = ScriptedDevice::new(vec![
            Step::Samples(480, vec![0u8; 480 * 4]),
            Step::Samples(960, vec![0u8; 960 * 4]),
        ]);
        let mut sink = StubSink::new();
        sink.stop_on_packet = Some(1);

        let coordinator = Arc::new(ShutdownCoordinator::new());
        let mut rec = CaptureLoop::new(CaptureSession::new(device), sink, coordinator);
        rec.run().unwrap();

        assert_eq!(rec.state(), CaptureState::Finalized);
        let sink = rec.into_sink();
        assert_eq!(sink.formats, 1);
        assert_eq!(sink.packets, vec![480]);
        assert_eq!(sink.finalizes, 1);
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn device_failure_still_drains_and_finalizes() {
        let path = temp_path("device_failure.wav");
        let (device, probe) = ScriptedDevice::new(vec![
            Step::Samples(480, vec![0x55u8; 480 * 4]),
            Step::Fail,
        ]);
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let sink = writer(&path, &coordinator);

        let mut rec = CaptureLoop::new(CaptureSession::new(device), sink, coordinator);
        let err = rec.run().unwrap_err();
        assert!(matches!(err, CaptureError::Protocol(_)));
        assert_eq!(rec.state(), CaptureState::Finalized);
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);

        // The partial recording is valid: header patched for 480 frames.
        let bytes = fs::read(&path).unwrap();
        assert_eq!(read_u32(&bytes, 42), 480 * 4);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn sink_error_releases_device_buffer() {
        let (device, probe) = ScriptedDevice::new(vec![Step::Samples(480, vec![0u8; 480 * 4])]);
        let mut sink = StubSink::new();
        sink.fail_on_packet = Some(1);

        let coordinator = Arc::new(ShutdownCoordinator::new());
        let mut rec = CaptureLoop::new(CaptureSession::new(device), sink, coordinator);
        rec.run().unwrap_err();

        assert_eq!(probe.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
        assert_eq!(rec.into_sink().finalizes, 1);
    }

    #[test]
    fn stop_before_first_packet_yields_empty_recording() {
        let path = temp_path("empty_recording.wav");
        let (device, _probe) = ScriptedDevice::new(vec![]);
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let sink = writer(&path, &coordinator);

        let requester = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.request_stop())
        };
        while !coordinator.stop_requested() {
            thread::sleep(Duration::from_millis(1));
        }

        let mut rec = CaptureLoop::new(CaptureSession::new(device), sink, coordinator);
        rec.run().unwrap();
        requester.join().unwrap();

        assert_eq!(rec.state(), CaptureState::Finalized);
        let sink = rec.into_sink();
        assert_eq!(sink.frames_written(), 0);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 46);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(read_u32(&bytes, 42), 0);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn idle_polls_never_write_and_stop_is_observed() {
        let path = temp_path("idle_polling.wav");
        let (device, _probe) = ScriptedDevice::new(vec![]);
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let sink = writer(&path, &coordinator);

        // Let the loop spin on Empty polls for a while before stopping it.
        let requester = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                coordinator.request_stop();
            })
        };

        let mut rec = CaptureLoop::new(CaptureSession::new(device), sink, coordinator);
        rec.run().unwrap();
        requester.join().unwrap();

        let sink = rec.into_sink();
        assert_eq!(sink.frames_written(), 0);
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 46);

        fs::remove_file(&path).ok();
    }

    /// End-to-end accounting: delegates to a real writer and gates the stop
    /// request so both packets land before the flag is raised.
    struct GatedWriter {
        inner: WavWriter,
        coordinator: Arc<ShutdownCoordinator>,
        release_requester: Option<mpsc::Sender<()>>,
        packets: usize,
        gate_on: usize,
    }

    impl AudioSink for GatedWriter {
        fn set_format(&mut self, format: &MixFormat) -> Result<(), CaptureError> {
            self.inner.set_format(format)
        }

        fn copy_data(&mut self, packet: Packet<'_>) -> Result<bool, CaptureError> {
            let keep_going = self.inner.copy_data(packet)?;
            self.packets += 1;
            if self.packets == self.gate_on {
                if let Some(tx) = self.release_requester.take() {
                    tx.send(()).unwrap();
                }
                while !self.coordinator.stop_requested() {
                    thread::yield_now();
                }
            }
            Ok(keep_going)
        }

        fn finalize(&mut self) -> Result<(), CaptureError> {
            self.inner.finalize()
        }
    }

    #[test]
    fn full_pipeline_accounts_every_frame() {
        let path = temp_path("pipeline.wav");
        let (device, probe) = ScriptedDevice::new(vec![
            Step::Samples(480, vec![0x0Fu8; 480 * 4]),
            Step::Empty,
            Step::Samples(960, vec![0xF0u8; 960 * 4]),
        ]);
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let (tx, rx) = mpsc::channel();
        let sink = GatedWriter {
            inner: writer(&path, &coordinator),
            coordinator: Arc::clone(&coordinator),
            release_requester: Some(tx),
            packets: 0,
            gate_on: 2,
        };

        let requester = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                rx.recv().unwrap();
                coordinator.request_stop();
            })
        };

        let mut rec = CaptureLoop::new(CaptureSession::new(device), sink, coordinator);
        rec.run().unwrap();
        requester.join().unwrap();

        assert_eq!(rec.state(), CaptureState::Finalized);
        let sink = rec.into_sink();
        assert_eq!(sink.inner.frames_written(), 1440);
        assert_eq!(probe.acquired.load(Ordering::SeqCst), 2);
        assert_eq!(probe.released.load(Ordering::SeqCst), 2);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 46 + 5760);
        assert_eq!(read_u32(&bytes, 42), 5760);
        assert_eq!(read_u32(&bytes, 4), 4 + (8 + 18) + (8 + 5760));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn silence_flagged_packet_writes_zeros() {
        let path = temp_path("silence_pipeline.wav");
        let (device, _probe) = ScriptedDevice::new(vec![Step::Silence(100)]);
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let (tx, rx) = mpsc::channel();
        let sink = GatedWriter {
            inner: writer(&path, &coordinator),
            coordinator: Arc::clone(&coordinator),
            release_requester: Some(tx),
            packets: 0,
            gate_on: 1,
        };

        let requester = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                rx.recv().unwrap();
                coordinator.request_stop();
            })
        };

        let mut rec = CaptureLoop::new(CaptureSession::new(device), sink, coordinator);
        rec.run().unwrap();
        requester.join().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 46 + 400);
        assert!(bytes[46..].iter().all(|&b| b == 0));

        fs::remove_file(&path).ok();
    }
}
