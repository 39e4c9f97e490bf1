//! WASAPI capture device for system audio (loopback) or microphone input.
//!
//! Opens the default render endpoint with `AUDCLNT_STREAMFLAGS_LOOPBACK`
//! to capture the mix being played to that device, or the default capture
//! endpoint for microphone input. Shared mode only; DRM-protected audio is
//! silenced in loopback.

use std::time::Duration;

use waverec_core::traits::capture_device::{CaptureDevice, PacketDrain};
use waverec_core::{CaptureError, MixFormat, Packet};
use windows::Win32::Media::Audio::{
    IAudioCaptureClient, IAudioClient, AUDCLNT_BUFFERFLAGS_SILENT, AUDCLNT_SHAREMODE_SHARED,
    AUDCLNT_STREAMFLAGS_LOOPBACK, AUDCLNT_STREAMFLAGS_NOPERSIST, WAVEFORMATEX,
};
use windows::Win32::System::Com::{CoTaskMemFree, CLSCTX_ALL};

use crate::com::ComGuard;
use crate::endpoint;

/// Which default endpoint the device reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointMode {
    /// Tap the mix going to the default render endpoint.
    Loopback,
    /// Record the default capture endpoint (microphone).
    Capture,
}

impl EndpointMode {
    fn label(self) -> &'static str {
        match self {
            Self::Loopback => "loopback",
            Self::Capture => "capture",
        }
    }
}

/// WASAPI-backed implementation of the abstract capture device.
///
/// Single-threaded by design: the capture loop that created it is the only
/// caller, so no interface crosses a thread boundary. The mix format
/// pointer returned by the device is owned here and freed on drop; COM is
/// uninitialized last (field order).
pub struct WasapiCaptureDevice {
    mode: EndpointMode,
    endpoint_name: String,
    capture_client: Option<IAudioCaptureClient>,
    audio_client: IAudioClient,
    mix_format: *mut WAVEFORMATEX,
    bytes_per_frame: u32,
    _com: ComGuard,
}

impl WasapiCaptureDevice {
    /// Open the default render endpoint for loopback capture.
    pub fn default_loopback() -> Result<Self, CaptureError> {
        Self::open_endpoint(EndpointMode::Loopback)
    }

    /// Open the default capture endpoint (microphone).
    pub fn default_capture() -> Result<Self, CaptureError> {
        Self::open_endpoint(EndpointMode::Capture)
    }

    fn open_endpoint(mode: EndpointMode) -> Result<Self, CaptureError> {
        let com = ComGuard::initialize()?;
        let (device, endpoint_name) = endpoint::default_endpoint(mode)?;

        let audio_client: IAudioClient = unsafe { device.Activate(CLSCTX_ALL, None) }
            .map_err(|_| CaptureError::DeviceUnavailable)?;

        log::info!("using {} endpoint \"{}\"", mode.label(), endpoint_name);

        Ok(Self {
            mode,
            endpoint_name,
            capture_client: None,
            audio_client,
            mix_format: std::ptr::null_mut(),
            bytes_per_frame: 0,
            _com: com,
        })
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    fn capture_client(&self) -> Result<&IAudioCaptureClient, CaptureError> {
        self.capture_client
            .as_ref()
            .ok_or_else(|| CaptureError::Protocol("capture client used before initialization".into()))
    }
}

impl CaptureDevice for WasapiCaptureDevice {
    fn mix_format(&mut self) -> Result<MixFormat, CaptureError> {
        unsafe {
            if self.mix_format.is_null() {
                self.mix_format = self
                    .audio_client
                    .GetMixFormat()
                    .map_err(|e| CaptureError::FormatNegotiationFailed(format!("GetMixFormat failed: {}", e)))?;
            }
            Ok(convert_format(&*self.mix_format))
        }
    }

    fn initialize(&mut self, buffer_duration: Duration, format: &MixFormat) -> Result<(), CaptureError> {
        if self.mix_format.is_null() {
            return Err(CaptureError::Protocol("initialize before mix-format query".into()));
        }

        // REFERENCE_TIME is counted in 100 ns units.
        let hns_duration = (buffer_duration.as_nanos() / 100) as i64;
        let stream_flags = match self.mode {
            EndpointMode::Loopback => AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST,
            EndpointMode::Capture => AUDCLNT_STREAMFLAGS_NOPERSIST,
        };

        unsafe {
            self.audio_client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    stream_flags,
                    hns_duration,
                    0,
                    self.mix_format,
                    None,
                )
                .map_err(|e| {
                    CaptureError::FormatNegotiationFailed(format!("IAudioClient::Initialize failed: {}", e))
                })?;

            let capture_client: IAudioCaptureClient = self
                .audio_client
                .GetService()
                .map_err(|e| CaptureError::ServiceUnavailable(format!("GetService failed: {}", e)))?;
            self.capture_client = Some(capture_client);
        }

        self.bytes_per_frame = format.bytes_per_frame() as u32;
        Ok(())
    }

    fn buffer_frame_count(&mut self) -> Result<u32, CaptureError> {
        unsafe {
            self.audio_client
                .GetBufferSize()
                .map_err(|e| CaptureError::Protocol(format!("GetBufferSize failed: {}", e)))
        }
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        unsafe {
            self.audio_client
                .Start()
                .map_err(|e| CaptureError::Protocol(format!("IAudioClient::Start failed: {}", e)))
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        unsafe {
            self.audio_client
                .Stop()
                .map_err(|e| CaptureError::Protocol(format!("IAudioClient::Stop failed: {}", e)))?;
            // Discard whatever is still queued; the session is over.
            let _ = self.audio_client.Reset();
        }
        Ok(())
    }

    fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        unsafe {
            self.capture_client()?
                .GetNextPacketSize()
                .map_err(|e| CaptureError::Protocol(format!("GetNextPacketSize failed: {}", e)))
        }
    }

    fn read_packet(&mut self, drain: PacketDrain<'_>) -> Result<bool, CaptureError> {
        let bytes_per_frame = self.bytes_per_frame as usize;
        let capture_client = self.capture_client()?;

        unsafe {
            let mut data: *mut u8 = std::ptr::null_mut();
            let mut frames: u32 = 0;
            let mut flags: u32 = 0;

            capture_client
                .GetBuffer(&mut data, &mut frames, &mut flags, None, None)
                .map_err(|e| CaptureError::Protocol(format!("GetBuffer failed: {}", e)))?;

            let packet = if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 || data.is_null() {
                Packet::silence(frames)
            } else {
                Packet::samples(frames, std::slice::from_raw_parts(data, frames as usize * bytes_per_frame))
            };

            let drained = drain(packet);

            // The lease goes back whatever the drain decided; a skipped
            // release stalls the shared buffer.
            let released = capture_client
                .ReleaseBuffer(frames)
                .map_err(|e| CaptureError::Protocol(format!("ReleaseBuffer failed: {}", e)));

            let keep_going = drained?;
            released?;
            Ok(keep_going)
        }
    }
}

impl Drop for WasapiCaptureDevice {
    fn drop(&mut self) {
        if !self.mix_format.is_null() {
            unsafe {
                CoTaskMemFree(Some(self.mix_format as *const _ as *const _));
            }
        }
    }
}

/// Copy the device's native format descriptor, extension blob included.
unsafe fn convert_format(wf: &WAVEFORMATEX) -> MixFormat {
    let extra = if wf.cbSize == 0 {
        Vec::new()
    } else {
        let base = (wf as *const WAVEFORMATEX as *const u8).add(std::mem::size_of::<WAVEFORMATEX>());
        std::slice::from_raw_parts(base, wf.cbSize as usize).to_vec()
    };

    MixFormat {
        format_tag: wf.wFormatTag,
        channels: wf.nChannels,
        samples_per_sec: wf.nSamplesPerSec,
        avg_bytes_per_sec: wf.nAvgBytesPerSec,
        block_align: wf.nBlockAlign,
        bits_per_sample: wf.wBitsPerSample,
        extra,
    }
}
