//! Console recorder: captures the default render mix (or the microphone
//! with `--mic`) into a timestamped WAV file until Ctrl+C.

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_os = "windows")]
fn run() -> Result<(), waverec_core::CaptureError> {
    use std::sync::Arc;

    use waverec_core::storage::sidecar;
    use waverec_core::{CaptureError, CaptureLoop, CaptureSession, ShutdownCoordinator, WavWriter};
    use waverec_windows::WasapiCaptureDevice;

    let use_mic = std::env::args().any(|arg| arg == "--mic");

    let file_name = chrono::Local::now()
        .format("recording_%Y%m%d-%H%M%S_%3f.wav")
        .to_string();
    println!("Output filename: {}", file_name);

    let coordinator = Arc::new(ShutdownCoordinator::new());
    let writer = WavWriter::create(&file_name, Arc::clone(&coordinator))?;

    let device = if use_mic {
        WasapiCaptureDevice::default_capture()?
    } else {
        WasapiCaptureDevice::default_loopback()?
    };

    {
        let coordinator = Arc::clone(&coordinator);
        ctrlc::set_handler(move || {
            // Returns only after the loop has drained and finalized, so the
            // process cannot exit while the file is still open.
            coordinator.request_stop();
        })
        .map_err(|e| CaptureError::Io(format!("failed to install Ctrl+C handler: {}", e)))?;
    }

    keep_system_awake();

    let mut rec = CaptureLoop::new(CaptureSession::new(device), writer, coordinator);
    let result = rec.run();
    println!();

    let writer = rec.into_sink();
    match writer.summary() {
        Ok(summary) => {
            sidecar::write_summary(&summary, writer.path())?;
            log::info!(
                "recorded {:.3} s ({} frames) to {}",
                summary.duration_secs,
                summary.frames,
                summary.file_path
            );
        }
        // No format was ever negotiated; there is nothing to summarize.
        Err(CaptureError::NotInitialized) => {}
        Err(e) => log::warn!("failed to summarize recording: {}", e),
    }

    result
}

/// Keep the machine from sleeping while the recording runs.
#[cfg(target_os = "windows")]
fn keep_system_awake() {
    use windows::Win32::System::Power::{SetThreadExecutionState, ES_CONTINUOUS, ES_SYSTEM_REQUIRED};

    unsafe {
        let _ = SetThreadExecutionState(ES_CONTINUOUS | ES_SYSTEM_REQUIRED);
    }
}

#[cfg(not(target_os = "windows"))]
fn run() -> Result<(), waverec_core::CaptureError> {
    Err(waverec_core::CaptureError::ServiceUnavailable(
        "WASAPI capture requires Windows".into(),
    ))
}
