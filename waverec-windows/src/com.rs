use waverec_core::CaptureError;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

/// RAII guard for COM initialization on the current thread.
///
/// Held by the capture device for its whole lifetime; COM objects created
/// under the guard must drop before it does.
pub struct ComGuard {
    _priv: (),
}

impl ComGuard {
    /// Initialize COM (MTA) on the calling thread.
    pub fn initialize() -> Result<Self, CaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| CaptureError::ServiceUnavailable(format!("CoInitializeEx failed: {}", e)))?;
        }
        Ok(Self { _priv: () })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
