//! Default endpoint selection via the MMDevice API.

use waverec_core::CaptureError;
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, eRender, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL, STGM_READ};

use crate::wasapi_device::EndpointMode;

/// Resolve the default endpoint for the given mode, with its friendly name.
///
/// Loopback reads from the default *render* endpoint — the capture client
/// taps the mix going to the speakers, not a microphone.
///
/// Requires COM to be initialized on the calling thread.
pub fn default_endpoint(mode: EndpointMode) -> Result<(IMMDevice, String), CaptureError> {
    unsafe {
        let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| CaptureError::ServiceUnavailable(format!("failed to create device enumerator: {}", e)))?;

        let data_flow = match mode {
            EndpointMode::Loopback => eRender,
            EndpointMode::Capture => eCapture,
        };
        let device = enumerator
            .GetDefaultAudioEndpoint(data_flow, eConsole)
            .map_err(|_| CaptureError::DeviceUnavailable)?;

        let name = friendly_name(&device).unwrap_or_else(|| "Unknown Endpoint".into());
        Ok((device, name))
    }
}

/// Read the PKEY_Device_FriendlyName property from a device.
fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        let name = value.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}
