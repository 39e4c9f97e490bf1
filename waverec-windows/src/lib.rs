//! # waverec-windows
//!
//! Windows WASAPI backend for waverec.
//!
//! Provides `WasapiCaptureDevice`, the production implementation of the
//! core's `CaptureDevice` trait — system audio via loopback on the default
//! render endpoint, or microphone input via the default capture endpoint.
//!
//! ## Platform Requirements
//! - Windows Vista+ (WASAPI shared mode and loopback)
//! - No special permissions for loopback capture
//!
//! ## Usage
//! ```ignore
//! use waverec_core::{CaptureLoop, CaptureSession, ShutdownCoordinator, WavWriter};
//! use waverec_windows::WasapiCaptureDevice;
//!
//! let device = WasapiCaptureDevice::default_loopback()?;
//! let session = CaptureSession::new(device);
//! ```

#[cfg(target_os = "windows")]
pub mod com;
#[cfg(target_os = "windows")]
pub mod endpoint;
#[cfg(target_os = "windows")]
pub mod wasapi_device;

#[cfg(target_os = "windows")]
pub use wasapi_device::{EndpointMode, WasapiCaptureDevice};
