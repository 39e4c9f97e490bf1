pub mod audio_sink;
pub mod capture_device;
pub mod progress_sink;
