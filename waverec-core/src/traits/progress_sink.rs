use std::time::Duration;

/// Receiver for per-packet progress updates.
///
/// Called from the capture thread after every successfully written packet;
/// implementations should stay cheap.
pub trait ProgressSink {
    /// The recording now spans `elapsed` of audio.
    fn on_advance(&mut self, elapsed: Duration);
}
