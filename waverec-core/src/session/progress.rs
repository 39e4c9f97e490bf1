use std::io::Write;
use std::time::Duration;

use crate::traits::progress_sink::ProgressSink;

/// Format an elapsed recording duration as `HH:MM:SS.mmm`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Progress sink that keeps one overwriting status line on the console.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn on_advance(&mut self, elapsed: Duration) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\rRecording: {}", format_elapsed(elapsed));
        let _ = stdout.flush();
    }
}

/// Progress sink that discards updates.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_advance(&mut self, _elapsed: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00.000");
    }

    #[test]
    fn formats_subsecond_millis() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "00:00:00.250");
    }

    #[test]
    fn rolls_over_minutes_and_hours() {
        let elapsed = Duration::from_millis(3_661_500);
        assert_eq!(format_elapsed(elapsed), "01:01:01.500");
    }

    #[test]
    fn one_second_of_frames_at_48khz() {
        let elapsed = Duration::from_secs_f64(48000.0 / 48000.0);
        assert_eq!(format_elapsed(elapsed), "00:00:01.000");
    }
}
