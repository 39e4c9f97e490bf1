use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

/// Two-signal rendezvous between an asynchronous stop request and the
/// capture loop.
///
/// `stop_requested` and `stop_completed` each transition false→true exactly
/// once, and `stop_requested` is observed strictly before `stop_completed`
/// is raised. The requesting side (typically a console-interrupt handler)
/// blocks in [`request_stop`] until the loop has drained and finalized the
/// file, so the handler cannot return while the recording is still open.
///
/// [`request_stop`]: ShutdownCoordinator::request_stop
pub struct ShutdownCoordinator {
    stop_requested: AtomicBool,
    completed: Mutex<bool>,
    completed_signal: Condvar,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            completed: Mutex::new(false),
            completed_signal: Condvar::new(),
        }
    }

    /// Ask the capture loop to stop and block until it has finalized.
    ///
    /// Safe to call at any point in the session lifecycle — before the loop
    /// has started streaming, concurrently with a poll cycle, or after
    /// completion (returns immediately). Safe to call from several threads;
    /// all callers are released together.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);

        let mut completed = self.completed.lock();
        while !*completed {
            self.completed_signal.wait(&mut completed);
        }
    }

    /// Whether a stop has been requested. Never blocks.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Release every blocked requester. Called once by the capture loop
    /// after the file is finalized.
    pub fn mark_completed(&self) {
        let mut completed = self.completed.lock();
        *completed = true;
        self.completed_signal.notify_all();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
