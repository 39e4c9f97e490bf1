/// Capture loop state machine.
///
/// State transitions:
/// ```text
/// idle → negotiating → streaming → draining → finalized
///             ↓                        ↑
///             └── (stop before start) ─┘
/// ```
///
/// `Finalized` is terminal. No transition skips `Draining`: even an
/// error-driven exit stops the device and finalizes the file so partial
/// recordings remain playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Negotiating,
    Streaming,
    Draining,
    Finalized,
}

impl CaptureState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}
