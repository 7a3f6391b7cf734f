/// Loopback service state machine.
///
/// State transitions:
/// ```text
/// uninitialized → idle → recording ⇄ idle → uninitialized
/// ```
///
/// `Idle` and `Recording` both hold valid channel handles. Starting from
/// `Uninitialized` reinitializes the channels first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopbackState {
    Uninitialized,
    Idle,
    Recording,
}

impl LoopbackState {
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn has_channels(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Idle => "idle",
            Self::Recording => "recording",
        }
    }
}
