use std::fmt;

/// Lifecycle of one recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No capture active, ready to start.
    #[default]
    Idle,
    /// `start()` issued, waiting on device/permission.
    Requesting,
    /// Capture active, blocks accumulating.
    Listening,
    /// Stop requested; converting, sending, and awaiting the result.
    Processing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Listening => "listening",
            Self::Processing => "processing",
        };
        f.write_str(s)
    }
}

/// Sole owner of the session state. Every transition is guarded here, so
/// "start while already listening" class bugs cannot occur elsewhere; other
/// components only read the current state.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: SessionState,
}

impl StateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == SessionState::Listening
    }

    /// Idle -> Requesting. Returns false (no-op) from any other state,
    /// which is what makes `start()` idempotent.
    pub fn begin_request(&mut self) -> bool {
        self.transition(SessionState::Idle, SessionState::Requesting)
    }

    /// Requesting -> Listening, once the device is acquired.
    pub fn begin_listening(&mut self) -> bool {
        self.transition(SessionState::Requesting, SessionState::Listening)
    }

    /// Requesting -> Idle on a failed start.
    pub fn fail_request(&mut self) -> bool {
        self.transition(SessionState::Requesting, SessionState::Idle)
    }

    /// Listening -> Processing. Guards duplicate stops: the first `stop()`
    /// moves to Processing, so a second one is a no-op.
    pub fn begin_processing(&mut self) -> bool {
        self.transition(SessionState::Listening, SessionState::Processing)
    }

    /// Processing -> Idle, after a result arrives or the send is skipped.
    pub fn finish(&mut self) -> bool {
        self.transition(SessionState::Processing, SessionState::Idle)
    }

    fn transition(&mut self, from: SessionState, to: SessionState) -> bool {
        if self.state != from {
            tracing::debug!("ignoring {from} -> {to} transition while {}", self.state);
            return false;
        }
        tracing::debug!("session state: {from} -> {to}");
        self.state = to;
        true
    }
}
