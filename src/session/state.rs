//! Session lifecycle state.

use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;

/// The five lifecycle states shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Listening,
    Speaking,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Listening => "listening",
            SessionStatus::Speaking => "speaking",
            SessionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Full session state.
///
/// `Speaking` carries the number of response buffers still scheduled, so a
/// speaking session with nothing playing cannot be represented. `Error`
/// carries the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Listening,
    Speaking {
        active: NonZeroUsize,
    },
    Error {
        message: String,
    },
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Idle => SessionStatus::Idle,
            SessionState::Connecting => SessionStatus::Connecting,
            SessionState::Listening => SessionStatus::Listening,
            SessionState::Speaking { .. } => SessionStatus::Speaking,
            SessionState::Error { .. } => SessionStatus::Error,
        }
    }

    /// State for an open session with `active` buffers scheduled.
    pub fn open_with(active: usize) -> Self {
        match NonZeroUsize::new(active) {
            Some(active) => SessionState::Speaking { active },
            None => SessionState::Listening,
        }
    }

    /// Message of the `Error` state, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            SessionState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// True while a session is connecting or open.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Listening | SessionState::Speaking { .. }
        )
    }

    /// True once `setupComplete` has been received and until the session ends.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            SessionState::Listening | SessionState::Speaking { .. }
        )
    }
}
