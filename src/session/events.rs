//! Events flowing into and out of the session controller.

use crate::catalog::DisplayedScheme;
use crate::live::protocol::FunctionCall;
use crate::session::state::SessionStatus;

/// One typed inbound event, in the order the server delivered it.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The remote side accepted the setup; the session is open.
    SetupComplete,
    /// Base64 response audio with its MIME type.
    Audio {
        data: String,
        mime_type: Option<String>,
    },
    /// The user barged in over the current response.
    Interrupted,
    InputTranscription(String),
    OutputTranscription(String),
    TurnComplete,
    ToolCall(FunctionCall),
    /// The server withdrew earlier tool calls.
    ToolCallCancellation(Vec<String>),
    /// The server will drop the connection soon.
    GoAway {
        time_left: Option<String>,
    },
    /// The transport closed from the remote side.
    Closed {
        reason: Option<String>,
    },
    /// The transport failed mid-session.
    TransportError(String),
}

/// Everything the presentation layer needs to render the session.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    StateChanged(SessionStatus),
    SchemeDisplayed(DisplayedScheme),
    SchemeCleared,
    /// Accumulated user transcription; empty when cleared at turn end.
    Transcription(String),
    /// Accumulated model transcription; empty when cleared at turn end.
    ResponseTranscription(String),
    Error(String),
}
