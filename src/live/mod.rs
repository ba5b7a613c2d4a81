//! Client side of the Gemini Live streaming session.

pub mod protocol;
pub mod transport;

pub use protocol::{ClientMessage, FunctionCall, FunctionResponse, ServerMessage, Setup};
pub use transport::{
    GeminiTransport, MockTransport, RemoteEnd, SessionLink, Transport, TransportEvent,
};
