//! The live session: lifecycle state, the controller that reacts to inbound
//! events, and the async runner that feeds it.

pub mod controller;
pub mod events;
pub mod runner;
pub mod state;

pub use controller::{Flow, Session};
pub use events::{SessionEvent, UiEvent};
pub use runner::{Outcome, SessionRunner};
pub use state::{SessionState, SessionStatus};
