//! lingo - voice companion for Indian government welfare schemes
//!
//! Streams the caller's speech to a live speech model, plays the spoken
//! answer back gaplessly, and shows a scheme card whenever the model matches
//! the caller to a scheme from the built-in catalog.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod live;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod playback;
pub mod session;

// Composition root - needs real devices and the terminal
#[cfg(all(feature = "cpal-audio", feature = "cli"))]
pub mod app;

// Seams
pub use audio::source::AudioSource;
pub use live::transport::Transport;
pub use playback::device::PlaybackDevice;

// Session
pub use session::{Outcome, Session, SessionRunner, SessionState, SessionStatus, UiEvent};

// Catalog
pub use catalog::{DisplayedScheme, Scheme};

// Error handling
pub use error::{LingoError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
