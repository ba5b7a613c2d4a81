//! Error types for lingo.

use crate::defaults;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LingoError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Microphone access denied: {message}")]
    MicrophonePermissionDenied { message: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Playback errors
    #[error("Audio playback failed: {message}")]
    AudioPlayback { message: String },

    // Decoding errors
    #[error(
        "Malformed PCM payload: {len} bytes is not a multiple of {frame_bytes} bytes per frame ({channels} channel(s))",
        frame_bytes = frame_bytes(.channels)
    )]
    Decode { len: usize, channels: u16 },

    #[error("Invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),

    // Live session errors
    #[error("Failed to connect to live session: {message}")]
    Connect { message: String },

    #[error("Live session transport error: {message}")]
    Transport { message: String },

    #[error("Live session protocol error: {message}")]
    Protocol { message: String },

    #[error("Live session is closed")]
    SessionClosed,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl LingoError {
    /// Message suitable for the user-facing error slot of the session.
    ///
    /// Transport failures collapse to one fixed sentence; device and setup
    /// failures keep their own description.
    pub fn user_message(&self) -> String {
        match self {
            LingoError::Connect { .. }
            | LingoError::Transport { .. }
            | LingoError::Protocol { .. }
            | LingoError::SessionClosed => defaults::CONNECTION_ERROR_MESSAGE.to_string(),
            other => {
                let text = other.to_string();
                if text.is_empty() {
                    defaults::START_FAILED_MESSAGE.to_string()
                } else {
                    text
                }
            }
        }
    }
}

fn frame_bytes(channels: &u16) -> usize {
    2 * usize::from(*channels)
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LingoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = LingoError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = LingoError::ConfigInvalidValue {
            key: "audio.chunk_samples".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for audio.chunk_samples: must be positive"
        );
    }

    #[test]
    fn test_microphone_permission_denied_display() {
        let error = LingoError::MicrophonePermissionDenied {
            message: "Permission denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Microphone access denied: Permission denied"
        );
    }

    #[test]
    fn test_decode_display_reports_frame_size() {
        let mono = LingoError::Decode {
            len: 3,
            channels: 1,
        };
        assert_eq!(
            mono.to_string(),
            "Malformed PCM payload: 3 bytes is not a multiple of 2 bytes per frame (1 channel(s))"
        );

        let stereo = LingoError::Decode {
            len: 6,
            channels: 2,
        };
        assert!(stereo.to_string().contains("multiple of 4 bytes"));
    }

    #[test]
    fn test_transport_errors_map_to_connection_message() {
        let errors = [
            LingoError::Connect {
                message: "dns failure".to_string(),
            },
            LingoError::Transport {
                message: "reset by peer".to_string(),
            },
            LingoError::Protocol {
                message: "bad frame".to_string(),
            },
            LingoError::SessionClosed,
        ];
        for error in errors {
            assert_eq!(error.user_message(), "Connection error. Please try again.");
        }
    }

    #[test]
    fn test_device_errors_keep_their_message() {
        let error = LingoError::MicrophonePermissionDenied {
            message: "blocked by system settings".to_string(),
        };
        assert_eq!(
            error.user_message(),
            "Microphone access denied: blocked by system settings"
        );
    }

    #[test]
    fn test_empty_other_falls_back_to_start_failed() {
        let error = LingoError::Other(String::new());
        assert_eq!(error.user_message(), "Failed to start session");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: LingoError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: LingoError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_base64_error() {
        use base64::Engine;
        let b64_error = base64::engine::general_purpose::STANDARD
            .decode("not base64!!")
            .unwrap_err();
        let error: LingoError = b64_error.into();
        assert!(error.to_string().starts_with("Invalid base64 audio payload"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: LingoError = io_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<LingoError>();
        assert_sync::<LingoError>();
    }
}
