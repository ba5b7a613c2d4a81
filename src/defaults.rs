//! Default configuration constants for lingo.
//!
//! Shared by the config layer, the audio pipeline and the live session so the
//! wire format and the device setup never drift apart.

/// Microphone capture rate in Hz.
///
/// The live endpoint expects 16 kHz mono PCM on the uplink.
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Rate of the audio the model streams back, in Hz.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Channel count of response audio.
pub const OUTPUT_CHANNELS: u16 = 1;

/// Number of samples per captured chunk sent upstream.
///
/// 4096 samples at 16 kHz is 256 ms of audio per message.
pub const CHUNK_SAMPLES: usize = 4096;

/// MIME descriptor attached to every uplink audio chunk.
pub const PCM_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Live API websocket endpoint (BidiGenerateContent).
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Native-audio model used for the conversation.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Prebuilt voice the model answers with.
pub const DEFAULT_VOICE: &str = "Kore";

/// How long the websocket handshake plus session setup may take.
pub const CONNECT_TIMEOUT: &str = "15s";

/// Name of the single tool the model may call.
pub const DISPLAY_SCHEME_TOOL: &str = "display_scheme";

/// Result text sent back for every `display_scheme` call.
pub const TOOL_ACK_MESSAGE: &str = "Scheme card with eligibility details displayed successfully.";

/// User-facing message for transport failures.
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error. Please try again.";

/// User-facing message when session start fails without a better description.
pub const START_FAILED_MESSAGE: &str = "Failed to start session";

/// How often the session loop collects finished playback buffers.
pub const PLAYBACK_POLL_MS: u64 = 20;

/// How often the capture thread drains the input device.
pub const CAPTURE_POLL_MS: u64 = 16;
