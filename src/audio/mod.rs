//! Audio plumbing: capture sources, PCM encoding for the uplink and decoding
//! of response audio.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod chunker;
pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod source;
pub mod wav;

#[cfg(feature = "cpal-audio")]
pub use capture::CpalAudioSource;
pub use chunker::FixedChunker;
pub use decoder::{PlayableBuffer, decode_base64, decode_pcm16};
pub use encoder::{WireAudioBlob, create_pcm_blob, encode_pcm16};
pub use source::{AudioSource, MockAudioSource};
pub use wav::WavAudioSource;
