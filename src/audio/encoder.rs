//! PCM encoder for the live session uplink.
//!
//! Converts float microphone samples into little-endian 16-bit PCM and wraps
//! the bytes as a base64 blob tagged with the uplink MIME type.

use crate::defaults::PCM_MIME_TYPE;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Encoded audio ready to be sent over the live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAudioBlob {
    /// Base64 of little-endian i16 samples.
    pub data: String,
    /// Rate and encoding descriptor, e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
}

impl WireAudioBlob {
    /// Number of PCM samples carried by this blob.
    pub fn sample_count(&self) -> usize {
        // 4 base64 chars encode 3 bytes; padding is subtracted.
        let padding = self.data.bytes().rev().take_while(|&b| b == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding) / 2
    }
}

/// Quantize one float sample to i16, clamping out-of-range input.
///
/// NaN maps to silence.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encode float samples as little-endian 16-bit PCM bytes.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&quantize(sample).to_le_bytes());
    }
    bytes
}

/// Encode float samples into a wire blob for the uplink.
///
/// Empty input yields an empty payload with the usual MIME type.
pub fn create_pcm_blob(samples: &[f32]) -> WireAudioBlob {
    WireAudioBlob {
        data: STANDARD.encode(encode_pcm16(samples)),
        mime_type: PCM_MIME_TYPE.to_string(),
    }
}
