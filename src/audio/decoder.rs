//! Decoder for response audio streamed back by the live session.

use crate::error::{LingoError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decoded float audio ready for the playback scheduler.
///
/// Samples are interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl PlayableBuffer {
    /// Build a buffer from interleaved samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// A buffer of `duration` seconds of silence.
    pub fn silence(duration: f64, sample_rate: u32, channels: u16) -> Self {
        let frames = (duration * f64::from(sample_rate)).round() as usize;
        Self::new(
            vec![0.0; frames * usize::from(channels.max(1))],
            sample_rate,
            channels,
        )
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples of a single channel, de-interleaved.
    pub fn channel(&self, index: u16) -> Vec<f32> {
        self.samples
            .iter()
            .skip(usize::from(index))
            .step_by(usize::from(self.channels))
            .copied()
            .collect()
    }
}

/// Decode little-endian 16-bit PCM into a playable buffer.
///
/// Each sample is divided by 32768. The payload must hold a whole number of
/// frames; a trailing partial frame is an error, never truncated.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<PlayableBuffer> {
    let frame_bytes = 2 * usize::from(channels);
    if channels == 0 || bytes.len() % frame_bytes != 0 {
        return Err(LingoError::Decode {
            len: bytes.len(),
            channels,
        });
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    Ok(PlayableBuffer::new(samples, sample_rate, channels))
}

/// Decode a base64 payload into raw bytes.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(data)?)
}
