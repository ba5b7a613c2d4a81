//! WAV file audio source, streamed in place of the microphone.

use crate::audio::convert::{mix_to_mono, resample};
use crate::audio::source::AudioSource;
use crate::defaults::INPUT_SAMPLE_RATE;
use crate::error::{LingoError, Result};
use std::io::Read;
use std::path::Path;
use std::time::Instant;

/// Audio source that reads from WAV file data.
/// Supports arbitrary sample rates, channels and sample formats, converting
/// to 16kHz mono float.
///
/// By default samples are released at wall-clock speed so the remote side
/// hears the file as if it were spoken live.
pub struct WavAudioSource {
    samples: Vec<f32>,
    position: usize,
    chunk_size: usize,
    realtime: bool,
    started_at: Option<Instant>,
}

impl WavAudioSource {
    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| LingoError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        let raw_samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => wav_reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>(),
            hound::SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                wav_reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
            }
        }
        .map_err(|e| LingoError::AudioCapture {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

        let mono = mix_to_mono(&raw_samples, usize::from(spec.channels));
        let samples = resample(&mono, spec.sample_rate, INPUT_SAMPLE_RATE);

        Ok(Self {
            samples,
            position: 0,
            // 100ms chunks at 16kHz
            chunk_size: 1600,
            realtime: true,
            started_at: None,
        })
    }

    /// Open a WAV file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| LingoError::AudioCapture {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(Box::new(std::io::BufReader::new(file)))
    }

    /// Release samples as fast as they are read instead of at wall-clock speed.
    pub fn without_pacing(mut self) -> Self {
        self.realtime = false;
        self
    }

    /// Consume the source and return all samples as a single buffer.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Total length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(INPUT_SAMPLE_RATE)
    }

    fn readable_end(&self) -> usize {
        match (self.realtime, self.started_at) {
            (true, Some(started)) => {
                let due = (started.elapsed().as_secs_f64() * f64::from(INPUT_SAMPLE_RATE)) as usize;
                due.min(self.samples.len())
            }
            _ => (self.position + self.chunk_size).min(self.samples.len()),
        }
    }
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started_at = None;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<f32>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = self.readable_end();
        if end <= self.position {
            // Paced source with nothing due yet: hand out a minimal non-empty
            // slice so the caller does not mistake this for exhaustion.
            let next = (self.position + 1).min(self.samples.len());
            let chunk = self.samples[self.position..next].to_vec();
            self.position = next;
            return Ok(chunk);
        }

        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(chunk)
    }

    fn is_finite(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "wav"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn make_float_wav(sample_rate: u32, samples: &[f32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn from_reader_16khz_mono_normalizes_samples() {
        let wav_data = make_wav_data(16000, 1, &[16384, -16384, 0]);
        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();
        assert_eq!(source.into_samples(), vec![0.5, -0.5, 0.0]);
    }

    #[test]
    fn from_reader_stereo_downmixes_to_mono() {
        let wav_data = make_wav_data(16000, 2, &[16384, 0, -16384, -16384]);
        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();
        assert_eq!(source.into_samples(), vec![0.25, -0.5]);
    }

    #[test]
    fn from_reader_48khz_resamples_to_16khz() {
        let wav_data = make_wav_data(48000, 1, &vec![0i16; 48000]);
        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();
        assert!((source.duration_secs() - 1.0).abs() < 0.01);
    }

    #[test]
    fn from_reader_accepts_float_wav() {
        let wav_data = make_float_wav(16000, &[0.25, -0.75]);
        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();
        assert_eq!(source.into_samples(), vec![0.25, -0.75]);
    }

    #[test]
    fn from_reader_rejects_garbage() {
        let result = WavAudioSource::from_reader(Box::new(Cursor::new(b"not a wav".to_vec())));
        assert!(matches!(result, Err(LingoError::AudioCapture { .. })));
    }

    #[test]
    fn unpaced_reads_in_100ms_chunks_until_exhausted() {
        let wav_data = make_wav_data(16000, 1, &vec![0i16; 4000]);
        let mut source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data)))
            .unwrap()
            .without_pacing();
        source.start().unwrap();

        assert_eq!(source.read_samples().unwrap().len(), 1600);
        assert_eq!(source.read_samples().unwrap().len(), 1600);
        assert_eq!(source.read_samples().unwrap().len(), 800);
        assert!(source.read_samples().unwrap().is_empty());
        assert!(source.is_finite());
    }

    #[test]
    fn paced_read_never_reports_false_exhaustion() {
        let wav_data = make_wav_data(16000, 1, &vec![0i16; 16000]);
        let mut source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();
        source.start().unwrap();
        // Immediately after start almost nothing is due, but the read is not empty
        assert!(!source.read_samples().unwrap().is_empty());
    }
}
