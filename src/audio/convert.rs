//! Sample format helpers shared by capture, WAV input and playback.

/// Convert one i16 sample to float in [-1.0, 1.0).
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Mix interleaved multi-channel audio down to mono by averaging channels.
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Simple linear interpolation resampling of mono audio.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            match (samples.get(source_idx), samples.get(source_idx + 1)) {
                (Some(&left), Some(&right)) => left + (right - left) * fraction,
                (Some(&left), None) => left,
                _ => samples[samples.len() - 1],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_conversion_is_normalized() {
        assert_eq!(i16_to_f32(0), 0.0);
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert_eq!(i16_to_f32(16384), 0.5);
    }

    #[test]
    fn mono_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(mix_to_mono(&samples, 1), samples);
    }

    #[test]
    fn stereo_averages_pairs() {
        let mono = mix_to_mono(&[0.2, 0.4, -0.5, 0.5], 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);
    }

    #[test]
    fn same_rate_is_identity() {
        let samples = vec![0.1, 0.2];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn downsample_48k_to_16k_keeps_duration() {
        let out = resample(&vec![0.25; 48000], 48000, 16000);
        assert_eq!(out.len(), 16000);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn upsample_interpolates() {
        let out = resample(&[0.0, 1.0], 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert_eq!(out[3], 1.0);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample(&[], 44100, 16000).is_empty());
    }
}
