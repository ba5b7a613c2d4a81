//! Speaker output through CPAL.
//!
//! One output stream runs for the whole session. Scheduled buffers become
//! voices on a sample-accurate timeline; the device clock is the number of
//! frames rendered so far divided by the stream rate.

use crate::audio::capture::with_suppressed_stderr;
use crate::audio::convert::{mix_to_mono, resample};
use crate::audio::decoder::PlayableBuffer;
use crate::error::{LingoError, Result};
use crate::playback::device::{PlaybackDevice, SourceId};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Finished ids waiting to be collected; the callback drops ids beyond this.
const FINISHED_CAPACITY: usize = 1024;

/// List output device names.
pub fn list_output_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().output_devices()).map_err(
        |e| LingoError::AudioPlayback {
            message: format!("Failed to enumerate output devices: {}", e),
        },
    )?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

struct Voice {
    id: SourceId,
    samples: Vec<f32>,
    start_frame: u64,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

struct Mixer {
    voices: Vec<Voice>,
    finished: Sender<SourceId>,
}

impl Mixer {
    /// Render `frames` frames starting at absolute frame `origin`.
    fn render(&mut self, out: &mut [f32], channels: usize, origin: u64) {
        out.fill(0.0);
        let frames = (out.len() / channels) as u64;
        let block_end = origin + frames;

        for voice in &self.voices {
            let from = voice.start_frame.max(origin);
            let to = voice.end_frame().min(block_end);
            for frame in from..to {
                let sample = voice.samples[(frame - voice.start_frame) as usize];
                let base = (frame - origin) as usize * channels;
                for out_sample in &mut out[base..base + channels] {
                    *out_sample += sample;
                }
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        let finished = &self.finished;
        self.voices.retain(|voice| {
            if voice.end_frame() <= block_end {
                // A full queue only happens if nobody collects; dropping is fine.
                finished.try_send(voice.id).ok();
                false
            } else {
                true
            }
        });
    }
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is created, played and dropped by the session that
/// owns it and never used concurrently.
struct SendableStream(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for SendableStream {}

/// Output device that plays scheduled buffers on the speakers.
pub struct CpalPlayback {
    _stream: SendableStream,
    mixer: Arc<Mutex<Mixer>>,
    frames_rendered: Arc<AtomicU64>,
    finished: Receiver<SourceId>,
    sample_rate: u32,
}

impl CpalPlayback {
    /// Open `device_name` (or the default output) and start the stream,
    /// preferring `preferred_rate` when the device supports it.
    pub fn open(device_name: Option<&str>, preferred_rate: u32) -> Result<Self> {
        let device = with_suppressed_stderr(|| find_output_device(device_name))?;
        let config = output_config(&device, preferred_rate)?;
        let channels = usize::from(config.channels);
        let sample_rate = config.sample_rate.0;

        let (finished_tx, finished) = bounded(FINISHED_CAPACITY);
        let mixer = Arc::new(Mutex::new(Mixer {
            voices: Vec::new(),
            finished: finished_tx,
        }));
        let frames_rendered = Arc::new(AtomicU64::new(0));

        let callback_mixer = Arc::clone(&mixer);
        let callback_frames = Arc::clone(&frames_rendered);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let origin = callback_frames.load(Ordering::Acquire);
                    match callback_mixer.try_lock() {
                        Ok(mut mixer) => mixer.render(data, channels, origin),
                        // Scheduling holds the lock briefly; one silent block is inaudible.
                        Err(_) => data.fill(0.0),
                    }
                    callback_frames.fetch_add((data.len() / channels) as u64, Ordering::Release);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| LingoError::AudioPlayback {
                message: format!("Failed to build output stream: {}", e),
            })?;

        stream.play().map_err(|e| LingoError::AudioPlayback {
            message: format!("Failed to start output stream: {}", e),
        })?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "audio playback initialized"
        );

        Ok(Self {
            _stream: SendableStream(stream),
            mixer,
            frames_rendered,
            finished,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn find_output_device(device_name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| LingoError::AudioPlayback {
                message: format!("Failed to enumerate output devices: {}", e),
            })?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or_else(|| LingoError::AudioDeviceNotFound {
                device: name.to_string(),
            }),
        None => host
            .default_output_device()
            .ok_or_else(|| LingoError::AudioDeviceNotFound {
                device: "default output".to_string(),
            }),
    }
}

/// Prefer f32 at the response rate, mono then stereo; otherwise take the
/// device default and resample in software.
fn output_config(device: &cpal::Device, preferred_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(preferred_rate);
    let supports = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate() <= rate
                && c.max_sample_rate() >= rate
        })
    };

    if let Some(supported) = supports(1).or_else(|| supports(2)) {
        return Ok(supported.with_sample_rate(rate).config());
    }

    let default = device
        .default_output_config()
        .map_err(|e| LingoError::AudioPlayback {
            message: format!("No usable output config: {}", e),
        })?;
    if default.sample_format() != cpal::SampleFormat::F32 {
        return Err(LingoError::AudioPlayback {
            message: format!(
                "Unsupported output sample format: {:?}. \
                 Try another device with --output-device.",
                default.sample_format()
            ),
        });
    }
    tracing::info!(
        sample_rate = default.sample_rate().0,
        channels = default.channels(),
        "output device does not run at the response rate, resampling"
    );
    Ok(default.config())
}

impl PlaybackDevice for CpalPlayback {
    fn current_time(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    fn start_source(&mut self, id: SourceId, buffer: PlayableBuffer, at: f64) -> Result<()> {
        let source_rate = buffer.sample_rate();
        let mono = mix_to_mono(buffer.samples(), usize::from(buffer.channels()));
        let samples = resample(&mono, source_rate, self.sample_rate);

        let requested = (at * f64::from(self.sample_rate)).round() as u64;
        let mut mixer = self.mixer.lock().map_err(|e| LingoError::AudioPlayback {
            message: format!("Failed to lock mixer: {}", e),
        })?;
        // Never schedule into a block that was already rendered.
        let start_frame = requested.max(self.frames_rendered.load(Ordering::Acquire));
        mixer.voices.push(Voice {
            id,
            samples,
            start_frame,
        });
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.voices.retain(|voice| voice.id != id);
        }
    }

    fn take_finished(&mut self) -> Vec<SourceId> {
        self.finished.try_iter().collect()
    }
}
