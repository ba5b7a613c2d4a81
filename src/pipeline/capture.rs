//! Capture pipeline: audio source -> fixed chunks -> PCM blobs -> uplink.
//!
//! The source is acquired when the session starts connecting, so a refused
//! microphone aborts startup before any remote session exists. Streaming
//! begins once the session is open and runs on its own polling thread until
//! [`CapturePipeline::stop`].

use crate::audio::chunker::FixedChunker;
use crate::audio::encoder::create_pcm_blob;
use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{LingoError, Result};
use crate::live::protocol::ClientMessage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Settings for the capture thread.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Samples per uplink message.
    pub chunk_samples: usize,
    /// Capture rate of the source.
    pub sample_rate: u32,
    /// How often the source is drained.
    pub poll_interval: Duration,
    /// After a finite source runs dry, keep sending silence so the remote
    /// side can detect the end of the utterance.
    pub silence_after_end: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_samples: defaults::CHUNK_SAMPLES,
            sample_rate: defaults::INPUT_SAMPLE_RATE,
            poll_interval: Duration::from_millis(defaults::CAPTURE_POLL_MS),
            silence_after_end: true,
        }
    }
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn AudioSource>>,
}

/// Owns the input device for the lifetime of one session.
pub struct CapturePipeline {
    config: CaptureConfig,
    source: Option<Box<dyn AudioSource>>,
    worker: Option<Worker>,
    chunks_sent: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
}

impl CapturePipeline {
    /// Start the source and hold it until streaming begins.
    ///
    /// Any failure here (permission refused, device missing) is returned
    /// as-is and nothing is kept open.
    pub fn acquire(mut source: Box<dyn AudioSource>, config: CaptureConfig) -> Result<Self> {
        source.start()?;
        tracing::info!(source = source.name(), "audio input acquired");
        Ok(Self {
            config,
            source: Some(source),
            worker: None,
            chunks_sent: Arc::new(AtomicU64::new(0)),
            failure: Arc::new(Mutex::new(None)),
        })
    }

    /// Spawn the polling thread feeding `outbound`.
    ///
    /// Audio a live device buffered while the session was connecting is
    /// discarded; finite sources keep theirs so nothing of the file is lost.
    pub fn begin_streaming(&mut self, outbound: UnboundedSender<ClientMessage>) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let mut source = self.source.take().ok_or_else(|| LingoError::AudioCapture {
            message: "capture pipeline already stopped".to_string(),
        })?;

        if !source.is_finite() {
            let stale = source.read_samples()?;
            tracing::debug!(samples = stale.len(), "discarded pre-session audio");
        }

        let running = Arc::new(AtomicBool::new(true));
        let ctx = WorkerContext {
            config: self.config.clone(),
            running: Arc::clone(&running),
            chunks_sent: Arc::clone(&self.chunks_sent),
            failure: Arc::clone(&self.failure),
            outbound,
        };

        let handle = thread::Builder::new()
            .name("lingo-capture".to_string())
            .spawn(move || ctx.run(source))
            .map_err(|e| LingoError::AudioCapture {
                message: format!("Failed to spawn capture thread: {}", e),
            })?;

        self.worker = Some(Worker { running, handle });
        tracing::info!(chunk_samples = self.config.chunk_samples, "streaming audio upstream");
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::SeqCst) && !w.handle.is_finished())
    }

    /// Number of chunks handed to the outbound queue so far.
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent.load(Ordering::SeqCst)
    }

    /// Fatal failure of the capture thread, reported once.
    pub fn take_failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|mut f| f.take())
    }

    /// Stop streaming and release the device. Safe to call repeatedly.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::SeqCst);
            match worker.handle.join() {
                Ok(source) => self.source = Some(source),
                Err(panic_info) => {
                    let msg = panic_info
                        .downcast_ref::<&str>()
                        .copied()
                        .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                        .unwrap_or("unknown panic");
                    tracing::error!(panic = msg, "capture thread panicked");
                }
            }
        }

        if let Some(mut source) = self.source.take() {
            source.stop()?;
            tracing::info!(source = source.name(), "audio input released");
        }
        Ok(())
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "failed to release audio input");
        }
    }
}

struct WorkerContext {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    chunks_sent: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
    outbound: UnboundedSender<ClientMessage>,
}

impl WorkerContext {
    fn run(self, mut source: Box<dyn AudioSource>) -> Box<dyn AudioSource> {
        let mut chunker = FixedChunker::new(self.config.chunk_samples);
        let silence_per_poll = (self.config.poll_interval.as_secs_f64()
            * f64::from(self.config.sample_rate))
        .round() as usize;
        let mut exhausted = false;

        while self.running.load(Ordering::SeqCst) {
            let samples = if exhausted {
                if !self.config.silence_after_end {
                    thread::sleep(self.config.poll_interval);
                    continue;
                }
                vec![0.0; silence_per_poll]
            } else {
                match source.read_samples() {
                    Ok(samples) => samples,
                    Err(e) => {
                        self.fail(source.name(), &e);
                        break;
                    }
                }
            };

            if samples.is_empty() && source.is_finite() && !exhausted {
                exhausted = true;
                tracing::info!(source = source.name(), "input exhausted");
                // The tail that never filled a chunk still carries speech.
                let tail_len = chunker.pending();
                if tail_len > 0 {
                    let tail = chunker.push(&vec![0.0; self.config.chunk_samples - tail_len]);
                    if !self.send_chunks(tail) {
                        break;
                    }
                }
                continue;
            }

            if !self.send_chunks(chunker.push(&samples)) {
                tracing::debug!("outbound queue closed, capture thread exiting");
                break;
            }

            thread::sleep(self.config.poll_interval);
        }

        self.running.store(false, Ordering::SeqCst);
        source
    }

    /// Encode and queue chunks in capture order. False once the queue is gone.
    fn send_chunks(&self, chunks: Vec<Vec<f32>>) -> bool {
        for chunk in chunks {
            let message = ClientMessage::audio(create_pcm_blob(&chunk));
            if self.outbound.send(message).is_err() {
                return false;
            }
            self.chunks_sent.fetch_add(1, Ordering::SeqCst);
        }
        true
    }

    /// Record a read failure; the thread stops after this.
    fn fail(&self, source: &str, error: &LingoError) {
        tracing::error!(source, %error, "audio capture failed");
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error.to_string());
        }
    }
}
