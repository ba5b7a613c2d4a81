use crate::error::{LingoError, Result};

/// Trait for audio input devices.
///
/// This trait allows swapping implementations (microphone, WAV file, mock).
/// Samples are mono floats at the capture rate.
pub trait AudioSource: Send {
    /// Acquire the device and start capturing.
    ///
    /// Permission or device failures surface here, before any session exists.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing and release the device.
    fn stop(&mut self) -> Result<()>;

    /// Drain the samples captured since the last call.
    fn read_samples(&mut self) -> Result<Vec<f32>>;

    /// Returns true if this source has finite data (file/pipe).
    /// Finite sources signal exhaustion by returning empty from `read_samples()`.
    fn is_finite(&self) -> bool {
        false
    }

    /// Name for logging.
    fn name(&self) -> &str {
        "audio source"
    }
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    reads: Vec<Vec<f32>>,
    repeat: Option<Vec<f32>>,
    should_fail_start: bool,
    should_deny_permission: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a mock that yields nothing.
    pub fn new() -> Self {
        Self {
            is_started: false,
            reads: Vec::new(),
            repeat: None,
            should_fail_start: false,
            should_deny_permission: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure a scripted sequence of reads; the source is finite and
    /// reports exhaustion once the script runs out.
    pub fn with_reads(mut self, reads: Vec<Vec<f32>>) -> Self {
        // Stored reversed so reads can be popped in order.
        self.reads = reads.into_iter().rev().collect();
        self
    }

    /// Configure the mock to return the same samples on every read (live source).
    pub fn with_samples(mut self, samples: Vec<f32>) -> Self {
        self.repeat = Some(samples);
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to behave like a denied microphone permission
    pub fn with_permission_denied(mut self) -> Self {
        self.should_deny_permission = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_deny_permission {
            return Err(LingoError::MicrophonePermissionDenied {
                message: self.error_message.clone(),
            });
        }
        if self.should_fail_start {
            return Err(LingoError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<f32>> {
        if self.should_fail_read {
            return Err(LingoError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        if let Some(samples) = &self.repeat {
            return Ok(samples.clone());
        }
        Ok(self.reads.pop().unwrap_or_default())
    }

    fn is_finite(&self) -> bool {
        self.repeat.is_none()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reads_come_back_in_order() {
        let mut source = MockAudioSource::new().with_reads(vec![vec![0.1], vec![0.2, 0.3]]);
        source.start().unwrap();
        assert_eq!(source.read_samples().unwrap(), vec![0.1]);
        assert_eq!(source.read_samples().unwrap(), vec![0.2, 0.3]);
        assert!(source.read_samples().unwrap().is_empty());
        assert!(source.is_finite());
    }

    #[test]
    fn repeating_source_is_live() {
        let mut source = MockAudioSource::new().with_samples(vec![0.5; 4]);
        assert!(!source.is_finite());
        assert_eq!(source.read_samples().unwrap().len(), 4);
        assert_eq!(source.read_samples().unwrap().len(), 4);
    }

    #[test]
    fn start_stop_toggle_state() {
        let mut source = MockAudioSource::new();
        assert!(!source.is_started());
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn permission_denial_is_reported_on_start() {
        let mut source = MockAudioSource::new()
            .with_permission_denied()
            .with_error_message("Permission denied");
        match source.start() {
            Err(LingoError::MicrophonePermissionDenied { message }) => {
                assert_eq!(message, "Permission denied");
            }
            other => panic!("expected permission error, got {:?}", other),
        }
        assert!(!source.is_started());
    }

    #[test]
    fn read_failure_is_reported() {
        let mut source = MockAudioSource::new().with_read_failure();
        assert!(matches!(
            source.read_samples(),
            Err(LingoError::AudioCapture { .. })
        ));
    }

    #[test]
    fn can_be_used_as_trait_object() {
        let mut source: Box<dyn AudioSource> = Box::new(MockAudioSource::new());
        assert!(source.start().is_ok());
        assert!(source.read_samples().is_ok());
        assert!(source.stop().is_ok());
    }
}
