//! Output device abstraction for the playback scheduler.

use crate::audio::decoder::PlayableBuffer;
use crate::error::{LingoError, Result};
use std::collections::BTreeMap;

/// Identifier of one scheduled buffer.
pub type SourceId = u64;

/// An output device with its own clock that plays buffers at given times.
///
/// Times are seconds on the device clock. Buffers that reach their natural
/// end are reported through [`PlaybackDevice::take_finished`]; stopped
/// buffers are not.
pub trait PlaybackDevice {
    /// Current device time in seconds.
    fn current_time(&self) -> f64;

    /// Schedule `buffer` to start at device time `at`.
    fn start_source(&mut self, id: SourceId, buffer: PlayableBuffer, at: f64) -> Result<()>;

    /// Stop a buffer immediately, whether or not it has started.
    fn stop_source(&mut self, id: SourceId);

    /// Buffers that finished playing since the last call, in completion order.
    fn take_finished(&mut self) -> Vec<SourceId>;
}

/// A source as recorded by [`ManualPlayback`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub start: f64,
    pub duration: f64,
}

impl ScheduledSource {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Device with a hand-driven clock, for tests and offline runs.
///
/// Nothing is audible; [`ManualPlayback::advance`] moves the clock and
/// completes every buffer whose end time has passed.
#[derive(Debug, Default)]
pub struct ManualPlayback {
    now: f64,
    scheduled: Vec<ScheduledSource>,
    playing: BTreeMap<SourceId, ScheduledSource>,
    stopped: Vec<SourceId>,
    finished: Vec<SourceId>,
    fail_starts: bool,
}

impl ManualPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock somewhere other than zero.
    pub fn with_start_time(mut self, now: f64) -> Self {
        self.now = now;
        self
    }

    /// Make every `start_source` call fail.
    pub fn with_start_failure(mut self) -> Self {
        self.fail_starts = true;
        self
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds;
        let now = self.now;
        let mut done: Vec<&ScheduledSource> =
            self.playing.values().filter(|s| s.end() <= now).collect();
        done.sort_by(|a, b| a.end().total_cmp(&b.end()));
        let ids: Vec<SourceId> = done.iter().map(|s| s.id).collect();
        for id in ids {
            self.playing.remove(&id);
            self.finished.push(id);
        }
    }

    /// Every source ever started, in scheduling order.
    pub fn scheduled(&self) -> &[ScheduledSource] {
        &self.scheduled
    }

    /// Sources stopped before their natural end.
    pub fn stopped(&self) -> &[SourceId] {
        &self.stopped
    }

    /// Sources still due to play.
    pub fn playing(&self) -> usize {
        self.playing.len()
    }
}

impl PlaybackDevice for ManualPlayback {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn start_source(&mut self, id: SourceId, buffer: PlayableBuffer, at: f64) -> Result<()> {
        if self.fail_starts {
            return Err(LingoError::AudioPlayback {
                message: "output device unavailable".to_string(),
            });
        }
        let source = ScheduledSource {
            id,
            start: at,
            duration: buffer.duration(),
        };
        self.scheduled.push(source.clone());
        self.playing.insert(id, source);
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) {
        if self.playing.remove(&id).is_some() {
            self.stopped.push(id);
        }
    }

    fn take_finished(&mut self) -> Vec<SourceId> {
        std::mem::take(&mut self.finished)
    }
}
