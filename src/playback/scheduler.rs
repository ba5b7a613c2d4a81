//! Gapless scheduling of response audio.
//!
//! Every buffer starts at `max(device time, next_start_time)` and pushes
//! `next_start_time` forward by its duration, so buffers play back to back in
//! arrival order however late each one was decoded. An interruption stops
//! everything and restarts the timeline from the device's current time.

use crate::audio::decoder::PlayableBuffer;
use crate::error::Result;
use crate::playback::device::{PlaybackDevice, SourceId};
use std::collections::BTreeSet;

/// Result of scheduling one buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    pub id: SourceId,
    /// Device time the buffer starts at.
    pub start: f64,
    pub duration: f64,
    /// True when this buffer made the active set non-empty.
    pub became_active: bool,
}

/// Owns the playback clock and the set of buffers still playing.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start_time: f64,
    active: BTreeSet<SourceId>,
    next_id: SourceId,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `buffer` right after everything already queued.
    ///
    /// If the device refuses the buffer, neither the clock nor the active
    /// set changes.
    pub fn schedule<D: PlaybackDevice + ?Sized>(
        &mut self,
        device: &mut D,
        buffer: PlayableBuffer,
    ) -> Result<Scheduled> {
        let start = self.next_start_time.max(device.current_time());
        let duration = buffer.duration();
        let id = self.next_id;

        device.start_source(id, buffer, start)?;

        self.next_id += 1;
        self.next_start_time = start + duration;
        let became_active = self.active.is_empty();
        self.active.insert(id);

        tracing::debug!(id, start, duration, active = self.active.len(), "scheduled buffer");
        Ok(Scheduled {
            id,
            start,
            duration,
            became_active,
        })
    }

    /// Record the natural end of a buffer.
    ///
    /// Returns true when this emptied the active set. Unknown ids (already
    /// stopped by an interruption) are ignored.
    pub fn on_ended(&mut self, id: SourceId) -> bool {
        self.active.remove(&id) && self.active.is_empty()
    }

    /// Stop every active buffer and restart the timeline at device time.
    ///
    /// Returns how many buffers were stopped.
    pub fn interrupt<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D) -> usize {
        let stopped = self.active.len();
        for id in std::mem::take(&mut self.active) {
            device.stop_source(id);
        }
        self.next_start_time = device.current_time();
        tracing::debug!(stopped, clock = self.next_start_time, "playback interrupted");
        stopped
    }

    /// Whether any buffer is scheduled and not yet finished.
    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.active.iter().copied()
    }

    /// Device time at which the next buffer would start if the device
    /// clock has not passed it.
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }
}
