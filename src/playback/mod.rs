//! Playback of response audio: device abstraction, gapless scheduler and the
//! speaker output.

pub mod device;
pub mod scheduler;
#[cfg(feature = "cpal-audio")]
pub mod speaker;

pub use device::{ManualPlayback, PlaybackDevice, ScheduledSource, SourceId};
pub use scheduler::{PlaybackScheduler, Scheduled};
#[cfg(feature = "cpal-audio")]
pub use speaker::{CpalPlayback, list_output_devices};
