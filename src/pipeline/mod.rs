//! Capture pipeline for the uplink.
//!
//! A single polling thread drains the audio source, cuts fixed-size chunks,
//! encodes them and queues them for the transport writer.

pub mod capture;

pub use capture::{CaptureConfig, CapturePipeline};
