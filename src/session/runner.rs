//! Async driver for one session.
//!
//! Acquires the input device, connects the transport, then feeds inbound
//! events, playback ticks and the stop signal to the [`Session`] one at a
//! time until the session ends.

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{LingoError, Result};
use crate::live::protocol::Setup;
use crate::live::transport::{Transport, TransportEvent};
use crate::pipeline::capture::{CaptureConfig, CapturePipeline};
use crate::playback::device::PlaybackDevice;
use crate::session::controller::{Flow, Session};
use crate::session::events::SessionEvent;
use crate::session::state::SessionState;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The user stopped the session.
    Stopped,
    /// The remote side closed the session.
    Closed,
    /// Startup or the session failed; the session is in `error`.
    Failed { message: String },
}

pub struct SessionRunner<T: Transport> {
    transport: T,
    setup: Setup,
    capture: CaptureConfig,
    poll_interval: Duration,
    connect_timeout: Duration,
}

impl<T: Transport> SessionRunner<T> {
    pub fn new(transport: T, setup: Setup) -> Self {
        Self {
            transport,
            setup,
            capture: CaptureConfig::default(),
            poll_interval: Duration::from_millis(defaults::PLAYBACK_POLL_MS),
            connect_timeout: humantime::parse_duration(defaults::CONNECT_TIMEOUT)
                .unwrap_or(Duration::from_secs(15)),
        }
    }

    pub fn with_capture_config(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Bound on handshake plus `setupComplete`.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Run one session to completion.
    ///
    /// `stop` becoming true (or its sender going away) is an explicit stop.
    pub async fn run<D: PlaybackDevice>(
        &self,
        session: &mut Session<D>,
        source: Box<dyn AudioSource>,
        mut stop: watch::Receiver<bool>,
    ) -> Outcome {
        if let Err(e) = session.begin_connect() {
            tracing::warn!(error = %e, "not starting session");
            return Outcome::Failed {
                message: e.user_message(),
            };
        }
        let deadline = tokio::time::Instant::now() + self.connect_timeout;

        // Opening the device can block on an OS permission prompt.
        let config = self.capture.clone();
        let mut acquiring =
            tokio::task::spawn_blocking(move || CapturePipeline::acquire(source, config));
        let acquired = tokio::select! {
            result = &mut acquiring => result,
            _ = stop_requested(&mut stop) => {
                tokio::spawn(release_when_acquired(acquiring));
                session.stop();
                return Outcome::Stopped;
            }
        };
        let capture = match acquired {
            Ok(Ok(capture)) => capture,
            Ok(Err(e)) => return fail(session, &e),
            Err(e) => return fail(session, &LingoError::AudioCapture {
                message: format!("audio setup task failed: {}", e),
            }),
        };
        session.attach_capture(capture);

        let connect = tokio::time::timeout_at(deadline, self.transport.connect(self.setup.clone()));
        let mut link = tokio::select! {
            result = connect => match result {
                Ok(Ok(link)) => link,
                Ok(Err(e)) => return fail(session, &e),
                Err(_) => return fail(session, &LingoError::Connect {
                    message: "timed out connecting".to_string(),
                }),
            },
            _ = stop_requested(&mut stop) => {
                session.stop();
                return Outcome::Stopped;
            }
        };
        session.connected(link.sender());

        let mut tick = tokio::time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                event = link.recv() => {
                    let events = match event {
                        Some(TransportEvent::Message(message)) => message.into_events(),
                        Some(TransportEvent::Closed { reason }) => vec![SessionEvent::Closed { reason }],
                        Some(TransportEvent::Error { message }) => vec![SessionEvent::TransportError(message)],
                        None => vec![SessionEvent::Closed { reason: None }],
                    };
                    // Later events of the same message are dropped once the session ends.
                    if events.into_iter().any(|e| session.handle_event(e) == Flow::Finished) {
                        break ended(session);
                    }
                }
                _ = tick.tick() => {
                    session.poll_playback();
                    if session.check_capture() == Flow::Finished {
                        break ended(session);
                    }
                }
                _ = tokio::time::sleep_until(deadline), if session.state() == &SessionState::Connecting => {
                    break fail(session, &LingoError::Connect {
                        message: "timed out waiting for session setup".to_string(),
                    });
                }
                _ = stop_requested(&mut stop) => {
                    session.stop();
                    break Outcome::Stopped;
                }
            }
        };

        link.close();
        tracing::info!(?outcome, "session ended");
        outcome
    }
}

fn fail<D: PlaybackDevice>(session: &mut Session<D>, error: &LingoError) -> Outcome {
    session.fail(error);
    ended(session)
}

fn ended<D: PlaybackDevice>(session: &Session<D>) -> Outcome {
    match session.state() {
        SessionState::Error { message } => Outcome::Failed {
            message: message.clone(),
        },
        _ => Outcome::Closed,
    }
}

/// Release an input that finished opening after the session was stopped.
async fn release_when_acquired(acquiring: JoinHandle<Result<CapturePipeline>>) {
    if let Ok(Ok(mut capture)) = acquiring.await
        && let Err(e) = capture.stop()
    {
        tracing::warn!(error = %e, "failed to release audio input");
    }
}

/// Resolves once a stop is requested or the requester is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}
