//! Session state machine.
//!
//! Consumes typed [`SessionEvent`]s one at a time and drives the capture
//! pipeline, the playback scheduler, the displayed scheme and the UI. Every
//! method runs to completion without blocking on I/O, so the async runner
//! can call it straight from its event loop.

use crate::audio::decoder::{decode_base64, decode_pcm16};
use crate::catalog::{DisplaySchemeArgs, DisplayedScheme};
use crate::defaults;
use crate::error::{LingoError, Result};
use crate::live::protocol::{ClientMessage, FunctionCall, FunctionResponse, pcm_rate};
use crate::pipeline::capture::CapturePipeline;
use crate::playback::device::PlaybackDevice;
use crate::playback::scheduler::PlaybackScheduler;
use crate::session::events::{SessionEvent, UiEvent};
use crate::session::state::{SessionState, SessionStatus};
use crossbeam_channel::Sender;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Whether the event loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished,
}

/// One live conversation and everything it owns.
pub struct Session<D: PlaybackDevice> {
    state: SessionState,
    device: D,
    scheduler: PlaybackScheduler,
    ui: Sender<UiEvent>,
    outbound: Option<UnboundedSender<ClientMessage>>,
    capture: Option<CapturePipeline>,
    displayed: Option<DisplayedScheme>,
    transcription: String,
    response_transcription: String,
    output_channels: u16,
}

impl<D: PlaybackDevice> Session<D> {
    pub fn new(device: D, ui: Sender<UiEvent>) -> Self {
        Self {
            state: SessionState::Idle,
            device,
            scheduler: PlaybackScheduler::new(),
            ui,
            outbound: None,
            capture: None,
            displayed: None,
            transcription: String::new(),
            response_transcription: String::new(),
            output_channels: defaults::OUTPUT_CHANNELS,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn displayed_scheme(&self) -> Option<&DisplayedScheme> {
        self.displayed.as_ref()
    }

    /// User transcription of the current turn.
    pub fn transcription(&self) -> &str {
        &self.transcription
    }

    /// Model transcription of the current turn.
    pub fn response_transcription(&self) -> &str {
        &self.response_transcription
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Enter `connecting`. Only valid from `idle` or `error`.
    pub fn begin_connect(&mut self) -> Result<()> {
        if self.state.is_active() {
            return Err(LingoError::Other("a session is already active".to_string()));
        }
        self.transcription.clear();
        self.response_transcription.clear();
        self.set_state(SessionState::Connecting);
        Ok(())
    }

    /// Hand over the acquired input device. It is released again if the
    /// session is no longer connecting.
    pub fn attach_capture(&mut self, mut capture: CapturePipeline) {
        if self.state != SessionState::Connecting {
            if let Err(e) = capture.stop() {
                warn!(error = %e, "failed to release audio input");
            }
            return;
        }
        self.capture = Some(capture);
    }

    /// The transport is up; outbound messages go to `outbound`.
    ///
    /// The session is not open until `setupComplete` arrives.
    pub fn connected(&mut self, outbound: UnboundedSender<ClientMessage>) {
        if self.state == SessionState::Connecting {
            self.outbound = Some(outbound);
        }
    }

    /// Process one inbound event.
    pub fn handle_event(&mut self, event: SessionEvent) -> Flow {
        if !self.state.is_active() {
            debug!(?event, "ignoring event outside an active session");
            return Flow::Finished;
        }

        match event {
            SessionEvent::SetupComplete => return self.on_open(),
            SessionEvent::Audio { data, mime_type } => self.on_audio(&data, mime_type.as_deref()),
            SessionEvent::Interrupted => self.on_interrupted(),
            SessionEvent::InputTranscription(text) => {
                if !text.is_empty() {
                    if !self.transcription.is_empty() {
                        self.transcription.push(' ');
                    }
                    self.transcription.push_str(&text);
                    self.emit(UiEvent::Transcription(self.transcription.clone()));
                }
            }
            SessionEvent::OutputTranscription(text) => {
                if !text.is_empty() {
                    self.response_transcription.push_str(&text);
                    self.emit(UiEvent::ResponseTranscription(
                        self.response_transcription.clone(),
                    ));
                }
            }
            SessionEvent::TurnComplete => self.clear_transcriptions(),
            SessionEvent::ToolCall(call) => self.on_tool_call(call),
            SessionEvent::ToolCallCancellation(ids) => {
                info!(?ids, "server cancelled tool calls");
            }
            SessionEvent::GoAway { time_left } => {
                warn!(?time_left, "server is about to close the session");
            }
            SessionEvent::Closed { reason } => {
                info!(?reason, "session closed remotely");
                self.teardown();
                self.set_state(SessionState::Idle);
                return Flow::Finished;
            }
            SessionEvent::TransportError(message) => {
                self.fail(&LingoError::Transport { message });
                return Flow::Finished;
            }
        }
        Flow::Continue
    }

    /// Collect buffers that finished playing.
    pub fn poll_playback(&mut self) {
        let mut emptied = false;
        for id in self.device.take_finished() {
            emptied |= self.scheduler.on_ended(id);
        }
        if self.state.is_open() {
            let next = SessionState::open_with(self.scheduler.active_count());
            if emptied {
                debug!("playback drained");
            }
            self.set_state(next);
        }
    }

    /// Surface a capture thread failure. Returns `Finished` if one occurred.
    pub fn check_capture(&mut self) -> Flow {
        let failure = self.capture.as_ref().and_then(|c| c.take_failure());
        match failure {
            Some(message) => {
                self.fail(&LingoError::AudioCapture { message });
                Flow::Finished
            }
            None => Flow::Continue,
        }
    }

    /// Move to `error` with the error's user-facing message.
    pub fn fail(&mut self, error: &LingoError) {
        tracing::error!(%error, "session failed");
        let message = error.user_message();
        self.teardown();
        self.set_state(SessionState::Error {
            message: message.clone(),
        });
        self.emit(UiEvent::Error(message));
    }

    /// Explicit stop: close the transport, release the microphone, drop all
    /// queued audio and clear the card. Valid from any state.
    pub fn stop(&mut self) {
        self.teardown();
        if self.displayed.take().is_some() {
            self.emit(UiEvent::SchemeCleared);
        }
        self.set_state(SessionState::Idle);
    }

    /// Clear the displayed scheme; audio is unaffected.
    pub fn dismiss_scheme(&mut self) {
        if self.displayed.take().is_some() {
            self.emit(UiEvent::SchemeCleared);
        }
    }

    fn on_open(&mut self) -> Flow {
        if self.state != SessionState::Connecting {
            return Flow::Continue;
        }
        let started = match (self.capture.as_mut(), self.outbound.as_ref()) {
            (Some(capture), Some(outbound)) => capture.begin_streaming(outbound.clone()),
            _ => Ok(()),
        };
        if let Err(e) = started {
            self.fail(&e);
            return Flow::Finished;
        }
        info!("live session open");
        self.set_state(SessionState::open_with(self.scheduler.active_count()));
        Flow::Continue
    }

    fn on_audio(&mut self, data: &str, mime_type: Option<&str>) {
        if !self.state.is_open() {
            debug!("ignoring audio before the session is open");
            return;
        }

        let buffer = match decode_base64(data)
            .and_then(|bytes| decode_pcm16(&bytes, pcm_rate(mime_type), self.output_channels))
        {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(error = %e, "dropping undecodable response audio");
                return;
            }
        };
        if buffer.is_empty() {
            return;
        }

        match self.scheduler.schedule(&mut self.device, buffer) {
            Ok(scheduled) => {
                if scheduled.became_active {
                    debug!(start = scheduled.start, "response audio started");
                }
                self.set_state(SessionState::open_with(self.scheduler.active_count()));
            }
            Err(e) => warn!(error = %e, "failed to schedule response audio"),
        }
    }

    fn on_interrupted(&mut self) {
        let stopped = self.scheduler.interrupt(&mut self.device);
        info!(stopped, "response interrupted");
        if self.state.is_open() {
            self.set_state(SessionState::Listening);
        }
    }

    fn on_tool_call(&mut self, call: FunctionCall) {
        if call.name != defaults::DISPLAY_SCHEME_TOOL {
            warn!(name = %call.name, "model called an unknown function");
            let message = format!("unknown function {}", call.name);
            self.send(ClientMessage::tool_response(FunctionResponse::error(
                &call, &message,
            )));
            return;
        }

        match DisplaySchemeArgs::from_value(&call.args) {
            Ok(args) => {
                let requested = args.scheme_id.clone();
                match DisplayedScheme::resolve(args) {
                    Some(shown) => {
                        info!(scheme = shown.id(), "displaying scheme");
                        self.displayed = Some(shown.clone());
                        self.emit(UiEvent::SchemeDisplayed(shown));
                    }
                    None => debug!(?requested, "no catalog entry for requested scheme"),
                }
            }
            Err(e) => warn!(error = %e, "ignoring malformed display_scheme call"),
        }

        // Always acknowledged so the remote turn can continue.
        self.send(ClientMessage::tool_response(FunctionResponse::success(
            &call,
            defaults::TOOL_ACK_MESSAGE,
        )));
    }

    fn clear_transcriptions(&mut self) {
        if !self.transcription.is_empty() {
            self.transcription.clear();
            self.emit(UiEvent::Transcription(String::new()));
        }
        if !self.response_transcription.is_empty() {
            self.response_transcription.clear();
            self.emit(UiEvent::ResponseTranscription(String::new()));
        }
    }

    /// Release everything the session owns except the displayed scheme.
    fn teardown(&mut self) {
        self.outbound = None;
        if let Some(mut capture) = self.capture.take()
            && let Err(e) = capture.stop()
        {
            warn!(error = %e, "failed to release audio input");
        }
        self.scheduler.interrupt(&mut self.device);
        self.clear_transcriptions();
    }

    fn send(&self, message: ClientMessage) {
        match &self.outbound {
            Some(outbound) => {
                if outbound.send(message).is_err() {
                    warn!("transport gone, dropping outbound message");
                }
            }
            None => debug!("no transport, dropping outbound message"),
        }
    }

    fn set_state(&mut self, next: SessionState) {
        let before = self.state.status();
        self.state = next;
        let after = self.state.status();
        if before != after {
            info!(from = %before, to = %after, "session state");
            self.emit(UiEvent::StateChanged(after));
        }
    }

    fn emit(&self, event: UiEvent) {
        if self.ui.send(event).is_err() {
            debug!("UI receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoder::create_pcm_blob;
    use crate::live::protocol::ServerMessage;
    use crate::playback::device::ManualPlayback;
    use crossbeam_channel::{Receiver, unbounded};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Harness {
        session: Session<ManualPlayback>,
        ui: Receiver<UiEvent>,
        sent: mpsc::UnboundedReceiver<ClientMessage>,
    }

    impl Harness {
        fn open() -> Self {
            Self::open_on(ManualPlayback::new())
        }

        fn open_on(device: ManualPlayback) -> Self {
            let (ui_tx, ui) = unbounded();
            let (tx, sent) = mpsc::unbounded_channel();
            let mut session = Session::new(device, ui_tx);
            session.begin_connect().unwrap();
            session.connected(tx);
            assert_eq!(session.handle_event(SessionEvent::SetupComplete), Flow::Continue);
            Self { session, ui, sent }
        }

        fn ui_events(&self) -> Vec<UiEvent> {
            self.ui.try_iter().collect()
        }

        fn sent(&mut self) -> Vec<ClientMessage> {
            let mut out = Vec::new();
            while let Ok(m) = self.sent.try_recv() {
                out.push(m);
            }
            out
        }

        fn audio(&mut self, seconds: f64) -> Flow {
            let samples = vec![0.25; (seconds * 24000.0).round() as usize];
            self.session.handle_event(SessionEvent::Audio {
                data: create_pcm_blob(&samples).data,
                mime_type: Some("audio/pcm;rate=24000".to_string()),
            })
        }
    }

    fn display_call(args: serde_json::Value) -> SessionEvent {
        SessionEvent::ToolCall(FunctionCall {
            id: Some("fc-1".to_string()),
            name: "display_scheme".to_string(),
            args,
        })
    }

    #[test]
    fn lifecycle_idle_connecting_listening() {
        let (ui_tx, ui) = unbounded();
        let mut session = Session::new(ManualPlayback::new(), ui_tx);
        assert_eq!(session.status(), SessionStatus::Idle);

        session.begin_connect().unwrap();
        assert_eq!(session.status(), SessionStatus::Connecting);
        session.handle_event(SessionEvent::SetupComplete);
        assert_eq!(session.status(), SessionStatus::Listening);

        let changes: Vec<_> = ui.try_iter().collect();
        assert_eq!(
            changes,
            vec![
                UiEvent::StateChanged(SessionStatus::Connecting),
                UiEvent::StateChanged(SessionStatus::Listening),
            ]
        );
    }

    #[test]
    fn second_start_is_rejected() {
        let mut h = Harness::open();
        assert!(h.session.begin_connect().is_err());
    }

    #[test]
    fn audio_before_open_is_ignored() {
        let (ui_tx, _ui) = unbounded();
        let mut session = Session::new(ManualPlayback::new(), ui_tx);
        session.begin_connect().unwrap();
        session.handle_event(SessionEvent::Audio {
            data: create_pcm_blob(&[0.5; 240]).data,
            mime_type: None,
        });
        assert!(!session.scheduler().is_active());
        assert_eq!(session.status(), SessionStatus::Connecting);
    }

    #[test]
    fn first_buffer_starts_speaking_and_last_end_returns_to_listening() {
        let mut h = Harness::open();
        h.audio(0.5);
        h.audio(0.5);
        assert!(matches!(
            h.session.state(),
            SessionState::Speaking { active } if active.get() == 2
        ));

        let scheduled = h.session.device().scheduled().to_vec();
        assert_eq!(scheduled[1].start, scheduled[0].end());

        h.session.device_mut().advance(0.6);
        h.session.poll_playback();
        assert_eq!(h.session.status(), SessionStatus::Speaking);

        h.session.device_mut().advance(0.5);
        h.session.poll_playback();
        assert_eq!(h.session.status(), SessionStatus::Listening);
    }

    #[test]
    fn interruption_empties_set_and_resets_clock() {
        let mut h = Harness::open_on(ManualPlayback::new().with_start_time(7.0));
        h.audio(1.0);
        h.audio(1.0);
        h.audio(1.0);
        h.session.device_mut().advance(0.25);

        h.session.handle_event(SessionEvent::Interrupted);
        assert!(!h.session.scheduler().is_active());
        assert_eq!(h.session.scheduler().next_start_time(), 7.25);
        assert_eq!(h.session.status(), SessionStatus::Listening);
        assert_eq!(h.session.device().stopped().len(), 3);

        // Audio after the interruption starts a fresh timeline.
        h.audio(0.5);
        let last = h.session.device().scheduled().last().cloned().unwrap();
        assert_eq!(last.start, 7.25);
    }

    #[test]
    fn malformed_audio_is_dropped_without_touching_playback() {
        let mut h = Harness::open();
        h.audio(0.5);
        let clock = h.session.scheduler().next_start_time();

        // Three bytes: odd length.
        h.session.handle_event(SessionEvent::Audio {
            data: "AAAA".to_string(),
            mime_type: None,
        });
        assert_eq!(h.session.scheduler().next_start_time(), clock);
        assert_eq!(h.session.scheduler().active_count(), 1);
        assert_eq!(h.session.status(), SessionStatus::Speaking);

        h.session.handle_event(SessionEvent::Audio {
            data: "!!not base64!!".to_string(),
            mime_type: None,
        });
        assert_eq!(h.session.scheduler().active_count(), 1);
    }

    #[test]
    fn empty_audio_is_not_scheduled() {
        let mut h = Harness::open();
        h.session.handle_event(SessionEvent::Audio {
            data: String::new(),
            mime_type: None,
        });
        assert!(h.session.device().scheduled().is_empty());
        assert_eq!(h.session.status(), SessionStatus::Listening);
    }

    #[test]
    fn known_scheme_is_displayed_and_acknowledged() {
        let mut h = Harness::open();
        h.ui_events();
        h.session.handle_event(display_call(json!({
            "schemeId": "pm-kisan",
            "translatedName": "PM-KISAN",
            "translatedExplanation": "x",
            "translatedEligibility": "y",
            "translatedChecklist": ["a", "b"]
        })));

        let shown = h.session.displayed_scheme().unwrap();
        assert_eq!(shown.checklist(), vec!["a", "b"]);
        assert!(matches!(&h.ui_events()[..], [UiEvent::SchemeDisplayed(s)] if s.id() == "pm-kisan"));

        let sent = h.sent();
        let ClientMessage::ToolResponse(reply) = &sent[0] else {
            panic!("expected tool response");
        };
        assert_eq!(reply.function_responses[0].id.as_deref(), Some("fc-1"));
        assert_eq!(reply.function_responses[0].name, "display_scheme");
        assert_eq!(
            reply.function_responses[0].response,
            json!({"result": "Scheme card with eligibility details displayed successfully."})
        );
    }

    #[test]
    fn unknown_scheme_is_acknowledged_without_display() {
        let mut h = Harness::open();
        h.ui_events();
        h.session
            .handle_event(display_call(json!({"schemeId": "not-a-real-scheme"})));
        assert!(h.session.displayed_scheme().is_none());
        assert!(h.ui_events().is_empty());
        assert_eq!(h.sent().len(), 1);
    }

    #[test]
    fn malformed_args_are_acknowledged_without_display() {
        let mut h = Harness::open();
        h.session
            .handle_event(display_call(json!({"schemeId": 42})));
        assert!(h.session.displayed_scheme().is_none());
        assert!(matches!(&h.sent()[..], [ClientMessage::ToolResponse(_)]));
    }

    #[test]
    fn mistyped_translation_still_displays_card() {
        let mut h = Harness::open();
        h.ui_events();
        h.session.handle_event(display_call(json!({
            "schemeId": "pm-kisan",
            "translatedName": "पीएम-किसान",
            "translatedExplanation": "x",
            "translatedEligibility": "y",
            "translatedChecklist": "Land Records, Aadhaar"
        })));

        let shown = h.session.displayed_scheme().unwrap();
        assert_eq!(shown.name(), "पीएम-किसान");
        assert_eq!(
            shown.checklist(),
            vec!["Land Records", "Aadhaar Card", "Bank Account Details"]
        );
        assert!(matches!(&h.ui_events()[..], [UiEvent::SchemeDisplayed(s)] if s.id() == "pm-kisan"));
        assert!(matches!(&h.sent()[..], [ClientMessage::ToolResponse(_)]));
    }

    #[test]
    fn unknown_function_gets_error_reply() {
        let mut h = Harness::open();
        h.session.handle_event(SessionEvent::ToolCall(FunctionCall {
            id: Some("x".to_string()),
            name: "book_appointment".to_string(),
            args: json!({}),
        }));
        let sent = h.sent();
        let ClientMessage::ToolResponse(reply) = &sent[0] else {
            panic!("expected tool response");
        };
        assert_eq!(
            reply.function_responses[0].response,
            json!({"error": "unknown function book_appointment"})
        );
    }

    #[test]
    fn transcription_accumulates_and_clears_on_turn_complete() {
        let mut h = Harness::open();
        h.ui_events();
        h.session
            .handle_event(SessionEvent::InputTranscription("main kisan".to_string()));
        h.session
            .handle_event(SessionEvent::InputTranscription("hoon".to_string()));
        h.session
            .handle_event(SessionEvent::OutputTranscription("Namaste".to_string()));
        assert_eq!(h.session.transcription(), "main kisan hoon");
        assert_eq!(h.session.response_transcription(), "Namaste");

        h.session.handle_event(SessionEvent::TurnComplete);
        assert_eq!(h.session.transcription(), "");
        let events = h.ui_events();
        assert_eq!(
            &events[events.len() - 2..],
            &[
                UiEvent::Transcription(String::new()),
                UiEvent::ResponseTranscription(String::new())
            ]
        );
    }

    #[test]
    fn explicit_stop_while_speaking_clears_everything() {
        let mut h = Harness::open();
        h.session.handle_event(display_call(json!({"schemeId": "pm-awas"})));
        h.audio(1.0);
        h.audio(1.0);
        assert_eq!(h.session.scheduler().active_count(), 2);

        h.session.stop();
        assert_eq!(h.session.status(), SessionStatus::Idle);
        assert!(!h.session.scheduler().is_active());
        assert!(h.session.displayed_scheme().is_none());
        assert_eq!(h.session.device().stopped().len(), 2);

        // Nothing is processed after stop.
        assert_eq!(h.audio(0.5), Flow::Finished);
        assert_eq!(h.session.device().scheduled().len(), 2);
        h.sent();
        h.session
            .handle_event(display_call(json!({"schemeId": "pm-kisan"})));
        assert!(h.session.displayed_scheme().is_none());
        assert!(h.sent().is_empty());
    }

    #[test]
    fn stop_is_safe_from_any_state() {
        let (ui_tx, _ui) = unbounded();
        let mut session = Session::new(ManualPlayback::new(), ui_tx);
        session.stop();
        assert_eq!(session.status(), SessionStatus::Idle);

        session.begin_connect().unwrap();
        session.stop();
        assert_eq!(session.status(), SessionStatus::Idle);

        session.begin_connect().unwrap();
        session.fail(&LingoError::SessionClosed);
        session.stop();
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn remote_close_goes_idle_and_keeps_card() {
        let mut h = Harness::open();
        h.session.handle_event(display_call(json!({"schemeId": "jan-dhan"})));
        h.audio(0.5);
        let flow = h.session.handle_event(SessionEvent::Closed { reason: None });
        assert_eq!(flow, Flow::Finished);
        assert_eq!(h.session.status(), SessionStatus::Idle);
        assert!(!h.session.scheduler().is_active());
        assert_eq!(h.session.displayed_scheme().unwrap().id(), "jan-dhan");
    }

    #[test]
    fn transport_error_enters_error_state_with_message() {
        let mut h = Harness::open();
        h.audio(0.5);
        h.ui_events();
        let flow = h
            .session
            .handle_event(SessionEvent::TransportError("reset".to_string()));
        assert_eq!(flow, Flow::Finished);
        assert_eq!(
            h.session.state().error_message(),
            Some("Connection error. Please try again.")
        );
        assert!(!h.session.scheduler().is_active());
        assert!(
            h.ui_events()
                .contains(&UiEvent::Error("Connection error. Please try again.".to_string()))
        );

        // Recoverable by starting again.
        assert!(h.session.begin_connect().is_ok());
    }

    #[test]
    fn dismiss_clears_card_but_not_audio() {
        let mut h = Harness::open();
        h.session.handle_event(display_call(json!({"schemeId": "pm-mudra"})));
        h.audio(0.5);
        h.session.dismiss_scheme();
        assert!(h.session.displayed_scheme().is_none());
        assert_eq!(h.session.status(), SessionStatus::Speaking);
    }

    #[test]
    fn server_message_drives_session_in_order() {
        let mut h = Harness::open();
        let blob = create_pcm_blob(&[0.1; 2400]).data;
        let message = ServerMessage::parse(&format!(
            r#"{{"serverContent": {{
                "modelTurn": {{"parts": [{{"inlineData": {{"mimeType": "audio/pcm;rate=24000", "data": "{blob}"}}}}]}},
                "interrupted": true
            }}}}"#
        ))
        .unwrap();
        for event in message.into_events() {
            h.session.handle_event(event);
        }
        // Audio first, then the interruption stops it.
        assert_eq!(h.session.device().scheduled().len(), 1);
        assert!(!h.session.scheduler().is_active());
        assert_eq!(h.session.status(), SessionStatus::Listening);
    }
}
