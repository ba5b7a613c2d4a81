//! Interactive talk loop.
//!
//! Enter starts a call, Enter again ends it, Ctrl-C ends any call and
//! quits. Each call gets a fresh output stream, input source and session;
//! UI events are rendered on their own thread.

use crate::audio::capture::{CpalAudioSource, suppress_audio_warnings};
use crate::audio::source::AudioSource;
use crate::audio::wav::WavAudioSource;
use crate::config::Config;
use crate::error::{LingoError, Result};
use crate::live::transport::GeminiTransport;
use crate::output::Renderer;
use crate::playback::speaker::CpalPlayback;
use crate::session::controller::Session;
use crate::session::events::UiEvent;
use crate::session::runner::SessionRunner;
use crate::session::state::SessionStatus;
use crossbeam_channel::Sender;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::thread;
use tokio::sync::{mpsc, watch};

/// Command-line overrides for the talk loop.
#[derive(Debug, Clone, Default)]
pub struct TalkOptions {
    pub device: Option<String>,
    pub output_device: Option<String>,
    /// Stream this WAV file instead of the microphone.
    pub input: Option<PathBuf>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub quiet: bool,
}

impl TalkOptions {
    fn apply(&self, config: &mut Config) {
        if let Some(d) = &self.device {
            config.audio.input_device = Some(d.clone());
        }
        if let Some(d) = &self.output_device {
            config.audio.output_device = Some(d.clone());
        }
        if let Some(m) = &self.model {
            config.session.model = m.clone();
        }
        if let Some(v) = &self.voice {
            config.session.voice = v.clone();
        }
    }
}

/// What the user asked for while a call was running.
enum Request {
    Hangup,
    Quit,
}

/// Run the talk loop until Ctrl-C or end of input.
pub async fn run_talk_command(mut config: Config, options: TalkOptions) -> Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();
    options.apply(&mut config);

    let api_key = require_api_key(&config)?;
    let setup = config.live_setup()?;
    let connect_timeout = config.connect_timeout()?;
    let capture = config.capture_config();

    let (ui_tx, ui_rx) = crossbeam_channel::unbounded::<UiEvent>();
    let color = std::io::stdout().is_terminal();
    let quiet = options.quiet;
    let render_thread = thread::Builder::new()
        .name("lingo-ui".to_string())
        .spawn(move || {
            let mut renderer = Renderer::new(quiet, color);
            for event in ui_rx {
                let result = renderer.render(
                    &event,
                    &mut std::io::stdout().lock(),
                    &mut std::io::stderr().lock(),
                );
                if let Err(e) = result {
                    tracing::warn!(error = %e, "terminal output failed");
                    break;
                }
            }
        })?;

    let mut enter = spawn_line_reader()?;
    emit(&ui_tx, UiEvent::StateChanged(SessionStatus::Idle));

    loop {
        tokio::select! {
            line = enter.recv() => if line.is_none() { break },
            _ = tokio::signal::ctrl_c() => break,
        }

        let (playback, source) = match open_devices(&config, &options) {
            Ok(devices) => devices,
            Err(e) => {
                tracing::error!(error = %e, "could not open audio devices");
                emit(&ui_tx, UiEvent::Error(e.user_message()));
                emit(&ui_tx, UiEvent::StateChanged(SessionStatus::Idle));
                continue;
            }
        };

        let transport = GeminiTransport::new(&config.session.endpoint, &api_key, connect_timeout);
        let runner = SessionRunner::new(transport, setup.clone())
            .with_capture_config(capture.clone())
            .with_connect_timeout(connect_timeout);
        let mut session = Session::new(playback, ui_tx.clone());
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut request = None;
        let outcome = {
            let run = runner.run(&mut session, source, stop_rx);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    outcome = &mut run => break outcome,
                    line = enter.recv(), if request.is_none() => {
                        request = Some(if line.is_some() { Request::Hangup } else { Request::Quit });
                        stop_tx.send_replace(true);
                    }
                    _ = tokio::signal::ctrl_c() => {
                        request = Some(Request::Quit);
                        stop_tx.send_replace(true);
                    }
                }
            }
        };

        tracing::info!(?outcome, "call ended");
        if matches!(request, Some(Request::Quit)) {
            break;
        }
    }

    drop(ui_tx);
    if render_thread.join().is_err() {
        tracing::warn!("ui thread panicked");
    }
    Ok(())
}

fn require_api_key(config: &Config) -> Result<String> {
    config
        .session
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| LingoError::ConfigInvalidValue {
            key: "session.api_key".to_string(),
            message: "not set (export LINGO_API_KEY or run `lingo config set session.api_key ...`)"
                .to_string(),
        })
}

fn open_devices(
    config: &Config,
    options: &TalkOptions,
) -> Result<(CpalPlayback, Box<dyn AudioSource>)> {
    let playback = CpalPlayback::open(
        config.audio.output_device.as_deref(),
        config.audio.output_sample_rate,
    )?;
    let source: Box<dyn AudioSource> = match &options.input {
        Some(path) => Box::new(WavAudioSource::open(path)?),
        None => Box::new(CpalAudioSource::new(
            config.audio.input_device.as_deref(),
            config.audio.input_sample_rate,
        )?),
    };
    Ok((playback, source))
}

/// Forward each stdin line as one key press; the channel closes on EOF.
fn spawn_line_reader() -> Result<mpsc::UnboundedReceiver<()>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("lingo-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn emit(ui: &Sender<UiEvent>, event: UiEvent) {
    if ui.send(event).is_err() {
        tracing::debug!("ui thread gone, dropping event");
    }
}
