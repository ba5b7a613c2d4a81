//! JSON messages of the Gemini Live (BidiGenerateContent) websocket API.
//!
//! Client messages are externally tagged (`{"setup": {...}}`,
//! `{"realtimeInput": {...}}`, `{"toolResponse": {...}}`). Server messages
//! carry any combination of optional fields and are flattened into ordered
//! [`SessionEvent`]s.

use crate::audio::encoder::WireAudioBlob;
use crate::defaults;
use crate::error::{LingoError, Result};
use crate::session::events::SessionEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// Wrap one encoded audio chunk for the uplink.
    pub fn audio(blob: WireAudioBlob) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![blob],
        })
    }

    /// Reply to a single function call.
    pub fn tool_response(response: FunctionResponse) -> Self {
        ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![response],
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LingoError::Protocol {
            message: format!("Failed to encode client message: {}", e),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<AudioTranscriptionConfig>,
}

impl Setup {
    /// Audio-only setup with a prebuilt voice and a text system instruction.
    ///
    /// Bare model names get the `models/` prefix the API expects.
    pub fn new(model: &str, voice: &str, system_instruction: String) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        Self {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                }),
            },
            system_instruction: Content::text(system_instruction),
            tools: Vec::new(),
            input_audio_transcription: None,
            output_audio_transcription: None,
        }
    }

    pub fn with_function(mut self, declaration: FunctionDeclaration) -> Self {
        match self.tools.first_mut() {
            Some(tool) => tool.function_declarations.push(declaration),
            None => self.tools.push(Tool {
                function_declarations: vec![declaration],
            }),
        }
        self
    }

    pub fn with_transcription(mut self, input: bool, output: bool) -> Self {
        self.input_audio_transcription = input.then_some(AudioTranscriptionConfig {});
        self.output_audio_transcription = output.then_some(AudioTranscriptionConfig {});
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Empty object enabling transcription of one audio direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTranscriptionConfig {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// OpenAPI-style schema object.
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<WireAudioBlob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

impl FunctionResponse {
    /// Successful reply to `call` carrying `result` text.
    pub fn success(call: &FunctionCall, result: &str) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            response: json!({ "result": result }),
        }
    }

    /// Error reply to `call`.
    pub fn error(call: &FunctionCall, message: &str) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            response: json!({ "error": message }),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: String) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text),
                inline_data: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    #[serde(default)]
    pub tool_call_cancellation: Option<ToolCallCancellation>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
    #[serde(default)]
    pub usage_metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub generation_complete: bool,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallCancellation {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

impl ServerMessage {
    /// Parse one text frame. Unknown fields are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LingoError::Protocol {
            message: format!("Failed to parse server message: {}", e),
        })
    }

    /// Flatten the message into events.
    ///
    /// Order within one message: setup completion, response audio,
    /// interruption, input transcription, output transcription, turn
    /// completion, tool calls.
    pub fn into_events(self) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(SessionEvent::SetupComplete);
        }

        if let Some(content) = self.server_content {
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(inline) = part.inline_data
                        && is_audio(inline.mime_type.as_deref())
                    {
                        events.push(SessionEvent::Audio {
                            data: inline.data,
                            mime_type: inline.mime_type,
                        });
                    }
                }
            }
            if content.interrupted {
                events.push(SessionEvent::Interrupted);
            }
            if let Some(t) = content.input_transcription {
                events.push(SessionEvent::InputTranscription(t.text));
            }
            if let Some(t) = content.output_transcription {
                events.push(SessionEvent::OutputTranscription(t.text));
            }
            if content.turn_complete {
                events.push(SessionEvent::TurnComplete);
            }
        }

        if let Some(call) = self.tool_call {
            events.extend(call.function_calls.into_iter().map(SessionEvent::ToolCall));
        }

        if let Some(cancel) = self.tool_call_cancellation {
            events.push(SessionEvent::ToolCallCancellation(cancel.ids));
        }

        if let Some(go_away) = self.go_away {
            events.push(SessionEvent::GoAway {
                time_left: go_away.time_left,
            });
        }

        events
    }
}

/// Inline data without a MIME type is assumed to be response audio.
fn is_audio(mime_type: Option<&str>) -> bool {
    mime_type.is_none_or(|m| m.starts_with("audio/"))
}

/// Sample rate declared by a MIME string such as `audio/pcm;rate=24000`.
///
/// Falls back to the default response rate when absent or unparseable.
pub fn pcm_rate(mime_type: Option<&str>) -> u32 {
    mime_type
        .into_iter()
        .flat_map(|m| m.split(';'))
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse::<u32>().ok())
        .filter(|&rate| rate > 0)
        .unwrap_or(defaults::OUTPUT_SAMPLE_RATE)
}
