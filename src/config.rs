use crate::catalog;
use crate::defaults;
use crate::error::{LingoError, Result};
use crate::live::protocol::Setup;
use crate::pipeline::capture::CaptureConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub session: SessionConfig,
}

/// Audio device configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub chunk_samples: usize,
}

/// Live session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub connect_timeout: String,
    pub input_transcription: bool,
    pub output_transcription: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            input_sample_rate: defaults::INPUT_SAMPLE_RATE,
            output_sample_rate: defaults::OUTPUT_SAMPLE_RATE,
            chunk_samples: defaults::CHUNK_SAMPLES,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::DEFAULT_ENDPOINT.to_string(),
            model: defaults::DEFAULT_MODEL.to_string(),
            voice: defaults::DEFAULT_VOICE.to_string(),
            api_key: None,
            connect_timeout: defaults::CONNECT_TIMEOUT.to_string(),
            input_transcription: true,
            output_transcription: true,
        }
    }
}

/// Value shape of a settable key.
#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyKind {
    Text,
    OptionalText,
    Positive,
    Duration,
    Flag,
}

const KEYS: &[(&str, KeyKind)] = &[
    ("audio.input_device", KeyKind::OptionalText),
    ("audio.output_device", KeyKind::OptionalText),
    ("audio.input_sample_rate", KeyKind::Positive),
    ("audio.output_sample_rate", KeyKind::Positive),
    ("audio.chunk_samples", KeyKind::Positive),
    ("session.endpoint", KeyKind::Text),
    ("session.model", KeyKind::Text),
    ("session.voice", KeyKind::Text),
    ("session.api_key", KeyKind::OptionalText),
    ("session.connect_timeout", KeyKind::Duration),
    ("session.input_transcription", KeyKind::Flag),
    ("session.output_transcription", KeyKind::Flag),
];

const MASK: &str = "********";

/// Environment variables checked for the API key, first match wins.
const API_KEY_VARS: &[&str] = &["LINGO_API_KEY", "GEMINI_API_KEY", "API_KEY"];

const TEMPLATE: &str = r#"# lingo configuration
# Location: ~/.config/lingo/config.toml

[audio]
# Microphone and speaker names as listed by `lingo devices`.
# Omit to use the system defaults.
# input_device = "pulse"
# output_device = "pulse"

# Uplink capture rate in Hz. The live API expects 16000.
input_sample_rate = 16000

# Rate requested from the output device in Hz. Responses arrive at 24000.
output_sample_rate = 24000

# Samples per uplink message (4096 at 16 kHz is 256 ms).
chunk_samples = 4096

[session]
endpoint = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent"
model = "gemini-2.5-flash-native-audio-preview-09-2025"
voice = "Kore"

# Prefer the LINGO_API_KEY (or GEMINI_API_KEY) environment variable.
# api_key = "..."

# Handshake plus session setup must finish within this time.
connect_timeout = "15s"

# Show what the user said and what the assistant is saying.
input_transcription = true
output_transcription = true
"#;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LingoError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                LingoError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(LingoError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LINGO_API_KEY (then GEMINI_API_KEY, API_KEY) → session.api_key
    /// - LINGO_MODEL → session.model
    /// - LINGO_VOICE → session.voice
    /// - LINGO_AUDIO_DEVICE → audio.input_device
    /// - LINGO_OUTPUT_DEVICE → audio.output_device
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = API_KEY_VARS.iter().find_map(|name| non_empty_env(name)) {
            self.session.api_key = Some(key);
        }

        if let Some(model) = non_empty_env("LINGO_MODEL") {
            self.session.model = model;
        }

        if let Some(voice) = non_empty_env("LINGO_VOICE") {
            self.session.voice = voice;
        }

        if let Some(device) = non_empty_env("LINGO_AUDIO_DEVICE") {
            self.audio.input_device = Some(device);
        }

        if let Some(device) = non_empty_env("LINGO_OUTPUT_DEVICE") {
            self.audio.output_device = Some(device);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/lingo/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("lingo")
            .join("config.toml")
    }

    /// Parsed `session.connect_timeout`.
    pub fn connect_timeout(&self) -> Result<Duration> {
        parse_duration("session.connect_timeout", &self.session.connect_timeout)
    }

    /// Capture settings derived from `[audio]`.
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            chunk_samples: self.audio.chunk_samples,
            sample_rate: self.audio.input_sample_rate,
            ..CaptureConfig::default()
        }
    }

    /// The setup message opening every session.
    pub fn live_setup(&self) -> Result<Setup> {
        let instruction = catalog::system_instruction()?;
        Ok(
            Setup::new(&self.session.model, &self.session.voice, instruction)
                .with_function(catalog::display_scheme_declaration())
                .with_transcription(
                    self.session.input_transcription,
                    self.session.output_transcription,
                ),
        )
    }

    /// Look up one value by dotted key (`session.model`).
    ///
    /// The API key is masked.
    pub fn get_value_by_path(&self, key: &str) -> Result<String> {
        lookup_kind(key)?;
        let (section, field) = split_key(key)?;
        let value = toml::Value::try_from(self.masked()).map_err(|e| LingoError::ConfigParse {
            message: e.to_string(),
        })?;
        match value
            .get(section)
            .and_then(|s| s.as_table())
            .and_then(|s| s.get(field))
        {
            Some(toml::Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Ok(String::new()),
        }
    }

    /// Set one value by dotted key in the file at `path`.
    ///
    /// The value is validated against the key's type, other entries of the
    /// file are preserved, and the file is created if needed. An empty value
    /// unsets an optional key.
    pub fn set_value_by_path(path: &Path, key: &str, value: &str) -> Result<()> {
        let kind = lookup_kind(key)?;
        let (section, field) = split_key(key)?;

        let mut table: toml::Table = match fs::read_to_string(path) {
            Ok(contents) => contents.parse().map_err(|e: toml::de::Error| {
                LingoError::ConfigParse {
                    message: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(e.into()),
        };

        let section_table = table
            .entry(section)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| LingoError::ConfigInvalidValue {
                key: section.to_string(),
                message: "is not a table".to_string(),
            })?;

        match parse_value(key, kind, value)? {
            Some(parsed) => {
                section_table.insert(field.to_string(), parsed);
            }
            None => {
                section_table.remove(field);
            }
        }

        // Reject files that would no longer load.
        let _: Config = toml::Value::Table(table.clone()).try_into()?;

        let contents = toml::to_string_pretty(&table).map_err(|e| LingoError::ConfigParse {
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        tracing::info!(key, path = %path.display(), "configuration updated");
        Ok(())
    }

    /// Full configuration as TOML, API key masked.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(&self.masked()).map_err(|e| LingoError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// One section (`audio`, `session`) as TOML, API key masked.
    pub fn display_section(&self, section: &str) -> Result<String> {
        let masked = self.masked();
        let rendered = match section {
            "audio" => toml::to_string_pretty(&masked.audio),
            "session" => toml::to_string_pretty(&masked.session),
            other => {
                return Err(LingoError::ConfigInvalidValue {
                    key: other.to_string(),
                    message: "unknown section (expected audio or session)".to_string(),
                });
            }
        };
        rendered.map_err(|e| LingoError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Commented template with every key at its default.
    pub fn dump_template() -> &'static str {
        TEMPLATE
    }

    /// Every settable dotted key.
    pub fn keys() -> impl Iterator<Item = &'static str> {
        KEYS.iter().map(|(key, _)| *key)
    }

    fn masked(&self) -> Self {
        let mut copy = self.clone();
        if copy.session.api_key.is_some() {
            copy.session.api_key = Some(MASK.to_string());
        }
        copy
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn lookup_kind(key: &str) -> Result<KeyKind> {
    KEYS.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| LingoError::ConfigInvalidValue {
            key: key.to_string(),
            message: format!(
                "unknown key (valid keys: {})",
                Config::keys().collect::<Vec<_>>().join(", ")
            ),
        })
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    key.split_once('.').ok_or_else(|| LingoError::ConfigInvalidValue {
        key: key.to_string(),
        message: "expected section.field".to_string(),
    })
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| LingoError::ConfigInvalidValue {
        key: key.to_string(),
        message: format!("invalid duration '{}': {}", value, e),
    })
}

/// `None` means remove the key.
fn parse_value(key: &str, kind: KeyKind, value: &str) -> Result<Option<toml::Value>> {
    let invalid = |message: String| LingoError::ConfigInvalidValue {
        key: key.to_string(),
        message,
    };
    let value = value.trim();
    match kind {
        KeyKind::Text if value.is_empty() => Err(invalid("must not be empty".to_string())),
        KeyKind::Text => Ok(Some(toml::Value::String(value.to_string()))),
        KeyKind::OptionalText if value.is_empty() => Ok(None),
        KeyKind::OptionalText => Ok(Some(toml::Value::String(value.to_string()))),
        KeyKind::Positive => match value.parse::<i64>() {
            Ok(n) if n > 0 && n <= i64::from(u32::MAX) => Ok(Some(toml::Value::Integer(n))),
            _ => Err(invalid(format!("must be a positive integer, got '{}'", value))),
        },
        KeyKind::Duration => {
            parse_duration(key, value)?;
            Ok(Some(toml::Value::String(value.to_string())))
        }
        KeyKind::Flag => match value {
            "true" | "yes" | "on" | "1" => Ok(Some(toml::Value::Boolean(true))),
            "false" | "no" | "off" | "0" => Ok(Some(toml::Value::Boolean(false))),
            _ => Err(invalid(format!("must be true or false, got '{}'", value))),
        },
    }
}
