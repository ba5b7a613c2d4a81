//! Command-line interface for lingo
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Voice companion for Indian government welfare schemes
#[derive(Parser, Debug)]
#[command(
    name = "lingo",
    version,
    about = "Voice companion for Indian government welfare schemes"
)]
pub struct Cli {
    /// Subcommand to execute (default: talk)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: lifecycle, -vv: wire traffic and scheduling)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Microphone device (see `lingo devices`)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Speaker device (see `lingo devices`)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub output_device: Option<String>,

    /// Stream a WAV file instead of the microphone
    #[arg(long, global = true, value_name = "WAV")]
    pub input: Option<PathBuf>,

    /// Live model (default: gemini-2.5-flash-native-audio-preview-09-2025)
    #[arg(long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Prebuilt voice the assistant answers with (default: Kore)
    #[arg(long, global = true, value_name = "VOICE")]
    pub voice: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Talk to Lingo (Enter starts and ends a call, Ctrl-C quits)
    Talk,

    /// List the scheme catalog
    Schemes {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the card of one scheme
    Scheme {
        /// Scheme identifier (e.g., pm-kisan)
        id: String,
    },

    /// Print the system instruction sent to the model
    Prompt,

    /// List available audio input and output devices
    Devices,

    /// Manage configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    /// Get a configuration value by key (e.g., session.model)
    Get {
        /// Dotted key path (e.g., session.voice, audio.chunk_samples)
        key: String,
    },
    /// Set a configuration value by key (empty value unsets optional keys)
    Set {
        /// Dotted key path (e.g., session.voice, audio.chunk_samples)
        key: String,
        /// Value to set
        value: String,
    },
    /// List current configuration values (optionally one section)
    List {
        /// Config section to show (audio or session)
        section: Option<String>,
    },
    /// Print the configuration file path
    Path,
    /// Dump a commented configuration template
    Dump,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["lingo"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.device.is_none());
        assert!(cli.output_device.is_none());
        assert!(cli.input.is_none());
        assert!(cli.model.is_none());
        assert!(cli.voice.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_single() {
        let cli = Cli::try_parse_from(["lingo", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["lingo", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_talk_with_options() {
        let cli = Cli::try_parse_from([
            "lingo",
            "talk",
            "--device",
            "hw:0",
            "--output-device",
            "pulse",
            "--input",
            "question.wav",
            "--voice",
            "Puck",
        ])
        .unwrap();

        assert_eq!(cli.command, Some(Commands::Talk));
        assert_eq!(cli.device.as_deref(), Some("hw:0"));
        assert_eq!(cli.output_device.as_deref(), Some("pulse"));
        assert_eq!(cli.input, Some(PathBuf::from("question.wav")));
        assert_eq!(cli.voice.as_deref(), Some("Puck"));
    }

    #[test]
    fn test_parse_schemes_json() {
        let cli = Cli::try_parse_from(["lingo", "schemes", "--json"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Schemes { json: true }));
    }

    #[test]
    fn test_parse_scheme_requires_id() {
        assert!(Cli::try_parse_from(["lingo", "scheme"]).is_err());
        let cli = Cli::try_parse_from(["lingo", "scheme", "pm-kisan"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Scheme {
                id: "pm-kisan".to_string()
            })
        );
    }

    #[test]
    fn test_parse_config_set() {
        let cli =
            Cli::try_parse_from(["lingo", "config", "set", "session.voice", "Puck"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Set {
                    key: "session.voice".to_string(),
                    value: "Puck".to_string(),
                }
            })
        );
    }

    #[test]
    fn test_parse_config_list_section() {
        let cli = Cli::try_parse_from(["lingo", "config", "list", "audio"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::List {
                    section: Some("audio".to_string())
                }
            })
        );
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["lingo", "prompt", "--config", "/tmp/c.toml", "-q"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["lingo", "completions", "bash"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        );
    }

    #[test]
    fn test_invalid_command_returns_error() {
        assert!(Cli::try_parse_from(["lingo", "dance"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
