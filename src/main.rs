use anyhow::Result;
use clap::{CommandFactory, Parser};
use lingo::app::{TalkOptions, run_talk_command};
use lingo::audio::capture::list_devices;
use lingo::catalog::{DisplayedScheme, find_scheme, list_schemes, system_instruction};
use lingo::cli::{Cli, Commands, ConfigAction};
use lingo::config::Config;
use lingo::output::{format_scheme_card, format_scheme_list};
use lingo::playback::speaker::list_output_devices;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None | Some(Commands::Talk) => {
            let config = load_config(cli.config.as_deref())?;
            let options = TalkOptions {
                device: cli.device,
                output_device: cli.output_device,
                input: cli.input,
                model: cli.model,
                voice: cli.voice,
                quiet: cli.quiet,
            };
            run_talk_command(config, options).await?;
        }
        Some(Commands::Schemes { json }) => {
            if json {
                println!("{}", serde_json::to_string_pretty(list_schemes())?);
            } else {
                print!("{}", format_scheme_list(list_schemes(), color_stdout()));
            }
        }
        Some(Commands::Scheme { id }) => match find_scheme(&id) {
            Some(scheme) => {
                print!(
                    "{}",
                    format_scheme_card(&DisplayedScheme::base(scheme), color_stdout())
                );
            }
            None => {
                eprintln!("Unknown scheme: '{}'", id);
                eprintln!("Run `lingo schemes` to see available schemes.");
                std::process::exit(1);
            }
        },
        Some(Commands::Prompt) => {
            print!("{}", system_instruction()?);
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "lingo", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins; otherwise `-v` raises lingo's level to info, `-vv` to debug.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lingo={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn color_stdout() -> bool {
    std::io::stdout().is_terminal()
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/lingo/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

/// List available audio input and output devices.
fn list_audio_devices() -> Result<()> {
    let inputs = list_devices()?;
    let outputs = list_output_devices()?;

    if inputs.is_empty() && outputs.is_empty() {
        eprintln!("No audio devices found");
        std::process::exit(1);
    }

    println!("Input devices (--device):");
    for (idx, device) in inputs.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }
    println!();
    println!("Output devices (--output-device):");
    for (idx, device) in outputs.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&std::path::Path>,
) -> Result<()> {
    let config_path = custom_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Get { key } => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            match config.get_value_by_path(&key) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("{} {}", "Error:".red(), e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            Config::set_value_by_path(&config_path, &key, &value)?;
            if key == "session.api_key" {
                println!("Set {}", key);
            } else {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List { section } => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            let rendered = match section.as_deref() {
                Some(section) => config.display_section(section),
                None => config.to_display_toml(),
            };
            match rendered {
                Ok(toml) => print!("{}", toml),
                Err(e) => {
                    eprintln!("{} {}", "Error:".red(), e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Dump => {
            print!("{}", Config::dump_template());
        }
    }
    Ok(())
}
