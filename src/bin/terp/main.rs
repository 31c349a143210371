use std::io::Write;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use terp::config::Config;
use terp::error::TerpError;
use terp::language::Language;

#[derive(Parser)]
#[command(
    name = "terp",
    about = "Live speech translation from your microphone",
    long_about = "Terp captures microphone audio one utterance at a time, converts it to \
        16-bit PCM, and sends it to a translation server over a websocket \
        channel. The original transcription and its translation are printed \
        as they arrive and collected into a transcript you can export as \
        plain text. The target language can be switched between utterances."
)]
struct Cli {
    /// Path to config file
    ///
    /// Defaults to ~/.config/terp/config.yaml if not specified.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    ///
    /// Sets the log level to debug for the terp crate, showing detailed
    /// information about audio capture, state transitions, and the wire
    /// protocol.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the server and start the interactive session (foreground)
    ///
    /// Connects to the configured translation server and reads commands
    /// from stdin: `start` begins an utterance, `stop` finishes it and
    /// sends the audio, `lang <tag>` switches the target language,
    /// `export` writes the transcript, `quit` exits. The transcript is
    /// also exported automatically on exit if it has entries.
    Run,

    /// List supported target languages
    ///
    /// Prints the language tags accepted by `lang <tag>` and by the
    /// `language` config key.
    Languages,

    /// List available audio input devices
    ///
    /// Shows all audio input devices recognized by the system. Use --pick
    /// to interactively select one and save it to your config file, or
    /// use --set to write a device name directly.
    Devices {
        /// Write the chosen device name to the config file
        #[arg(long, conflicts_with = "pick")]
        set: Option<String>,

        /// Interactively pick a device and save it to the config file
        #[arg(long, conflicts_with = "set")]
        pick: bool,
    },

    /// Create a new configuration file
    ///
    /// Walks through an interactive setup to configure the audio input
    /// device, the server URL, the default target language, and the
    /// transcript output path. Writes the result to the config file.
    Init,

    /// Generate shell completions
    ///
    /// Prints a completion script for the given shell to stdout.
    /// Source or install the output to enable tab completion.
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, elvish, powershell)
        shell: Shell,
    },
}

fn load_config(cli: &Cli) -> Result<Config, TerpError> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    Config::load(&path)
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_path)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("terp=debug,info")
    } else {
        EnvFilter::new("terp=info,warn")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    install_completions_if_missing();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// Auto-install shell completions for `$SHELL` if the completion file does
/// not already exist. Runs silently; errors are ignored so that missing dirs
/// or unsupported shells never block normal operation.
fn install_completions_if_missing() {
    let Ok(shell_env) = std::env::var("SHELL") else {
        return;
    };

    let Some(home) = dirs::home_dir() else {
        return;
    };

    // Map $SHELL to a clap_complete Shell variant and a destination path.
    let (shell, path) = if shell_env.ends_with("/bash") {
        let dir = home.join(".local/share/bash-completion/completions");
        (Shell::Bash, dir.join("terp"))
    } else if shell_env.ends_with("/zsh") {
        (Shell::Zsh, home.join(".zfunc/_terp"))
    } else if shell_env.ends_with("/fish") {
        (Shell::Fish, home.join(".config/fish/completions/terp.fish"))
    } else {
        return;
    };

    if path.exists() {
        return;
    }

    // Create parent directory if needed.
    if let Some(parent) = path.parent()
        && std::fs::create_dir_all(parent).is_err()
    {
        return;
    }

    let mut buf = Vec::new();
    generate(shell, &mut Cli::command(), "terp", &mut buf);

    let _ = std::fs::write(&path, buf);
}

fn run(cli: Cli) -> Result<(), TerpError> {
    match cli.command {
        Command::Devices { ref set, pick } => run_devices(&cli, set.as_deref(), pick),
        Command::Languages => {
            run_languages();
            Ok(())
        }
        Command::Init => run_init(&cli),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "terp", &mut std::io::stdout());
            Ok(())
        }
        Command::Run => {
            let config = load_config(&cli)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(terp::app::run(config))
        }
    }
}

fn run_languages() {
    for lang in Language::ALL {
        let marker = if lang == Language::default() {
            " (default)"
        } else {
            ""
        };
        println!("  {}: {}{marker}", lang.tag(), lang.name());
    }
}

fn list_devices() -> Result<(Vec<String>, Option<String>), TerpError> {
    let devices = terp::audio::capture::list_input_devices()?;
    let default_name = terp::audio::capture::default_input_device_name();
    Ok((devices, default_name))
}

fn print_device_list(devices: &[String], default_name: Option<&str>) {
    for (i, name) in devices.iter().enumerate() {
        let marker = if default_name == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("  {}: {name}{marker}", i + 1);
    }
}

fn run_devices(cli: &Cli, set: Option<&str>, pick: bool) -> Result<(), TerpError> {
    if let Some(device_name) = set {
        let path = config_path(cli);
        Config::set_audio_device(&path, device_name)?;
        println!("Set audio device to: {device_name}");
        return Ok(());
    }

    let (devices, default_name) = list_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    if pick {
        println!("Available audio input devices:");
        print_device_list(&devices, default_name.as_deref());
        println!();

        print!("Select device [1-{}]: ", devices.len());
        std::io::stdout()
            .flush()
            .map_err(|e| TerpError::Other(format!("failed to flush stdout: {e}")))?;

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| TerpError::Other(format!("failed to read input: {e}")))?;

        let choice: usize = input
            .trim()
            .parse()
            .map_err(|_| TerpError::Other("invalid selection: enter a number".to_string()))?;

        if choice < 1 || choice > devices.len() {
            return Err(TerpError::Other(format!(
                "selection out of range: pick 1-{}",
                devices.len()
            )));
        }

        let selected = &devices[choice - 1];
        let path = config_path(cli);
        Config::set_audio_device(&path, selected)?;
        println!("Set audio device to: {selected}");
    } else {
        print_device_list(&devices, default_name.as_deref());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Prompt helpers
// ---------------------------------------------------------------------------

fn prompt(msg: &str) -> Result<String, TerpError> {
    print!("{msg}");
    std::io::stdout()
        .flush()
        .map_err(|e| TerpError::Other(format!("failed to flush stdout: {e}")))?;
    let mut buf = String::new();
    std::io::stdin()
        .read_line(&mut buf)
        .map_err(|e| TerpError::Other(format!("failed to read input: {e}")))?;
    Ok(buf.trim().to_string())
}

fn prompt_default(msg: &str, default: &str) -> Result<String, TerpError> {
    let input = prompt(&format!("{msg} [{default}]: "))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

fn prompt_yes_no(msg: &str, default_yes: bool) -> Result<bool, TerpError> {
    let hint = if default_yes { "Y/n" } else { "y/N" };
    let input = prompt(&format!("{msg} [{hint}]: "))?;
    if input.is_empty() {
        return Ok(default_yes);
    }
    match input.to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Ok(default_yes),
    }
}

// ---------------------------------------------------------------------------
// terp init
// ---------------------------------------------------------------------------

fn run_init(cli: &Cli) -> Result<(), TerpError> {
    use serde_yaml_ng::{Mapping, Value};

    let path = config_path(cli);

    if path.exists() {
        let overwrite = prompt_yes_no(
            &format!("Config file already exists at {}. Overwrite?", path.display()),
            false,
        )?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut root = Mapping::new();

    // Audio device
    println!();
    let pick_device = prompt_yes_no("Pick an audio input device?", true)?;
    if pick_device {
        let (devices, default_name) = list_devices()?;
        if devices.is_empty() {
            println!("No audio input devices found, skipping.");
        } else {
            println!("Available audio input devices:");
            print_device_list(&devices, default_name.as_deref());
            println!();
            let input = prompt(&format!(
                "Select device [1-{}] (Enter to skip): ",
                devices.len()
            ))?;
            if let Ok(choice) = input.parse::<usize>()
                && choice >= 1
                && choice <= devices.len()
            {
                let audio = yaml_section(&mut root, "audio")?;
                audio.insert(
                    Value::String("device".to_string()),
                    Value::String(devices[choice - 1].clone()),
                );
            }
        }
    }

    // Server URL
    println!();
    let url = prompt_default("Translation server URL", "ws://127.0.0.1:5001/stream")?;
    if url != "ws://127.0.0.1:5001/stream" {
        let server = yaml_section(&mut root, "server")?;
        server.insert(Value::String("url".to_string()), Value::String(url));
    }

    // Target language
    println!();
    println!("Target languages:");
    run_languages();
    let tag = prompt_default("Default target language", Language::default().tag())?;
    let lang: Language = tag.parse()?;
    if lang != Language::default() {
        root.insert(
            Value::String("language".to_string()),
            Value::String(lang.tag().to_string()),
        );
    }

    // Transcript path
    println!();
    let transcript = prompt_default("Transcript output path", "~/transcript.txt")?;
    if transcript != "~/transcript.txt" {
        let output = yaml_section(&mut root, "output")?;
        output.insert(
            Value::String("transcript_path".to_string()),
            Value::String(transcript),
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml_ng::to_string(&Value::Mapping(root))
        .map_err(|e| TerpError::Config(format!("failed to serialize config: {e}")))?;
    std::fs::write(&path, yaml)?;

    println!();
    println!("Wrote config to {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// YAML builder helper
// ---------------------------------------------------------------------------

fn yaml_section<'a>(
    root: &'a mut serde_yaml_ng::Mapping,
    key: &str,
) -> Result<&'a mut serde_yaml_ng::Mapping, TerpError> {
    let k = serde_yaml_ng::Value::String(key.to_string());
    root.entry(k)
        .or_insert_with(|| serde_yaml_ng::Value::Mapping(serde_yaml_ng::Mapping::new()))
        .as_mapping_mut()
        .ok_or_else(|| TerpError::Config(format!("{key} section is not a mapping")))
}
