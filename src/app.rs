//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// A terminal-based real-time audio volume and spectrum visualizer
#[derive(Parser)]
#[command(name = "osav")]
#[command(version)]
#[command(about = "\n\n ┏┓┏┏┓┓┏ \n ┗┛┛┗┻┗┛")]
#[command(long_about = "\n\n ┏┓┏┏┓┓┏ \n ┗┛┛┗┻┗┛\n\nA terminal-based real-time audio analyzer. Captures a live input device and\nrenders per-channel volume meters and a peak-hold frequency spectrum.\n\nDEFAULT COMMAND:\n    If no command is specified, 'visualize' is used by default.\n    The device option (-d) can be used without explicitly saying 'visualize'.\n\nEXAMPLES:\n    # Visualize the default input device\n    $ osav\n    \n    # Visualize a specific device by index or name\n    $ osav -d 2\n    $ osav visualize -d \"USB Microphone\"\n    \n    # See which input devices are available\n    $ osav list-devices\n    \n    # Edit configuration file\n    $ osav config\n\nKEYS:\n    r        restart the audio stream\n    q, Esc   quit")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/osav/osav.toml\n    Logs:               ~/.local/state/osav/osav.log.*\n\nFor more information, visit: https://github.com/kristoferlund/osav"
)]
struct Cli {
    /// Audio input device: "default", an index, or a name (visualize default command)
    #[arg(short, long, value_name = "DEVICE", global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Visualize live audio with volume meters and spectrum (default)
    ///
    /// Press 'r' to restart the stream, 'q' or Escape to quit.
    /// Sending SIGUSR1 to the process also restarts the stream.
    #[command(visible_alias = "v")]
    Visualize {
        /// Audio input device: "default", an index, or a name
        #[arg(short, long, value_name = "DEVICE")]
        device: Option<String>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Edit the audio device, sample rate, period size, frequency range,
    /// and display tuning. Uses $EDITOR or falls back to nano/vim.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in osav.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Generate shell completion script
    ///
    /// Generate completion script for your shell. Save the output to your
    /// shell's completion directory or source it directly.
    ///
    /// Examples:
    ///   osav completions bash > osav.bash
    ///   osav completions zsh > _osav
    ///   osav completions fish > osav.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails (e.g., stream open, restart)
pub fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging or config setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "osav", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    // Initialize logging for all other commands
    logging::init_logging()?;

    // Route to appropriate command handler
    match cli.command {
        None | Some(Commands::Visualize { .. }) => {
            // Default command is visualize
            // Merge top-level options with explicit visualize command options
            // If both are specified, the explicit visualize command options take precedence
            let device = match cli.command {
                Some(Commands::Visualize { device }) => device.or(cli.device),
                None => cli.device,
                _ => unreachable!(),
            };
            commands::handle_visualize(device)?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
