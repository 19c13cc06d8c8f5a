use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

mod bus;
mod cmd;
mod console;
mod session;
mod utils;

use bus::DEFAULT_DESTINATION;
use bus::dbus::{BusKind, DbusBus};
use cmd::format::StyleOptions;
use console::Console;
use session::Session;

/// connmanctl - command interpreter for the ConnMan connection manager
///
/// Modes:
///   connmanctl                      interactive prompt (help lists commands)
///   connmanctl <command> [args]     run one command and exit
///
/// Commands that finish asynchronously (scan, connect, disconnect, monitor)
/// keep a one-shot run alive until their result arrives; `monitor` runs until
/// Ctrl-C.
///
/// Global flags / env:
///   -v / -vv          Increase log verbosity (stderr)
///   -q / --quiet      Errors only
///   --bus             system (default) or session
///   CONNMANCTL_BUS    Environment fallback if --bus not provided
///   --destination     Bus name of the daemon (default net.connman)
///   --json            Print state/services/technologies replies as JSON
///   NO_COLOR          Disable coloured labels
///
/// Examples:
///   connmanctl technologies
///   connmanctl enable wifi
///   connmanctl config wifi_abc_managed_psk --ipv4 manual 192.168.1.5 24 192.168.1.1
///   connmanctl monitor services
#[derive(Parser, Debug)]
#[command(
    name = "connmanctl",
    version,
    about = "connmanctl - interactive command interpreter for ConnMan",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long)]
    quiet: bool,

    /// Message bus to use
    #[arg(long, value_enum, value_name = "BUS")]
    bus: Option<BusKind>,

    /// Bus name of the connection manager
    #[arg(long, value_name = "NAME", default_value = DEFAULT_DESTINATION)]
    destination: String,

    /// JSON output for replies
    #[arg(long)]
    json: bool,

    /// Command and arguments (omit for the interactive prompt)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    // Effective bus (CLI flag > CONNMANCTL_BUS env > system)
    let bus_kind = match cli.bus {
        Some(kind) => kind,
        None => match std::env::var("CONNMANCTL_BUS")
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            Some(raw) => match BusKind::from_str(raw.trim(), true) {
                Ok(kind) => kind,
                Err(_) => {
                    eprintln!("Invalid CONNMANCTL_BUS '{raw}': expected system or session");
                    std::process::exit(2);
                }
            },
            None => BusKind::System,
        },
    };

    let interactive = cli.command.is_empty();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    let ok = rt.block_on(async {
        let bus = DbusBus::connect(bus_kind, &cli.destination).await?;
        let console = Console::stdio(interactive);
        // Machine-readable runs get no escape codes.
        let style = if cli.json {
            StyleOptions::plain()
        } else {
            StyleOptions::detect()
        };
        let mut session = Session::new(bus, console, style, cli.json);

        if interactive {
            session.run_interactive().await?;
            Ok::<bool, anyhow::Error>(true)
        } else {
            Ok(session.run_once(&cli.command).await)
        }
    })?;

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
