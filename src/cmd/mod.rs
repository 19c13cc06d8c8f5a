/*!
Command dispatcher.

Layout:
  src/cmd/
    mod.rs      (this file: command table, dispatch, help)
    args.rs     (option tables, token resolution, cursor)
    error.rs    (Outcome + CommandError)
    format.rs   (reply / notification rendering)
    manager.rs  (state, technologies, enable, disable, scan)
    service.rs  (services, connect, disconnect)
    config.rs   (config directives)
    monitor.rs  (signal subscriptions + classifier)

Conventions:
  - Handlers take `(&mut Session<B>, &[String], &[OptionSpec]) -> CommandResult`
    and receive the full token list (command name first). Those that only
    fire an async call (scan, connect, disconnect) are plain fns.
  - Arity bounds live in the table and are checked before the handler runs.
  - Handlers that print their own result (now or from a continuation)
    return `Outcome::InProgress`; the dispatcher only prints errors.
*/

pub mod args;
pub mod config;
pub mod error;
pub mod format;
pub mod manager;
pub mod monitor;
pub mod service;

use crate::bus::{Bus, Value, last_segment};
use crate::log_debug;
use crate::session::Session;

pub use args::{Arity, OptionSpec, Resolved, resolve};
pub use error::{CommandError, CommandResult, Outcome};

use format::{Role, color, object_entries};

/// Which handler a table entry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Enable,
    Disable,
    State,
    Services,
    Technologies,
    Scan,
    Connect,
    Disconnect,
    Config,
    Monitor,
    Help,
    Exit,
}

/// One command table entry.
#[derive(Debug)]
pub struct Command {
    pub name: &'static str,
    pub argument: Option<&'static str>,
    pub options: &'static [OptionSpec],
    /// Token bounds including the command name; `None` = unbounded.
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub handler: Handler,
    pub desc: &'static str,
}

const fn command(
    name: &'static str,
    argument: Option<&'static str>,
    options: &'static [OptionSpec],
    bounds: (usize, Option<usize>),
    handler: Handler,
    desc: &'static str,
) -> Command {
    Command {
        name,
        argument,
        options,
        min_args: bounds.0,
        max_args: bounds.1,
        handler,
        desc,
    }
}

pub static COMMANDS: &[Command] = &[
    command(
        "enable",
        Some("<technology>|offline"),
        &[],
        (2, Some(2)),
        Handler::Enable,
        "Enables given technology or offline mode",
    ),
    command(
        "disable",
        Some("<technology>|offline"),
        &[],
        (2, Some(2)),
        Handler::Disable,
        "Disables given technology or offline mode",
    ),
    command(
        "state",
        None,
        &[],
        (1, Some(1)),
        Handler::State,
        "Shows if the system is online or offline",
    ),
    command(
        "services",
        Some("[<service>]"),
        service::SERVICE_OPTIONS,
        (1, Some(3)),
        Handler::Services,
        "Display services",
    ),
    command(
        "technologies",
        None,
        &[],
        (1, Some(1)),
        Handler::Technologies,
        "Display technologies",
    ),
    command(
        "scan",
        Some("<technology>"),
        &[],
        (2, Some(2)),
        Handler::Scan,
        "Scans for new services for given technology",
    ),
    command(
        "connect",
        Some("<service>"),
        &[],
        (2, Some(2)),
        Handler::Connect,
        "Connect a given service",
    ),
    command(
        "disconnect",
        Some("<service>"),
        &[],
        (2, Some(2)),
        Handler::Disconnect,
        "Disconnect a given service",
    ),
    command(
        "config",
        Some("<service>"),
        config::CONFIG_OPTIONS,
        (2, None),
        Handler::Config,
        "Set service configuration options",
    ),
    command(
        "monitor",
        Some("[on|off]"),
        monitor::MONITOR_OPTIONS,
        (1, Some(3)),
        Handler::Monitor,
        "Monitor signals from interfaces",
    ),
    command("help", None, &[], (1, None), Handler::Help, "Show help"),
    command("exit", None, &[], (1, None), Handler::Exit, "Exit"),
    command("quit", None, &[], (1, None), Handler::Exit, "Quit"),
];

/// Exact, case-sensitive lookup.
pub fn find(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Run one tokenized command line and report failures on the error stream.
pub async fn dispatch<B: Bus>(session: &mut Session<B>, tokens: &[String]) -> CommandResult {
    let Some(name) = tokens.first() else {
        return Ok(Outcome::Done);
    };

    let Some(cmd) = find(name) else {
        report(session, name, &CommandError::UnknownCommand);
        return Err(CommandError::UnknownCommand);
    };

    log_debug!("dispatch {} ({} tokens)", cmd.name, tokens.len());
    let result = run(session, cmd, tokens).await;
    if let Err(err) = &result {
        report(session, name, err);
    }
    result
}

fn report<B: Bus>(session: &mut Session<B>, token: &str, err: &CommandError) {
    let style = session.style.stderr();
    let line = color(Role::Error, format!("Error '{token}': {err}"), &style);
    session.console.error(line);
}

async fn run<B: Bus>(session: &mut Session<B>, cmd: &Command, tokens: &[String]) -> CommandResult {
    if let Some(max) = cmd.max_args
        && tokens.len() > max
    {
        return Err(CommandError::ArgumentListTooLong);
    }
    if tokens.len() < cmd.min_args {
        return Err(CommandError::InvalidArgument);
    }

    let options = cmd.options;
    match cmd.handler {
        Handler::Enable => manager::cmd_enable(session, tokens, options).await,
        Handler::Disable => manager::cmd_disable(session, tokens, options).await,
        Handler::State => manager::cmd_state(session, tokens, options).await,
        Handler::Technologies => manager::cmd_technologies(session, tokens, options).await,
        Handler::Scan => manager::cmd_scan(session, tokens, options),
        Handler::Services => service::cmd_services(session, tokens, options).await,
        Handler::Connect => service::cmd_connect(session, tokens, options),
        Handler::Disconnect => service::cmd_disconnect(session, tokens, options),
        Handler::Config => config::cmd_config(session, tokens, options).await,
        Handler::Monitor => monitor::cmd_monitor(session, tokens, options).await,
        Handler::Help => Ok(cmd_help(session)),
        Handler::Exit => Ok(Outcome::Exit),
    }
}

fn cmd_help<B: Bus>(session: &mut Session<B>) -> Outcome {
    let interactive = session.console.is_interactive();
    let console = &mut session.console;

    if !interactive {
        console.line("Usage: connmanctl [[command] [args]]");
    }

    for cmd in COMMANDS {
        console.line(format!(
            "{:<12}{:<22}{}",
            cmd.name,
            cmd.argument.unwrap_or(""),
            cmd.desc
        ));
        for opt in cmd.options {
            console.line(format!("   --{:<12}{}", opt.name, opt.desc));
        }
    }

    if !interactive {
        console.line("\nNote: arguments and output are considered EXPERIMENTAL for now.");
    }
    Outcome::Done
}

/// Object path of the entry in an `a(oa{sv})` reply whose last segment is `name`.
pub(crate) fn find_object(list: Option<&Value>, name: &str) -> Option<String> {
    list.map(object_entries)
        .unwrap_or_default()
        .into_iter()
        .find(|(path, _)| last_segment(path) == name)
        .map(|(path, _)| path.to_string())
}
