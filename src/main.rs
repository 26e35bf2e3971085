//! `chiptool-bridge`: forwards voice commands from a POSIX message queue to
//! `chip-tool interactive start`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use chiptool_bridge::{Bridge, BridgeConfig, BridgeError};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "chiptool-bridge", about = "Message queue to chip-tool bridge", version, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.  Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the command queue name.
    #[arg(long)]
    command_queue: Option<String>,

    /// Override the TMPDIR given to the child.  Empty keeps the inherited one.
    #[arg(long)]
    tmpdir: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the bridge (the default).
    Run,
    /// Post one command character to the command queue.
    Send {
        /// A single ASCII character, normally a digit such as 7 or 8.
        #[arg(value_parser = parse_command_byte)]
        command: u8,
    },
    /// Remove the command and wakeword queue names.
    Unlink,
}

fn parse_command_byte(s: &str) -> Result<u8, String> {
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("expected a single ASCII character, got {s:?}")),
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "chiptool-bridge failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Cli) -> Result<(), BridgeError> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(queue) = args.command_queue {
        config.command_queue = queue;
    }
    if let Some(tmpdir) = args.tmpdir {
        config.child.tmpdir = tmpdir;
    }
    config.validate()?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let Err(err) = Bridge::new(config)?.run();
            Err(err)
        }
        Command::Send { command } => send(&config, command),
        Command::Unlink => unlink(&config),
    }
}

#[cfg(target_os = "linux")]
fn send(config: &BridgeConfig, command: u8) -> Result<(), BridgeError> {
    use chiptool_bridge::comm::mqueue::{MessageQueue, QueueAccess};

    let queue = MessageQueue::open_or_create(&config.command_queue, QueueAccess::Send)?;
    queue.send(&[command])?;
    info!(queue = queue.name(), command = %char::from(command), "command sent");
    Ok(())
}

#[cfg(target_os = "linux")]
fn unlink(config: &BridgeConfig) -> Result<(), BridgeError> {
    use chiptool_bridge::comm::mqueue::MessageQueue;

    // Try every name, report the first failure.
    let names = std::iter::once(config.command_queue.as_str()).chain(config.wakeword_queue());
    let mut first_err = None;
    for name in names {
        match MessageQueue::remove_if_exists(name) {
            Ok(true) => info!(queue = name, "queue removed"),
            Ok(false) => info!(queue = name, "queue not present"),
            Err(err) => {
                error!(%err, "queue not removed");
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(not(target_os = "linux"))]
fn send(_config: &BridgeConfig, _command: u8) -> Result<(), BridgeError> {
    Err(BridgeError::ProcessError(
        "POSIX message queues are only supported on Linux".to_string(),
    ))
}

#[cfg(not(target_os = "linux"))]
fn unlink(config: &BridgeConfig) -> Result<(), BridgeError> {
    send(config, 0)
}

fn init_tracing(log_format: LogFormat) -> Result<(), BridgeError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stdout);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| BridgeError::Tracing(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| BridgeError::Tracing(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
