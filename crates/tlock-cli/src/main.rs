//! tlock: time-locked notes from the terminal
//!
//! Usage:
//!   tlock lock "text" --in 2h          lock text for two hours
//!   tlock lock --at 2026-12-24T18:00   text read from stdin
//!   tlock list                         show notes, newest first
//!   tlock reveal <ID>                  decrypt an unlockable note (20 min window)
//!   tlock watch                        live view, refreshed every second

mod time_input;

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tlock_core::config::TlockConfig;
use tlock_core::{NoteId, NoteStatus, NoteView, TlockError};
use tlock_crypto::{KdfParams, TimeLockCipher};
use tlock_notes::{
    escape_terminal, run_driver, Clock, DriverHandle, JsonFileStore, NoteManager, SystemClock,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

type Manager = NoteManager<JsonFileStore, TimeLockCipher>;

#[derive(Parser, Debug)]
#[command(name = "tlock", version, about = "Time-locked notes")]
struct Cli {
    /// Path to tlock.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "TLOCK_CONFIG",
        default_value = "~/.config/tlock/tlock.toml",
        global = true
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "TLOCK_LOG", global = true)]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "TLOCK_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt text so it cannot be read before the unlock time
    Lock(LockArgs),
    /// Show every note with its state and remaining time
    List,
    /// Decrypt an unlockable note; it is deleted after the viewing window
    Reveal {
        /// Note ID as shown by `tlock list`
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Live view refreshed on every tick; type `reveal <ID>` to reveal, `q` to quit
    Watch,
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
struct LockArgs {
    /// Text to lock (read from stdin when omitted)
    text: Option<String>,

    /// Unlock at this time: RFC 3339, or local `YYYY-MM-DDTHH:MM[:SS]`
    #[arg(long, conflicts_with = "unlock_in", required_unless_present = "unlock_in")]
    at: Option<String>,

    /// Unlock after this long, e.g. `90s`, `45m`, `2h30m`, `3d`
    #[arg(long = "in", id = "unlock_in")]
    unlock_in: Option<String>,

    /// Skip the confirmation step
    #[arg(long, short = 'y')]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = expand_home(&cli.config);
    let config = TlockConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        store = %config.store_path().display(),
        "tlock starting"
    );

    let result = match cli.command {
        Commands::Lock(args) => cmd_lock(&config, args).await,
        Commands::List => cmd_list(&config).await,
        Commands::Reveal { id, yes } => cmd_reveal(&config, &id, yes).await,
        Commands::Watch => cmd_watch(&config).await,
        Commands::Config => cmd_config(&config),
    };

    if let Err(e) = &result {
        error!(error = %e, "command failed");
    }
    result
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn build_manager(config: &TlockConfig) -> Manager {
    let cipher = TimeLockCipher::new(KdfParams {
        iterations: config.crypto.pbkdf2_iterations,
    });
    NoteManager::new(JsonFileStore::new(config.store_path()), cipher)
        .with_view_window(Duration::from_secs(config.lifecycle.view_window_secs))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().context("flushing stdout")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("reading confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn reveal_prompt(window_secs: u64) -> String {
    format!(
        "Reveal this text? You will have {} to view it before it's permanently deleted.",
        tlock_notes::format_remaining(window_secs as i64 * 1000)
    )
}

async fn cmd_lock(config: &TlockConfig, args: LockArgs) -> Result<()> {
    let now = SystemClock.now_ms();
    let unlock_time = match (&args.at, &args.unlock_in) {
        (Some(at), _) => time_input::parse_at(at)?,
        (None, Some(after)) => {
            time_input::unlock_after(now, time_input::parse_duration_ms(after)?)?
        }
        (None, None) => anyhow::bail!("either --at or --in is required"),
    };

    let from_stdin = args.text.is_none();
    let text = match args.text {
        Some(text) => text,
        None => {
            if io::stdin().is_terminal() {
                eprintln!("Enter the text to lock, then Ctrl-D:");
            }
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading text from stdin")?;
            buf
        }
    };

    // Same checks the manager makes, surfaced before asking for confirmation
    if text.trim().is_empty() {
        return Err(user_error(TlockError::Validation(
            "Please enter some text to lock".into(),
        )));
    }
    if unlock_time <= now {
        return Err(user_error(TlockError::Validation(
            "Unlock time must be in the future".into(),
        )));
    }
    if from_stdin && !args.yes {
        anyhow::bail!("stdin was used for the note text; pass --yes to confirm the lock");
    }

    let manager = build_manager(config);
    let lock_for = unlock_time - now;
    if !args.yes
        && !confirm(&format!(
            "Lock this note for {}? It cannot be read or edited until then.",
            tlock_notes::format_remaining(lock_for)
        ))?
    {
        println!("Not locked.");
        return Ok(());
    }

    let note = manager
        .create_note(&text, unlock_time, SystemClock.now_ms())
        .await
        .map_err(user_error)?;
    println!(
        "Locked {} until {}",
        note.id(),
        time_input::display_local(note.unlock_time)
    );
    Ok(())
}

async fn cmd_list(config: &TlockConfig) -> Result<()> {
    let manager = build_manager(config);
    let views = manager
        .try_evaluate(SystemClock.now_ms())
        .await
        .map_err(user_error)?;
    print!("{}", render_views(&views));
    Ok(())
}

async fn cmd_reveal(config: &TlockConfig, id: &str, yes: bool) -> Result<()> {
    let manager = build_manager(config);
    if !yes && !confirm(&reveal_prompt(config.lifecycle.view_window_secs))? {
        println!("Not revealed.");
        return Ok(());
    }

    let note = manager
        .reveal(&NoteId::from(id), SystemClock.now_ms())
        .await
        .map_err(user_error)?;
    if let Some(text) = &note.plaintext {
        println!("{}", escape_terminal(text));
    }
    if let Some(view_until) = note.view_until {
        println!(
            "\n(deleted after {})",
            time_input::display_local(view_until)
        );
    }
    Ok(())
}

async fn cmd_watch(config: &TlockConfig) -> Result<()> {
    let manager = Arc::new(build_manager(config));
    let (handle, commands) = DriverHandle::channel(16);
    let cancel = CancellationToken::new();

    let driver = tokio::spawn(run_driver(
        manager,
        SystemClock,
        commands,
        |views: &[NoteView]| {
            // Clear screen and home the cursor before each frame
            print!("\x1b[2J\x1b[H{}", render_views(views));
            println!("\n> reveal <ID> | q");
            let _ = io::stdout().flush();
        },
        Duration::from_millis(config.lifecycle.tick_interval_ms),
        cancel.clone(),
    ));

    let input = watch_input(handle, config.lifecycle.view_window_secs, stdin_lines());
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("waiting for Ctrl-C")?,
        res = input => res?,
    }

    cancel.cancel();
    driver.await.context("note driver panicked")?;
    Ok(())
}

/// Stdin lines read on a plain thread.
///
/// A blocking read on the runtime's pool would keep the runtime from
/// shutting down after Ctrl-C; this thread is simply left behind.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "reading stdin failed");
                    break;
                }
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Interactive commands typed while watching. Ends on `q` or end of input.
async fn watch_input(
    handle: DriverHandle,
    window_secs: u64,
    mut lines: mpsc::Receiver<String>,
) -> Result<()> {
    let mut pending: Option<NoteId> = None;

    while let Some(line) = lines.recv().await {
        let line = line.trim();

        if let Some(id) = pending.take() {
            if matches!(line, "y" | "Y" | "yes") {
                match handle.reveal(id).await {
                    Ok(_) => {}
                    Err(e) => eprintln!("{}", user_error(e)),
                }
            }
            continue;
        }

        match line.split_once(' ') {
            Some(("reveal", id)) => {
                println!("{} [y/N]", reveal_prompt(window_secs));
                pending = Some(NoteId::from(id));
            }
            _ if matches!(line, "q" | "quit") => break,
            _ if line.is_empty() => handle.tick().await?,
            _ => eprintln!("unknown command: {line}"),
        }
    }
    Ok(())
}

fn cmd_config(config: &TlockConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("serializing config")?;
    print!("{rendered}");
    Ok(())
}

fn render_views(views: &[NoteView]) -> String {
    if views.is_empty() {
        return "No locked notes yet\nCreate your first time-locked note with `tlock lock`\n"
            .to_string();
    }

    let mut out = String::new();
    for view in views {
        match view.status {
            NoteStatus::Locked => out.push_str(&format!(
                "{}  Locked      {} remaining\n",
                view.id,
                view.remaining.as_deref().unwrap_or("")
            )),
            NoteStatus::Unlockable => out.push_str(&format!(
                "{}  Ready       unlock time has been reached\n",
                view.id
            )),
            NoteStatus::Viewing => {
                out.push_str(&format!(
                    "{}  Unlocked    view time remaining: {}\n",
                    view.id,
                    view.remaining.as_deref().unwrap_or("")
                ));
                if let Some(text) = &view.plaintext {
                    for line in escape_terminal(text).lines() {
                        out.push_str("    ");
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
        }
    }
    out
}

/// Turn library errors into the messages users see.
fn user_error(e: TlockError) -> anyhow::Error {
    let hint = match &e {
        TlockError::Decryption => "Failed to decrypt note. It may be corrupted.",
        TlockError::Crypto(_) => "Failed to encrypt note. Please try again.",
        TlockError::InvalidState {
            status: NoteStatus::Locked,
            ..
        } => "This note is still locked.",
        TlockError::InvalidState { .. } => "This note has already been revealed.",
        TlockError::NotFound(_) => "No such note (it may have expired).",
        _ => "",
    };
    let retry = if e.is_retriable() {
        " You can try again."
    } else {
        ""
    };
    if hint.is_empty() {
        anyhow::Error::new(e)
    } else {
        anyhow::Error::new(e).context(format!("{hint}{retry}"))
    }
}
