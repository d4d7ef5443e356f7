//! Huddle CLI
//!
//! Terminal client for shared-passphrase encrypted group chat over a line relay.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use huddle_cli::config::Config;
use huddle_cli::display::{format_fingerprint, render_message, render_state};
use huddle_core::{ConnectionState, Credentials, SessionController, SessionStreams};

/// Huddle - encrypted group chat over an untrusted relay
#[derive(Parser)]
#[command(name = "huddle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path [default: <config dir>/huddle/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room and chat
    Join {
        /// Room name
        #[arg(short, long)]
        room: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Read the passphrase from this environment variable instead of prompting
        #[arg(long, value_name = "VAR")]
        passphrase_env: Option<String>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the room key fingerprint to compare out of band
    DeriveKey {
        /// Room name
        #[arg(short, long)]
        room: String,

        /// Read the passphrase from this environment variable instead of prompting
        #[arg(long, value_name = "VAR")]
        passphrase_env: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    if let Commands::InitConfig { force } = cli.command {
        return init_config(&config_path, force);
    }

    // Load configuration
    let config = if cli.config.is_some() {
        Config::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        Config::load_or_create(&config_path)?
    };

    // Validate configuration
    config.validate()?;

    // Initialize logging; stdout belongs to the chat
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Join {
            room,
            name,
            passphrase_env,
        } => {
            let passphrase = read_passphrase(passphrase_env.as_deref())?;
            let credentials = Credentials::new(name, room, passphrase.as_str());
            join_room(&config, credentials).await?;
        }
        Commands::DeriveKey {
            room,
            passphrase_env,
        } => {
            let passphrase = read_passphrase(passphrase_env.as_deref())?;
            derive_key(room, passphrase).await?;
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Write the default config file
fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(path)?;
    println!("Configuration written to: {}", path.display());
    Ok(())
}

/// Passphrase from the named environment variable, or an interactive prompt
fn read_passphrase(env_var: Option<&str>) -> anyhow::Result<Zeroizing<String>> {
    let passphrase = match env_var {
        Some(var) => Zeroizing::new(
            std::env::var(var).with_context(|| format!("Environment variable {var} not set"))?,
        ),
        None => Zeroizing::new(
            rpassword::prompt_password("Room passphrase: ")
                .context("Failed to read passphrase")?,
        ),
    };

    if passphrase.is_empty() {
        anyhow::bail!("Passphrase must not be empty");
    }

    Ok(passphrase)
}

/// Print the key fingerprint for a room
async fn derive_key(room: String, passphrase: Zeroizing<String>) -> anyhow::Result<()> {
    let room_name = room.clone();
    let key = tokio::task::spawn_blocking(move || {
        huddle_crypto::derive_room_key(&room, &passphrase)
    })
    .await??;

    println!("Room: {room_name}");
    println!("Key fingerprint: {}", format_fingerprint(&key.fingerprint()));
    Ok(())
}

/// Run an interactive chat session until `/quit`, EOF or Ctrl+C
async fn join_room(config: &Config, credentials: Credentials) -> anyhow::Result<()> {
    println!("Deriving room key...");
    let (session, streams) =
        SessionController::start(config.to_session_config(), &credentials).await?;
    drop(credentials);

    tracing::info!(
        fingerprint = %format_fingerprint(&session.key_fingerprint()),
        "session started"
    );
    println!(
        "Joined as {}. Type /quit to leave.",
        session.username()
    );

    let printer = tokio::spawn(print_events(streams));
    let mut input = spawn_stdin_reader();

    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else { break };
                let line = line.trim_end_matches(['\r', '\n']);
                if line == "/quit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                // Failures already show up as a notice on the message stream
                if let Err(e) = session.send_chat(line) {
                    tracing::debug!(error = %e, "send failed");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await?;
    printer.await?;
    Ok(())
}

/// Print messages and state changes until both streams close
async fn print_events(streams: SessionStreams) {
    let SessionStreams {
        mut messages,
        mut states,
    } = streams;
    let mut ever_connected = false;

    loop {
        tokio::select! {
            Some(message) = messages.recv() => println!("{}", render_message(&message)),
            Some(state) = states.recv() => {
                if let Some(text) = render_state(state, ever_connected) {
                    println!("{text}");
                }
                ever_connected |= state == ConnectionState::Connected;
            }
            else => break,
        }
    }
}

/// Forward stdin lines from a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
