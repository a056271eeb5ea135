use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cozycorner::synthetic::{SyntheticConnector, SyntheticDevices};
use cozycorner::{PresenceRecord, Profile, RelayTransport, RoomId, RoomView, SessionConfig, SessionError, SessionStatus};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay returned HTTP {status}: {message}")]
    Relay { status: u16, message: String },
    #[error("relay URL must start with http:// or https://: {0}")]
    InvalidRelayUrl(String),
    #[error("session: {0}")]
    Session(#[from] SessionError),
    #[error("session failed: {0}")]
    SessionFailed(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "cozy", about = "Headless cozycorner participant and relay client")]
struct Cli {
    #[arg(long, env = "COZY_RELAY_URL", default_value = "http://127.0.0.1:3000")]
    relay_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the relay is up.
    Ping,
    /// Print a fresh shareable room name.
    NewRoom,
    /// List the peers the relay currently has in a room.
    Peers { room: String },
    /// Join a room with synthetic media and print the roster as it changes.
    Join {
        room: String,
        #[arg(long, env = "COZY_NAME", default_value = "guest")]
        name: String,
        /// Leave after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.relay_url).await,
        Command::NewRoom => {
            println!("{}", RoomId::generate());
            Ok(())
        }
        Command::Peers { room } => run_peers(&cli.relay_url, &room).await,
        Command::Join { room, name, seconds } => run_join(&cli.relay_url, room, name, seconds).await,
    }
}

async fn run_ping(relay_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", relay_url.trim_end_matches('/'));
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Relay { status: status.as_u16(), message: "health check failed".to_owned() });
    }
    println!("ok");
    Ok(())
}

async fn run_peers(relay_url: &str, room: &str) -> Result<(), CliError> {
    let url = format!("{}/api/rooms/{room}/peers", relay_url.trim_end_matches('/'));
    let response = reqwest::get(url).await?;
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(CliError::Relay { status: status.as_u16(), message: value.to_string() });
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn run_join(relay_url: &str, room: String, name: String, seconds: Option<u64>) -> Result<(), CliError> {
    let handle = cozycorner::join(
        SessionConfig::from_env(),
        Profile::new(name),
        RoomId::new(room),
        Box::new(RelayTransport::new(ws_url(relay_url)?)),
        Arc::new(SyntheticDevices::new()),
        Arc::new(SyntheticConnector::new()),
    )
    .await?;
    println!("joined as {}", handle.local_id());

    let mut views = handle.watch();
    let deadline = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };
    tokio::pin!(deadline);

    let mut last = String::new();
    loop {
        let rendered = {
            let view = views.borrow_and_update();
            if let SessionStatus::Failed { reason } = &view.status {
                return Err(CliError::SessionFailed(reason.clone()));
            }
            render_roster(&view)
        };
        if rendered != last {
            println!("{rendered}");
            last = rendered;
        }
        tokio::select! {
            () = &mut deadline => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    handle.leave().await;
    println!("left");
    Ok(())
}

/// Websocket endpoint for an `http(s)://host` relay base URL.
fn ws_url(relay_url: &str) -> Result<String, CliError> {
    let base = relay_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/ws"));
    }
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/ws"));
    }
    Err(CliError::InvalidRelayUrl(relay_url.to_owned()))
}

fn render_roster(view: &RoomView) -> String {
    let mut out = format!("-- {} participant(s)", view.records.len());
    for record in &view.records {
        out.push('\n');
        out.push_str(&render_record(record));
    }
    out
}

fn render_record(record: &PresenceRecord) -> String {
    let name = if record.display_name.is_empty() { "(joining)" } else { record.display_name.as_str() };
    let mut flags = Vec::new();
    if record.is_local {
        flags.push("you");
    }
    if record.is_screen_share {
        flags.push("screen");
    }
    if record.muted {
        flags.push("muted");
    }
    if record.video_off {
        flags.push("video off");
    }
    if record.speaking {
        flags.push("speaking");
    }
    if record.stream.is_none() {
        flags.push("no media");
    }
    format!("  {name} [{}] {:?}", flags.join(", "), record.link)
}
