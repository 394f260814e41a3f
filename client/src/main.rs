use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use concord_client::config::{ClientConfig, parse_channel_list};
use concord_client::engine::{ClientEvent, IrcClient};
use concord_client::irc::connection::connect;

/// Minimal IRC client that tracks channel membership.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "concord-client.toml")]
    config: String,

    /// Server address (host:port), overrides the config file.
    #[arg(short, long)]
    server: Option<String>,

    /// Nickname, overrides the config file.
    #[arg(short, long)]
    nick: Option<String>,

    /// Extra channels to join, e.g. `#rust` or `#secret:key`.
    #[arg(short, long)]
    join: Vec<String>,

    /// Print membership changes and events as JSON lines.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::load(&args.config)?;
    if let Some(server) = args.server {
        config.server.address = server;
    }
    if let Some(nick) = args.nick {
        config.identity.nickname = nick;
    }
    for entry in &args.join {
        config.channels.autojoin.extend(parse_channel_list(entry));
    }

    let cancel = CancellationToken::new();
    let session = connect(&config.server, &config.identity, cancel.clone()).await?;
    let client = session.client;
    let mut events = session.events;

    spawn_printer(&client, args.json);

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, quitting");
            ctrl_c.cancel();
        }
    });

    let stdin_client = client.clone();
    let stdin_cancel = cancel.clone();
    let part_message = config.channels.part_message.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !run_command(&stdin_client, line.trim(), part_message.as_deref()) {
                stdin_cancel.cancel();
                break;
            }
        }
    });

    // Autojoin once the server has accepted registration.
    let autojoin = config.channels.autojoin.clone();
    tokio::spawn({
        let client = client.clone();
        async move {
            loop {
                match events.recv().await {
                    Ok(ClientEvent::Registered { .. }) => {
                        client.channels().request_join_with_keys(
                            autojoin.iter().map(|c| (c.name(), c.key())),
                        );
                    }
                    Ok(ClientEvent::Disconnected { .. }) | Err(RecvError::Closed) => break,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                }
            }
        }
    });

    session.handle.await?;
    Ok(())
}

/// Handle one line of user input. Returns false when the user wants to quit.
fn run_command(client: &IrcClient, line: &str, part_message: Option<&str>) -> bool {
    let mut parts = line.splitn(3, ' ');
    match parts.next().unwrap_or_default() {
        "/join" => {
            let channels = parts.next().unwrap_or_default();
            let keys: Vec<&str> = parts.next().map(|k| k.split(',').collect()).unwrap_or_default();
            client.channels().request_join_with_keys(
                channels
                    .split(',')
                    .filter(|c| !c.is_empty())
                    .enumerate()
                    .map(|(i, name)| (name, keys.get(i).copied())),
            );
        }
        "/part" => {
            let channels: Vec<&str> = parts
                .next()
                .unwrap_or_default()
                .split(',')
                .filter(|c| !c.is_empty())
                .collect();
            let comment = parts.next().or(part_message);
            client.channels().request_leave(channels, comment);
        }
        "/channels" => {
            client.channels().with_channels(|channels| {
                for channel in channels {
                    println!("{}  (joined {})", channel.name(), channel.joined_at());
                }
            });
        }
        "/quit" => return false,
        "" => {}
        other => warn!(command = %other, "unknown command"),
    }
    true
}

fn spawn_printer(client: &IrcClient, json: bool) {
    let mut changes = client.channels().subscribe();
    let mut events = client.subscribe_events();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => {
                        let summary = change.summary();
                        if json {
                            match serde_json::to_string(&summary) {
                                Ok(line) => println!("{line}"),
                                Err(e) => warn!(error = %e, "failed to encode change"),
                            }
                        } else {
                            for name in &summary.added {
                                println!("+ {name}");
                            }
                            for name in &summary.removed {
                                println!("- {name}");
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "membership printer lagged"),
                    Err(RecvError::Closed) => break,
                },
                event = events.recv() => match event {
                    Ok(event) => {
                        if json {
                            match serde_json::to_string(&event) {
                                Ok(line) => println!("{line}"),
                                Err(e) => warn!(error = %e, "failed to encode event"),
                            }
                        } else {
                            println!("* {event:?}");
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "event printer lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
}
