//! Interactive console for an Inworld scene.
//!
//! Connects with the key/secret (or custom token) from the environment, then
//! sends each stdin line as text to the chosen characters and prints what they
//! say back. `/quit` or Ctrl+C disconnects.

use anyhow::Context;
use clap::Parser;
use inworld_realtime::{ClientConfig, Collaborators, ConnectionStatus, InworldClient};
use inworld_realtime_types::Target;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Talk to Inworld characters from the terminal")]
struct Args {
    /// Full name of a character to talk to. Repeat to address several.
    #[arg(short, long = "character")]
    characters: Vec<String>,

    /// Scene to load instead of INWORLD_SCENE.
    #[arg(long)]
    scene: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Seconds to wait for the scene to load.
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    let mut config = ClientConfig::from_env().context("Failed to load configuration")?;
    if let Some(scene) = args.scene {
        config.scene = scene;
    }
    let collaborators = Collaborators::from_config(&config);
    let (handle, task) = InworldClient::new(config, collaborators).spawn();

    handle.events().packet_received.subscribe(|received| {
        if let Some(text) = received.packet.as_text() {
            let speaker = received
                .source
                .as_ref()
                .map(|c| c.given_name.as_str())
                .unwrap_or("World");
            println!("{}: {}", speaker, text.text);
        }
    });
    handle
        .events()
        .error_received
        .subscribe(|error| eprintln!("! {}", error.message));

    handle.reconnect()?;
    tokio::time::timeout(
        Duration::from_secs(args.connect_timeout),
        handle.wait_for_status(ConnectionStatus::Connected),
    )
    .await
    .context("Timed out waiting for the scene to load")??;

    let characters = handle.live_session().await?;
    for character in &characters {
        info!(%character, "Character available");
    }
    let target = if args.characters.is_empty() {
        let first = characters
            .first()
            .context("The scene has no characters")?;
        Target::Character(first.brain_name.clone())
    } else {
        Target::from_names(args.characters)
    };
    println!("Connected. Type a message, /quit to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => continue,
                    "/quit" => break,
                    text => handle.send_text(target.clone(), text)?,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal.");
                break;
            }
        }
    }

    handle.disconnect()?;
    handle.shutdown()?;
    task.await.context("Client task panicked")?;
    info!("Console has shut down.");
    Ok(())
}
