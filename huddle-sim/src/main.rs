use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use huddle::call::{
    CallConfig, CallCoordinator, CallState, ConnectionState, LocalRelay, LoopbackNetwork,
    PeerStatus, SyntheticDevices,
};
use huddle::{ParticipantId, RoomId};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle-sim")]
#[command(about = "Runs an in-process mesh call and prints every participant's view")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Mesh {
        #[arg(short, long, default_value_t = 3)]
        participants: u32,

        /// Block the link between two participants, e.g. `2:3`.
        #[arg(long, value_parser = parse_link)]
        fail_link: Vec<(u32, u32)>,

        /// Mute the microphone of this participant once the mesh is up.
        #[arg(long)]
        toggle_mic: Option<u32>,

        #[arg(long, default_value_t = 1500)]
        settle_ms: u64,

        #[arg(long, default_value = "study-room")]
        room: String,

        #[arg(long, default_value_t = 15_000)]
        negotiation_timeout_ms: u64,

        /// Delay before each ICE restart; the count bounds the restarts.
        #[arg(long, value_delimiter = ',', default_values_t = [200u64, 600])]
        restart_backoff_ms: Vec<u64>,
    },
}

fn parse_link(s: &str) -> Result<(u32, u32), String> {
    let (a, b) = s
        .split_once(':')
        .ok_or_else(|| format!("expected I:J, got {s:?}"))?;
    let a = a.trim().parse().map_err(|e| format!("bad index {a:?}: {e}"))?;
    let b = b.trim().parse().map_err(|e| format!("bad index {b:?}: {e}"))?;
    if a == b {
        return Err("a link needs two different participants".into());
    }
    Ok((a, b))
}

fn participant(index: u32) -> ParticipantId {
    ParticipantId::from_u128(index as u128)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Commands::Mesh {
            participants,
            fail_link,
            toggle_mic,
            settle_ms,
            room,
            negotiation_timeout_ms,
            restart_backoff_ms,
        } => {
            if participants < 2 {
                bail!("a mesh needs at least two participants");
            }
            for &(a, b) in &fail_link {
                if a.max(b) > participants || a.min(b) == 0 {
                    bail!("link {a}:{b} is outside 1..={participants}");
                }
            }
            if toggle_mic.is_some_and(|i| i == 0 || i > participants) {
                bail!("--toggle-mic must name a participant in 1..={participants}");
            }

            let config = CallConfig {
                negotiation_timeout: Duration::from_millis(negotiation_timeout_ms),
                restart_backoff: restart_backoff_ms
                    .into_iter()
                    .map(Duration::from_millis)
                    .collect(),
                ice_servers: vec![],
                ..CallConfig::default()
            };

            run_mesh(
                participants,
                &fail_link,
                toggle_mic,
                Duration::from_millis(settle_ms),
                RoomId::new(room),
                config,
            )
            .await?;
        }
    }

    Ok(())
}

async fn run_mesh(
    count: u32,
    fail_link: &[(u32, u32)],
    toggle_mic: Option<u32>,
    settle: Duration,
    room: RoomId,
    config: CallConfig,
) -> Result<()> {
    println!(
        "{}",
        format!("🚀 Starting a {count}-way call in '{room}'...")
            .green()
            .bold()
    );

    let relay = LocalRelay::new();
    let network = LoopbackNetwork::new();
    for &(a, b) in fail_link {
        network.block(participant(a), participant(b));
        println!("   {} link {a} <-> {b} blocked", "✂".red());
    }

    let mut coordinators = Vec::new();
    for index in 1..=count {
        let coordinator = CallCoordinator::new(
            participant(index),
            Arc::new(relay.client()),
            Arc::new(network.clone()),
            Arc::new(SyntheticDevices::new()),
            config.clone(),
        );
        coordinator
            .join_call(room.clone())
            .await
            .with_context(|| format!("Participant {index} failed to join"))?;
        info!("Participant {} joined '{}'", index, room);
        coordinators.push(coordinator);
    }

    println!("{}", "⏳ Letting the mesh settle...".cyan());
    tokio::time::sleep(settle).await;

    if let Some(index) = toggle_mic {
        let coordinator = &coordinators[(index - 1) as usize];
        let enabled = coordinator.toggle_mic().await?;
        println!(
            "   🎙  participant {index} microphone {}",
            if enabled { "on".green() } else { "off".yellow() }
        );
        tokio::time::sleep(settle / 4).await;
    }

    let mut complete = true;
    for (index, coordinator) in (1..=count).zip(&coordinators) {
        let state = coordinator.state().borrow().clone();
        complete &= print_view(index, count, &state);
    }

    for coordinator in &coordinators {
        coordinator.leave_call().await?;
    }

    if complete {
        println!("{}", "✨ Every pair connected.".green().bold());
    } else {
        println!("{}", "⚠ Some pairs are not connected.".yellow().bold());
    }
    Ok(())
}

/// Prints one participant's view. Returns whether it reached everyone.
fn print_view(index: u32, count: u32, state: &CallState) -> bool {
    let media = &state.local_media;
    println!(
        "\n{} {}  mic {}  camera {}",
        "👤".bold(),
        format!("participant {index}").bold(),
        flag(media.mic_enabled),
        flag(media.camera_enabled),
    );

    let mut complete = true;
    for other in (1..=count).filter(|&i| i != index) {
        let id = participant(other);
        match state.status(&id) {
            Some(status) => {
                complete &= status.connection == ConnectionState::Connected;
                println!("   → {other}  {}", describe(status));
            }
            None if state.unreachable.contains(&id) => {
                complete = false;
                println!("   → {other}  {}", "unreachable".red());
            }
            None => {
                complete = false;
                println!("   → {other}  {}", "not in registry".dimmed());
            }
        }
    }
    if let Some(error) = &state.error {
        println!("   {} {:?}", "call ended:".red(), error);
    }
    complete
}

fn describe(status: &PeerStatus) -> String {
    let connection = match status.connection {
        ConnectionState::Connected => "connected".green(),
        ConnectionState::Connecting => "connecting".cyan(),
        ConnectionState::Reconnecting => "reconnecting".yellow(),
    };
    format!(
        "{connection}  {:?}/{:?}  gen {}  audio {}  video {}",
        status.role,
        status.negotiation,
        status.generation,
        flag(status.remote_audio),
        flag(status.remote_video),
    )
}

fn flag(enabled: bool) -> ColoredString {
    if enabled { "on".green() } else { "off".dimmed() }
}
