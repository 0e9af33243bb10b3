//! Pong Match Server
//!
//! Demo binary: runs one scripted match through the registry with the
//! in-process ports and logs what clients would see.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pong_match::{
    GameMode, MatchPhase, MatchRegistry, MatchType, PlayerId, PlayerInfo, RegistryConfig, VERSION,
    COUNTDOWN_MS, MODE_SELECT_MS,
    game::input::Direction,
    network::{ChannelBroadcaster, ChannelMessage, MemoryPersistence, Ports},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Pong Match Server v{}", VERSION);

    let config = RegistryConfig::from_env().context("invalid match configuration")?;
    info!(
        "Canvas {}x{}, first to {}",
        config.match_config.canvas_width, config.match_config.canvas_height, config.match_config.winning_score
    );

    demo_match(config).await
}

/// Play one ranked match: a few rallies of scripted input, then player 2
/// walks away.
async fn demo_match(config: RegistryConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let broadcaster = Arc::new(ChannelBroadcaster::new(1_024));
    let persistence = Arc::new(MemoryPersistence::new());
    let registry = MatchRegistry::new(
        config,
        Ports {
            broadcast: broadcaster.clone(),
            persistence: persistence.clone(),
        },
    );

    // Stand-in for the socket gateway
    let mut feed = broadcaster.subscribe();
    let gateway = tokio::spawn(async move {
        let mut sync_count = 0usize;
        while let Ok(envelope) = feed.recv().await {
            match envelope.message {
                ChannelMessage::Event(event) => match event.name() {
                    "syncData" | "countdown" => sync_count += 1,
                    _ => info!("-> {}", event.to_json().unwrap_or_default()),
                },
                ChannelMessage::Disconnect => {
                    info!("-> disconnect ({} sync/countdown frames)", sync_count);
                    break;
                }
            }
        }
    });

    let match_id = *uuid::Uuid::new_v4().as_bytes();
    let alice = PlayerId::new(*uuid::Uuid::new_v4().as_bytes());
    let bob = PlayerId::new(*uuid::Uuid::new_v4().as_bytes());
    registry
        .create_match(
            match_id,
            [PlayerInfo::new(alice, 1_200), PlayerInfo::new(bob, 1_150)],
            MatchType::Ranked,
        )
        .await?;

    registry.select_mode(&match_id, GameMode::Speed).await;
    tokio::time::sleep(Duration::from_millis(MODE_SELECT_MS + COUNTDOWN_MS + 50)).await;

    // Wiggle both paddles for a while
    for step in 0..20u64 {
        let direction = if step % 2 == 0 { Direction::Up } else { Direction::Down };
        registry.key_down(&match_id, alice, direction).await;
        registry.key_down(&match_id, bob, direction).await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        registry.key_up(&match_id, alice, direction).await;
        registry.key_up(&match_id, bob, direction).await;
        info!("Phase after step {}: {:?}", step, registry.query_phase(&match_id).await);
    }

    if !registry.player_leave(&match_id, bob).await {
        warn!("Match already decided before the scripted forfeit");
    }

    if let Some(mut phase) = registry.subscribe_phase(&match_id).await {
        // Sender drops once the match task exits.
        while phase.changed().await.is_ok() {
            if *phase.borrow() == MatchPhase::Torndown {
                break;
            }
        }
    }
    gateway.await.context("gateway task panicked")?;

    info!("=== Match Results ===");
    for record in persistence.records().await {
        info!(
            "Winner {} ({} -> {}), loser {} ({} -> {}), score {}:{}",
            record.winner.short(),
            if record.winner == alice { 1_200 } else { 1_150 },
            record.winner_rating,
            record.loser.short(),
            if record.loser == alice { 1_200 } else { 1_150 },
            record.loser_rating,
            record.winner_score,
            record.loser_score
        );
    }

    Ok(())
}
