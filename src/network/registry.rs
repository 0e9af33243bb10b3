//! Match Registry
//!
//! Owns the set of live matches. The registry only maps ids to mailboxes and
//! phase watchers; it never touches a match's state, which lives inside the
//! match's own task.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::core::rng::derive_match_seed;
use crate::game::config::{ConfigError, GameMode, MatchConfig, MatchType};
use crate::game::engine::{EngineError, MatchEngine};
use crate::game::input::Direction;
use crate::game::state::{MatchId, MatchPhase, PlayerId, PlayerInfo};
use crate::network::actor::{MatchActor, MatchClock, MatchCommand};
use crate::network::ports::Ports;

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Geometry and speeds handed to every new match.
    pub match_config: MatchConfig,
    /// Per-match command mailbox size.
    pub mailbox_capacity: usize,
    /// Fixed RNG seed for every match (tests only). `None` derives a fresh
    /// seed per match.
    pub seed: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            match_config: MatchConfig::default(),
            mailbox_capacity: 64,
            seed: None,
        }
    }
}

impl RegistryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            match_config: MatchConfig::from_env()?,
            ..Default::default()
        })
    }
}

/// Match creation errors.
#[derive(Debug, Error)]
pub enum MatchError {
    /// A match with this id is already live.
    #[error("match {0} already exists")]
    DuplicateMatch(String),

    /// The engine refused the setup.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Registry-side view of a live match.
struct MatchHandle {
    commands: mpsc::Sender<MatchCommand>,
    phase: watch::Receiver<MatchPhase>,
    players: [PlayerInfo; 2],
    match_type: MatchType,
}

/// All live matches.
pub struct MatchRegistry {
    config: RegistryConfig,
    ports: Ports,
    clock: MatchClock,
    matches: RwLock<BTreeMap<MatchId, MatchHandle>>,
}

impl MatchRegistry {
    /// Create an empty registry publishing through `ports`.
    pub fn new(config: RegistryConfig, ports: Ports) -> Arc<Self> {
        Arc::new(Self {
            config,
            ports,
            clock: MatchClock::start(),
            matches: RwLock::new(BTreeMap::new()),
        })
    }

    /// Seat two players and start the match task.
    ///
    /// On failure the error is logged and nothing is registered.
    #[instrument(skip(self, id, players), fields(match_id = %hex::encode(&id[..4])))]
    pub async fn create_match(
        self: &Arc<Self>,
        id: MatchId,
        players: [PlayerInfo; 2],
        match_type: MatchType,
    ) -> Result<(), MatchError> {
        let mut matches = self.matches.write().await;
        if matches.contains_key(&id) {
            let id_str = uuid::Uuid::from_bytes(id).to_string();
            error!("Match {} already exists", id_str);
            return Err(MatchError::DuplicateMatch(id_str));
        }

        let seed = self.config.seed.unwrap_or_else(|| {
            let (entropy, _) = uuid::Uuid::new_v4().as_u64_pair();
            derive_match_seed(entropy, &id, &[*players[0].id.as_bytes(), *players[1].id.as_bytes()])
        });

        let engine = MatchEngine::new(
            id,
            self.config.match_config.clone(),
            players,
            match_type,
            seed,
            self.clock.now_ms(),
        )
        .map_err(|e| {
            error!("Failed to create match: {}", e);
            MatchError::from(e)
        })?;

        let (command_tx, command_rx) = mpsc::channel(self.config.mailbox_capacity);
        let (phase_tx, phase_rx) = watch::channel(engine.phase());
        matches.insert(
            id,
            MatchHandle {
                commands: command_tx,
                phase: phase_rx,
                players,
                match_type,
            },
        );
        drop(matches);

        let actor = MatchActor::new(engine, command_rx, phase_tx, self.ports.clone(), self.clock);
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            actor.run().await;
            registry.remove(&id).await;
        });

        info!(
            "Created {:?} match {} between {} and {}",
            match_type,
            hex::encode(&id[..4]),
            players[0].id.short(),
            players[1].id.short()
        );
        Ok(())
    }

    /// Choose the game mode. True if the match accepted it.
    #[instrument(skip(self, id), fields(match_id = %hex::encode(&id[..4])))]
    pub async fn select_mode(&self, id: &MatchId, mode: GameMode) -> bool {
        self.request(id, |reply| MatchCommand::SelectMode { mode, reply }).await
    }

    /// Key pressed. True if the match accepted it.
    #[instrument(skip(self, id), fields(match_id = %hex::encode(&id[..4])))]
    pub async fn key_down(&self, id: &MatchId, player: PlayerId, direction: Direction) -> bool {
        self.request(id, |reply| MatchCommand::Key {
            player,
            direction,
            pressed: true,
            reply,
        })
        .await
    }

    /// Key released. True if the match accepted it.
    #[instrument(skip(self, id), fields(match_id = %hex::encode(&id[..4])))]
    pub async fn key_up(&self, id: &MatchId, player: PlayerId, direction: Direction) -> bool {
        self.request(id, |reply| MatchCommand::Key {
            player,
            direction,
            pressed: false,
            reply,
        })
        .await
    }

    /// A player left. True if it forfeited a live match.
    #[instrument(skip(self, id), fields(match_id = %hex::encode(&id[..4])))]
    pub async fn player_leave(&self, id: &MatchId, player: PlayerId) -> bool {
        self.request(id, |reply| MatchCommand::Leave { player, reply }).await
    }

    /// Current phase. Unknown or removed matches report
    /// [`MatchPhase::Finished`].
    pub async fn query_phase(&self, id: &MatchId) -> MatchPhase {
        let matches = self.matches.read().await;
        matches
            .get(id)
            .map(|handle| *handle.phase.borrow())
            .unwrap_or(MatchPhase::Finished)
    }

    /// Watch a match's phase changes.
    pub async fn subscribe_phase(&self, id: &MatchId) -> Option<watch::Receiver<MatchPhase>> {
        let matches = self.matches.read().await;
        matches.get(id).map(|handle| handle.phase.clone())
    }

    /// Whether a match is live.
    pub async fn contains(&self, id: &MatchId) -> bool {
        self.matches.read().await.contains_key(id)
    }

    /// Number of live matches.
    pub async fn match_count(&self) -> usize {
        self.matches.read().await.len()
    }

    /// Seated players of a live match.
    pub async fn players(&self, id: &MatchId) -> Option<[PlayerInfo; 2]> {
        self.matches.read().await.get(id).map(|handle| handle.players)
    }

    /// Match type of a live match.
    pub async fn match_type(&self, id: &MatchId) -> Option<MatchType> {
        self.matches.read().await.get(id).map(|handle| handle.match_type)
    }

    async fn request(
        &self,
        id: &MatchId,
        command: impl FnOnce(oneshot::Sender<bool>) -> MatchCommand,
    ) -> bool {
        let sender = {
            let matches = self.matches.read().await;
            match matches.get(id) {
                Some(handle) => handle.commands.clone(),
                None => {
                    warn!("Ignoring command for unknown match");
                    return false;
                }
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if sender.send(command(reply_tx)).await.is_err() {
            // Task already finished, removal pending.
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    async fn remove(&self, id: &MatchId) {
        self.matches.write().await.remove(id);
        debug!("Match {} removed", hex::encode(&id[..4]));
    }
}
