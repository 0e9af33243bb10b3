//! Outbound Ports
//!
//! The two things a match needs from the rest of the backend: a way to push
//! events to every socket watching it, and a place to store the result.
//! Both are traits so the socket gateway and the database stay outside this
//! crate. In-process adapters are provided for the demo binary and tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::game::config::MatchType;
use crate::game::engine::MatchResult;
use crate::game::events::MatchEvent;
use crate::game::state::{MatchId, PlayerId};

// =============================================================================
// BROADCAST
// =============================================================================

/// Pushes events to all sockets joined to a match channel.
pub trait BroadcastPort: Send + Sync {
    /// Send one event to every socket of the match.
    fn broadcast(&self, match_id: &MatchId, event: &MatchEvent);

    /// Drop every socket of the match. Called once at teardown.
    fn disconnect_all(&self, match_id: &MatchId);
}

/// What travels over a [`ChannelBroadcaster`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// A match event.
    Event(MatchEvent),
    /// The match channel is closing.
    Disconnect,
}

/// A message tagged with the match it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Source match.
    pub match_id: MatchId,
    /// Payload.
    pub message: ChannelMessage,
}

/// Broadcast port backed by a tokio broadcast channel.
///
/// Every subscriber sees every match; a socket gateway filters on
/// [`Envelope::match_id`].
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<Envelope>,
}

impl ChannelBroadcaster {
    /// Create with room for `capacity` undelivered messages per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all match traffic.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    fn send(&self, match_id: &MatchId, message: ChannelMessage) {
        // No subscribers is fine, nobody is watching.
        let _ = self.tx.send(Envelope {
            match_id: *match_id,
            message,
        });
    }
}

impl BroadcastPort for ChannelBroadcaster {
    fn broadcast(&self, match_id: &MatchId, event: &MatchEvent) {
        self.send(match_id, ChannelMessage::Event(event.clone()));
    }

    fn disconnect_all(&self, match_id: &MatchId) {
        debug!("Match {} disconnecting all sockets", hex::encode(&match_id[..4]));
        self.send(match_id, ChannelMessage::Disconnect);
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Completed match as stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Match identifier.
    pub match_id: MatchId,
    /// Ranked / casual / private.
    pub match_type: MatchType,
    /// Winning player.
    pub winner: PlayerId,
    /// Losing player.
    pub loser: PlayerId,
    /// Winner's final score.
    pub winner_score: i32,
    /// Loser's final score, `-1` on forfeit.
    pub loser_score: i32,
    /// Winner's rating after the match.
    pub winner_rating: i32,
    /// Loser's rating after the match.
    pub loser_rating: i32,
    /// When the match was torn down.
    pub finished_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Build a record from the engine's result.
    pub fn from_result(match_id: MatchId, result: &MatchResult, finished_at: DateTime<Utc>) -> Self {
        Self {
            match_id,
            match_type: result.match_type,
            winner: result.winner,
            loser: result.loser,
            winner_score: result.winner_score,
            loser_score: result.loser_score,
            winner_rating: result.ratings.winner,
            loser_rating: result.ratings.loser,
            finished_at,
        }
    }
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Storage backend rejected or lost the write.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A record for this match already exists.
    #[error("match {0} already saved")]
    AlreadySaved(String),
}

/// Stores completed matches and applies new ratings.
pub trait PersistencePort: Send + Sync {
    /// Save one finished match.
    fn save_match(&self, record: MatchRecord) -> BoxFuture<'_, Result<(), PersistenceError>>;
}

/// In-memory persistence, keeps every record in insertion order.
#[derive(Default)]
pub struct MemoryPersistence {
    records: RwLock<Vec<MatchRecord>>,
}

impl MemoryPersistence {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All saved records.
    pub async fn records(&self) -> Vec<MatchRecord> {
        self.records.read().await.clone()
    }
}

impl PersistencePort for MemoryPersistence {
    fn save_match(&self, record: MatchRecord) -> BoxFuture<'_, Result<(), PersistenceError>> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            if records.iter().any(|r| r.match_id == record.match_id) {
                return Err(PersistenceError::AlreadySaved(uuid::Uuid::from_bytes(record.match_id).to_string()));
            }
            records.push(record);
            Ok(())
        })
    }
}

/// Shared handles to both ports, cloned into every match task.
#[derive(Clone)]
pub struct Ports {
    /// Event fan-out.
    pub broadcast: Arc<dyn BroadcastPort>,
    /// Result storage.
    pub persistence: Arc<dyn PersistencePort>,
}
