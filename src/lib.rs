//! # Pong Match Server
//!
//! Authoritative match engine for two-player Pong.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PONG MATCH SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                           │
//! │  ├── physics.rs  - Reflection, collision tests, prediction   │
//! │  └── rng.rs      - Seeded Xorshift128+ for serves            │
//! │                                                              │
//! │  game/           - Match logic (no I/O, no clock)            │
//! │  ├── config.rs   - Geometry, speeds, modes                   │
//! │  ├── state.rs    - Match state and scoreboard                │
//! │  ├── input.rs    - Key hold reconciliation                   │
//! │  ├── engine.rs   - Phase state machine                       │
//! │  ├── rating.rs   - Elo update                                │
//! │  └── events.rs   - Client-facing messages                    │
//! │                                                              │
//! │  network/        - Runtime                                   │
//! │  ├── ports.rs    - Broadcast / persistence traits            │
//! │  ├── actor.rs    - One task per match                        │
//! │  └── registry.rs - Live match registry                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timing
//!
//! The server does not tick at a fixed rate. Each update computes when the
//! ball will next reach a wall or paddle plane and sleeps until then, so a
//! rally costs a handful of updates instead of sixty per second. Clients
//! extrapolate between `syncData` snapshots on their own.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::config::{GameMode, MatchConfig, MatchType};
pub use game::engine::{MatchEngine, Wake};
pub use game::events::MatchEvent;
pub use game::state::{MatchId, MatchPhase, PlayerId, PlayerInfo};
pub use network::registry::{MatchRegistry, RegistryConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Mode select window (ms).
pub const MODE_SELECT_MS: u64 = 5_000;

/// Pre-round countdown (ms).
pub const COUNTDOWN_MS: u64 = 3_000;

/// Delay between the final score and teardown (ms).
pub const FINISH_LINGER_MS: u64 = 1_000;

/// Wake delay for immediate phase transitions (ms).
pub const PHASE_STEP_MS: u64 = 1;
