//! Core primitives.
//!
//! Pure functions and seeded randomness with no knowledge of phases,
//! players or transport.

pub mod physics;
pub mod rng;

// Re-export core types
pub use physics::{Arena, PlaneHit, WallHit, COLLISION_EPSILON_MS};
pub use rng::{derive_match_seed, DeterministicRng};
