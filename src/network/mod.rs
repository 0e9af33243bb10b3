//! Network Layer
//!
//! Runs matches as tokio tasks and connects them to the outside world
//! through the broadcast and persistence ports. Socket handling itself
//! lives in the gateway that implements [`BroadcastPort`].

pub mod ports;
pub mod actor;
pub mod registry;

pub use ports::{
    BroadcastPort, ChannelBroadcaster, ChannelMessage, Envelope, MatchRecord,
    MemoryPersistence, PersistenceError, PersistencePort, Ports,
};
pub use actor::{MatchActor, MatchClock, MatchCommand};
pub use registry::{MatchError, MatchRegistry, RegistryConfig};
