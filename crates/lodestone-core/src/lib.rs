//! Region generation gate, reconnect reports and the lanes they run on.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `lodestone-config.yaml` into
//!   strongly-typed structs.
//! - [`lanes`] -- [`MutationLane`] (sole owner of world state) and the
//!   bounded [`IoPool`] for store work.
//! - [`gate`] -- [`RegionGate`]: claim once per region, place once.
//! - [`collab`] -- Host collaborator traits and in-memory implementations.
//! - [`delta`] -- Pure delta and report composition.
//! - [`feed`] -- [`FeedEngine`]: reconnect reports and announcements.
//! - [`team`] -- Optional team integration bound once at startup.
//!
//! [`MutationLane`]: lanes::MutationLane
//! [`IoPool`]: lanes::IoPool
//! [`RegionGate`]: gate::RegionGate
//! [`FeedEngine`]: feed::FeedEngine

pub mod collab;
pub mod config;
pub mod delta;
pub mod feed;
pub mod gate;
pub mod lanes;
pub mod team;

pub use collab::{
    CollaboratorError, Ledger, MemoryStats, Messenger, Presence, RecordingMessenger, Roster,
    StatsSource,
};
pub use config::{ConfigError, LodestoneConfig};
pub use feed::{AbortReason, DeliveryReport, FeedEngine, NotifyOutcome, PublishError};
pub use gate::{ClaimOutcome, RegionGate};
pub use lanes::{IoPool, LaneError, MutationLane};
pub use team::{TeamDirectory, TeamId, TeamLookup, TeamMembers, TeamProvider, team_balance};
