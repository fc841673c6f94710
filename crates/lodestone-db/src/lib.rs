//! Durable key store for the Lodestone world services.
//!
//! A small embedded SQLite database gives the two engines the atomic
//! primitives they are built on:
//!
//! ```text
//! DurableStore (one pool per process, opened at startup, closed at shutdown)
//!     |-- ClaimStore         insert-if-absent on (realm, x, z)
//!     |-- SnapshotStore      upsert of actor baselines, monotonic last-seen
//!     +-- AnnouncementStore  append + prune to N, newest-N reads
//! ```
//!
//! Every operation returns [`DbError`] rather than panicking; callers
//! degrade on [`DbError::is_unavailable`].
//!
//! # Modules
//!
//! - [`store`] -- Pool configuration, lifecycle and migrations
//! - [`claim_store`] -- Region claims
//! - [`snapshot_store`] -- Actor baselines
//! - [`announcement_store`] -- Bounded announcement feed
//! - [`error`] -- Shared error type

pub mod announcement_store;
pub mod claim_store;
pub mod error;
pub mod snapshot_store;
pub mod store;

// Re-export primary types for convenience.
pub use announcement_store::{AnnouncementRow, AnnouncementStore, FeedOrder};
pub use claim_store::{ClaimRow, ClaimStore};
pub use error::DbError;
pub use snapshot_store::{SnapshotRow, SnapshotStore};
pub use store::{DurableStore, StoreConfig, StoreLocation};
