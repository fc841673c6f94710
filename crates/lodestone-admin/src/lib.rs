//! Administrative HTTP API for Lodestone.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Publish** (`POST /api/announcements`) -- the only operation that
//!   reports failure to its caller
//! - **Read-only views** of the announcement feed, actor baselines and the
//!   global statistics aggregate
//! - **Status** of the key store and feed configuration
//!
//! # Architecture
//!
//! Handlers call straight into the [`FeedEngine`] and its store. If the
//! store failed to open at startup the state carries no engine and the
//! store-backed endpoints answer 503.
//!
//! [`FeedEngine`]: lodestone_core::FeedEngine

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::AdminError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind, serve};
pub use state::AdminState;
