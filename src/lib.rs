//! # Tinyquest - An Idle Terminal RPG
//!
//! Tinyquest is a small idle RPG driven by a single deterministic state
//! reducer. Every change to a session, whether typed at the prompt or
//! arriving from the remote save store, flows through one `reduce`
//! function, and everything random flows through an injected RNG so
//! combat math is reproducible under test.
//!
//! ## Features
//!
//! - **Pure Combat Engine**: Attack, skill, escape, and enemy turns are
//!   plain functions of stats plus an RNG handle; no hidden state.
//! - **Single Reducer**: All session mutation goes through tagged
//!   actions, which also drive the dirty-tracking that schedules saves.
//! - **Debounced Sync**: A background engine coalesces rapid changes
//!   into one merge-write, suppresses its own echoes, and degrades to
//!   offline play when the store is unreachable.
//! - **Save Migration**: Older save documents are upgraded in staged
//!   steps before deserialization, so no progress is lost on update.
//! - **Optional Narrative Service**: Flavor text can come from an HTTP
//!   generation service, with canned lines always available offline.
//! - **Async Design**: Built with Tokio; the game itself never blocks
//!   on persistence or the network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tinyquest::config::Config;
//! use tinyquest::game::content::{self, ContentTables};
//! use tinyquest::game::runtime::Runtime;
//! use tinyquest::game::types::GameSession;
//! use tinyquest::sync::{SledStore, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let tables = ContentTables::standard();
//!     let session = GameSession::fresh(content::template_player(&tables, "adventurer"));
//!     let (runtime, dirty_rx) = Runtime::new(
//!         tables,
//!         config.game.clone(),
//!         config.narrative.clone(),
//!         session,
//!     );
//!     let store = Arc::new(SledStore::open(&config.sync.data_dir)?);
//!     let engine = SyncEngine::new(store, runtime.clone(), config.sync.clone());
//!     tokio::spawn(engine.run(dirty_rx));
//!     runtime.explore().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - Session types, the reducer, combat math, and the
//!   player-facing action modules
//! - [`sync`] - The remote store trait, the sled-backed default store,
//!   and the debounced synchronization engine
//! - [`config`] - Configuration management and validation
//! - [`narrative`] - Flavor text with canned offline fallbacks
//! - [`services`] - Quota and latency gates for external calls

pub mod config;
pub mod game;
pub mod logutil;
pub mod narrative;
pub mod services;
pub mod sync;
