//! Game core: data model, static content, the pure combat engine, the
//! authoritative reducer, the action modules that orchestrate between
//! them, and the runtime that composes it all.

pub mod actions;
pub mod combat;
pub mod content;
pub mod migration;
pub mod reducer;
pub mod runtime;
pub mod types;
