//! Nodesync Sync Engine
//!
//! This module keeps a local view of a hierarchical coordination namespace
//! current, including:
//! - Bootstrap discovery of an existing tree
//! - One-shot watch re-arming on every notification
//! - Classification of remote changes into add, update and delete events
//! - Tree mutators: create with parents, recursive delete, trim and prune

pub mod engine;
pub mod event;
pub mod listener;
pub mod state;
mod tree;
mod watcher;

// Re-export main types
pub use engine::{SyncConfig, SyncEngine, SyncHandle};
pub use event::{EventKind, SyncEvent};
pub use listener::{ChannelListener, SyncListener};
pub use state::{ListenerSet, NodeRegistry};
