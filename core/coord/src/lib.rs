//! Coordination service capability for nodesync.
//!
//! This crate defines the operations the sync engine consumes from a
//! hierarchical coordination service (existence checks, child listings,
//! data reads and writes, node creation and deletion), the one-shot watch
//! notifications such a service delivers, and an in-memory implementation
//! used by tests and the command line tool.
//!
//! # Watch model
//! - A watch is armed by passing `watch = true` to `exists` or `get_children`
//! - Each armed watch fires at most once, then must be armed again
//! - Notifications arrive on the session's notification stream, asynchronously
//!   from the mutation that caused them

pub mod client;
pub mod memory;
pub mod notification;

pub use client::{CoordinationClient, CreateMode, Stat};
pub use memory::{MemoryCoordinator, MemorySession};
pub use notification::{ChangeKind, Notification, NotificationReceiver, NotificationSender};
