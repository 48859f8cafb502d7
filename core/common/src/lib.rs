//! Common types shared by the nodesync crates.
//!
//! Provides the validated [`NodePath`] used to address nodes in the remote
//! namespace and the error taxonomy every layer reports through.

pub mod error;
pub mod path;

pub use error::{Error, Result};
pub use path::{is_valid_path, is_valid_sub_path, NodePath};
