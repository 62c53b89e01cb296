//! # editlayer-server
//!
//! Serves the edit overlay over HTTP and watches the root for renames.

pub mod api;
pub mod server;
pub mod watcher;

pub use server::EditLayerServer;
pub use watcher::RenameWatcher;
