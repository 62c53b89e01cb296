//! # editlayer
//!
//! Staged edit overlay for AI agent file changes. Re-exports the core
//! library along with the server and client entry points.

pub use editlayer_core::*;
pub use editlayer_sdk::EditLayerClient;
pub use editlayer_server::EditLayerServer;
