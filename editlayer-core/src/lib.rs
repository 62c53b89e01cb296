//! # editlayer-core
//!
//! Core library for editlayer - a staging overlay for agent file edits.
//!
//! Edits are recorded in a [`ChangeLedger`] instead of being written
//! straight to disk. The [`Overlay`] serves reads through the ledger,
//! rebasing staged content onto whatever is on disk now, and writes the
//! edits out on commit. A [`RenameTracker`] remembers renames seen on disk.

pub mod composite;
pub mod config;
pub mod diff;
pub mod error;
pub mod ledger;
pub mod models;
pub mod overlay;
pub mod patch;
pub mod storage;
pub mod store;
pub mod tracker;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::ChangeLedger;
pub use models::{
    ChangeKind, CommitRecord, CommitReport, CompositeChange, CompositeKind, ConflictBundle,
    ConflictReason, FileView, PathOutcome, ProposedChange, RenameEvent, TrackedChange,
};
pub use overlay::{Overlay, ReadOptions};
pub use patch::{Patch, PatchOutcome};
pub use storage::{SharedStorage, Storage};
pub use store::{DocumentStore, FsStore, MemoryStore};
pub use tracker::{RenameLogStore, RenameTracker};
