pub mod abandon;
pub mod commit;
pub mod diff;
pub mod log;
pub mod renames;
pub mod show;
pub mod start;
pub mod status;

use colored::{ColoredString, Colorize};
use editlayer_core::{CompositeChange, CompositeKind};

pub fn kind_label(kind: CompositeKind) -> ColoredString {
    match kind {
        CompositeKind::Create => "NEW".green(),
        CompositeKind::Modify => "MOD".yellow(),
        CompositeKind::Delete => "DEL".red(),
        CompositeKind::Rename => "REN".blue(),
    }
}

/// `path`, or `old → path` when the composite moves a file.
pub fn display_path(composite: &CompositeChange) -> String {
    match &composite.renamed_from {
        Some(from) => format!("{} → {}", from, composite.path),
        None => composite.path.clone(),
    }
}
