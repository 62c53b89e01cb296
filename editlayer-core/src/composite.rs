//! Folding a path's change history into its net effect.

use crate::models::{ChangeKind, CompositeChange, CompositeKind, TrackedChange};
use crate::patch::{rebase, PatchOutcome};
use tracing::{debug, warn};

/// Folds an ordered change list from an empty start.
///
/// `None` means nothing is pending: either the list is empty or a creation
/// was undone by a later deletion.
pub fn fold<'a, I>(changes: I) -> Option<CompositeChange>
where
    I: IntoIterator<Item = &'a TrackedChange>,
{
    changes
        .into_iter()
        .fold(None, |acc, change| apply(acc, change))
}

/// Applies one change on top of an accumulated composite.
pub fn apply(acc: Option<CompositeChange>, change: &TrackedChange) -> Option<CompositeChange> {
    let next = match (acc, &change.kind) {
        (None, ChangeKind::Rename { old_path, path }) => Some(CompositeChange {
            id: change.id,
            timestamp: change.timestamp,
            path: path.clone(),
            kind: CompositeKind::Rename,
            before: None,
            after: None,
            renamed_from: (old_path != path).then(|| old_path.clone()),
        }),
        (Some(mut acc), ChangeKind::Rename { path, .. }) => {
            let origin = acc.renamed_from.take().unwrap_or_else(|| acc.path.clone());
            acc.renamed_from = (origin != *path).then_some(origin);
            acc.path = path.clone();
            Some(acc)
        }

        (None, ChangeKind::Create { path, after }) => {
            Some(start(change, path, CompositeKind::Create, None, Some(after)))
        }
        (None, ChangeKind::Modify {
            path,
            before,
            after,
        }) => Some(start(
            change,
            path,
            CompositeKind::Modify,
            Some(before),
            Some(after),
        )),
        (None, ChangeKind::Delete { path, before }) => {
            Some(start(change, path, CompositeKind::Delete, Some(before), None))
        }

        (Some(mut acc), ChangeKind::Create { after, .. }) => {
            match acc.kind {
                CompositeKind::Delete => {
                    acc.kind = CompositeKind::Modify;
                }
                CompositeKind::Create | CompositeKind::Modify | CompositeKind::Rename => {
                    acc.kind = CompositeKind::Create;
                    acc.before = None;
                }
            }
            acc.after = Some(after.clone());
            Some(acc)
        }

        (Some(mut acc), ChangeKind::Modify { before, after, .. }) => {
            match acc.kind {
                CompositeKind::Create | CompositeKind::Modify => {
                    acc.after = Some(rebased(&acc, before, after));
                }
                CompositeKind::Delete => {
                    acc.kind = CompositeKind::Modify;
                    acc.after = Some(after.clone());
                }
                CompositeKind::Rename => {
                    acc.kind = CompositeKind::Modify;
                    acc.before = Some(before.clone());
                    acc.after = Some(after.clone());
                }
            }
            Some(acc)
        }

        (Some(mut acc), ChangeKind::Delete { before, .. }) => match acc.kind {
            CompositeKind::Create => {
                debug!(path = %acc.path, "creation undone by deletion, lineage cancelled");
                None
            }
            CompositeKind::Modify | CompositeKind::Delete => {
                acc.kind = CompositeKind::Delete;
                acc.after = None;
                Some(acc)
            }
            CompositeKind::Rename => {
                acc.kind = CompositeKind::Delete;
                acc.before = Some(before.clone());
                acc.after = None;
                Some(acc)
            }
        },
    };

    next.map(|mut composite| {
        composite.id = change.id;
        composite.timestamp = change.timestamp;
        composite
    })
}

fn start(
    change: &TrackedChange,
    path: &str,
    kind: CompositeKind,
    before: Option<&String>,
    after: Option<&String>,
) -> CompositeChange {
    CompositeChange {
        id: change.id,
        timestamp: change.timestamp,
        path: path.to_string(),
        kind,
        before: before.cloned(),
        after: after.cloned(),
        renamed_from: None,
    }
}

/// The accumulated text after replaying a `before -> after` edit whose
/// `before` may no longer match what the lineage has built so far.
fn rebased(acc: &CompositeChange, before: &str, after: &str) -> String {
    let Some(current) = acc.after.as_deref() else {
        return after.to_string();
    };
    if current == before {
        return after.to_string();
    }

    match rebase(before, after, current) {
        PatchOutcome::Applied(merged) => merged,
        PatchOutcome::Failed { hunk } => {
            warn!(
                path = %acc.path,
                hunk,
                "edit no longer applies to its predecessor, keeping its content as-is"
            );
            after.to_string()
        }
    }
}
