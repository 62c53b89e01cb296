use crate::composite;
use crate::models::{ChangeKind, CompositeChange, TrackedChange};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
struct Lineage {
    changes: Vec<TrackedChange>,
    /// `None` while the history cancels out.
    composite: Option<CompositeChange>,
    /// Lineages this one landed on; they come back once it moves away.
    shadowed: Vec<Lineage>,
}

impl Lineage {
    fn key(&self) -> Option<String> {
        match &self.composite {
            Some(composite) => Some(composite.path.clone()),
            None => self.changes.last().map(|c| c.path().to_string()),
        }
    }

    fn involves(&self, message_id: &str) -> bool {
        self.changes.iter().any(|c| c.message_id == message_id)
            || self.shadowed.iter().any(|s| s.involves(message_id))
    }

    /// Removes `message_id`'s changes here and in every shadowed lineage,
    /// refolding whatever lost a change.
    fn strip(&mut self, message_id: &str) -> usize {
        let count = self.changes.len();
        self.changes.retain(|c| c.message_id != message_id);
        let mut removed = count - self.changes.len();
        if removed > 0 {
            self.composite = composite::fold(&self.changes);
        }

        for shadowed in &mut self.shadowed {
            removed += shadowed.strip(message_id);
        }
        removed
    }
}

/// Path-keyed history of staged edits and the net change each path's
/// history folds to.
///
/// A history that folds to nothing stays stored but reads as absent, so
/// discarding the change that cancelled it brings it back. The ledger
/// never touches the real store.
#[derive(Debug, Default)]
pub struct ChangeLedger {
    lineages: HashMap<String, Lineage>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, change: TrackedChange) {
        let key = change.path().to_string();
        let mut lineage = match &change.kind {
            ChangeKind::Rename { old_path, path } if old_path != path => {
                let mut moved = self.lineages.remove(old_path).unwrap_or_default();
                for restored in std::mem::take(&mut moved.shadowed) {
                    self.settle(restored);
                }
                if let Some(displaced) = self.lineages.remove(path) {
                    if displaced.composite.is_some() {
                        warn!(
                            from = %old_path,
                            to = %path,
                            hidden = displaced.changes.len(),
                            "rename lands on a path with staged edits, hiding them"
                        );
                    }
                    moved.shadowed.push(displaced);
                }
                moved
            }
            _ => self.lineages.remove(&key).unwrap_or_default(),
        };

        let in_order = lineage
            .changes
            .last()
            .map_or(true, |last| last.timestamp <= change.timestamp);

        let composite = if in_order {
            let next = composite::apply(lineage.composite.take(), &change);
            lineage.changes.push(change);
            next
        } else {
            let at = lineage
                .changes
                .partition_point(|c| c.timestamp <= change.timestamp);
            lineage.changes.insert(at, change);
            composite::fold(&lineage.changes)
        };

        match &composite {
            Some(composite) => {
                debug!(path = %key, kind = composite.kind.as_str(), "composite updated")
            }
            None => debug!(path = %key, "staged edits cancel out"),
        }
        lineage.composite = composite;
        self.lineages.insert(key, lineage);
    }

    pub fn get(&self, path: &str) -> Option<&CompositeChange> {
        self.lineages
            .get(path)
            .and_then(|lineage| lineage.composite.as_ref())
    }

    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Rewrites a composite's content after the overlay rebased it onto
    /// live disk. The change history is left untouched.
    ///
    /// Only the overlay calls this, inside the same `&mut` borrow as the
    /// read that produced the rebase, so no `add` can interleave.
    pub(crate) fn update(&mut self, path: &str, before: String, after: String) -> bool {
        match self
            .lineages
            .get_mut(path)
            .and_then(|lineage| lineage.composite.as_mut())
        {
            Some(composite) => {
                composite.before = Some(before);
                composite.after = Some(after);
                true
            }
            None => false,
        }
    }

    /// Drops every change made under `message_id` and refolds the paths it
    /// touched. Returns how many changes were removed.
    pub fn discard(&mut self, message_id: &str) -> usize {
        let affected: Vec<String> = self
            .lineages
            .iter()
            .filter(|(_, lineage)| lineage.involves(message_id))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in affected {
            let Some(mut lineage) = self.lineages.remove(&key) else {
                continue;
            };
            removed += lineage.strip(message_id);

            match lineage.key() {
                Some(path) if path == key => {}
                Some(path) => {
                    debug!(from = %key, to = %path, "discarded rename moves lineage back");
                    for restored in std::mem::take(&mut lineage.shadowed) {
                        self.settle(restored);
                    }
                }
                None => debug!(path = %key, "lineage emptied by discard"),
            }
            self.settle(lineage);
        }

        if removed > 0 {
            debug!(message_id, removed, "discarded staged changes");
        }
        removed
    }

    /// Forgets a path's entire history, e.g. once it has been committed.
    /// Anything the path's lineage was hiding goes with it.
    pub fn remove(&mut self, path: &str) -> Option<CompositeChange> {
        self.lineages
            .remove(path)
            .and_then(|lineage| lineage.composite)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .lineages
            .iter()
            .filter(|(_, lineage)| lineage.composite.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn composites(&self) -> Vec<&CompositeChange> {
        let mut composites: Vec<&CompositeChange> = self
            .lineages
            .values()
            .filter_map(|l| l.composite.as_ref())
            .collect();
        composites.sort_by(|a, b| a.path.cmp(&b.path));
        composites
    }

    /// The change history stored under `path`, including one that
    /// currently cancels out.
    pub fn changes(&self, path: &str) -> &[TrackedChange] {
        self.lineages
            .get(path)
            .map(|lineage| lineage.changes.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.lineages
            .values()
            .filter(|lineage| lineage.composite.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&mut self) {
        self.lineages.clear();
    }

    /// Files a lineage under the path its history ends at. A lineage left
    /// with no changes hands back whatever it was hiding instead.
    fn settle(&mut self, mut lineage: Lineage) {
        let Some(key) = lineage.key() else {
            for restored in lineage.shadowed {
                self.settle(restored);
            }
            return;
        };

        if let Some(displaced) = self.lineages.remove(&key) {
            if displaced.composite.is_some() {
                warn!(
                    path = %key,
                    hidden = displaced.changes.len(),
                    "lineage lands on a path with staged edits, hiding them"
                );
            }
            lineage.shadowed.push(displaced);
        }
        self.lineages.insert(key, lineage);
    }
}
