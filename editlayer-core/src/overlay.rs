//! Mediates between staged edits and the real store.
//!
//! Reads consult the ledger first and rebase staged content onto disk when
//! the disk drifted since the edit was proposed. Flushing writes composites
//! out and drops them from the ledger. Nothing else touches the store.

use crate::error::{Error, Result};
use crate::ledger::ChangeLedger;
use crate::models::{
    hash_content, CommitReport, CompositeChange, CompositeKind, ConflictBundle, FileView,
    PathOutcome, ProposedChange, TrackedChange,
};
use crate::patch::{rebase, PatchOutcome};
use crate::store::{normalize_path, parent_of, DocumentStore};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Skip the ledger and return what is on disk.
    pub raw: bool,
}

impl ReadOptions {
    pub fn raw() -> Self {
        Self { raw: true }
    }
}

pub struct Overlay<S> {
    ledger: ChangeLedger,
    store: S,
}

impl<S: DocumentStore> Overlay<S> {
    pub fn new(ledger: ChangeLedger, store: S) -> Self {
        Self { ledger, store }
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_parts(self) -> (ChangeLedger, S) {
        (self.ledger, self.store)
    }

    /// Reads a path as it would look with every staged edit applied.
    ///
    /// `Ok(None)` means the path reads as absent. Drift that cannot be
    /// merged comes back as [`FileView::Conflict`], never as an error.
    pub fn read_file(&mut self, path: &str, options: ReadOptions) -> Result<Option<FileView>> {
        if options.raw {
            return Ok(self.store.read(path)?.map(FileView::Content));
        }

        let Some(composite) = self.ledger.get(path).cloned() else {
            return Ok(self.store.read(path)?.map(FileView::Content));
        };

        let disk = self.store.read(composite.source_path())?;

        match composite.kind {
            CompositeKind::Delete => Ok(disk.map(|disk| {
                FileView::Conflict(ConflictBundle::deleted(disk, composite.before))
            })),
            CompositeKind::Rename => Ok(disk.map(FileView::Content)),
            CompositeKind::Create | CompositeKind::Modify => {
                let after = composite.after.unwrap_or_default();
                let Some(before) = composite.before else {
                    return Ok(Some(FileView::Content(after)));
                };
                let Some(disk) = disk else {
                    return Ok(Some(FileView::Conflict(ConflictBundle::text(
                        None,
                        Some(after),
                        Some(before),
                    ))));
                };
                if disk == before {
                    return Ok(Some(FileView::Content(after)));
                }

                match rebase(&before, &after, &disk) {
                    PatchOutcome::Applied(merged) => {
                        debug!(path, "staged edit rebased onto drifted disk content");
                        self.ledger.update(path, disk, merged.clone());
                        Ok(Some(FileView::Content(merged)))
                    }
                    PatchOutcome::Failed { hunk } => {
                        debug!(path, hunk, "staged edit conflicts with disk content");
                        Ok(Some(FileView::Conflict(ConflictBundle::text(
                            Some(disk),
                            Some(after),
                            Some(before),
                        ))))
                    }
                }
            }
        }
    }

    pub fn write_change(&mut self, change: TrackedChange) {
        self.ledger.add(change);
    }

    /// Commits the given paths (every staged path by default) in order,
    /// stopping at the first failure. Paths committed before the failure
    /// stay committed.
    pub fn flush(&mut self, paths: Option<&[String]>) -> Result<()> {
        let targets = match paths {
            Some(paths) => paths.iter().map(|p| normalize_path(p)).collect(),
            None => self.ledger.paths(),
        };

        for path in &targets {
            self.flush_path(path)?;
        }

        Ok(())
    }

    /// Commits one path. Returns the composite that was written, or `None`
    /// when nothing was staged there.
    pub fn flush_path(&mut self, path: &str) -> Result<Option<CompositeChange>> {
        let Some(composite) = self.ledger.get(path).cloned() else {
            return Ok(None);
        };

        match composite.kind {
            CompositeKind::Create => {
                let content = composite.after.as_deref().unwrap_or_default();
                if let Some(parent) = parent_of(&composite.path) {
                    self.store.ensure_container(parent)?;
                }
                match self.store.read(&composite.path)? {
                    Some(live) if live == content => {
                        debug!(path = %composite.path, "created file already on disk");
                    }
                    Some(_) => return Err(Error::AlreadyExists(composite.path.clone())),
                    None => self.store.create(&composite.path, content)?,
                }
            }
            CompositeKind::Modify => {
                let source = composite.source_path();
                let live = self
                    .store
                    .read(source)?
                    .ok_or_else(|| Error::MissingTarget(source.to_string()))?;
                let expected = composite.before.as_deref().unwrap_or_default();
                if live != expected {
                    return Err(Error::Drift {
                        path: composite.path.clone(),
                        expected: short_hash(expected),
                        found: short_hash(&live),
                    });
                }
                if composite.renamed_from.is_some() {
                    self.move_file(source, &composite.path)?;
                }
                self.store
                    .overwrite(&composite.path, composite.after.as_deref().unwrap_or_default())?;
            }
            CompositeKind::Delete => {
                let source = composite.source_path();
                self.require(source)?;
                self.store.delete(source)?;
            }
            CompositeKind::Rename => {
                let source = composite.source_path();
                self.require(source)?;
                self.move_file(source, &composite.path)?;
            }
        }

        self.ledger.remove(path);
        info!(
            path = %composite.path,
            kind = composite.kind.as_str(),
            renamed_from = ?composite.renamed_from,
            "committed staged change"
        );
        Ok(Some(composite))
    }

    pub fn propose(&mut self, proposed: ProposedChange) -> TrackedChange {
        let mut change = proposed.into_tracked();
        normalize_kind_paths(&mut change);
        self.write_change(change.clone());
        change
    }

    pub fn peek(&self, path: &str) -> Option<&CompositeChange> {
        self.ledger.get(&normalize_path(path))
    }

    pub fn abandon(&mut self, message_id: &str) -> usize {
        self.ledger.discard(message_id)
    }

    pub fn view(&mut self, path: &str) -> Result<Option<FileView>> {
        self.read_file(&normalize_path(path), ReadOptions::default())
    }

    /// Commits each path independently and reports how each one went.
    pub fn commit(&mut self, paths: Option<&[String]>) -> CommitReport {
        let targets: Vec<String> = match paths {
            Some(paths) => paths.iter().map(|p| normalize_path(p)).collect(),
            None => self.ledger.paths(),
        };

        let outcomes = targets
            .into_iter()
            .map(|path| {
                let staged = self.ledger.get(&path);
                let kind = staged.map(|c| c.kind);
                let renamed_from = staged.and_then(|c| c.renamed_from.clone());

                let error = match self.flush_path(&path) {
                    Ok(Some(_)) => None,
                    Ok(None) => Some("nothing staged for this path".to_string()),
                    Err(e) => {
                        warn!(path = %path, error = %e, "commit failed");
                        Some(e.to_string())
                    }
                };

                PathOutcome {
                    path,
                    kind,
                    renamed_from,
                    committed: error.is_none(),
                    error,
                }
            })
            .collect();

        CommitReport { outcomes }
    }

    fn require(&self, path: &str) -> Result<()> {
        if self.store.exists(path)? {
            Ok(())
        } else {
            Err(Error::MissingTarget(path.to_string()))
        }
    }

    fn move_file(&mut self, from: &str, to: &str) -> Result<()> {
        if let Some(parent) = parent_of(to) {
            self.store.ensure_container(parent)?;
        }
        self.store.rename(from, to)
    }
}

fn normalize_kind_paths(change: &mut TrackedChange) {
    use crate::models::ChangeKind;
    match &mut change.kind {
        ChangeKind::Create { path, .. }
        | ChangeKind::Modify { path, .. }
        | ChangeKind::Delete { path, .. } => *path = normalize_path(path),
        ChangeKind::Rename { old_path, path } => {
            *old_path = normalize_path(old_path);
            *path = normalize_path(path);
        }
    }
}

fn short_hash(content: &str) -> String {
    hash_content(content)[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeKind, ConflictReason};
    use crate::store::{FsStore, MemoryStore};
    use tempfile::TempDir;

    fn overlay(store: MemoryStore) -> Overlay<MemoryStore> {
        Overlay::new(ChangeLedger::new(), store)
    }

    fn text(view: Option<FileView>) -> String {
        view.and_then(|v| v.content().map(str::to_string))
            .expect("expected text content")
    }

    #[test]
    fn test_unstaged_read_returns_disk() {
        let mut overlay = overlay(MemoryStore::new().with_file("p", "Hello"));

        assert_eq!(text(overlay.read_file("p", ReadOptions::default()).unwrap()), "Hello");
        assert!(overlay
            .read_file("missing", ReadOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_raw_read_ignores_ledger() {
        let mut overlay = overlay(MemoryStore::new().with_file("p", "Hello"));
        overlay.write_change(TrackedChange::modify("m1", "p", "Hello", "Hi"));

        assert_eq!(text(overlay.read_file("p", ReadOptions::raw()).unwrap()), "Hello");
        assert_eq!(text(overlay.read_file("p", ReadOptions::default()).unwrap()), "Hi");
    }

    #[test]
    fn test_created_file_reads_staged_content() {
        let mut overlay = overlay(MemoryStore::new());
        overlay.write_change(TrackedChange::create("m1", "new.md", "fresh"));

        assert_eq!(text(overlay.view("new.md").unwrap()), "fresh");
    }

    #[test]
    fn test_drifted_read_is_rebased_and_promoted() {
        let mut overlay = overlay(MemoryStore::new().with_file("p", "Hello there"));
        overlay.write_change(TrackedChange::modify("m1", "p", "Hello", "Hi"));

        assert_eq!(text(overlay.view("p").unwrap()), "Hi there");

        let composite = overlay.peek("p").unwrap();
        assert_eq!(composite.before.as_deref(), Some("Hello there"));
        assert_eq!(composite.after.as_deref(), Some("Hi there"));

        overlay.flush(None).unwrap();
        assert_eq!(overlay.store().files()["p"], "Hi there");
    }

    #[test]
    fn test_unmergeable_drift_is_text_conflict() {
        let mut overlay = overlay(MemoryStore::new().with_file("p", "Goodbye"));
        overlay.write_change(TrackedChange::modify("m1", "p", "Hello", "Hi"));

        let view = overlay.view("p").unwrap().unwrap();
        let bundle = view.conflict().unwrap();
        assert!(bundle.conflict);
        assert_eq!(bundle.reason, ConflictReason::Text);
        assert_eq!(bundle.disk.as_deref(), Some("Goodbye"));
        assert_eq!(bundle.staged.as_deref(), Some("Hi"));
        assert_eq!(bundle.base.as_deref(), Some("Hello"));

        // The ledger is left alone on conflict.
        assert_eq!(overlay.peek("p").unwrap().before.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_short_edit_over_unrelated_disk_is_text_conflict() {
        let mut overlay =
            overlay(MemoryStore::new().with_file("p", "Goodbye everyone, wonderful day"));
        overlay.write_change(TrackedChange::modify("m1", "p", "Hello world", "Hello World"));

        let view = overlay.view("p").unwrap().unwrap();
        let bundle = view.conflict().unwrap();
        assert_eq!(bundle.reason, ConflictReason::Text);
        assert_eq!(bundle.disk.as_deref(), Some("Goodbye everyone, wonderful day"));
        assert_eq!(bundle.staged.as_deref(), Some("Hello World"));
    }

    #[test]
    fn test_modify_of_vanished_file_is_text_conflict() {
        let mut overlay = overlay(MemoryStore::new());
        overlay.write_change(TrackedChange::modify("m1", "p", "Hello", "Hi"));

        let view = overlay.view("p").unwrap().unwrap();
        let bundle = view.conflict().unwrap();
        assert_eq!(bundle.reason, ConflictReason::Text);
        assert_eq!(bundle.disk, None);
    }

    #[test]
    fn test_staged_delete_with_file_present_conflicts() {
        let mut overlay = overlay(MemoryStore::new().with_file("p", "still here"));
        overlay.write_change(TrackedChange::delete("m1", "p", "original"));

        let view = overlay.view("p").unwrap().unwrap();
        let bundle = view.conflict().unwrap();
        assert_eq!(bundle.reason, ConflictReason::Deleted);
        assert_eq!(bundle.disk.as_deref(), Some("still here"));
        assert_eq!(bundle.base.as_deref(), Some("original"));
    }

    #[test]
    fn test_staged_delete_with_file_gone_reads_none() {
        let mut overlay = overlay(MemoryStore::new());
        overlay.write_change(TrackedChange::delete("m1", "p", "original"));

        assert!(overlay.view("p").unwrap().is_none());
    }

    #[test]
    fn test_bare_rename_reads_source_content() {
        let mut overlay = overlay(MemoryStore::new().with_file("a.md", "A"));
        overlay.write_change(TrackedChange::rename("m1", "a.md", "b.md"));

        assert_eq!(text(overlay.view("b.md").unwrap()), "A");
        assert_eq!(text(overlay.view("a.md").unwrap()), "A");
    }

    #[test]
    fn test_flush_create_writes_and_clears() {
        let mut overlay = overlay(MemoryStore::new());
        overlay.write_change(TrackedChange::create("m1", "notes/p.md", "body"));

        overlay.flush(Some(&["notes/p.md".to_string()])).unwrap();

        assert_eq!(overlay.store().files()["notes/p.md"], "body");
        assert!(overlay.store().has_container("notes"));
        assert!(!overlay.ledger().has("notes/p.md"));
    }

    #[test]
    fn test_flush_normalizes_paths() {
        let mut overlay = overlay(MemoryStore::new());
        overlay.write_change(TrackedChange::create("m1", "notes/p.md", "body"));

        overlay.flush(Some(&["./notes//p.md".to_string()])).unwrap();

        assert_eq!(overlay.store().files()["notes/p.md"], "body");
        assert!(overlay.ledger().is_empty());
    }

    #[test]
    fn test_create_never_overwrites_a_file_made_since() {
        let mut overlay = overlay(MemoryStore::new());
        overlay.write_change(TrackedChange::create("m1", "n.md", "agent"));
        overlay
            .store_mut()
            .create("n.md", "human wrote this")
            .unwrap();

        let result = overlay.flush(None);
        assert!(matches!(result, Err(Error::AlreadyExists(path)) if path == "n.md"));
        assert_eq!(overlay.store().files()["n.md"], "human wrote this");
        assert!(overlay.ledger().has("n.md"));

        let report = overlay.commit(None);
        assert!(!report.is_clean());
        assert!(!report.outcomes[0].committed);
        assert_eq!(overlay.store().files()["n.md"], "human wrote this");
    }

    #[test]
    fn test_create_matching_disk_commits() {
        let mut overlay = overlay(MemoryStore::new().with_file("n.md", "same"));
        overlay.write_change(TrackedChange::create("m1", "n.md", "same"));

        let report = overlay.commit(None);

        assert!(report.is_clean());
        assert!(overlay.ledger().is_empty());
    }

    #[test]
    fn test_flush_create_into_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let mut overlay = Overlay::new(ChangeLedger::new(), FsStore::new(temp_dir.path()));
        overlay.write_change(TrackedChange::create("m1", "deep/er/p.md", "body"));

        overlay.flush(None).unwrap();

        let written = std::fs::read_to_string(temp_dir.path().join("deep/er/p.md")).unwrap();
        assert_eq!(written, "body");
        assert!(overlay.ledger().is_empty());
    }

    #[test]
    fn test_flush_drifted_modify_fails_and_keeps_entry() {
        let mut overlay = overlay(MemoryStore::new().with_file("p", "edited by hand"));
        overlay.write_change(TrackedChange::modify("m1", "p", "Hello", "Hi"));

        let result = overlay.flush(Some(&["p".to_string()]));

        assert!(matches!(result, Err(Error::Drift { .. })));
        assert!(overlay.ledger().has("p"));
        assert_eq!(overlay.store().files()["p"], "edited by hand");
    }

    #[test]
    fn test_flush_modify_of_missing_file() {
        let mut overlay = overlay(MemoryStore::new());
        overlay.write_change(TrackedChange::modify("m1", "p", "Hello", "Hi"));

        let result = overlay.flush(None);
        assert!(matches!(result, Err(Error::MissingTarget(path)) if path == "p"));
    }

    #[test]
    fn test_flush_delete() {
        let mut overlay = overlay(MemoryStore::new().with_file("p", "bye"));
        overlay.write_change(TrackedChange::delete("m1", "p", "bye"));

        overlay.flush(None).unwrap();

        assert!(overlay.store().files().is_empty());
        assert!(overlay.ledger().is_empty());
    }

    #[test]
    fn test_flush_delete_of_missing_file() {
        let mut overlay = overlay(MemoryStore::new());
        overlay.write_change(TrackedChange::delete("m1", "p", "bye"));

        assert!(matches!(overlay.flush(None), Err(Error::MissingTarget(_))));
        assert!(overlay.ledger().has("p"));
    }

    #[test]
    fn test_flush_renamed_modify_moves_then_writes() {
        let mut overlay = overlay(MemoryStore::new().with_file("a.md", "one"));
        overlay.write_change(TrackedChange::rename("m1", "a.md", "dir/b.md"));
        overlay.write_change(TrackedChange::modify("m2", "dir/b.md", "one", "two"));

        overlay.flush(None).unwrap();

        let files = overlay.store().files();
        assert!(!files.contains_key("a.md"));
        assert_eq!(files["dir/b.md"], "two");
    }

    #[test]
    fn test_flush_bare_rename() {
        let mut overlay = overlay(MemoryStore::new().with_file("a.md", "one"));
        overlay.write_change(TrackedChange::rename("m1", "a.md", "b.md"));

        overlay.flush(None).unwrap();

        assert_eq!(overlay.store().files()["b.md"], "one");
        assert!(!overlay.store().files().contains_key("a.md"));
    }

    #[test]
    fn test_flush_stops_at_first_failure() {
        let mut overlay = overlay(
            MemoryStore::new()
                .with_file("a", "A")
                .with_file("b", "drifted"),
        );
        overlay.write_change(TrackedChange::modify("m1", "a", "A", "A2"));
        overlay.write_change(TrackedChange::modify("m1", "b", "B", "B2"));
        overlay.write_change(TrackedChange::create("m1", "c", "C"));

        let result = overlay.flush(None);

        assert!(result.is_err());
        assert_eq!(overlay.store().files()["a"], "A2");
        assert!(!overlay.store().files().contains_key("c"));
        assert_eq!(overlay.ledger().paths(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_commit_isolates_failures() {
        let mut overlay = overlay(
            MemoryStore::new()
                .with_file("a", "A")
                .with_file("b", "drifted"),
        );
        overlay.write_change(TrackedChange::modify("m1", "a", "A", "A2"));
        overlay.write_change(TrackedChange::modify("m1", "b", "B", "B2"));
        overlay.write_change(TrackedChange::create("m1", "c", "C"));

        let report = overlay.commit(None);

        assert!(!report.is_clean());
        let committed: Vec<&str> = report.committed().map(|o| o.path.as_str()).collect();
        assert_eq!(committed, vec!["a", "c"]);
        let failed: Vec<&PathOutcome> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].path, "b");
        assert_eq!(failed[0].kind, Some(CompositeKind::Modify));
        assert!(failed[0].error.as_deref().unwrap().contains("Drift"));
        assert_eq!(overlay.ledger().paths(), vec!["b".to_string()]);
    }

    #[test]
    fn test_commit_unknown_path_reports_failure() {
        let mut overlay = overlay(MemoryStore::new());
        let report = overlay.commit(Some(&["ghost.md".to_string()]));

        assert_eq!(report.outcomes.len(), 1);
        assert!(!report.outcomes[0].committed);
        assert_eq!(report.outcomes[0].kind, None);
    }

    #[test]
    fn test_propose_peek_abandon() {
        let mut overlay = overlay(MemoryStore::new().with_file("notes/a.md", "A"));

        let change = overlay.propose(ProposedChange::new(
            "step-1",
            ChangeKind::Modify {
                path: "./notes/a.md".to_string(),
                before: "A".to_string(),
                after: "B".to_string(),
            },
        ));
        assert_eq!(change.path(), "notes/a.md");

        let composite = overlay.peek("notes/a.md").unwrap();
        assert_eq!(composite.id, change.id);

        assert_eq!(overlay.abandon("step-1"), 1);
        assert!(overlay.peek("notes/a.md").is_none());
        assert_eq!(overlay.abandon("step-1"), 0);
        assert_eq!(text(overlay.view("notes/a.md").unwrap()), "A");
    }
}
