use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The payload of one atomic edit. Renames never carry content; a rename
/// with an edit is two changes sharing timestamp order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeKind {
    Create {
        path: String,
        after: String,
    },
    Modify {
        path: String,
        before: String,
        after: String,
    },
    Delete {
        path: String,
        before: String,
    },
    Rename {
        old_path: String,
        path: String,
    },
}

impl ChangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeKind::Create { .. } => "create",
            ChangeKind::Modify { .. } => "modify",
            ChangeKind::Delete { .. } => "delete",
            ChangeKind::Rename { .. } => "rename",
        }
    }

    /// The path this change lands on (the destination for renames).
    pub fn path(&self) -> &str {
        match self {
            ChangeKind::Create { path, .. }
            | ChangeKind::Modify { path, .. }
            | ChangeKind::Delete { path, .. }
            | ChangeKind::Rename { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedChange {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message_id: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl TrackedChange {
    pub fn new(message_id: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            message_id: message_id.into(),
            kind,
        }
    }

    pub fn create(
        message_id: impl Into<String>,
        path: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self::new(
            message_id,
            ChangeKind::Create {
                path: path.into(),
                after: after.into(),
            },
        )
    }

    pub fn modify(
        message_id: impl Into<String>,
        path: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self::new(
            message_id,
            ChangeKind::Modify {
                path: path.into(),
                before: before.into(),
                after: after.into(),
            },
        )
    }

    pub fn delete(
        message_id: impl Into<String>,
        path: impl Into<String>,
        before: impl Into<String>,
    ) -> Self {
        Self::new(
            message_id,
            ChangeKind::Delete {
                path: path.into(),
                before: before.into(),
            },
        )
    }

    pub fn rename(
        message_id: impl Into<String>,
        old_path: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(
            message_id,
            ChangeKind::Rename {
                old_path: old_path.into(),
                path: path.into(),
            },
        )
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn path(&self) -> &str {
        self.kind.path()
    }
}

/// An edit as proposed by a caller, before the ledger assigns it an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedChange {
    pub message_id: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProposedChange {
    pub fn new(message_id: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            message_id: message_id.into(),
            kind,
            timestamp: None,
        }
    }

    pub fn into_tracked(self) -> TrackedChange {
        let change = TrackedChange::new(self.message_id, self.kind);
        match self.timestamp {
            Some(timestamp) => change.with_timestamp(timestamp),
            None => change,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeKind {
    Create,
    Modify,
    Delete,
    /// Only produced by a lineage made of renames alone.
    Rename,
}

impl CompositeKind {
    pub fn as_str(&self) -> &str {
        match self {
            CompositeKind::Create => "create",
            CompositeKind::Modify => "modify",
            CompositeKind::Delete => "delete",
            CompositeKind::Rename => "rename",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(CompositeKind::Create),
            "modify" => Some(CompositeKind::Modify),
            "delete" => Some(CompositeKind::Delete),
            "rename" => Some(CompositeKind::Rename),
            _ => None,
        }
    }
}

/// The net effect of every surviving change in one path's lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeChange {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub kind: CompositeKind,
    pub before: Option<String>,
    pub after: Option<String>,
    pub renamed_from: Option<String>,
}

impl CompositeChange {
    /// Where the lineage's content lives on the real store right now.
    pub fn source_path(&self) -> &str {
        self.renamed_from.as_deref().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictReason {
    Text,
    Deleted,
}

/// Returned from a read when a staged edit cannot be reconciled with disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictBundle {
    pub conflict: bool,
    pub reason: ConflictReason,
    pub disk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

impl ConflictBundle {
    pub fn text(disk: Option<String>, staged: Option<String>, base: Option<String>) -> Self {
        Self {
            conflict: true,
            reason: ConflictReason::Text,
            disk,
            staged,
            base,
        }
    }

    pub fn deleted(disk: String, base: Option<String>) -> Self {
        Self {
            conflict: true,
            reason: ConflictReason::Deleted,
            disk: Some(disk),
            staged: None,
            base,
        }
    }
}

/// A mediated read: plain text, or a conflict the caller has to resolve.
/// Serializes as a bare string or as the conflict object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileView {
    Content(String),
    Conflict(ConflictBundle),
}

impl FileView {
    pub fn content(&self) -> Option<&str> {
        match self {
            FileView::Content(content) => Some(content),
            FileView::Conflict(_) => None,
        }
    }

    pub fn conflict(&self) -> Option<&ConflictBundle> {
        match self {
            FileView::Content(_) => None,
            FileView::Conflict(bundle) => Some(bundle),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameEvent {
    pub old_path: String,
    pub new_path: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathOutcome {
    pub path: String,
    pub kind: Option<CompositeKind>,
    pub renamed_from: Option<String>,
    pub committed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitReport {
    pub outcomes: Vec<PathOutcome>,
}

impl CommitReport {
    pub fn committed(&self) -> impl Iterator<Item = &PathOutcome> {
        self.outcomes.iter().filter(|o| o.committed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PathOutcome> {
        self.outcomes.iter().filter(|o| !o.committed)
    }

    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.committed)
    }
}

/// A path that was written to the real store, kept for `editlayer log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: Uuid,
    pub path: String,
    pub kind: CompositeKind,
    pub renamed_from: Option<String>,
    pub committed_at: DateTime<Utc>,
}

impl CommitRecord {
    pub fn from_outcome(outcome: &PathOutcome) -> Option<Self> {
        if !outcome.committed {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            path: outcome.path.clone(),
            kind: outcome.kind?,
            renamed_from: outcome.renamed_from.clone(),
            committed_at: Utc::now(),
        })
    }
}

pub(crate) fn hash_content(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_creation() {
        let change = TrackedChange::modify("msg-1", "notes.md", "old", "new");

        assert_eq!(change.kind.as_str(), "modify");
        assert_eq!(change.path(), "notes.md");
        assert_eq!(change.message_id, "msg-1");
    }

    #[test]
    fn test_rename_path_is_destination() {
        let change = TrackedChange::rename("msg-1", "a.md", "b.md");
        assert_eq!(change.path(), "b.md");
    }

    #[test]
    fn test_proposed_change_keeps_timestamp() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut proposed = ProposedChange::new(
            "msg-1",
            ChangeKind::Create {
                path: "a.md".to_string(),
                after: "hi".to_string(),
            },
        );
        proposed.timestamp = Some(ts);

        let tracked = proposed.into_tracked();
        assert_eq!(tracked.timestamp, ts);
        assert_eq!(tracked.message_id, "msg-1");
    }

    #[test]
    fn test_tracked_change_wire_shape() {
        let change = TrackedChange::rename("msg-1", "a.md", "b.md");
        let value = serde_json::to_value(&change).unwrap();

        assert_eq!(value["kind"], "rename");
        assert_eq!(value["old_path"], "a.md");
        assert_eq!(value["path"], "b.md");

        let parsed: TrackedChange = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, change);
    }

    #[test]
    fn test_conflict_bundle_wire_shape() {
        let bundle = ConflictBundle::deleted("still here".to_string(), None);
        let value = serde_json::to_value(FileView::Conflict(bundle)).unwrap();

        assert_eq!(value["conflict"], true);
        assert_eq!(value["reason"], "deleted");
        assert_eq!(value["disk"], "still here");
        assert!(value.get("staged").is_none());
        assert!(value.get("base").is_none());
    }

    #[test]
    fn test_file_view_content_is_bare_string() {
        let value = serde_json::to_value(FileView::Content("hello".to_string())).unwrap();
        assert_eq!(value, serde_json::json!("hello"));

        let parsed: FileView = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.content(), Some("hello"));
    }

    #[test]
    fn test_rename_event_uses_camel_case() {
        let event = RenameEvent {
            old_path: "a.md".to_string(),
            new_path: "b.md".to_string(),
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["oldPath"], "a.md");
        assert_eq!(value["newPath"], "b.md");
        assert_eq!(value["timestamp"], 1_700_000_000_123i64);
    }

    #[test]
    fn test_commit_record_skips_failures() {
        let failed = PathOutcome {
            path: "a.md".to_string(),
            kind: Some(CompositeKind::Modify),
            renamed_from: None,
            committed: false,
            error: Some("drift".to_string()),
        };
        assert!(CommitRecord::from_outcome(&failed).is_none());

        let ok = PathOutcome {
            committed: true,
            error: None,
            ..failed
        };
        let record = CommitRecord::from_outcome(&ok).unwrap();
        assert_eq!(record.kind, CompositeKind::Modify);
    }
}
