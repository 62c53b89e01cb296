//! # editlayer-sdk
//!
//! SDK for AI agents to stage file edits through an editlayer server.
//!
//! ## Example
//!
//! ```no_run
//! use editlayer_sdk::EditLayerClient;
//!
//! let client = EditLayerClient::new("http://localhost:3030", "msg-1");
//!
//! // Stage an edit; nothing touches disk yet
//! client.modify_file("src/main.rs", "fn main() {}", "fn main() { run() }").unwrap();
//!
//! // Read the file as it will look once committed
//! let view = client.view("src/main.rs", false).unwrap();
//! println!("{:?}", view);
//!
//! // Write everything out
//! let report = client.commit(None).unwrap();
//! assert!(report.is_clean());
//! ```

use anyhow::{Context, Result};
use editlayer_core::{
    ChangeKind, CommitRecord, CommitReport, CompositeChange, FileView, ProposedChange,
    TrackedChange,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct EditLayerClient {
    base_url: String,
    message_id: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    paths: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct AbandonResponse {
    discarded: usize,
}

#[derive(Deserialize)]
struct RenameResponse {
    path: Option<String>,
}

impl EditLayerClient {
    /// Create a new editlayer client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the editlayer server (e.g., "http://localhost:3030")
    /// * `message_id` - Groups every change this client stages, so they can be
    ///   abandoned together
    pub fn new(base_url: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            message_id: message_id.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Same server, different message id.
    pub fn for_message(&self, message_id: impl Into<String>) -> Self {
        Self {
            base_url: self.base_url.clone(),
            message_id: message_id.into(),
            client: self.client.clone(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Stage a new file
    pub fn create_file(&self, path: &str, content: &str) -> Result<TrackedChange> {
        self.propose(ChangeKind::Create {
            path: path.to_string(),
            after: content.to_string(),
        })
    }

    /// Stage an edit to a file whose content was `before` when the edit was made
    pub fn modify_file(&self, path: &str, before: &str, after: &str) -> Result<TrackedChange> {
        self.propose(ChangeKind::Modify {
            path: path.to_string(),
            before: before.to_string(),
            after: after.to_string(),
        })
    }

    /// Stage a deletion
    pub fn delete_file(&self, path: &str, before: &str) -> Result<TrackedChange> {
        self.propose(ChangeKind::Delete {
            path: path.to_string(),
            before: before.to_string(),
        })
    }

    /// Stage a rename
    pub fn rename_file(&self, old_path: &str, new_path: &str) -> Result<TrackedChange> {
        self.propose(ChangeKind::Rename {
            old_path: old_path.to_string(),
            path: new_path.to_string(),
        })
    }

    fn propose(&self, kind: ChangeKind) -> Result<TrackedChange> {
        let request = ProposedChange::new(self.message_id.clone(), kind);

        let change = self
            .client
            .post(self.url("/changes"))
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(change)
    }

    /// Every staged composite
    pub fn pending(&self) -> Result<Vec<CompositeChange>> {
        let response = self
            .client
            .get(self.url("/changes"))
            .send()?
            .error_for_status()?;

        Ok(response.json()?)
    }

    /// The staged composite for one path, if any
    pub fn peek(&self, path: &str) -> Result<Option<CompositeChange>> {
        let response = self
            .client
            .get(self.url(&format!("/changes/{}", encode_path(path))))
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json()?))
    }

    /// Drop every staged change made under `message_id`
    pub fn abandon(&self, message_id: &str) -> Result<usize> {
        let response: AbandonResponse = self
            .client
            .delete(self.url(&format!("/messages/{}", encode_path(message_id))))
            .send()?
            .error_for_status()?
            .json()?;

        Ok(response.discarded)
    }

    /// Read a file through the overlay; `raw` skips staged edits
    pub fn view(&self, path: &str, raw: bool) -> Result<Option<FileView>> {
        let response = self
            .client
            .get(self.url(&format!("/files/{}", encode_path(path))))
            .query(&[("raw", raw)])
            .send()?
            .error_for_status()?;

        Ok(response.json()?)
    }

    /// Write staged changes to disk; `None` commits every staged path
    pub fn commit(&self, paths: Option<&[String]>) -> Result<CommitReport> {
        let response = self
            .client
            .post(self.url("/commit"))
            .json(&CommitRequest { paths })
            .send()?
            .error_for_status()?;

        response.json().context("invalid commit report")
    }

    /// Where `path` went if it was renamed on disk within `max_age_secs`
    pub fn resolve_rename(&self, path: &str, max_age_secs: Option<i64>) -> Result<Option<String>> {
        let mut request = self
            .client
            .get(self.url(&format!("/renames/{}", encode_path(path))));
        if let Some(secs) = max_age_secs {
            request = request.query(&[("max_age_secs", secs)]);
        }

        let response: RenameResponse = request.send()?.error_for_status()?.json()?;
        Ok(response.path)
    }

    /// Committed paths, newest first
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<CommitRecord>> {
        let mut request = self.client.get(self.url("/history"));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        Ok(request.send()?.error_for_status()?.json()?)
    }

    /// Check server health
    pub fn health_check(&self) -> Result<bool> {
        let response = self.client.get(self.url("/health")).send()?;

        Ok(response.status().is_success())
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }
}

/// Escapes the characters that would end a URL path segment early.
fn encode_path(path: &str) -> String {
    path.replace('%', "%25")
        .replace('#', "%23")
        .replace('?', "%3F")
        .replace(' ', "%20")
}
