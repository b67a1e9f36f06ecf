//! JSON export of the tracking session.

use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::geo::LocationSample;
use crate::state::{ChatMessage, Roster, Transcript, User};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to format export timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write export to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Snapshot written to `live-tracking-<date>.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument<'a> {
    pub users: Vec<&'a User>,
    pub chat_messages: Vec<&'a ChatMessage>,
    pub recorded_route: &'a [LocationSample],
    /// RFC 3339 export time.
    pub timestamp: String,
}

impl<'a> ExportDocument<'a> {
    /// # Errors
    ///
    /// [`ExportError::Timestamp`] if `at` cannot be rendered as RFC 3339.
    pub fn new(
        roster: &'a Roster,
        transcript: &'a Transcript,
        recorded_route: &'a [LocationSample],
        at: OffsetDateTime,
    ) -> Result<Self, ExportError> {
        Ok(Self {
            users: roster.iter().collect(),
            chat_messages: transcript.iter().collect(),
            recorded_route,
            timestamp: at.format(&Rfc3339)?,
        })
    }

    /// # Errors
    ///
    /// [`ExportError::Serialize`] on serializer failure.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `live-tracking-YYYY-MM-DD.json` for the date of `at`.
#[must_use]
pub fn export_file_name(at: OffsetDateTime) -> String {
    format!(
        "live-tracking-{:04}-{:02}-{:02}.json",
        at.year(),
        u8::from(at.month()),
        at.day()
    )
}

/// Write the document into `dir` under its dated file name.
///
/// # Errors
///
/// [`ExportError`] if the document cannot be serialized or written.
pub async fn write_export(
    dir: &Path,
    document: &ExportDocument<'_>,
    at: OffsetDateTime,
) -> Result<PathBuf, ExportError> {
    let path = dir.join(export_file_name(at));
    let json = document.to_json()?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
    info!(
        path = %path.display(),
        users = document.users.len(),
        messages = document.chat_messages.len(),
        route_points = document.recorded_route.len(),
        "export written"
    );
    Ok(path)
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
