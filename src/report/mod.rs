//! Durable storage for generated reports.
//!
//! Identifiers derive from the save time at second resolution
//! (`report_%Y%m%d_%H%M%S.html`), which keeps lexicographic order equal
//! to chronological order. Two saves within the same second produce the
//! same identifier and the later write wins; that is a documented
//! boundary of the naming scheme, not detected or repaired here.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Errors from the report store.
#[derive(Debug, thiserror::Error)]
pub enum ReportStoreError {
    #[error("Report storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File-backed store for generated HTML reports.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identifier for a report saved at `ts`.
    pub fn file_name_for(ts: DateTime<Utc>) -> String {
        format!("report_{}.html", ts.format("%Y%m%d_%H%M%S"))
    }

    /// Whether `name` matches the report naming convention
    /// (8-digit date + 6-digit time).
    pub fn is_valid_report_name(name: &str) -> bool {
        let pattern = regex::Regex::new(r"^report_\d{8}_\d{6}\.html$").expect("static regex");
        pattern.is_match(name)
    }

    /// Save a report under the current time. Returns the identifier.
    pub fn save(&self, html: &str) -> Result<String, ReportStoreError> {
        self.save_at(html, Utc::now())
    }

    /// Save a report under an explicit timestamp.
    ///
    /// The content is written to a temporary file in the store
    /// directory and renamed into place, so readers never observe a
    /// partial report.
    pub fn save_at(&self, html: &str, ts: DateTime<Utc>) -> Result<String, ReportStoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let name = Self::file_name_for(ts);
        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)?;
        staged.write_all(html.as_bytes())?;
        staged
            .persist(self.dir.join(&name))
            .map_err(|e| ReportStoreError::Io(e.error))?;
        tracing::info!(report = %name, "Report saved");
        Ok(name)
    }

    /// All stored report identifiers, newest first.
    pub fn list(&self) -> Result<Vec<String>, ReportStoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| Self::is_valid_report_name(name))
            .collect();
        // The naming scheme is monotonic in time at second resolution,
        // so the lexicographic maximum is the most recent report.
        names.sort_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Most recently saved report identifier, if any.
    pub fn latest(&self) -> Result<Option<String>, ReportStoreError> {
        Ok(self.list()?.into_iter().next())
    }

    /// Read a stored report. Returns `None` when absent.
    pub fn read(&self, name: &str) -> Result<Option<String>, ReportStoreError> {
        match std::fs::read_to_string(self.dir.join(name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
