//! Fixture loading.
//!
//! A fixture is a JSON array of stub objects. Entries that cannot be decoded
//! are skipped with a warning; only a missing or structurally invalid file
//! fails the load.

use std::path::Path;

use serde_json::Value;

use crate::error::ReplayError;
use crate::error::Result;
use crate::stub::Stub;

/// An entry the loader refused, with its position in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub index: usize,
    pub reason: String,
}

/// Stubs in file order plus whatever was skipped on the way.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub stubs: Vec<Stub>,
    pub skipped: Vec<SkippedEntry>,
}

/// Load every decodable stub from `path`, in file order.
pub fn load(path: &Path) -> Result<Vec<Stub>> {
    load_with_report(path).map(|report| report.stubs)
}

/// Like [`load`], but a missing file is an empty fixture.
pub fn load_optional(path: &Path) -> Result<Vec<Stub>> {
    if !path.exists() {
        tracing::debug!("no fixture at {}", path.display());
        return Ok(Vec::new());
    }
    load(path)
}

pub fn load_with_report(path: &Path) -> Result<LoadReport> {
    let raw = std::fs::read(path).map_err(|e| ReplayError::unreadable(path, e))?;
    let document: Value =
        serde_json::from_slice(&raw).map_err(|e| ReplayError::unreadable(path, e))?;
    let Value::Array(entries) = document else {
        return Err(ReplayError::unreadable(path, "top level is not an array"));
    };
    if let Some(index) = entries.iter().position(|entry| !entry.is_object()) {
        return Err(ReplayError::unreadable(
            path,
            format!("entry {index} is not an object"),
        ));
    }

    let mut report = LoadReport::default();
    for (index, entry) in entries.iter().enumerate() {
        match Stub::from_json(entry) {
            Ok(stub) => report.stubs.push(stub),
            Err(reason) => {
                tracing::warn!(
                    "skipping fixture entry {index} in {}: {reason}",
                    path.display()
                );
                report.skipped.push(SkippedEntry { index, reason });
            }
        }
    }

    tracing::debug!(
        "loaded {} stubs from {} ({} skipped)",
        report.stubs.len(),
        path.display(),
        report.skipped.len()
    );
    Ok(report)
}
