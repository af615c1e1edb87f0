//! Appends recordings to a fixture file.
//!
//! Each append is a locked read-merge-write: take an exclusive advisory lock
//! on `<file>.lock`, read the current array, push, write `<file>.tmp` and
//! rename it over the fixture. Readers therefore never see a partial file, and
//! writers in other processes never lose each other's entries.
//!
//! The `.lock` file is left in place after the append: deleting it while
//! another writer holds it would let a third writer lock a fresh inode.
//! Projects that commit `__replays__/` should ignore `__replays__/*.lock`.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use fs2::FileExt;
use serde_json::Value;

use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::error::Result;
use crate::stub::Stub;

#[derive(Debug, Clone)]
pub struct FixtureWriter {
    path: PathBuf,
}

impl FixtureWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writer for the test-specific fixture named by `config`.
    pub fn from_config(config: &ReplayConfig) -> Result<Self> {
        config.fixture_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advisory lock file shared by every writer of this fixture.
    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, ".lock")
    }

    pub fn append_stub(&self, stub: &Stub) -> Result<()> {
        self.append(&stub.to_json())
    }

    /// Append one recording to the end of the fixture array.
    ///
    /// An existing file that is not a JSON array is left untouched and
    /// reported as [`ReplayError::FixtureUnreadable`].
    pub fn append(&self, recording: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = self.lock_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock_file.lock_exclusive()?;

        // Lock released when `lock_file` drops.
        let mut entries = self.read_existing()?;
        entries.push(recording.clone());

        let tmp = sibling(&self.path, ".tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&Value::Array(entries))?)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!("appended recording to {}", self.path.display());
        Ok(())
    }

    fn read_existing(&self) -> Result<Vec<Value>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        match serde_json::from_slice(&raw) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(_) => Err(ReplayError::unreadable(
                &self.path,
                "top level is not an array",
            )),
            Err(e) => Err(ReplayError::unreadable(&self.path, e)),
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
