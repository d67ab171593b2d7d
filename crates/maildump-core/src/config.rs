//! Run configuration model.

use std::path::PathBuf;

use regex::Regex;

use maildump_imap::SessionConfig;

use crate::Result;

/// How a run treats existing cache and dump state.
///
/// Recreate and mirror are mutually exclusive by construction; the
/// orthogonal dry-run switch lives on [`DumpConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Fetch only new or changed messages; never delete anything.
    #[default]
    Incremental,
    /// Discard all cache and dumped files, then rebuild from scratch.
    Recreate,
    /// Make local state an exact reflection of remote state, deleting
    /// local cache entries and files with no remote counterpart.
    Mirror,
}

impl RunMode {
    /// Whether this is a full-recreate run.
    #[must_use]
    pub const fn is_recreate(self) -> bool {
        matches!(self, Self::Recreate)
    }

    /// Whether this is a mirror run.
    #[must_use]
    pub const fn is_mirror(self) -> bool {
        matches!(self, Self::Mirror)
    }
}

/// Everything one dump run needs to know.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    /// Server connection and credentials.
    pub session: SessionConfig,
    /// Inclusion pattern matched against the start of each folder name;
    /// non-matching folders are skipped entirely.
    pub folder_pattern: String,
    /// Directory the `.eml` tree is written under.
    pub dump_root: PathBuf,
    /// Path of the sqlite cache file.
    pub database_file: PathBuf,
    /// Run mode.
    pub mode: RunMode,
    /// Simulate: report every decision but mutate nothing real.
    pub dry_run: bool,
}

/// Compiled folder inclusion filter.
///
/// A folder is included when the pattern matches at the start of its name
/// (a match further in does not count).
#[derive(Debug)]
pub struct FolderFilter {
    pattern: Regex,
}

impl FolderFilter {
    /// Compile the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regex.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Whether the given folder name is included.
    #[must_use]
    pub fn matches(&self, folder: &str) -> bool {
        self.pattern
            .find(folder)
            .is_some_and(|found| found.start() == 0)
    }
}
