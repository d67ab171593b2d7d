//! Cache data model.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use maildump_imap::Uid;

use crate::identity::{TITLE_MAX_LEN, sanitize_title};

/// A message observed on the server, as remembered between runs.
#[derive(Debug, Clone)]
pub struct CachedMail {
    /// Stable identity: hex digest of `{folder}_{uid}`; the primary key.
    pub id: String,
    /// Server-assigned message number within its folder at fetch time.
    pub uid: Uid,
    /// Folder path as reported by the server.
    pub folder: String,
    /// Subject line, decoded; sanitized only when building the filename.
    pub title: String,
    /// Server-reported RFC-822 byte size; the sole change-detection signal.
    pub size: u32,
    /// Server-reported internal date, restored as the file's mtime.
    pub date: Option<DateTime<Utc>>,
    /// Set on insert.
    pub created: DateTime<Utc>,
    /// Set on insert and refreshed on every update.
    pub modified: DateTime<Utc>,
}

impl CachedMail {
    /// A not-yet-persisted record shell with only the identity set; the
    /// caller populates the remaining fields before saving.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            uid: 0,
            folder: String::new(),
            title: String::new(),
            size: 0,
            date: None,
            created: now,
            modified: now,
        }
    }

    /// File name this message is dumped under: `{id}_{sanitized title}.eml`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.eml",
            self.id,
            sanitize_title(&self.title, TITLE_MAX_LEN)
        )
    }

    /// Path of the dumped file relative to the dump root.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.folder).join(self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::generate_id;

    #[test]
    fn file_name_combines_id_and_sanitized_title() {
        let mut mail = CachedMail::new(generate_id("INBOX", 3));
        mail.title = "Hello World! 日本語".to_string();
        let name = mail.file_name();
        assert!(name.starts_with(&mail.id));
        assert!(name.ends_with("_Hello_World.eml"));
    }

    #[test]
    fn empty_title_still_yields_a_name() {
        let mail = CachedMail::new("abc123");
        assert_eq!(mail.file_name(), "abc123_.eml");
    }

    #[test]
    fn relative_path_is_under_the_folder() {
        let mut mail = CachedMail::new("abc123");
        mail.folder = "INBOX/Sub".to_string();
        assert_eq!(
            mail.relative_path(),
            PathBuf::from("INBOX/Sub").join("abc123_.eml")
        );
    }
}
