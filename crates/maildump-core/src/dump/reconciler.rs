//! Writer phase: reconcile the dump directory with the cache.
//!
//! Everything under the dump root starts out "unknown"; paths accounted for
//! by cache records or empty folders are struck off, and whatever remains is
//! reported (and, in mirror mode, removed). Content is then fetched per
//! folder for files that do not exist yet.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use walkdir::WalkDir;

use maildump_imap::{MailboxSession, Uid};

use super::engine::percentage;
use super::{CHUNK_SIZE, Dumper};
use crate::Result;

/// Final counts of one writer phase.
#[derive(Debug, Default, Clone, Copy)]
pub struct DumpSummary {
    /// Messages written this run (or that would be, under dry-run).
    pub written: u64,
    /// Messages skipped because their file already existed.
    pub skipped: u64,
    /// Bytes actually written to disk (zero under dry-run).
    pub bytes_written: u64,
}

/// A message queued for content fetch, with its precomputed target.
struct PendingDownload {
    uid: Uid,
    path: PathBuf,
    date: Option<DateTime<Utc>>,
}

impl<S: MailboxSession> Dumper<S> {
    /// Reconcile the dump directory against the current cache contents and
    /// write new or changed messages.
    pub(crate) async fn write_dump(&mut self, empty_folders: &[String]) -> Result<DumpSummary> {
        info!("starting writer");

        let all_mails = self.store.list_all().await?;
        let dump_root = self.config.dump_root.clone();
        let dry_run = self.config.dry_run;
        let recreate = self.config.mode.is_recreate();
        let mirror = self.config.mode.is_mirror();

        info!(
            count = all_mails.len(),
            root = %dump_root.display(),
            "dumping messages"
        );

        if recreate && dump_root.is_dir() && !dry_run {
            info!(root = %dump_root.display(), "deleting dump root");
            tokio::fs::remove_dir_all(&dump_root).await?;
        }
        if !dry_run {
            tokio::fs::create_dir_all(&dump_root).await?;
        }

        let mut unknown_paths = walk_relative(&dump_root)?;

        for empty_folder in empty_folders {
            info!(folder = %empty_folder, "materializing empty folder");
            if !dry_run {
                tokio::fs::create_dir_all(dump_root.join(empty_folder)).await?;
            }
            account_for(&mut unknown_paths, Path::new(empty_folder));
        }

        let mut summary = DumpSummary::default();
        let mut to_write = 0u64;
        let mut queues: BTreeMap<String, Vec<PendingDownload>> = BTreeMap::new();

        for mail in &all_mails {
            let folder_dir = dump_root.join(&mail.folder);
            if !dry_run && !folder_dir.is_dir() {
                tokio::fs::create_dir_all(&folder_dir).await?;
            }

            account_for(&mut unknown_paths, &mail.relative_path());

            let target = dump_root.join(mail.relative_path());
            // skip the write if the file already exists and we're not recreating
            if target.exists() && !recreate {
                summary.skipped += 1;
                continue;
            }

            queues.entry(mail.folder.clone()).or_default().push(PendingDownload {
                uid: mail.uid,
                path: target,
                date: mail.date,
            });
            to_write += 1;
        }

        if to_write > 0 {
            self.set_idle(false).await?;
        }

        self.handle_unknown_paths(&dump_root, &unknown_paths, mirror, dry_run)
            .await?;

        for (folder_name, downloads) in &queues {
            self.session.select_folder(folder_name, true).await?;
            info!(
                folder = %folder_name,
                count = downloads.len(),
                "writing messages from folder"
            );

            let total = downloads.len();
            let mut processed = 0usize;
            for chunk in downloads.chunks(CHUNK_SIZE) {
                processed += chunk.len();

                let uids: Vec<Uid> = chunk.iter().map(|download| download.uid).collect();
                let by_uid: HashMap<Uid, &PendingDownload> =
                    chunk.iter().map(|download| (download.uid, download)).collect();

                for (uid, body) in self.session.fetch_bodies(&uids).await? {
                    let Some(download) = by_uid.get(&uid) else {
                        continue;
                    };
                    debug!(
                        uid,
                        bytes = body.len(),
                        path = %download.path.display(),
                        "writing message"
                    );
                    if !dry_run {
                        tokio::fs::write(&download.path, &body).await?;
                        summary.bytes_written += body.len() as u64;
                        if let Some(date) = download.date {
                            restore_mtime(&download.path, date)?;
                        }
                    }
                    summary.written += 1;
                }

                let percentage = percentage(processed, total);
                info!(folder = %folder_name, "write progress: {percentage:.2}%");
            }
        }

        if summary.written > 0 {
            self.set_idle(true).await?;
        }

        info!("done writing to filesystem");
        info!(
            written = summary.written,
            skipped = summary.skipped,
            bytes = summary.bytes_written,
            simulated = dry_run,
            "dump finished"
        );

        Ok(summary)
    }

    /// Report paths in the dump root that no cache record accounts for, and
    /// remove them in mirror mode.
    async fn handle_unknown_paths(
        &mut self,
        dump_root: &Path,
        unknown_paths: &HashSet<PathBuf>,
        mirror: bool,
        dry_run: bool,
    ) -> Result<()> {
        let mut unknown_mails: Vec<&PathBuf> = Vec::new();
        let mut unknown_other: Vec<&PathBuf> = Vec::new();
        for path in unknown_paths {
            let is_mail = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".eml"));
            if is_mail {
                unknown_mails.push(path);
            } else {
                unknown_other.push(path);
            }
        }
        unknown_mails.sort();
        unknown_other.sort();

        if !unknown_mails.is_empty() {
            let listing = join_listing(&unknown_mails);
            info!(
                count = unknown_mails.len(),
                "mail files in the dump folder that are not present on the server:\n{listing}"
            );
            if mirror {
                for path in &unknown_mails {
                    info!(path = %path.display(), "removing unknown mail file");
                    if !dry_run {
                        tokio::fs::remove_file(dump_root.join(path)).await?;
                    }
                }
            }
        }

        if !unknown_other.is_empty() {
            let listing = join_listing(&unknown_other);
            info!(
                count = unknown_other.len(),
                "unknown files/folders in the dump folder:\n{listing}"
            );
            if mirror {
                for path in &unknown_other {
                    let absolute = dump_root.join(path);
                    if absolute.is_file() {
                        info!(path = %path.display(), "removing unknown file");
                        if !dry_run {
                            tokio::fs::remove_file(&absolute).await?;
                        }
                    } else {
                        info!(path = %path.display(), "removing unknown folder");
                        // the folder may already be gone with a parent
                        if !dry_run && let Err(err) = tokio::fs::remove_dir_all(&absolute).await {
                            debug!(path = %path.display(), error = %err, "removal failed");
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Strike an accounted path off the unknown set, together with every
/// ancestor directory leading to it. Nested folder names ("Archive/2024")
/// would otherwise leave their parents in the set and mirror mode would
/// delete them recursively.
fn account_for(unknown_paths: &mut HashSet<PathBuf>, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        unknown_paths.remove(ancestor);
    }
}

/// Every path under `root`, relative to it. Empty if `root` does not exist.
fn walk_relative(root: &Path) -> Result<HashSet<PathBuf>> {
    let mut paths = HashSet::new();
    if !root.is_dir() {
        return Ok(paths);
    }
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if let Ok(relative) = entry.path().strip_prefix(root) {
            paths.insert(relative.to_path_buf());
        }
    }
    Ok(paths)
}

/// Set the file's access and modification times to the mail's timestamp.
fn restore_mtime(path: &Path, date: DateTime<Utc>) -> std::io::Result<()> {
    let time = std::time::SystemTime::from(date);
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(
        std::fs::FileTimes::new()
            .set_accessed(time)
            .set_modified(time),
    )
}

fn join_listing(paths: &[&PathBuf]) -> String {
    paths
        .iter()
        .map(|path| format!("'{}'", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn walk_relative_lists_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("INBOX/Sub")).unwrap();
        std::fs::write(dir.path().join("INBOX/a.eml"), b"x").unwrap();

        let paths = walk_relative(dir.path()).unwrap();
        assert!(paths.contains(Path::new("INBOX")));
        assert!(paths.contains(Path::new("INBOX/Sub")));
        assert!(paths.contains(Path::new("INBOX/a.eml")));
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn account_for_strikes_ancestors_too() {
        let mut unknown: HashSet<PathBuf> = [
            PathBuf::from("Archive"),
            PathBuf::from("Archive/2024"),
            PathBuf::from("Archive/2024/a.eml"),
            PathBuf::from("Other"),
        ]
        .into_iter()
        .collect();

        account_for(&mut unknown, Path::new("Archive/2024/a.eml"));
        let expected: HashSet<PathBuf> = [PathBuf::from("Other")].into_iter().collect();
        assert_eq!(unknown, expected);
    }

    #[test]
    fn walk_relative_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(walk_relative(&missing).unwrap().is_empty());
    }

    #[test]
    fn restore_mtime_sets_the_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.eml");
        std::fs::write(&path, b"body").unwrap();

        let date = chrono::DateTime::parse_from_rfc3339("2020-05-04T03:02:01Z")
            .unwrap()
            .with_timezone(&Utc);
        restore_mtime(&path, date).unwrap();

        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime, std::time::SystemTime::from(date));
    }
}
