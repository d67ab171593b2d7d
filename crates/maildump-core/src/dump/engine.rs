//! Cache update phase: diff the remote folders against the store.
//!
//! Two-phase fetch keeps transfer small: sizes first for the whole batch,
//! then full metadata only for messages that are new or changed. One extra
//! round trip per batch buys skipping the expensive fetch for everything
//! already cached.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};

use maildump_imap::{MailboxSession, Uid};

use super::{CHUNK_SIZE, Dumper};
use crate::cache::CachedMail;
use crate::config::FolderFilter;
use crate::identity::generate_id;
use crate::Result;

/// What the engine phase found, for the writer phase and for logging.
#[derive(Debug, Default)]
pub struct CacheUpdate {
    /// Folders with zero messages; still materialized as directories.
    pub empty_folders: Vec<String>,
    /// Number of new or updated records persisted this run.
    pub updated: usize,
}

impl<S: MailboxSession> Dumper<S> {
    /// Walk every included folder and bring the cache up to date.
    pub(crate) async fn update_cache(&mut self) -> Result<CacheUpdate> {
        info!("updating cache");
        self.set_idle(false).await?;

        let filter = FolderFilter::new(&self.config.folder_pattern)?;

        let mut folder_names = Vec::new();
        for folder in self.session.list_folders().await? {
            debug!(
                name = %folder.name,
                delimiter = ?folder.delimiter,
                attributes = ?folder.attributes,
                "listed folder"
            );
            if filter.matches(&folder.name) {
                folder_names.push(folder.name);
            } else {
                info!(folder = %folder.name, "skipping ignored folder");
            }
        }

        if self.config.mode.is_recreate() {
            let cleared = self.store.delete_all().await?;
            debug!(cleared, "cleared cache for recreate run");
        }

        let mut update = CacheUpdate::default();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut to_persist: Vec<CachedMail> = Vec::new();

        for folder_name in &folder_names {
            self.session.select_folder(folder_name, true).await?;
            let uids = self.session.search_all().await?;

            if uids.is_empty() {
                info!(folder = %folder_name, "skipping empty folder");
                update.empty_folders.push(folder_name.clone());
                continue;
            }

            info!(
                folder = %folder_name,
                messages = uids.len(),
                "processing folder"
            );

            let total = uids.len();
            let mut processed = 0usize;
            for chunk in uids.chunks(CHUNK_SIZE) {
                processed += chunk.len();

                let need_fetch = self.stale_uids(folder_name, chunk, &mut seen_ids).await?;
                if !need_fetch.is_empty() {
                    for summary in self.session.fetch_summaries(&need_fetch).await? {
                        let id = generate_id(folder_name, summary.uid);
                        let mut mail = self.store.get_or_create(&id).await?;
                        mail.uid = summary.uid;
                        mail.folder = folder_name.clone();
                        mail.title = summary.subject;
                        mail.size = summary.size;
                        mail.date = summary.internal_date;
                        mail.modified = Utc::now();
                        to_persist.push(mail);
                    }
                }

                let percentage = percentage(processed, total);
                info!(folder = %folder_name, "progress: {percentage:.2}%");
            }
        }

        update.updated = to_persist.len();
        self.store.save_all(&to_persist).await?;

        if self.config.mode.is_mirror() {
            let removed = self.store.delete_except(&seen_ids).await?;
            if removed > 0 {
                info!(removed, "removed cache entries no longer on the server");
            }
        }

        self.set_idle(true).await?;

        info!("done updating cache");
        info!(count = update.updated, "found new or updated messages to dump");

        Ok(update)
    }

    /// Decide which of the batch's messages must be fetched in full.
    ///
    /// Recreate treats everything as stale (the store was cleared at run
    /// start). Otherwise only sizes are fetched, each identity is recorded
    /// as seen for mirror bookkeeping, and the store decides freshness.
    async fn stale_uids(
        &mut self,
        folder_name: &str,
        chunk: &[Uid],
        seen_ids: &mut HashSet<String>,
    ) -> Result<Vec<Uid>> {
        if self.config.mode.is_recreate() {
            return Ok(chunk.to_vec());
        }

        let mut stale = Vec::new();
        for (uid, size) in self.session.fetch_sizes(chunk).await? {
            let id = generate_id(folder_name, uid);
            if self.config.mode.is_mirror() {
                seen_ids.insert(id.clone());
            }
            if self.store.needs_refresh(&id, size).await? {
                stale.push(uid);
            }
        }
        Ok(stale)
    }
}

/// Completion percentage for progress logging.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn percentage(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_clamped_to_batch_progress() {
        assert!((percentage(1000, 2500) - 40.0).abs() < f64::EPSILON);
        assert!((percentage(2500, 2500) - 100.0).abs() < f64::EPSILON);
        assert!((percentage(0, 0) - 100.0).abs() < f64::EPSILON);
    }
}
