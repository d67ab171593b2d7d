//! The dump run: sync engine, filesystem reconciler and run controller.
//!
//! A run has two phases. The engine phase walks the remote folders and
//! brings the cache up to date; the writer phase reconciles the dump
//! directory against the cache and fetches content for files that are
//! missing. The controller sequences the two and keeps the session's
//! idle/active discipline: the connection parks in IDLE whenever no
//! commands need to be issued.

mod engine;
mod reconciler;

use tracing::info;

use maildump_imap::MailboxSession;

use crate::cache::MailRepository;
use crate::config::DumpConfig;
use crate::Result;

pub use engine::CacheUpdate;
pub use reconciler::DumpSummary;

/// Messages per metadata or content request. Bounds the size of a single
/// fetch round trip.
pub(crate) const CHUNK_SIZE: usize = 1000;

/// Orchestrates one dump run over a logged-in session and an open cache.
pub struct Dumper<S> {
    session: S,
    store: MailRepository,
    config: DumpConfig,
    idling: bool,
}

impl<S: MailboxSession> Dumper<S> {
    /// Create a controller over a freshly logged-in (active) session.
    #[must_use]
    pub fn new(session: S, store: MailRepository, config: DumpConfig) -> Self {
        Self {
            session,
            store,
            config,
            idling: false,
        }
    }

    /// Run one dump: update the cache from the server, then reconcile the
    /// dump directory and write missing messages.
    ///
    /// # Errors
    ///
    /// Returns the first session, database or I/O error; a failure aborts
    /// the remaining batches and folders of this run. Cache writes committed
    /// before the failure remain durable.
    pub async fn run(&mut self) -> Result<DumpSummary> {
        self.set_idle(true).await?;
        let update = self.update_cache().await?;
        self.write_dump(&update.empty_folders).await
    }

    /// Close the underlying cache store. Call once, after the last run.
    pub async fn close(self) {
        self.store.close().await;
    }

    /// The cache store this run reads and writes.
    #[must_use]
    pub const fn store(&self) -> &MailRepository {
        &self.store
    }

    /// Toggle the session between idle and active.
    ///
    /// Redundant calls are no-ops: the underlying protocol forbids entering
    /// IDLE twice or leaving it while active, so duplicates are only logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the protocol transition fails.
    pub async fn set_idle(&mut self, idle: bool) -> Result<()> {
        if idle == self.idling {
            info!("skipped duplicate IDLE call");
            return Ok(());
        }
        if idle {
            self.session.enter_idle().await?;
        } else {
            self.session.exit_idle().await?;
        }
        self.idling = idle;
        Ok(())
    }
}
