//! Message cache storage repository.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, info};

use super::model::CachedMail;
use crate::Result;

/// Repository for message cache storage and retrieval.
///
/// Batched writes happen inside one transaction; the transaction commit is
/// the durability boundary.
pub struct MailRepository {
    pool: SqlitePool,
}

impl MailRepository {
    /// Open the repository on the given database path.
    ///
    /// Creates the database and schema if they don't exist. `recreate` drops
    /// and rebuilds the schema first. `dry_run` operates on a throwaway
    /// in-memory copy seeded with the contents of any existing backing file,
    /// so reads reflect real history but writes never reach disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file is inaccessible or schema
    /// creation fails.
    pub async fn open(database_path: &Path, recreate: bool, dry_run: bool) -> Result<Self> {
        if dry_run {
            return Self::open_dry_run(database_path, recreate).await;
        }

        let url = format!("sqlite:{}?mode=rwc", database_path.display());
        debug!(%url, "opening cache database");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        if recreate {
            info!("recreating cache schema");
            sqlx::query("DROP TABLE IF EXISTS mails")
                .execute(&repo.pool)
                .await?;
        }
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository (used by tests and dry runs).
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation
    /// fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// In-memory store seeded from the persisted backing file, if any.
    async fn open_dry_run(database_path: &Path, recreate: bool) -> Result<Self> {
        let repo = Self::in_memory().await?;

        if !recreate && database_path.exists() {
            let url = format!("sqlite:{}?mode=ro", database_path.display());
            let backing_pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&url)
                .await?;
            let backing = Self { pool: backing_pool };
            let existing = backing.list_all().await?;
            repo.save_all(&existing).await?;
            backing.close().await;
            debug!(
                seeded = existing.len(),
                "seeded in-memory cache from backing file"
            );
        }

        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mails (
                id TEXT PRIMARY KEY,
                uid INTEGER NOT NULL,
                folder TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                size INTEGER NOT NULL,
                date TEXT,
                created TEXT NOT NULL,
                modified TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_mails_folder
            ON mails(folder)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a cached record by identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: &str) -> Result<Option<CachedMail>> {
        let row = sqlx::query(
            r"
            SELECT id, uid, folder, title, size, date, created, modified
            FROM mails
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(row_to_mail))
    }

    /// Get the existing record, or a new unsaved shell with only the
    /// identity set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_or_create(&self, id: &str) -> Result<CachedMail> {
        Ok(self.get(id).await?.unwrap_or_else(|| CachedMail::new(id)))
    }

    /// Whether the message must be fetched: no record with this identity, or
    /// a stored size differing from the server-reported one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn needs_refresh(&self, id: &str, size: u32) -> Result<bool> {
        Ok(self.get(id).await?.is_none_or(|mail| mail.size != size))
    }

    /// Upsert a batch of records inside one transaction.
    ///
    /// `created` is preserved for existing rows; `modified` is overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save_all(&self, mails: &[CachedMail]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for mail in mails {
            sqlx::query(
                r"
                INSERT INTO mails (id, uid, folder, title, size, date, created, modified)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    uid = excluded.uid,
                    folder = excluded.folder,
                    title = excluded.title,
                    size = excluded.size,
                    date = excluded.date,
                    modified = excluded.modified
                ",
            )
            .bind(&mail.id)
            .bind(mail.uid)
            .bind(&mail.folder)
            .bind(&mail.title)
            .bind(mail.size)
            .bind(mail.date.map(|date| date.to_rfc3339()))
            .bind(mail.created.to_rfc3339())
            .bind(mail.modified.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Remove every record. Used by full-recreate runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM mails").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Remove every record whose identity is not in `keep_ids`. Used by
    /// mirror runs to drop messages that vanished from the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_except(&self, keep_ids: &HashSet<String>) -> Result<u64> {
        let rows = sqlx::query("SELECT id FROM mails")
            .fetch_all(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for row in &rows {
            let id: String = row.get("id");
            if keep_ids.contains(&id) {
                continue;
            }
            let result = sqlx::query("DELETE FROM mails WHERE id = ?")
                .bind(&id)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }

    /// Get every cached record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> Result<Vec<CachedMail>> {
        let rows = sqlx::query(
            r"
            SELECT id, uid, folder, title, size, date, created, modified
            FROM mails
            ORDER BY folder, uid
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_mail).collect())
    }

    /// Get the distinct folder names present in the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_folders(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT folder FROM mails ORDER BY folder")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("folder")).collect())
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_mail(row: &SqliteRow) -> Option<CachedMail> {
    let parse = |value: String| {
        DateTime::parse_from_rfc3339(&value)
            .ok()
            .map(|date| date.with_timezone(&Utc))
    };

    Some(CachedMail {
        id: row.get("id"),
        uid: row.get::<u32, _>("uid"),
        folder: row.get("folder"),
        title: row.get("title"),
        size: row.get::<u32, _>("size"),
        date: row.get::<Option<String>, _>("date").and_then(parse),
        created: parse(row.get("created"))?,
        modified: parse(row.get("modified"))?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::generate_id;

    fn sample(folder: &str, uid: u32, size: u32) -> CachedMail {
        let mut mail = CachedMail::new(generate_id(folder, uid));
        mail.uid = uid;
        mail.folder = folder.to_string();
        mail.title = format!("message {uid}");
        mail.size = size;
        mail
    }

    #[tokio::test]
    async fn save_and_get_round_trip() {
        let repo = MailRepository::in_memory().await.unwrap();
        let mail = sample("INBOX", 1, 512);

        repo.save_all(std::slice::from_ref(&mail)).await.unwrap();

        let loaded = repo.get(&mail.id).await.unwrap().unwrap();
        assert_eq!(loaded.uid, 1);
        assert_eq!(loaded.folder, "INBOX");
        assert_eq!(loaded.size, 512);
        assert_eq!(loaded.title, "message 1");
    }

    #[tokio::test]
    async fn needs_refresh_semantics() {
        let repo = MailRepository::in_memory().await.unwrap();
        let mail = sample("INBOX", 1, 512);

        assert!(repo.needs_refresh(&mail.id, 512).await.unwrap());

        repo.save_all(std::slice::from_ref(&mail)).await.unwrap();
        assert!(!repo.needs_refresh(&mail.id, 512).await.unwrap());
        assert!(repo.needs_refresh(&mail.id, 513).await.unwrap());
    }

    #[tokio::test]
    async fn upsert_preserves_created_and_bumps_modified() {
        let repo = MailRepository::in_memory().await.unwrap();
        let mail = sample("INBOX", 1, 512);
        repo.save_all(std::slice::from_ref(&mail)).await.unwrap();
        let first = repo.get(&mail.id).await.unwrap().unwrap();

        let mut updated = first.clone();
        updated.size = 1024;
        updated.modified = first.modified + chrono::Duration::seconds(5);
        repo.save_all(std::slice::from_ref(&updated)).await.unwrap();

        let second = repo.get(&mail.id).await.unwrap().unwrap();
        assert_eq!(second.size, 1024);
        assert_eq!(second.created, first.created);
        assert!(second.modified > first.modified);
    }

    #[tokio::test]
    async fn delete_except_keeps_only_the_given_ids() {
        let repo = MailRepository::in_memory().await.unwrap();
        let mails = vec![sample("INBOX", 1, 10), sample("INBOX", 2, 20), sample("Sent", 1, 30)];
        repo.save_all(&mails).await.unwrap();

        let keep: HashSet<String> = [mails[0].id.clone()].into_iter().collect();
        let removed = repo.delete_except(&keep).await.unwrap();
        assert_eq!(removed, 2);

        let remaining = repo.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, mails[0].id);
    }

    #[tokio::test]
    async fn delete_all_empties_the_store() {
        let repo = MailRepository::in_memory().await.unwrap();
        repo.save_all(&[sample("INBOX", 1, 10), sample("Sent", 2, 20)])
            .await
            .unwrap();

        assert_eq!(repo.delete_all().await.unwrap(), 2);
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_folders_is_distinct_and_sorted() {
        let repo = MailRepository::in_memory().await.unwrap();
        repo.save_all(&[
            sample("Sent", 1, 10),
            sample("INBOX", 2, 20),
            sample("INBOX", 3, 30),
        ])
        .await
        .unwrap();

        assert_eq!(repo.list_folders().await.unwrap(), vec!["INBOX", "Sent"]);
    }

    #[tokio::test]
    async fn get_or_create_returns_shell_for_unknown_id() {
        let repo = MailRepository::in_memory().await.unwrap();
        let shell = repo.get_or_create("deadbeef").await.unwrap();
        assert_eq!(shell.id, "deadbeef");
        assert_eq!(shell.size, 0);
        // the shell is not persisted until saved
        assert!(repo.get("deadbeef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dry_run_store_reads_history_but_never_writes_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cache.db");

        let real = MailRepository::open(&db_path, false, false).await.unwrap();
        let mail = sample("INBOX", 1, 512);
        real.save_all(std::slice::from_ref(&mail)).await.unwrap();
        real.close().await;

        let dry = MailRepository::open(&db_path, false, true).await.unwrap();
        // reads reflect real history
        assert!(dry.get(&mail.id).await.unwrap().is_some());
        // writes stay in memory
        dry.save_all(&[sample("INBOX", 2, 99)]).await.unwrap();
        assert_eq!(dry.list_all().await.unwrap().len(), 2);
        dry.close().await;

        let reopened = MailRepository::open(&db_path, false, false).await.unwrap();
        assert_eq!(reopened.list_all().await.unwrap().len(), 1);
        reopened.close().await;
    }
}
