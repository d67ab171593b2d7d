//! The mailbox session capability and its production IMAP implementation.
//!
//! `MailboxSession` is the seam between the sync engine and the wire
//! protocol: folder listing and selection, UID search, chunked metadata and
//! content fetch, and the idle/active toggle. The production implementation
//! drives [`async_imap`]; tests substitute scripted fakes.

use async_imap::Session;
use async_imap::extensions::idle::Handle;
use async_imap::types::{Fetch, Name};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use tracing::debug;

use crate::stream::{ImapStream, connect_plain, connect_tls};
use crate::types::{FolderInfo, MessageSummary, Security, SessionConfig, Uid};
use crate::{Error, Result};

/// A stateful connection to a remote message store.
///
/// One folder is selected at a time; search and fetch operate on the
/// currently selected folder. The session is either *active* (free to issue
/// commands) or *idling* (waiting for server push); the two are mutually
/// exclusive and must be toggled explicitly via [`enter_idle`] and
/// [`exit_idle`].
///
/// [`enter_idle`]: MailboxSession::enter_idle
/// [`exit_idle`]: MailboxSession::exit_idle
#[async_trait]
pub trait MailboxSession {
    /// List all folders in the account.
    async fn list_folders(&mut self) -> Result<Vec<FolderInfo>>;

    /// Select a folder; `readonly` selects without marking messages seen.
    async fn select_folder(&mut self, folder: &str, readonly: bool) -> Result<()>;

    /// Return all message UIDs in the selected folder, ascending.
    async fn search_all(&mut self) -> Result<Vec<Uid>>;

    /// Fetch only the RFC-822 size for each of the given UIDs.
    async fn fetch_sizes(&mut self, uids: &[Uid]) -> Result<Vec<(Uid, u32)>>;

    /// Fetch size, internal date and subject for each of the given UIDs.
    async fn fetch_summaries(&mut self, uids: &[Uid]) -> Result<Vec<MessageSummary>>;

    /// Fetch the full RFC-822 content for each of the given UIDs.
    async fn fetch_bodies(&mut self, uids: &[Uid]) -> Result<Vec<(Uid, Vec<u8>)>>;

    /// Enter idle mode. Fails if already idling.
    async fn enter_idle(&mut self) -> Result<()>;

    /// Leave idle mode. Fails if not idling.
    async fn exit_idle(&mut self) -> Result<()>;
}

/// Connection state: either free to issue commands or parked in IDLE.
enum State {
    /// Active session, one folder possibly selected.
    Active(Session<ImapStream>),
    /// Parked in IDLE; commands require [`MailboxSession::exit_idle`] first.
    Idling(Handle<ImapStream>),
    /// A state transition failed mid-way; the connection is unusable.
    Broken,
}

/// Production mailbox session over an IMAP connection.
pub struct ImapSession {
    state: State,
}

impl ImapSession {
    /// Connect to the configured server and authenticate.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, TLS handshake or login fails, or
    /// if the configured security mode is not supported.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let stream = match config.security {
            Security::Tls => connect_tls(&config.host, config.port).await?,
            Security::None => connect_plain(&config.host, config.port).await?,
            Security::StartTls => return Err(Error::UnsupportedSecurity),
        };

        let mut client = async_imap::Client::new(stream);
        match client.read_response().await {
            Some(Ok(_greeting)) => debug!("read server greeting"),
            Some(Err(err)) => return Err(err.into()),
            None => {
                return Err(Error::Protocol(
                    "connection closed before greeting".to_string(),
                ));
            }
        }

        let session = client
            .login(&config.username, &config.password)
            .await
            .map_err(|(err, _client)| Error::Auth(err.to_string()))?;

        debug!(host = %config.host, port = config.port, "logged in");

        Ok(Self {
            state: State::Active(session),
        })
    }

    fn session_mut(&mut self) -> Result<&mut Session<ImapStream>> {
        match &mut self.state {
            State::Active(session) => Ok(session),
            State::Idling(_) => Err(Error::InvalidState(
                "operation requires an active session, but it is idling".to_string(),
            )),
            State::Broken => Err(Error::InvalidState("session is broken".to_string())),
        }
    }
}

/// Render a comma-separated UID set for a fetch command.
fn uid_set(uids: &[Uid]) -> String {
    uids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl MailboxSession for ImapSession {
    async fn list_folders(&mut self) -> Result<Vec<FolderInfo>> {
        let session = self.session_mut()?;
        let stream = session.list(Some(""), Some("*")).await?;
        let names: Vec<Name> = stream.try_collect().await?;

        Ok(names
            .iter()
            .map(|name| FolderInfo {
                name: name.name().to_string(),
                delimiter: name.delimiter().map(ToString::to_string),
                attributes: name
                    .attributes()
                    .iter()
                    .map(|attr| format!("{attr:?}"))
                    .collect(),
            })
            .collect())
    }

    async fn select_folder(&mut self, folder: &str, readonly: bool) -> Result<()> {
        let session = self.session_mut()?;
        let mailbox = if readonly {
            session.examine(folder).await?
        } else {
            session.select(folder).await?
        };
        debug!(folder, exists = mailbox.exists, "selected folder");
        Ok(())
    }

    async fn search_all(&mut self) -> Result<Vec<Uid>> {
        let session = self.session_mut()?;
        let mut uids: Vec<Uid> = session.uid_search("ALL").await?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch_sizes(&mut self, uids: &[Uid]) -> Result<Vec<(Uid, u32)>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let session = self.session_mut()?;
        let set = uid_set(uids);
        let stream = session.uid_fetch(&set, "(UID RFC822.SIZE)").await?;
        let fetches: Vec<Fetch> = stream.try_collect().await?;

        Ok(fetches
            .iter()
            .filter_map(|fetch| Some((fetch.uid?, fetch.size?)))
            .collect())
    }

    async fn fetch_summaries(&mut self, uids: &[Uid]) -> Result<Vec<MessageSummary>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let session = self.session_mut()?;
        let set = uid_set(uids);
        let stream = session
            .uid_fetch(&set, "(UID RFC822.SIZE INTERNALDATE ENVELOPE)")
            .await?;
        let fetches: Vec<Fetch> = stream.try_collect().await?;

        let mut summaries = Vec::with_capacity(fetches.len());
        for fetch in &fetches {
            let (Some(uid), Some(size)) = (fetch.uid, fetch.size) else {
                continue;
            };
            let subject = fetch
                .envelope()
                .and_then(|envelope| envelope.subject.as_ref())
                .map(|subject| String::from_utf8_lossy(subject.as_ref()).into_owned())
                .unwrap_or_default();
            summaries.push(MessageSummary {
                uid,
                size,
                internal_date: fetch.internal_date().map(|date| date.with_timezone(&Utc)),
                subject,
            });
        }
        Ok(summaries)
    }

    async fn fetch_bodies(&mut self, uids: &[Uid]) -> Result<Vec<(Uid, Vec<u8>)>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let session = self.session_mut()?;
        let set = uid_set(uids);
        let stream = session.uid_fetch(&set, "(UID BODY.PEEK[])").await?;
        let fetches: Vec<Fetch> = stream.try_collect().await?;

        Ok(fetches
            .iter()
            .filter_map(|fetch| Some((fetch.uid?, fetch.body()?.to_vec())))
            .collect())
    }

    async fn enter_idle(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Broken) {
            State::Active(session) => {
                let mut handle = session.idle();
                handle.init().await?;
                self.state = State::Idling(handle);
                Ok(())
            }
            State::Idling(handle) => {
                self.state = State::Idling(handle);
                Err(Error::InvalidState("already idling".to_string()))
            }
            State::Broken => Err(Error::InvalidState("session is broken".to_string())),
        }
    }

    async fn exit_idle(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Broken) {
            State::Idling(handle) => {
                let session = handle.done().await?;
                self.state = State::Active(session);
                Ok(())
            }
            State::Active(session) => {
                self.state = State::Active(session);
                Err(Error::InvalidState("not idling".to_string()))
            }
            State::Broken => Err(Error::InvalidState("session is broken".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_set_rendering() {
        assert_eq!(uid_set(&[1]), "1");
        assert_eq!(uid_set(&[3, 1, 9]), "3,1,9");
        assert_eq!(uid_set(&[]), "");
    }
}
