//! # maildump-imap
//!
//! The mailbox session capability for maildump: connection setup (plaintext
//! or implicit TLS via rustls), the [`MailboxSession`] trait the sync engine
//! drives, and a production implementation over `async-imap`.
//!
//! The wire protocol itself lives in `async-imap`; this crate only adapts it
//! to the narrow interface the dumper needs — folder listing and selection,
//! UID search, chunked metadata/content fetch, and the idle/active toggle.
//!
//! ## Example
//!
//! ```ignore
//! use maildump_imap::{ImapSession, MailboxSession, SessionConfig};
//!
//! let config = SessionConfig::new("imap.example.com", 993)
//!     .credentials("user@example.com", "password");
//!
//! let mut session = ImapSession::connect(&config).await?;
//! for folder in session.list_folders().await? {
//!     println!("{}", folder.name);
//! }
//! session.enter_idle().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod session;
pub mod stream;
mod types;

pub use error::{Error, Result};
pub use session::{ImapSession, MailboxSession};
pub use stream::ImapStream;
pub use types::{FolderInfo, MessageSummary, Security, SessionConfig, Uid};
