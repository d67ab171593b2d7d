//! # maildump-core
//!
//! The incremental synchronization engine behind maildump.
//!
//! This crate provides:
//! - Message identity and filesystem naming
//! - The durable message cache (`SQLite`)
//! - The sync engine (chunked diffing against the cache)
//! - The filesystem reconciler (dump directory cleanup and writes)
//! - The run controller (phase sequencing and session idle discipline)
//!
//! The mailbox session itself is a capability supplied by `maildump-imap`;
//! the engine only drives its trait.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
mod config;
pub mod dump;
mod error;
pub mod identity;

pub use cache::{CachedMail, MailRepository};
pub use config::{DumpConfig, FolderFilter, RunMode};
pub use dump::{CacheUpdate, DumpSummary, Dumper};
pub use error::{Error, Result};
