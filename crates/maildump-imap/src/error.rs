//! Error types for the mailbox session library.

use thiserror::Error;

/// Errors that can occur during mailbox session operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// IMAP protocol operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] async_imap::error::Error),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Security mode not supported.
    #[error("Security mode not supported: only SSL/TLS and plaintext are currently supported")]
    UnsupportedSecurity,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
