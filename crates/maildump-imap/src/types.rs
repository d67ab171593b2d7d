//! Session-facing types: configuration, folder listings and message metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned message number, unique within a folder at a point in time.
pub type Uid = u32;

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }

    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Tls => 993,
        }
    }
}

/// Configuration for a mailbox session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (default: 993 for TLS).
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
}

impl SessionConfig {
    /// Creates a new session configuration.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }
}

/// A folder as reported by the server's listing.
#[derive(Debug, Clone)]
pub struct FolderInfo {
    /// Folder path (including hierarchy).
    pub name: String,
    /// Hierarchy delimiter, if the server reports one.
    pub delimiter: Option<String>,
    /// Folder attributes (rendered for logging).
    pub attributes: Vec<String>,
}

/// Metadata for one message, fetched without its content.
#[derive(Debug, Clone)]
pub struct MessageSummary {
    /// Server-assigned message number.
    pub uid: Uid,
    /// RFC-822 byte size as reported by the server.
    pub size: u32,
    /// Server-side internal date.
    pub internal_date: Option<DateTime<Utc>>,
    /// Subject line, decoded lossily; empty if the message has none.
    pub subject: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports() {
        assert_eq!(Security::Tls.default_port(), 993);
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
    }

    #[test]
    fn config_builder() {
        let config = SessionConfig::new("imap.example.com", 993)
            .credentials("user@example.com", "hunter2")
            .security(Security::Tls);
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.username, "user@example.com");
        assert_eq!(config.security, Security::Tls);
    }
}
