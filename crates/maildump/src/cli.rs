//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use maildump_core::RunMode;
use maildump_imap::Security;

/// Dump an IMAP account to a local directory.
#[derive(Debug, Parser)]
#[command(name = "maildump", version, about)]
pub struct Cli {
    /// Console log level
    #[arg(short = 'l', long = "logging", value_enum, default_value_t = LogLevel::Info)]
    pub logging: LogLevel,

    /// Hostname of the IMAP server
    #[arg(long)]
    pub host: Option<String>,

    /// Database file
    #[arg(short = 'f', long = "file")]
    pub database_file: Option<PathBuf>,

    /// Port of the IMAP server
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Username for the IMAP account
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password of the IMAP account
    #[arg(long)]
    pub password: Option<String>,

    /// IMAP encryption mode
    #[arg(long, value_enum)]
    pub encryption_mode: Option<EncryptionMode>,

    /// Pattern to match against for including folders
    #[arg(long)]
    pub folder_regex: Option<String>,

    /// Recreate the cache and the dump directory (destructive, this will
    /// delete dumped files!), then dump all matching messages
    #[arg(long, conflicts_with = "mirror")]
    pub recreate: bool,

    /// Remove all unknown files and folders from the dump folder and exactly
    /// mirror server state
    #[arg(long)]
    pub mirror: bool,

    /// Only simulate what would be done, don't actually write/change anything
    #[arg(long)]
    pub dry_run: bool,

    /// Where to dump .eml files to
    #[arg(long)]
    pub dump_folder: Option<PathBuf>,

    /// Supply a config file (can be specified multiple times)
    #[arg(short = 'c', long = "config")]
    pub config_files: Vec<PathBuf>,
}

impl Cli {
    /// The run mode selected by the mode flags.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        if self.recreate {
            RunMode::Recreate
        } else if self.mirror {
            RunMode::Mirror
        } else {
            RunMode::Incremental
        }
    }
}

/// Console log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Everything, including wire-level detail.
    Trace,
    /// Internal decisions per message and folder.
    Debug,
    /// Progress and summaries (the default).
    Info,
    /// Only problems.
    Warn,
    /// Only failures.
    Error,
}

impl LogLevel {
    /// The tracing filter directive for this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IMAP encryption mode, as spelled on the command line and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS on connect.
    Ssl,
    /// STARTTLS upgrade after plaintext connect.
    Starttls,
}

impl EncryptionMode {
    /// The session security mode this spelling stands for.
    #[must_use]
    pub const fn to_security(self) -> Security {
        match self {
            Self::None => Security::None,
            Self::Ssl => Security::Tls,
            Self::Starttls => Security::StartTls,
        }
    }
}
