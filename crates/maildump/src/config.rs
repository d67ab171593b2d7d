//! Run settings: defaults, config-file loading and CLI merging.
//!
//! Precedence is defaults < config files (in the order given) < explicitly
//! set command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::Deserialize;

use maildump_core::{DumpConfig, RunMode};
use maildump_imap::SessionConfig;

use crate::cli::{Cli, EncryptionMode};

/// One TOML config file; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Hostname of the IMAP server.
    pub host: Option<String>,
    /// Port of the IMAP server.
    pub port: Option<u16>,
    /// Username for the IMAP account.
    pub username: Option<String>,
    /// Password of the IMAP account.
    pub password: Option<String>,
    /// Database file path.
    pub database_file: Option<PathBuf>,
    /// IMAP encryption mode.
    pub encryption_mode: Option<EncryptionMode>,
    /// Folder inclusion pattern.
    pub folder_regex: Option<String>,
    /// Where to dump .eml files to.
    pub dump_folder: Option<PathBuf>,
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Hostname of the IMAP server; has no default and must be configured.
    pub host: String,
    /// Port of the IMAP server.
    pub port: u16,
    /// Username for the IMAP account.
    pub username: String,
    /// Password of the IMAP account.
    pub password: String,
    /// Database file path.
    pub database_file: PathBuf,
    /// IMAP encryption mode.
    pub encryption_mode: EncryptionMode,
    /// Folder inclusion pattern.
    pub folder_regex: String,
    /// Where to dump .eml files to.
    pub dump_folder: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 993,
            username: String::new(),
            password: String::new(),
            database_file: PathBuf::from(".maildump-cache.db"),
            encryption_mode: EncryptionMode::Ssl,
            folder_regex: "^.*$".to_string(),
            dump_folder: PathBuf::from("dumped_mails"),
        }
    }
}

impl Settings {
    /// Load and apply every config file given on the command line, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed.
    pub fn load_files(&mut self, paths: &[PathBuf]) -> anyhow::Result<()> {
        for path in paths {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file '{}'", path.display()))?;
            let file: FileConfig = toml::from_str(&raw)
                .with_context(|| format!("parsing config file '{}'", path.display()))?;
            self.apply_file(file);
        }
        Ok(())
    }

    /// Overlay one config file's settings.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(username) = file.username {
            self.username = username;
        }
        if let Some(password) = file.password {
            self.password = password;
        }
        if let Some(database_file) = file.database_file {
            self.database_file = database_file;
        }
        if let Some(encryption_mode) = file.encryption_mode {
            self.encryption_mode = encryption_mode;
        }
        if let Some(folder_regex) = file.folder_regex {
            self.folder_regex = folder_regex;
        }
        if let Some(dump_folder) = file.dump_folder {
            self.dump_folder = dump_folder;
        }
    }

    /// Overlay every flag the user explicitly set on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref host) = cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(ref username) = cli.username {
            self.username = username.clone();
        }
        if let Some(ref password) = cli.password {
            self.password = password.clone();
        }
        if let Some(ref database_file) = cli.database_file {
            self.database_file = database_file.clone();
        }
        if let Some(encryption_mode) = cli.encryption_mode {
            self.encryption_mode = encryption_mode;
        }
        if let Some(ref folder_regex) = cli.folder_regex {
            self.folder_regex = folder_regex.clone();
        }
        if let Some(ref dump_folder) = cli.dump_folder {
            self.dump_folder = dump_folder.clone();
        }
    }

    /// Turn the resolved settings into a run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no host is configured.
    pub fn into_dump_config(self, mode: RunMode, dry_run: bool) -> anyhow::Result<DumpConfig> {
        if self.host.is_empty() {
            bail!("no IMAP host configured; pass --host or a config file");
        }

        let session = SessionConfig::new(self.host, self.port)
            .credentials(self.username, self.password)
            .security(self.encryption_mode.to_security());

        Ok(DumpConfig {
            session,
            folder_pattern: self.folder_regex,
            dump_root: expand_home(&self.dump_folder),
            database_file: expand_home(&self.database_file),
            mode,
            dry_run,
        })
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    path.to_path_buf()
}
