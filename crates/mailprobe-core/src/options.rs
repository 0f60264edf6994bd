//! Probe options, as read from configuration files.

use mailprobe_transport::{ConnectionConfig, Credentials};
use serde::{Deserialize, Serialize};

/// Mailbox selected after login by the IMAP check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderProbe {
    /// Whether to run SELECT at all.
    #[serde(default)]
    pub check_folder: bool,
    /// Mailbox to select.
    #[serde(default = "default_folder_name")]
    pub folder_name: String,
}

impl FolderProbe {
    /// Probes `folder_name` after login.
    #[must_use]
    pub fn new(folder_name: impl Into<String>) -> Self {
        Self {
            check_folder: true,
            folder_name: folder_name.into(),
        }
    }
}

impl Default for FolderProbe {
    fn default() -> Self {
        Self {
            check_folder: false,
            folder_name: default_folder_name(),
        }
    }
}

fn default_folder_name() -> String {
    "INBOX".to_string()
}

/// Options for [`SmtpHealthCheck`](crate::SmtpHealthCheck).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpHealthCheckOptions {
    /// Server and security settings.
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    /// Credentials to log in with; the login step is skipped when unset.
    #[serde(default)]
    pub account: Option<Credentials>,
}

impl SmtpHealthCheckOptions {
    /// Checks connectivity only.
    #[must_use]
    pub const fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            account: None,
        }
    }

    /// Also logs in with `credentials`.
    #[must_use]
    pub fn with_account(mut self, credentials: Credentials) -> Self {
        self.account = Some(credentials);
        self
    }
}

/// Options for [`ImapHealthCheck`](crate::ImapHealthCheck).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImapHealthCheckOptions {
    /// Server and security settings.
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    /// Credentials to log in with; login and folder steps are skipped when unset.
    #[serde(default)]
    pub account: Option<Credentials>,
    /// Mailbox selected after login.
    #[serde(default)]
    pub folder: FolderProbe,
}

impl ImapHealthCheckOptions {
    /// Checks connectivity only.
    #[must_use]
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            account: None,
            folder: FolderProbe::default(),
        }
    }

    /// Also logs in with `credentials`.
    #[must_use]
    pub fn with_account(mut self, credentials: Credentials) -> Self {
        self.account = Some(credentials);
        self
    }

    /// Selects `folder_name` after logging in.
    #[must_use]
    pub fn with_folder(mut self, folder_name: impl Into<String>) -> Self {
        self.folder = FolderProbe::new(folder_name);
        self
    }
}
