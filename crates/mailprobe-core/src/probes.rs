//! Probe definition files and batch runs.
//!
//! ```json
//! {
//!   "smtp": [{ "name": "outbound", "host": "smtp.example.com", "port": 587 }],
//!   "imap": [{ "name": "inbox", "host": "imap.example.com", "port": 993,
//!              "account": { "username": "svc", "password": "secret" },
//!              "folder": { "check_folder": true, "folder_name": "INBOX" } }]
//! }
//! ```

use std::path::Path;

use mailprobe_transport::CancellationToken;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::Result;
use crate::health::{HealthCheck, HealthCheckContext, HealthCheckResult};
use crate::options::{ImapHealthCheckOptions, SmtpHealthCheckOptions};
use crate::service::{ImapHealthCheck, SmtpHealthCheck};

/// A probe definition with its registration name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedProbe<T> {
    /// Name reported with the result.
    pub name: String,
    /// Probe options.
    #[serde(flatten)]
    pub options: T,
}

/// Every probe in a definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFile {
    /// SMTP probes.
    #[serde(default)]
    pub smtp: Vec<NamedProbe<SmtpHealthCheckOptions>>,
    /// IMAP probes.
    #[serde(default)]
    pub imap: Vec<NamedProbe<ImapHealthCheckOptions>>,
}

/// Outcome of one probe in a batch.
#[derive(Debug)]
pub struct ProbeReport {
    /// "smtp" or "imap".
    pub protocol: &'static str,
    /// Registration name.
    pub name: String,
    /// Check result.
    pub result: HealthCheckResult,
}

impl ProbeFile {
    /// Parses a definition file.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a definition file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Total number of probes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.smtp.len() + self.imap.len()
    }

    /// Returns true if the file defines no probes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every probe concurrently and returns the reports in file order,
    /// SMTP probes first.
    ///
    /// All probes are validated before any connection is opened.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any probe is invalid.
    pub async fn run(self, cancel: CancellationToken) -> Result<Vec<ProbeReport>> {
        let smtp = self
            .smtp
            .into_iter()
            .map(|probe| Ok((probe.name, SmtpHealthCheck::new(probe.options)?)))
            .collect::<Result<Vec<_>>>()?;
        let imap = self
            .imap
            .into_iter()
            .map(|probe| Ok((probe.name, ImapHealthCheck::new(probe.options)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut tasks = JoinSet::new();
        let mut index = 0;
        for (name, check) in smtp {
            tasks.spawn(run_one(index, "smtp", name, check, cancel.clone()));
            index += 1;
        }
        for (name, check) in imap {
            tasks.spawn(run_one(index, "imap", name, check, cancel.clone()));
            index += 1;
        }

        let mut reports = tasks.join_all().await;
        reports.sort_by_key(|(index, _)| *index);
        Ok(reports.into_iter().map(|(_, report)| report).collect())
    }
}

async fn run_one<H: HealthCheck>(
    index: usize,
    protocol: &'static str,
    name: String,
    check: H,
    cancel: CancellationToken,
) -> (usize, ProbeReport) {
    let context = HealthCheckContext::new(name);
    let result = check.check_health(&context, cancel).await;
    (
        index,
        ProbeReport {
            protocol,
            name: context.name,
            result,
        },
    )
}
