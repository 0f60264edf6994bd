//! # mailprobe-core
//!
//! Health checks for mail servers, built on the SMTP and IMAP probe sessions.
//!
//! This crate provides:
//! - The health-check contract (status, result, context)
//! - SMTP and IMAP checks with serde-friendly options
//! - Probe definition files and concurrent batch runs
//!
//! Negative protocol outcomes (a rejected EHLO, LOGIN or SELECT) become
//! failure results with a description. Transport failures become failure
//! results carrying the error. Configuration mistakes are rejected when a
//! check is built.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod health;
pub mod options;
pub mod probes;
pub mod service;

pub use error::{Error, Result};
pub use health::{HealthCheck, HealthCheckContext, HealthCheckResult, HealthStatus};
pub use options::{FolderProbe, ImapHealthCheckOptions, SmtpHealthCheckOptions};
pub use probes::{NamedProbe, ProbeFile, ProbeReport};
pub use service::{ImapHealthCheck, SmtpHealthCheck};
