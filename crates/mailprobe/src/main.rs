//! `mailprobe` - runs SMTP and IMAP health probes from a definition file
//!
//! Prints one line per probe and exits non-zero if any probe is not healthy.
//! Ctrl-C cancels every probe still in flight.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mailprobe_core::{ProbeFile, ProbeReport};
use mailprobe_transport::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run SMTP and IMAP health probes.
#[derive(Debug, Parser)]
#[command(name = "mailprobe", version, about)]
struct Cli {
    /// JSON file with `smtp` and `imap` probe lists
    probes: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailprobe=info,mailprobe_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let probes = ProbeFile::load(&cli.probes)
        .await
        .with_context(|| format!("Failed to load probes from {}", cli.probes.display()))?;
    if probes.is_empty() {
        tracing::warn!(path = %cli.probes.display(), "no probes defined");
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, cancelling probes");
                cancel.cancel();
            }
        }
    });

    tracing::info!(count = probes.len(), "running probes");
    let reports = probes.run(cancel).await.context("Invalid probe definition")?;

    let mut all_healthy = true;
    for report in &reports {
        all_healthy &= report.result.is_healthy();
        println!("{}", render(report));
    }

    Ok(if all_healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn render(report: &ProbeReport) -> String {
    let ProbeReport {
        protocol,
        name,
        result,
    } = report;
    match &result.description {
        Some(description) if !result.is_healthy() => {
            format!("{protocol}/{name}: {} - {description}", result.status)
        }
        _ => format!("{protocol}/{name}: {}", result.status),
    }
}
