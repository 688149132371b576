//! Wires the HTTP client, the orchestrator and the terminal together.

use std::path::Path;

use anyhow::Context;
use kmcp_upload_client::Client;
use kmcp_uploader::{UploadEvent, UploadOrchestrator, UploadSettings};
use tokio::sync::mpsc;

use crate::config::{Config, KS_ENV};

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub chunk_kb: Option<f64>,
    pub no_adaptive: bool,
}

impl Overrides {
    pub fn apply(&self, settings: &mut UploadSettings) {
        if let Some(kb) = self.chunk_kb {
            settings.chunking.initial_kb = kb;
        }
        if self.no_adaptive {
            settings.chunking.adaptive = false;
        }
    }
}

/// Uploads `file` and prints the token id, or the full report as JSON.
pub async fn run(file: &Path, config: Config, overrides: &Overrides, json: bool) -> anyhow::Result<()> {
    let mut settings = config.upload.clone();
    overrides.apply(&mut settings);

    let ks = config
        .session_key(std::env::var(KS_ENV).ok())
        .with_context(|| format!("no session key: set `ks` in the config or {KS_ENV}"))?;
    let client = Client::new(&config.service_url, &ks, settings.request_timeout())?;

    let mut orchestrator = UploadOrchestrator::new(client, settings);

    let printer = orchestrator
        .take_events()
        .map(|rx| tokio::spawn(log_events(rx)));

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling upload");
            cancel.cancel();
        }
    });

    let result = orchestrator.upload_with_report(file).await;

    // Closes the event channel so the printer drains and exits.
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let report = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.token_id);
    }
    Ok(())
}

/// Logs progress events until the orchestrator goes away.
async fn log_events(mut rx: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            UploadEvent::ChunkSent {
                offset,
                len,
                progress,
                bytes_per_second,
                eta,
                ..
            } => {
                tracing::info!(
                    offset,
                    len,
                    progress = format_args!("{:.1}%", progress * 100.0),
                    speed = %format_rate(bytes_per_second),
                    eta_secs = eta.map(|d| d.as_secs()),
                    "uploading"
                );
            }
            UploadEvent::Finalizing { token_id } => {
                tracing::info!(token = %token_id, "waiting for the server to finalize");
            }
            _ => {}
        }
    }
}

/// Formats a byte rate for humans.
fn format_rate(bytes_per_second: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    if bytes_per_second >= MIB {
        format!("{:.1} MiB/s", bytes_per_second / MIB)
    } else if bytes_per_second >= KIB {
        format!("{:.1} KiB/s", bytes_per_second / KIB)
    } else {
        format!("{bytes_per_second:.0} B/s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply() {
        let mut settings = UploadSettings::default();
        Overrides {
            chunk_kb: Some(256.0),
            no_adaptive: true,
        }
        .apply(&mut settings);
        assert_eq!(settings.chunking.initial_kb, 256.0);
        assert!(!settings.chunking.adaptive);
    }

    #[test]
    fn empty_overrides_keep_settings() {
        let mut settings = UploadSettings::default();
        Overrides::default().apply(&mut settings);
        assert_eq!(settings, UploadSettings::default());
    }

    #[test]
    fn rate_units() {
        assert_eq!(format_rate(512.0), "512 B/s");
        assert_eq!(format_rate(2048.0), "2.0 KiB/s");
        assert_eq!(format_rate(3.5 * 1024.0 * 1024.0), "3.5 MiB/s");
    }
}
