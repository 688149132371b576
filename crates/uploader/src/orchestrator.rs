//! Upload orchestrator.
//!
//! Drives one file through token creation, sequential chunk upload and
//! finalization polling, publishes progress events, and supports
//! cancellation.

use std::path::Path;

use chrono::Utc;
use kmcp_transfer::{
    ChunkPlan, ChunkSizeController, FileSource, SpeedCalculator, TransferError, UploadSession,
    upload_file_name,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::UploadSettings;
use crate::error::UploadError;
use crate::poller::FinalizationPoller;
use crate::retry::{RetryError, RetryExecutor};
use crate::transport::UploadTransport;
use crate::types::{ChunkReport, EventSink, RetryOperation, UploadEvent, UploadReport};

/// Uploads files through an [`UploadTransport`].
pub struct UploadOrchestrator<T> {
    transport: T,
    settings: UploadSettings,
    events: EventSink,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl<T: UploadTransport> UploadOrchestrator<T> {
    /// Creates a new orchestrator.
    pub fn new(transport: T, settings: UploadSettings) -> Self {
        let (events_tx, events_rx) = mpsc::channel(settings.event_capacity.max(1));
        Self {
            transport,
            settings,
            events: EventSink::new(events_tx),
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the cancellation token for uploads run by this orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Uploads `path` and returns the finalized token id.
    pub async fn upload(&self, path: &Path) -> Result<String, UploadError> {
        self.upload_with_report(path).await.map(|r| r.token_id)
    }

    /// Uploads `path` and returns the full transfer report.
    pub async fn upload_with_report(&self, path: &Path) -> Result<UploadReport, UploadError> {
        match self.run(path).await {
            Ok(report) => {
                self.events.emit(UploadEvent::Completed {
                    token_id: report.token_id.clone(),
                });
                info!(
                    path = %path.display(),
                    token = %report.token_id,
                    bytes = report.total_bytes,
                    chunks = report.chunks.len(),
                    retries = report.total_retries(),
                    "upload completed"
                );
                Ok(report)
            }
            Err(e) => {
                let err_msg = e.to_string();
                self.events.emit(UploadEvent::Failed {
                    error: err_msg.clone(),
                });
                error!(
                    path = %path.display(),
                    token = e.token_id().unwrap_or("-"),
                    error = %err_msg,
                    "upload failed"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, path: &Path) -> Result<UploadReport, UploadError> {
        self.settings.validate()?;
        self.check_cancelled()?;

        let started_at = Utc::now();

        // 1. Validate and open the file.
        let mut source = FileSource::open(path)
            .await
            .map_err(|e| UploadError::from_file(path, e))?;
        let total_size = source.total_size();
        let file_name = upload_file_name(path);
        let mut session = UploadSession::new(path, total_size);

        // 2. Create the server token.
        let token_id = self.create_token(&file_name, total_size).await?;
        session.set_token(&token_id);
        info!(
            path = %path.display(),
            token = %token_id,
            total_bytes = total_size,
            "upload token created"
        );
        self.events.emit(UploadEvent::TokenCreated {
            token_id: token_id.clone(),
            total_bytes: total_size,
        });

        // 3. Send chunks in offset order.
        let chunks = self.send_chunks(&mut source, &mut session, &token_id).await?;
        drop(source);

        // 4. Wait for the server to assemble the file.
        self.events.emit(UploadEvent::Finalizing {
            token_id: token_id.clone(),
        });
        let mut poller = FinalizationPoller::new(
            &self.transport,
            &token_id,
            total_size,
            self.settings.finalize,
            self.settings.status_retry,
            &self.cancel,
            &self.events,
        );
        poller.run().await?;
        let finalize_polls = poller.polls();

        Ok(UploadReport {
            token_id,
            file_name,
            total_bytes: total_size,
            chunks,
            finalize_polls,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn create_token(&self, file_name: &str, total_size: u64) -> Result<String, UploadError> {
        let executor = RetryExecutor::new(
            self.settings.create_retry,
            RetryOperation::CreateToken,
            &self.cancel,
            &self.events,
        );
        executor
            .run(|| self.transport.create_token(file_name, total_size))
            .await
            .map(|t| t.value.id)
            .map_err(|e| match e {
                RetryError::Cancelled => UploadError::Cancelled,
                RetryError::Failed { attempts, error } => UploadError::TokenCreation {
                    file_name: file_name.to_string(),
                    attempts,
                    source: error,
                },
            })
    }

    async fn send_chunks(
        &self,
        source: &mut FileSource,
        session: &mut UploadSession,
        token_id: &str,
    ) -> Result<Vec<ChunkReport>, UploadError> {
        let total_size = session.total_size();
        let mut controller = ChunkSizeController::new(&self.settings.chunking);
        let mut speed = SpeedCalculator::default();
        let mut reports = Vec::new();

        while !session.is_complete() {
            self.check_cancelled()?;

            let chunk = source
                .next_chunk(controller.chunk_bytes())
                .await?
                .ok_or_else(|| {
                    TransferError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!(
                            "source ended at offset {} of {total_size}",
                            session.offset()
                        ),
                    ))
                })?;
            let plan = ChunkPlan::new(chunk, total_size);
            let len = plan.len() as u64;

            let executor = RetryExecutor::new(
                self.settings.chunk_retry,
                RetryOperation::UploadChunk {
                    offset: plan.offset,
                },
                &self.cancel,
                &self.events,
            );
            let started = Instant::now();
            let sent = executor
                .run(|| self.transport.upload_chunk(token_id, &plan))
                .await
                .map_err(|e| match e {
                    RetryError::Cancelled => UploadError::Cancelled,
                    RetryError::Failed { attempts, error } => UploadError::ChunkTransfer {
                        token_id: token_id.to_string(),
                        offset: plan.offset,
                        attempts,
                        source: error,
                    },
                })?;
            let elapsed = started.elapsed();

            controller.adjust(elapsed, plan.len());
            speed.add_sample(len, elapsed);
            session.advance(len)?;

            debug!(
                token = %token_id,
                offset = plan.offset,
                len,
                is_final = plan.is_final,
                retries = sent.retries(),
                elapsed_ms = elapsed.as_millis() as u64,
                next_chunk_kb = format_args!("{:.0}", controller.current_kb()),
                "chunk sent"
            );

            self.events.emit(UploadEvent::ChunkSent {
                token_id: token_id.to_string(),
                offset: plan.offset,
                len,
                is_final: plan.is_final,
                retries: sent.retries(),
                progress: session.progress(),
                next_chunk_bytes: controller.chunk_bytes(),
                bytes_per_second: speed.bytes_per_second(),
                eta: speed.eta(session.remaining()),
            });

            reports.push(ChunkReport {
                index: reports.len() as u32,
                offset: plan.offset,
                len,
                is_final: plan.is_final,
                retries: sent.retries(),
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }

        Ok(reports)
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}
