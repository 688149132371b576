//! Finalization polling after the last chunk.

use kmcp_protocol::{TokenHandle, TokenStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::retry::{RetryError, RetryExecutor, RetryPolicy};
use crate::transport::UploadTransport;
use crate::types::{EventSink, RetryOperation};

/// Poller state. Starts in `Polling`; the other two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Finalized,
    Abandoned,
}

/// Waits for the server to report a token fully uploaded.
///
/// Each poll is a status call under its own retry policy. Between polls
/// the poller backs off exponentially; once `policy.max_attempts` polls
/// have not seen `full` with the expected byte count it gives up.
///
/// There is no sleep after the last poll. With 5 polls and a 1 s base the
/// waits are 1, 2, 4 and 8 s; the 16 s step of the schedule is never taken.
pub struct FinalizationPoller<'a, T: UploadTransport + ?Sized> {
    transport: &'a T,
    token_id: &'a str,
    total_size: u64,
    policy: RetryPolicy,
    status_retry: RetryPolicy,
    cancel: &'a CancellationToken,
    events: &'a EventSink,
    state: PollState,
    polls: u32,
}

impl<'a, T: UploadTransport + ?Sized> FinalizationPoller<'a, T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: &'a T,
        token_id: &'a str,
        total_size: u64,
        policy: RetryPolicy,
        status_retry: RetryPolicy,
        cancel: &'a CancellationToken,
        events: &'a EventSink,
    ) -> Self {
        Self {
            transport,
            token_id,
            total_size,
            policy,
            status_retry,
            cancel,
            events,
            state: PollState::Polling,
            polls: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Polls issued so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Runs until the token is finalized or polling is abandoned.
    pub async fn run(&mut self) -> Result<TokenHandle, UploadError> {
        let max_polls = self.policy.max_attempts.max(1);

        while self.state == PollState::Polling {
            self.polls += 1;
            let status = self.poll_once().await?;

            if status.is_finalized(self.total_size) {
                self.state = PollState::Finalized;
                info!(token = %self.token_id, polls = self.polls, "upload finalized");
                return Ok(status);
            }

            debug!(
                token = %self.token_id,
                poll = self.polls,
                status = %status.status,
                uploaded = status.uploaded_bytes,
                expected = self.total_size,
                "token not finalized yet"
            );

            if self.polls >= max_polls {
                self.state = PollState::Abandoned;
                warn!(
                    token = %self.token_id,
                    polls = self.polls,
                    status = %status.status,
                    "giving up on finalization"
                );
                return Err(UploadError::TokenNotFinalized {
                    token_id: self.token_id.to_string(),
                    polls: self.polls,
                    last_status: status.status,
                    uploaded_bytes: status.uploaded_bytes,
                    total_size: self.total_size,
                });
            }

            let delay = self.policy.delay_for_attempt(self.polls);
            let cancel = self.cancel;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.state = PollState::Abandoned;
                    return Err(UploadError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        // Only reachable if `run` is called again after a terminal state.
        Err(UploadError::TokenNotFinalized {
            token_id: self.token_id.to_string(),
            polls: self.polls,
            last_status: TokenStatus::Unknown,
            uploaded_bytes: 0,
            total_size: self.total_size,
        })
    }

    async fn poll_once(&mut self) -> Result<TokenHandle, UploadError> {
        let executor = RetryExecutor::new(
            self.status_retry,
            RetryOperation::TokenStatus,
            self.cancel,
            self.events,
        );
        let transport = self.transport;
        let token_id = self.token_id;
        match executor.run(|| transport.get_token_status(token_id)).await {
            Ok(attempted) => Ok(attempted.value),
            Err(e) => {
                self.state = PollState::Abandoned;
                Err(match e {
                    RetryError::Cancelled => UploadError::Cancelled,
                    RetryError::Failed { attempts, error } => UploadError::StatusPoll {
                        token_id: token_id.to_string(),
                        attempts,
                        source: error,
                    },
                })
            }
        }
    }
}
