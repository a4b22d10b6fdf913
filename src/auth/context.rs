use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{AuthError, AuthResult};

/// Cancellation and deadline for one inbound call.
///
/// Store calls are raced against both; whichever fires first drops the
/// pending store future.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn run<T, E, F>(&self, fut: F) -> AuthResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<AuthError>,
    {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Canceled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(AuthError::DeadlineExceeded);
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthError::Canceled),
            _ = expired => Err(AuthError::DeadlineExceeded),
            result = fut => result.map_err(Into::into),
        }
    }
}
