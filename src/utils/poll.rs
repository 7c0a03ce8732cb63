// src/utils/poll.rs
use std::future::Future;
use std::time::Duration;

/// How often to ask a remote job for its state, and for how long at most.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
pub enum PollError<E> {
    /// The check itself reported a failure.
    Failed(E),
    /// `max_wait` elapsed before the check reported ready.
    TimedOut(Duration),
}

/// Calls `check` until it yields `Some`, sleeping `policy.interval` between
/// attempts. The whole loop is cut off after `policy.max_wait`.
pub async fn poll_until<T, E, F, Fut>(policy: &PollPolicy, mut check: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let waiting = async {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match check().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {
                    tracing::debug!(
                        "Not ready after attempt {}, sleeping {:?}",
                        attempt,
                        policy.interval
                    );
                    tokio::time::sleep(policy.interval).await;
                }
                Err(e) => return Err(PollError::Failed(e)),
            }
        }
    };

    match tokio::time::timeout(policy.max_wait, waiting).await {
        Ok(result) => result,
        Err(_) => Err(PollError::TimedOut(policy.max_wait)),
    }
}
