//! Bounded polling primitives.
//!
//! Every convergence check in the verifier is expressed as a condition that is
//! re-evaluated on a fixed interval until it holds, fails fatally, or runs out
//! of time. Key concepts:
//!
//! - **Pending**: the condition is not met yet (including transient read
//!   failures). The driver sleeps and retries.
//! - **Satisfied**: the condition holds. The driver returns immediately.
//! - **Failed**: the check hit a non-retryable error. The driver aborts without
//!   spending the remaining budget.
//!
//! # Invariants
//!
//! - The condition is evaluated immediately, then at most once per interval.
//! - Every poll is bounded by its timeout; there is no unbounded retry.
//! - A shutdown signal, when attached, interrupts the sleep between attempts.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Outcome of one evaluation of a polled condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<E> {
    /// The condition holds.
    Satisfied,

    /// The condition does not hold yet; retry after the interval.
    ///
    /// The optional reason is kept as the last observed cause and reported if
    /// the poll eventually times out.
    Pending(Option<String>),

    /// A non-retryable error; abort the poll.
    Failed(E),
}

impl<E> PollStatus<E> {
    /// Not yet, without a specific reason.
    pub fn pending() -> Self {
        Self::Pending(None)
    }

    /// Not yet, with a reason worth surfacing on timeout.
    pub fn waiting(reason: impl Into<String>) -> Self {
        Self::Pending(Some(reason.into()))
    }

    /// Map a plain boolean check onto satisfied/pending.
    pub fn from_bool(done: bool) -> Self {
        if done {
            Self::Satisfied
        } else {
            Self::Pending(None)
        }
    }

    /// Returns true if the condition holds.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// Returns true if the condition should be retried.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Outcome of one evaluation of a polled lookup: like [`PollStatus`], but the
/// satisfied case carries what was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T, E> {
    Found(T),
    Pending(Option<String>),
    Failed(E),
}

impl<T, E> Lookup<T, E> {
    /// Not found yet, with a reason worth surfacing on timeout.
    pub fn waiting(reason: impl Into<String>) -> Self {
        Self::Pending(Some(reason.into()))
    }
}

impl<E> From<PollStatus<E>> for Lookup<(), E> {
    fn from(status: PollStatus<E>) -> Self {
        match status {
            PollStatus::Satisfied => Self::Found(()),
            PollStatus::Pending(reason) => Self::Pending(reason),
            PollStatus::Failed(e) => Self::Failed(e),
        }
    }
}

/// Polling errors.
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The deadline passed before the condition held.
    #[error("timeout after {elapsed:?} waiting for {condition}{}", observed_suffix(.last_observed))]
    Timeout {
        condition: String,
        elapsed: Duration,
        last_observed: Option<String>,
    },

    /// The check reported a non-retryable error.
    #[error("{condition} aborted: {source}")]
    Aborted {
        condition: String,
        #[source]
        source: E,
    },

    /// The shutdown signal fired while waiting.
    #[error("cancelled after {elapsed:?} waiting for {condition}")]
    Cancelled { condition: String, elapsed: Duration },
}

fn observed_suffix(last_observed: &Option<String>) -> String {
    match last_observed {
        Some(reason) => format!(" (last observed: {reason})"),
        None => String::new(),
    }
}

impl<E> PollError<E> {
    /// Returns true if the poll ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the poll was interrupted by shutdown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Name of the condition that failed to converge.
    pub fn condition(&self) -> &str {
        match self {
            Self::Timeout { condition, .. }
            | Self::Aborted { condition, .. }
            | Self::Cancelled { condition, .. } => condition,
        }
    }

    /// The fatal error returned by the check, if any.
    pub fn aborted_source(&self) -> Option<&E> {
        match self {
            Self::Aborted { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Interval and deadline for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Minimum delay between two evaluations.
    pub interval: Duration,

    /// Hard deadline measured from the first evaluation.
    pub timeout: Duration,
}

impl PollPolicy {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl fmt::Display for PollPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {:?} for {:?}", self.interval, self.timeout)
    }
}

/// Bounded retry driver.
///
/// Cloning a poller shares its shutdown signal.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    shutdown: Option<watch::Receiver<bool>>,
}

enum Wake {
    Elapsed,
    Cancelled,
}

impl Poller {
    /// Create a poller without a shutdown signal.
    pub fn new() -> Self {
        Self { shutdown: None }
    }

    /// Create a poller that stops waiting once `shutdown` becomes `true`.
    pub fn with_shutdown(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            shutdown: Some(shutdown),
        }
    }

    /// Evaluate `check` until it is satisfied, fails, or `policy.timeout` elapses.
    ///
    /// Returns the time spent polling on success.
    pub async fn poll<F, Fut, E>(
        &self,
        condition: &str,
        policy: PollPolicy,
        mut check: F,
    ) -> Result<Duration, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollStatus<E>>,
    {
        let ((), elapsed) = self
            .poll_for(condition, policy, || {
                let status = check();
                async move { Lookup::<(), E>::from(status.await) }
            })
            .await?;
        Ok(elapsed)
    }

    /// Evaluate `lookup` until it finds something, fails, or `policy.timeout`
    /// elapses.
    ///
    /// Returns what was found and the time spent polling.
    pub async fn poll_for<T, F, Fut, E>(
        &self,
        condition: &str,
        policy: PollPolicy,
        mut lookup: F,
    ) -> Result<(T, Duration), PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Lookup<T, E>>,
    {
        let started = Instant::now();
        let mut shutdown = self.shutdown.clone();
        let mut last_observed: Option<String> = None;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match lookup().await {
                Lookup::Found(value) => {
                    let elapsed = started.elapsed();
                    debug!(condition, attempt, elapsed = ?elapsed, "Condition satisfied");
                    return Ok((value, elapsed));
                }
                Lookup::Failed(source) => {
                    debug!(condition, attempt, "Condition check failed, aborting poll");
                    return Err(PollError::Aborted {
                        condition: condition.to_string(),
                        source,
                    });
                }
                Lookup::Pending(reason) => {
                    debug!(
                        condition,
                        attempt,
                        reason = reason.as_deref().unwrap_or("not yet"),
                        "Condition not met, will retry"
                    );
                    if reason.is_some() {
                        last_observed = reason;
                    }
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= policy.timeout {
                return Err(timeout(condition, elapsed, last_observed));
            }

            // The final nap only runs out the clock; the next check would come
            // sooner than one interval after the previous one.
            let nap = policy.interval.min(policy.timeout - elapsed);
            if let Wake::Cancelled = sleep_or_shutdown(shutdown.as_mut(), nap).await {
                return Err(PollError::Cancelled {
                    condition: condition.to_string(),
                    elapsed: started.elapsed(),
                });
            }
            if nap < policy.interval {
                return Err(timeout(condition, started.elapsed(), last_observed));
            }
        }
    }
}

fn timeout<E>(condition: &str, elapsed: Duration, last_observed: Option<String>) -> PollError<E> {
    PollError::Timeout {
        condition: condition.to_string(),
        elapsed,
        last_observed,
    }
}

async fn sleep_or_shutdown(shutdown: Option<&mut watch::Receiver<bool>>, nap: Duration) -> Wake {
    let sleep = tokio::time::sleep(nap);
    let Some(shutdown) = shutdown else {
        sleep.await;
        return Wake::Elapsed;
    };

    if *shutdown.borrow() {
        return Wake::Cancelled;
    }

    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Wake::Elapsed,
            changed = shutdown.changed() => match changed {
                Ok(()) => {
                    if *shutdown.borrow() {
                        return Wake::Cancelled;
                    }
                }
                // Sender dropped: nobody can cancel anymore.
                Err(_) => {
                    (&mut sleep).await;
                    return Wake::Elapsed;
                }
            },
        }
    }
}

/// Poll without a shutdown signal.
pub async fn poll_until<F, Fut, E>(
    condition: &str,
    policy: PollPolicy,
    check: F,
) -> Result<Duration, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollStatus<E>>,
{
    Poller::new().poll(condition, policy, check).await
}
