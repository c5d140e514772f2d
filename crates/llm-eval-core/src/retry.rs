//! Deadlines and retries for capability calls
//!
//! Each attempt runs on a helper thread while the caller waits on a channel
//! with a deadline. A timed-out helper is detached and its late result
//! discarded. Retryable failures back off exponentially between attempts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::capability::CapabilityError;

/// Attempts, backoff and per-attempt deadline for external calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(1000),
            timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1-based): backoff, 2x, 4x, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }

    /// Run `call` with a deadline per attempt, retrying retryable failures
    ///
    /// Stops early without another attempt once `cancel` is set.
    pub fn run<T, E, F>(&self, label: &str, cancel: Option<&AtomicBool>, call: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: CapabilityError,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let call = Arc::new(call);
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let attempt_call = Arc::clone(&call);
            match call_with_deadline(self.timeout, move || attempt_call()) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let cancelled = cancel.map(|c| c.load(Ordering::SeqCst)).unwrap_or(false);
                    if !e.is_retryable() || attempt >= max_attempts || cancelled {
                        debug!(call = label, attempt, error = %e, "call_failed");
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        call = label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after failure"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Run `call` on a helper thread and wait at most `timeout` for its result
pub fn call_with_deadline<T, E, F>(timeout: Duration, call: F) -> Result<T, E>
where
    T: Send + 'static,
    E: CapabilityError,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("llm-eval-call".to_string())
        .spawn(move || {
            // The receiver is gone once the caller has timed out
            let _ = tx.send(call());
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn call thread");
        return Err(E::aborted());
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(E::timed_out(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(E::aborted()),
    }
}
