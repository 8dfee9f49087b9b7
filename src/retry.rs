//! Bounded polling for eventually-consistent mesh state.
//!
//! An attempt is a closure that reports through the [`Helper`] it receives.
//! It is retried until one invocation makes no failure reports or the attempt
//! budget runs out. Failures from all but the last attempt stay private to
//! that attempt; the last attempt reports straight to the test.
//!
//! ```ignore
//! retry::until_success_with_options(
//!     &t,
//!     retry::options().max_attempts(10).delay_between_attempts(Duration::from_secs(2)),
//!     |t| async move {
//!         curl::request(&*t, "http://istio-ingressgateway/productpage", (), &[
//!             assert::response_status(200),
//!         ])
//!         .await?;
//!         Ok(())
//!     },
//! )
//! .await?;
//! ```

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tokio::time::sleep;

use crate::{
    helper::{Cleanup, Helper, TestHelper},
    Config, Outcome,
};

const DEFAULT_MAX_ATTEMPTS: u32 = 60;
const DEFAULT_DELAY_BETWEEN_ATTEMPTS: Duration = Duration::from_secs(1);

/// Retry budget and logging behaviour.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryOptions {
    max_attempts: u32,
    delay_between_attempts: Duration,
    log_attempts: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_between_attempts: DEFAULT_DELAY_BETWEEN_ATTEMPTS,
            log_attempts: true,
        }
    }
}

/// Returns the default options: 60 attempts, one second apart.
pub fn options() -> RetryOptions {
    RetryOptions::default()
}

impl RetryOptions {
    /// Sets the attempt budget. Zero is treated as a single attempt.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn delay_between_attempts(mut self, delay: Duration) -> Self {
        self.delay_between_attempts = delay;
        self
    }

    /// Enables or disables the per-attempt progress lines.
    pub fn log_attempts(mut self, log_attempts: bool) -> Self {
        self.log_attempts = log_attempts;
        self
    }

    fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Retries `attempt` with the default [`RetryOptions`].
pub async fn until_success<F, Fut>(t: &Helper, attempt: F) -> Outcome
where
    F: FnMut(Helper) -> Fut,
    Fut: Future<Output = Outcome>,
{
    until_success_with_options(t, RetryOptions::default(), attempt).await
}

/// Retries `attempt` until it reports no failures or the budget is spent.
///
/// Returns `Err(Abort)` only when the last attempt reported a fatal failure.
/// Non-fatal failures of the last attempt stay recorded on `t`.
pub async fn until_success_with_options<F, Fut>(
    t: &Helper,
    options: RetryOptions,
    mut attempt: F,
) -> Outcome
where
    F: FnMut(Helper) -> Fut,
    Fut: Future<Output = Outcome>,
{
    let max_attempts = options.effective_max_attempts();
    let log_attempts = options.log_attempts && t.config().log_failed_retry_attempts;
    let start = Instant::now();

    for index in 0..max_attempts - 1 {
        let helper = Arc::new(RetryHelper::new(t.clone(), index, max_attempts));
        let handle: Helper = helper.clone();
        let outcome = attempt(handle).await;

        if outcome.is_ok() && !helper.failed() {
            helper.flush_log_buffer();
            report_success(t, &options, index, max_attempts, start);
            return Ok(());
        }

        if log_attempts {
            if options.delay_between_attempts == DEFAULT_DELAY_BETWEEN_ATTEMPTS {
                t.log(&format!(
                    "--- Attempt {}/{max_attempts} failed. Retrying...",
                    index + 1
                ));
            } else {
                t.log(&format!(
                    "--- Attempt {}/{max_attempts} failed. Retrying in {:?}...",
                    index + 1,
                    options.delay_between_attempts
                ));
            }
        }
        sleep(options.delay_between_attempts).await;
    }

    let last = max_attempts - 1;
    let failures_before = t.failures().len();
    let outcome = attempt(t.clone()).await;
    if outcome.is_err() || t.failures().len() > failures_before {
        if log_attempts {
            t.log(&format!("Last attempt ({max_attempts}/{max_attempts}) failed."));
        }
        return outcome;
    }

    report_success(t, &options, last, max_attempts, start);
    Ok(())
}

/// Runs `f` once against a private [`RetryHelper`] and returns it, so the
/// caller can inspect [`failed`](TestHelper::failed) and decide whether to
/// [`flush_log_buffer`](RetryHelper::flush_log_buffer).
pub async fn attempt<F, Fut>(t: &Helper, f: F) -> Arc<RetryHelper>
where
    F: FnOnce(Helper) -> Fut,
    Fut: Future<Output = Outcome>,
{
    let helper = Arc::new(RetryHelper::new(t.clone(), 0, 1));
    let handle: Helper = helper.clone();
    // an abort has already been recorded on the helper
    let _ = f(handle).await;
    helper
}

fn report_success(
    t: &Helper,
    options: &RetryOptions,
    index: u32,
    max_attempts: u32,
    start: Instant,
) {
    if options.log_attempts && t.config().log_failed_retry_attempts && index > 0 {
        t.log(&format!(
            "--- Attempt {}/{max_attempts} successful; total time: {:.2}s",
            index + 1,
            start.elapsed().as_secs_f64()
        ));
    }

    if max_attempts > 1 {
        let percentage = index * 100 / max_attempts;
        if percentage >= 90 {
            t.log("WARNING: This test is almost certainly flaky since it required more than 90% of the maximum retry count to succeed. Consider increasing the maximum retry count to prevent flakiness.");
        } else if percentage >= 75 {
            t.log("WARNING: This test may be flaky since it required more than 75% of the maximum retry count to succeed. Consider increasing the maximum retry count to prevent flakiness.");
        }
    }
}

/// [`TestHelper`] for a single retry attempt.
///
/// Failures are kept on the attempt instead of the test. Log lines go
/// straight to the parent, or are buffered when
/// [`Config::log_failed_retry_attempts`] is off.
pub struct RetryHelper {
    parent: Helper,
    attempt: u32,
    max_attempts: u32,
    state: Mutex<AttemptState>,
}

#[derive(Default)]
struct AttemptState {
    failures: Vec<String>,
    log_buffer: Vec<String>,
    current_step: usize,
}

impl RetryHelper {
    pub(crate) fn new(parent: Helper, attempt: u32, max_attempts: u32) -> Self {
        // steps of an attempt continue the parent's numbering without moving it
        let state = AttemptState {
            current_step: parent.current_step(),
            ..AttemptState::default()
        };
        Self {
            parent,
            attempt,
            max_attempts,
            state: Mutex::new(state),
        }
    }

    /// Forwards buffered log lines to the parent helper.
    pub fn flush_log_buffer(&self) {
        let lines = std::mem::take(&mut self.state().log_buffer);
        for line in lines {
            self.parent.log(&line);
        }
    }

    fn state(&self) -> MutexGuard<'_, AttemptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TestHelper for RetryHelper {
    fn name(&self) -> &str {
        self.parent.name()
    }

    fn config(&self) -> &Config {
        self.parent.config()
    }

    fn log(&self, message: &str) {
        if self.parent.config().log_failed_retry_attempts {
            self.parent.log(message);
        } else {
            self.state().log_buffer.push(message.to_owned());
        }
    }

    fn log_step(&self, step: &str) {
        let current = {
            let mut state = self.state();
            state.current_step += 1;
            state.current_step
        };
        self.log("");
        self.log(&format!("STEP {current}: {step}"));
    }

    fn current_step(&self) -> usize {
        self.state().current_step
    }

    fn record_failure(&self, message: String) {
        self.state().failures.push(message);
    }

    fn failures(&self) -> Vec<String> {
        self.state().failures.clone()
    }

    fn cleanup(&self, action: Cleanup) {
        self.parent.cleanup(action);
    }

    fn will_retry(&self) -> bool {
        self.attempt + 1 < self.max_attempts
    }
}
