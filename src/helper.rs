use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use tracing::info;

use crate::{error::Abort, Config};

pub const SUCCESS_PREFIX: &str = "SUCCESS: ";
pub const FAILURE_PREFIX: &str = "FAILURE: ";
pub const FATAL_PREFIX: &str = "FATAL: ";

/// Shared handle to the helper of the running test or retry attempt.
pub type Helper = Arc<dyn TestHelper>;

/// A deferred cleanup action registered with [`TestHelper::cleanup`].
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Reporting surface of one test case.
///
/// Checks, the retry engine and the HTTP pipeline report through this trait.
/// Non-fatal failures go through [`error`](TestHelper::error) and the test
/// continues; fatal ones go through [`fatal`](TestHelper::fatal), whose
/// [`Abort`] must be returned to the caller.
pub trait TestHelper: Send + Sync {
    /// Name of the test case.
    fn name(&self) -> &str;

    /// Settings for this test case.
    fn config(&self) -> &Config;

    /// Writes one log line.
    fn log(&self, message: &str);

    /// Starts a new numbered step; subsequent log lines are indented.
    fn log_step(&self, step: &str);

    /// Number of steps started so far.
    fn current_step(&self) -> usize;

    /// Marks the test as failed with the given message.
    fn record_failure(&self, message: String);

    /// Every failure message recorded so far.
    fn failures(&self) -> Vec<String>;

    /// Registers an action to run after the test body, even when it aborts.
    fn cleanup(&self, action: Cleanup);

    /// Whether a failure reported now will be retried by an enclosing
    /// retry loop. Checks omit bulky detail from failures that will retry.
    fn will_retry(&self) -> bool {
        false
    }

    fn failed(&self) -> bool {
        !self.failures().is_empty()
    }

    fn log_success(&self, message: &str) {
        self.log(&format!("{SUCCESS_PREFIX}{message}"));
    }

    /// Reports a non-fatal failure.
    fn error(&self, message: &str) {
        self.log(&format!("{FAILURE_PREFIX}{message}"));
        self.record_failure(message.to_owned());
    }

    /// Reports a fatal failure. The returned [`Abort`] must be propagated.
    fn fatal(&self, message: &str) -> Abort {
        self.log(&format!("{FATAL_PREFIX}{message}"));
        self.record_failure(message.to_owned());
        Abort(())
    }
}

/// Top-level [`TestHelper`] owned by a [`TestCase`](crate::TestCase) run.
pub struct TestContext {
    name: String,
    config: Arc<Config>,
    started: Instant,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    failures: Vec<String>,
    logs: Vec<String>,
    current_step: usize,
    cleanups: Vec<Cleanup>,
}

impl TestContext {
    pub fn new(name: impl Into<String>, config: impl Into<Arc<Config>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            config: config.into(),
            started: Instant::now(),
            state: Mutex::new(State::default()),
        })
    }

    /// Every line logged so far, including prefixes and indentation.
    pub fn logs(&self) -> Vec<String> {
        self.state().logs.clone()
    }

    /// Runs registered cleanups in reverse registration order.
    ///
    /// A panicking cleanup is recorded as a failure and the remaining
    /// cleanups still run.
    pub fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut self.state().cleanups);
        if cleanups.is_empty() {
            return;
        }

        let start = Instant::now();
        self.emit("");
        self.emit("Performing cleanup");
        for action in cleanups.into_iter().rev() {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(action)) {
                self.error(&format!("cleanup panicked: {}", panic_message(&*panic)));
            }
        }
        self.emit(&format!(
            "Cleanup completed in {:.2}s",
            start.elapsed().as_secs_f64()
        ));
    }

    pub(crate) fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, line: &str) {
        info!(test = %self.name, "{line}");
        self.state().logs.push(line.to_owned());
    }
}

impl TestHelper for TestContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn log(&self, message: &str) {
        let indent = if self.current_step() > 0 { "   " } else { "" };
        self.emit(&format!("{indent}{message}"));
    }

    fn log_step(&self, step: &str) {
        let current = {
            let mut state = self.state();
            state.current_step += 1;
            state.current_step
        };
        self.emit("");
        self.emit(&format!("STEP {current}: {step}"));
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
        self.state().cleanups.push(action);
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
