//! Composable checks over command output and HTTP exchanges.
//!
//! Every check exists in two families with the same constructor names:
//! [`assert`] reports mismatches with [`TestHelper::error`] and lets the test
//! continue, [`require`] reports them with [`TestHelper::fatal`] and stops it.

pub mod assert;
pub mod require;

mod output;
pub(crate) mod response;

use crate::{curl::Exchange, helper::TestHelper, Outcome};

/// Check over a captured string such as command output or a pod log.
pub type OutputCheck = Box<dyn Fn(&dyn TestHelper, &str) -> Outcome + Send + Sync>;

/// Check over the result of one HTTP request.
pub type ResponseCheck = Box<dyn Fn(&dyn TestHelper, &Exchange) -> Outcome + Send + Sync>;

/// How a check reports a mismatch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    /// Record the failure and continue.
    Error,
    /// Record the failure and abort the current test or attempt.
    Fatal,
}

impl Severity {
    /// Reports `"<message>; <detail>"`, or whichever of the two is non-empty.
    pub(crate) fn report(self, t: &dyn TestHelper, message: &str, detail: &str) -> Outcome {
        let full = match (message.is_empty(), detail.is_empty()) {
            (false, false) => format!("{message}; {detail}"),
            (false, true) => message.to_owned(),
            (true, _) => detail.to_owned(),
        };
        match self {
            Self::Error => {
                t.error(&full);
                Ok(())
            }
            Self::Fatal => Err(t.fatal(&full)),
        }
    }
}

fn log_success(t: &dyn TestHelper, custom: &str, default: impl FnOnce() -> String) {
    if custom.is_empty() {
        t.log_success(&default());
    } else {
        t.log_success(custom);
    }
}

/// Appends the full captured text unless the failure is going to be retried.
fn with_full_text(t: &dyn TestHelper, detail: String, label: &str, text: &str) -> String {
    if t.will_retry() {
        detail
    } else {
        format!("{detail}; full {label}:\n{text}")
    }
}
