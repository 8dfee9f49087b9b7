use std::fmt;

/// Structural error type returned by this crate.
///
/// Assertion mismatches are never reported through this type; they are
/// recorded on the [`TestHelper`](crate::TestHelper).
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// HTTP client construction or request building error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// TLS trust or identity material could not be loaded.
    #[error("tls error: {0}")]
    Tls(String),
    /// Filesystem error while reading fixtures or writing artifacts.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A request option carried an invalid header name or value.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),
    /// Certificate generation error.
    #[error("certificate error: {0}")]
    Cert(String),
    /// A shell command could not be started or exited unsuccessfully.
    #[error("command failed: {command}: {message}")]
    Command {
        /// The command line passed to `sh -c`.
        command: String,
        /// Exit status description and combined output.
        message: String,
    },
}

/// Proof that a fatal failure was reported on a [`TestHelper`](crate::TestHelper).
///
/// Only [`TestHelper::fatal`](crate::TestHelper::fatal) hands these out.
/// Propagate it with `?` to stop the current test body or retry attempt.
#[derive(Debug, PartialEq, Eq)]
pub struct Abort(pub(crate) ());

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("test aborted by a fatal failure")
    }
}

impl std::error::Error for Abort {}

/// Result of a check, a retry attempt or a test body.
pub type Outcome = Result<(), Abort>;

/// A test case finished with one or more recorded failures.
#[derive(Debug, thiserror::Error)]
#[error("test {name} failed: {}", failures.join("; "))]
pub struct TestFailure {
    /// Name of the failed test case.
    pub name: String,
    /// Every failure message recorded during the run, in order.
    pub failures: Vec<String>,
}
