//! Log output for harness runs.
//!
//! Every helper log line is a `tracing` event at `INFO` with the test name as
//! a field. Without a subscriber nothing is printed; call [`init`] once per
//! test binary to see the lines.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`) that
/// writes through the test harness's captured output.
///
/// Safe to call from every test: only the first call installs anything.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
