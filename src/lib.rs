//! `mesh-harness` is the core of an end-to-end test suite for service-mesh
//! deployments.
//!
//! Mesh state converges eventually, so the crate is built around three
//! pieces:
//! - [`retry::until_success`] polls an attempt until it reports no failures
//! - [`check::assert`] and [`check::require`] build composable checks that
//!   report through a [`TestHelper`] instead of panicking
//! - [`curl::request`] sends an HTTP request shaped by [`request`] options
//!   and runs response checks against it
//!
//! [`TestCase`] runs a test body with its own helper and turns recorded
//! failures into a [`TestFailure`].

pub mod cert;
pub mod check;
pub mod curl;
pub mod logging;
pub mod request;
pub mod retry;
pub mod shell;

mod config;
mod error;
mod helper;
mod runner;

pub use config::Config;
pub use error::{Abort, HarnessError, Outcome, TestFailure};
pub use helper::{
    Cleanup, Helper, TestContext, TestHelper, FAILURE_PREFIX, FATAL_PREFIX, SUCCESS_PREFIX,
};
pub use runner::{FlakinessDetector, SubTest, TestCase};

pub type Result<T> = std::result::Result<T, HarnessError>;
