//! Fatal checks: a mismatch is reported with [`TestHelper::fatal`] and the
//! check returns `Err(Abort)`, which the caller propagates with `?`.
//!
//! Constructors mirror [`assert`](super::assert) one for one.
//!
//! [`TestHelper::fatal`]: crate::TestHelper::fatal

use std::time::Duration;

use super::{output, response, OutputCheck, ResponseCheck, Severity};

const SEVERITY: Severity = Severity::Fatal;

/// Passes when the output contains `expected`.
pub fn output_contains(expected: &str, success_msg: &str, failure_msg: &str) -> OutputCheck {
    output::contains_any(SEVERITY, vec![expected.to_owned()], success_msg, failure_msg)
}

pub fn output_does_not_contain(unexpected: &str, success_msg: &str, failure_msg: &str) -> OutputCheck {
    output::does_not_contain(SEVERITY, unexpected.to_owned(), success_msg, failure_msg)
}

/// Passes when the output contains at least one of `expected`.
pub fn output_contains_any<S: AsRef<str>>(
    expected: &[S],
    success_msg: &str,
    failure_msg: &str,
) -> OutputCheck {
    let expected = expected.iter().map(|s| s.as_ref().to_owned()).collect();
    output::contains_any(SEVERITY, expected, success_msg, failure_msg)
}

/// Passes when `expected` occurs exactly `count` times, without overlaps.
pub fn count_expected_string(
    expected: &str,
    count: usize,
    success_msg: &str,
    failure_msg: &str,
) -> OutputCheck {
    output::count_expected(SEVERITY, expected.to_owned(), count, success_msg, failure_msg)
}

pub fn response_status(expected: u16) -> ResponseCheck {
    response::status(SEVERITY, expected)
}

pub fn response_contains(expected: &str) -> ResponseCheck {
    response::contains(SEVERITY, expected.to_owned())
}

pub fn response_does_not_contain(unexpected: &str) -> ResponseCheck {
    response::does_not_contain(SEVERITY, unexpected.to_owned())
}

/// Fatal form of [`assert::response_matches_file`](super::assert::response_matches_file).
pub fn response_matches_file<S: AsRef<str>>(
    file: &str,
    success_msg: &str,
    failure_msg: &str,
    other_files: &[S],
) -> ResponseCheck {
    let other_files = other_files.iter().map(|s| s.as_ref().to_owned()).collect();
    response::matches_file(SEVERITY, file.to_owned(), success_msg, failure_msg, other_files)
}

/// Passes when the request took between `min` and `max`, both inclusive.
pub fn duration_in_range(min: Duration, max: Duration) -> ResponseCheck {
    response::duration_in_range(SEVERITY, min, max)
}

pub fn request_fails(success_msg: &str, failure_msg: &str) -> ResponseCheck {
    response::request_fails(SEVERITY, success_msg, failure_msg)
}

pub fn request_succeeds(success_msg: &str, failure_msg: &str) -> ResponseCheck {
    response::request_succeeds(SEVERITY, success_msg, failure_msg)
}

pub fn request_fails_with_error_message(
    expected: &str,
    success_msg: &str,
    failure_msg: &str,
) -> ResponseCheck {
    response::fails_with_any_error_messages(
        SEVERITY,
        vec![expected.to_owned()],
        success_msg,
        failure_msg,
    )
}

/// Passes when the request failed and its error chain mentions any of
/// `expected`.
pub fn request_fails_with_any_error_messages<S: AsRef<str>>(
    expected: &[S],
    success_msg: &str,
    failure_msg: &str,
) -> ResponseCheck {
    let expected = expected.iter().map(|s| s.as_ref().to_owned()).collect();
    response::fails_with_any_error_messages(SEVERITY, expected, success_msg, failure_msg)
}
