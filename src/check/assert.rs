//! Non-fatal checks: a mismatch is reported with [`TestHelper::error`] and the
//! test keeps running.
//!
//! [`TestHelper::error`]: crate::TestHelper::error

use std::time::Duration;

use super::{output, response, OutputCheck, ResponseCheck, Severity};

const SEVERITY: Severity = Severity::Error;

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

/// Passes when the body is byte-for-byte equal to `file` under
/// [`Config::fixtures_dir`](crate::Config::fixtures_dir).
///
/// On a mismatch the body is saved next to the other test artifacts, and the
/// failure names any of `other_files` that the body does match.
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

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use bytes::Bytes;
    use reqwest::{header::HeaderMap, StatusCode};

    use super::*;
    use crate::{
        curl::{Exchange, HttpResponse},
        retry::RetryHelper,
        Config, Helper, TestContext, TestHelper,
    };

    fn exchange(status: u16, body: &'static str) -> Exchange {
        Exchange {
            response: Some(HttpResponse {
                status: StatusCode::from_u16(status).unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::from_static(body.as_bytes()),
            }),
            error: None,
            duration: Duration::from_millis(120),
        }
    }

    fn failed_exchange() -> Exchange {
        let error = reqwest::Client::new().get("no-scheme").build().unwrap_err();
        Exchange {
            response: None,
            error: Some(error),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn output_contains_logs_success() {
        let t = TestContext::new("contains", Config::default());
        let check = output_contains("reviews-v2", "", "");

        assert_eq!(check(&*t, "productpage -> reviews-v2"), Ok(()));
        assert!(!t.failed());
        assert_eq!(
            t.logs(),
            vec!["SUCCESS: string 'reviews-v2' found in output".to_owned()]
        );
    }

    #[test]
    fn output_contains_reports_and_continues() {
        let t = TestContext::new("contains", Config::default());
        let check = output_contains("ERROR", "", "sail logs have errors");

        assert_eq!(check(&*t, "all good"), Ok(()));
        assert_eq!(
            t.failures(),
            vec![
                "sail logs have errors; expected to find the string 'ERROR' in the output, but it wasn't found; full output:\nall good"
                    .to_owned()
            ]
        );
    }

    #[test]
    fn output_does_not_contain_reports_presence() {
        let t = TestContext::new("absent", Config::default());
        let check = output_does_not_contain("ERROR", "no errors", "found errors");

        assert_eq!(check(&*t, "clean"), Ok(()));
        assert!(!t.failed());
        assert_eq!(check(&*t, "ERROR: boom"), Ok(()));
        assert_eq!(t.failures().len(), 1);
        assert!(t.failures()[0].starts_with("found errors; expected the string 'ERROR'"));
    }

    #[test]
    fn output_contains_any_passes_on_first_match() {
        let t = TestContext::new("any", Config::default());
        let check = output_contains_any(&["v1", "v3"], "", "no version");

        assert_eq!(check(&*t, "reviews-v3"), Ok(()));
        assert!(!t.failed());

        assert_eq!(check(&*t, "reviews-v2"), Ok(()));
        assert!(t.failures()[0].contains(r#"any of ["v1", "v3"]"#));
    }

    #[test]
    fn count_expected_string_counts_without_overlap() {
        let t = TestContext::new("count", Config::default());

        assert_eq!(count_expected_string("x", 2, "", "")(&*t, "xx"), Ok(()));
        assert_eq!(count_expected_string("v2", 0, "", "")(&*t, "v1 v3"), Ok(()));
        assert!(!t.failed());

        assert_eq!(count_expected_string("aa", 2, "", "")(&*t, "aaa"), Ok(()));
        assert!(t.failures()[0].contains("2 times in the output, but found it 1 times"));
    }

    #[test]
    fn failure_omits_full_output_when_it_will_retry() {
        let t = TestContext::new("retrying", Config::default());
        let parent: Helper = t.clone();
        let helper = RetryHelper::new(parent, 0, 2);
        let check = output_contains("ready", "", "not ready");

        assert_eq!(check(&helper, "pending"), Ok(()));
        assert_eq!(
            helper.failures(),
            vec!["not ready; expected to find the string 'ready' in the output, but it wasn't found".to_owned()]
        );
        assert!(!t.failed());
    }

    #[test]
    fn response_status_mismatch_names_both_codes() {
        let t = TestContext::new("status", Config::default());

        assert_eq!(response_status(200)(&*t, &exchange(200, "ok")), Ok(()));
        assert!(!t.failed());

        assert_eq!(response_status(200)(&*t, &exchange(503, "")), Ok(()));
        assert_eq!(
            t.failures(),
            vec!["expected status code 200 but got 503 Service Unavailable".to_owned()]
        );
    }

    #[test]
    fn response_status_without_response_is_reported_not_panicked() {
        let t = TestContext::new("nil-response", Config::default());

        assert_eq!(response_status(200)(&*t, &failed_exchange()), Ok(()));
        assert_eq!(t.failures().len(), 1);
        assert!(t.failures()[0].starts_with("no response received"));
    }

    #[test]
    fn response_contains_checks_body() {
        let t = TestContext::new("body", Config::default());
        let ok = exchange(200, "<title>Simple Bookstore App</title>");

        assert_eq!(response_contains("Bookstore")(&*t, &ok), Ok(()));
        assert_eq!(response_does_not_contain("error")(&*t, &ok), Ok(()));
        assert!(!t.failed());

        assert_eq!(response_contains("ratings")(&*t, &ok), Ok(()));
        assert_eq!(t.failures().len(), 1);
    }

    #[test]
    fn duration_range_is_inclusive() {
        let t = TestContext::new("duration", Config::default());
        let ex = exchange(200, "");

        let check = duration_in_range(Duration::from_millis(120), Duration::from_millis(120));
        assert_eq!(check(&*t, &ex), Ok(()));
        assert!(!t.failed());

        let check = duration_in_range(Duration::ZERO, Duration::from_millis(100));
        assert_eq!(check(&*t, &ex), Ok(()));
        assert_eq!(
            t.failures(),
            vec!["expected request duration to be between 0ns and 100ms, but was 120ms".to_owned()]
        );
    }

    #[test]
    fn request_fails_and_succeeds_are_opposites() {
        let t = TestContext::new("fails", Config::default());

        assert_eq!(request_fails("", "")(&*t, &failed_exchange()), Ok(()));
        assert_eq!(request_succeeds("", "")(&*t, &exchange(200, "")), Ok(()));
        assert!(!t.failed());

        assert_eq!(request_fails("", "route open")(&*t, &exchange(200, "")), Ok(()));
        assert_eq!(
            request_succeeds("", "route closed")(&*t, &failed_exchange()),
            Ok(())
        );
        let failures = t.failures();
        assert_eq!(
            failures[0],
            "route open; expected request to fail, but it succeeded with status 200 OK"
        );
        assert!(failures[1].starts_with("route closed; expected request to succeed, but it failed"));
    }

    #[test]
    fn request_fails_with_error_message_searches_the_chain() {
        let t = TestContext::new("error-message", Config::default());
        let failed = failed_exchange();

        let check = request_fails_with_error_message("relative URL without a base", "", "");
        assert_eq!(check(&*t, &failed), Ok(()));
        assert!(!t.failed());

        let check = request_fails_with_any_error_messages(&["connection reset", "timed out"], "", "");
        assert_eq!(check(&*t, &failed), Ok(()));
        assert!(t.failures()[0].contains("any of [\"connection reset\", \"timed out\"]"));
    }

    #[test]
    fn response_matches_file_writes_actual_body_on_mismatch() {
        let fixtures = tempfile::tempdir().unwrap();
        let artifacts = tempfile::tempdir().unwrap();
        std::fs::write(fixtures.path().join("productpage.html"), "v1").unwrap();
        std::fs::write(fixtures.path().join("productpage-v2.html"), "v2").unwrap();
        let config = Config {
            fixtures_dir: fixtures.path().to_path_buf(),
            artifacts_dir: artifacts.path().to_path_buf(),
            ..Config::default()
        };
        let t = TestContext::new("file", Arc::new(config));

        let check = response_matches_file("productpage.html", "", "", &["productpage-v2.html"]);
        assert_eq!(check(&*t, &exchange(200, "v1")), Ok(()));
        assert!(!t.failed());

        assert_eq!(check(&*t, &exchange(200, "v2")), Ok(()));
        let failures = t.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("it matches productpage-v2.html instead"));
        let actual = artifacts.path().join("productpage.html.actual");
        assert_eq!(std::fs::read_to_string(actual).unwrap(), "v2");
    }

    #[test]
    fn response_matches_file_reports_missing_fixture() {
        let fixtures = tempfile::tempdir().unwrap();
        let config = Config {
            fixtures_dir: fixtures.path().to_path_buf(),
            ..Config::default()
        };
        let t = TestContext::new("missing-fixture", config);
        let none: &[&str] = &[];

        let check = response_matches_file("absent.html", "", "wrong page", none);
        assert_eq!(check(&*t, &exchange(200, "body")), Ok(()));
        assert!(t.failures()[0].starts_with("wrong page; could not read expected file"));
    }
}
