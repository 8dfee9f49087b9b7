use std::{error::Error as StdError, fs, path::Path, time::Duration};

use similar_asserts::SimpleDiff;

use super::{log_success, with_full_text, ResponseCheck, Severity};
use crate::{
    curl::{Exchange, HttpResponse},
    helper::TestHelper,
    Outcome,
};

pub(super) fn status(severity: Severity, expected: u16) -> ResponseCheck {
    Box::new(move |t: &dyn TestHelper, exchange: &Exchange| {
        let response = match exchange.response.as_ref() {
            Some(response) => response,
            None => return missing_response(severity, t, exchange),
        };
        if response.status.as_u16() == expected {
            return Ok(());
        }
        severity.report(
            t,
            "",
            &format!(
                "expected status code {expected} but got {}",
                response.status
            ),
        )
    })
}

pub(super) fn contains(severity: Severity, expected: String) -> ResponseCheck {
    Box::new(move |t: &dyn TestHelper, exchange: &Exchange| {
        if exchange.response.is_none() {
            return missing_response(severity, t, exchange);
        }
        let body = String::from_utf8_lossy(exchange.body());
        if body.contains(expected.as_str()) {
            t.log_success(&format!("response contains '{expected}'"));
            return Ok(());
        }
        let detail = format!(
            "expected the response body to contain '{expected}', but it wasn't found"
        );
        let detail = with_full_text(t, detail, "response body", &body);
        severity.report(t, "", &detail)
    })
}

pub(super) fn does_not_contain(severity: Severity, unexpected: String) -> ResponseCheck {
    Box::new(move |t: &dyn TestHelper, exchange: &Exchange| {
        if exchange.response.is_none() {
            return missing_response(severity, t, exchange);
        }
        let body = String::from_utf8_lossy(exchange.body());
        if !body.contains(unexpected.as_str()) {
            t.log_success(&format!("response does not contain '{unexpected}'"));
            return Ok(());
        }
        let detail = format!(
            "expected the response body not to contain '{unexpected}', but it was present"
        );
        let detail = with_full_text(t, detail, "response body", &body);
        severity.report(t, "", &detail)
    })
}

pub(super) fn matches_file(
    severity: Severity,
    file: String,
    success_msg: &str,
    failure_msg: &str,
    other_files: Vec<String>,
) -> ResponseCheck {
    let success_msg = success_msg.to_owned();
    let failure_msg = failure_msg.to_owned();
    Box::new(move |t: &dyn TestHelper, exchange: &Exchange| {
        let response = match exchange.response.as_ref() {
            Some(response) => response,
            None => return missing_response(severity, t, exchange),
        };

        let fixtures = &t.config().fixtures_dir;
        let path = fixtures.join(&file);
        let expected = match fs::read(&path) {
            Ok(expected) => expected,
            Err(err) => {
                let detail = format!("could not read expected file {}: {err}", path.display());
                return severity.report(t, &failure_msg, &detail);
            }
        };

        if response.body.as_ref() == expected.as_slice() {
            log_success(t, &success_msg, || {
                format!("response body matches file {file}")
            });
            return Ok(());
        }

        let mut detail = match other_files
            .iter()
            .find(|other| file_matches(&fixtures.join(other), response))
        {
            Some(other) => {
                format!("response body does not match {file}; it matches {other} instead")
            }
            None => format!("response body does not match {file}"),
        };

        if let Some(artifact) = write_artifact(t, &file, response) {
            detail.push_str(&format!("; actual body written to {}", artifact.display()));
        }

        if !t.will_retry() {
            let expected = String::from_utf8_lossy(&expected);
            let actual = String::from_utf8_lossy(&response.body);
            let diff = SimpleDiff::from_str(&expected, &actual, "expected", "actual");
            detail.push_str(&format!("\n{diff}"));
        }

        severity.report(t, &failure_msg, &detail)
    })
}

pub(super) fn duration_in_range(severity: Severity, min: Duration, max: Duration) -> ResponseCheck {
    Box::new(move |t: &dyn TestHelper, exchange: &Exchange| {
        if exchange.response.is_none() {
            return missing_response(severity, t, exchange);
        }
        let duration = truncate_to_millis(exchange.duration);
        if (min..=max).contains(&exchange.duration) {
            t.log_success(&format!(
                "request duration {duration:?} is within range [{min:?}, {max:?}]"
            ));
            return Ok(());
        }
        severity.report(
            t,
            "",
            &format!(
                "expected request duration to be between {min:?} and {max:?}, but was {duration:?}"
            ),
        )
    })
}

pub(super) fn request_fails(severity: Severity, success_msg: &str, failure_msg: &str) -> ResponseCheck {
    let success_msg = success_msg.to_owned();
    let failure_msg = failure_msg.to_owned();
    Box::new(move |t: &dyn TestHelper, exchange: &Exchange| match &exchange.error {
        Some(err) => {
            log_success(t, &success_msg, || {
                format!("request failed as expected: {}", error_chain(err))
            });
            Ok(())
        }
        None => severity.report(t, &failure_msg, &unexpected_success(exchange)),
    })
}

pub(super) fn request_succeeds(
    severity: Severity,
    success_msg: &str,
    failure_msg: &str,
) -> ResponseCheck {
    let success_msg = success_msg.to_owned();
    let failure_msg = failure_msg.to_owned();
    Box::new(move |t: &dyn TestHelper, exchange: &Exchange| match &exchange.error {
        None => {
            log_success(t, &success_msg, || "request succeeded".to_owned());
            Ok(())
        }
        Some(err) => severity.report(
            t,
            &failure_msg,
            &format!("expected request to succeed, but it failed: {}", error_chain(err)),
        ),
    })
}

pub(super) fn fails_with_any_error_messages(
    severity: Severity,
    expected: Vec<String>,
    success_msg: &str,
    failure_msg: &str,
) -> ResponseCheck {
    let success_msg = success_msg.to_owned();
    let failure_msg = failure_msg.to_owned();
    Box::new(move |t: &dyn TestHelper, exchange: &Exchange| {
        let err = match &exchange.error {
            Some(err) => err,
            None => return severity.report(t, &failure_msg, &unexpected_success(exchange)),
        };

        let chain = error_chain(err);
        if let Some(found) = expected.iter().find(|m| chain.contains(m.as_str())) {
            log_success(t, &success_msg, || {
                format!("request failed with expected error '{found}'")
            });
            return Ok(());
        }

        let detail = match expected.as_slice() {
            [single] => format!(
                "expected the request to fail with an error containing '{single}', but got: {chain}"
            ),
            _ => format!(
                "expected the request to fail with an error containing any of {expected:?}, but got: {chain}"
            ),
        };
        severity.report(t, &failure_msg, &detail)
    })
}

fn missing_response(severity: Severity, t: &dyn TestHelper, exchange: &Exchange) -> Outcome {
    let detail = match &exchange.error {
        Some(err) => format!(
            "no response received; the HTTP request failed: {}",
            error_chain(err)
        ),
        None => "no response received; the HTTP request must have failed".to_owned(),
    };
    severity.report(t, "", &detail)
}

fn unexpected_success(exchange: &Exchange) -> String {
    match &exchange.response {
        Some(response) => format!(
            "expected request to fail, but it succeeded with status {}",
            response.status
        ),
        None => "expected request to fail, but it succeeded".to_owned(),
    }
}

fn file_matches(path: &Path, response: &HttpResponse) -> bool {
    fs::read(path).is_ok_and(|contents| contents.as_slice() == response.body.as_ref())
}

fn write_artifact(t: &dyn TestHelper, file: &str, response: &HttpResponse) -> Option<std::path::PathBuf> {
    let path = t.config().artifacts_dir.join(format!("{file}.actual"));
    let written = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(&path, &response.body));
    match written {
        Ok(()) => Some(path),
        Err(err) => {
            t.log(&format!(
                "could not write actual response body to {}: {err}",
                path.display()
            ));
            None
        }
    }
}

/// Renders an error with every `source()` joined by `": "`.
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !rendered.contains(&cause_text) {
            rendered.push_str(": ");
            rendered.push_str(&cause_text);
        }
        source = cause.source();
    }
    rendered
}

fn truncate_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
