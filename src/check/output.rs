use super::{log_success, with_full_text, OutputCheck, Severity};
use crate::helper::TestHelper;

pub(super) fn contains_any(
    severity: Severity,
    expected: Vec<String>,
    success_msg: &str,
    failure_msg: &str,
) -> OutputCheck {
    let success_msg = success_msg.to_owned();
    let failure_msg = failure_msg.to_owned();
    Box::new(move |t: &dyn TestHelper, output: &str| {
        if let Some(found) = expected.iter().find(|s| output.contains(s.as_str())) {
            log_success(t, &success_msg, || {
                format!("string '{found}' found in output")
            });
            return Ok(());
        }

        let detail = match expected.as_slice() {
            [single] => format!(
                "expected to find the string '{single}' in the output, but it wasn't found"
            ),
            _ => format!(
                "expected to find any of {expected:?} in the output, but none was found"
            ),
        };
        let detail = with_full_text(t, detail, "output", output);
        severity.report(t, &failure_msg, &detail)
    })
}

pub(super) fn does_not_contain(
    severity: Severity,
    unexpected: String,
    success_msg: &str,
    failure_msg: &str,
) -> OutputCheck {
    let success_msg = success_msg.to_owned();
    let failure_msg = failure_msg.to_owned();
    Box::new(move |t: &dyn TestHelper, output: &str| {
        if output.contains(unexpected.as_str()) {
            let detail = format!(
                "expected the string '{unexpected}' to be absent from the output, but it was present"
            );
            let detail = with_full_text(t, detail, "output", output);
            return severity.report(t, &failure_msg, &detail);
        }

        log_success(t, &success_msg, || {
            format!("string '{unexpected}' not found in output")
        });
        Ok(())
    })
}

pub(super) fn count_expected(
    severity: Severity,
    expected: String,
    expected_count: usize,
    success_msg: &str,
    failure_msg: &str,
) -> OutputCheck {
    let success_msg = success_msg.to_owned();
    let failure_msg = failure_msg.to_owned();
    Box::new(move |t: &dyn TestHelper, output: &str| {
        let actual = count_occurrences(output, &expected);
        if actual == expected_count {
            log_success(t, &success_msg, || {
                format!("string '{expected}' found {expected_count} times in output")
            });
            return Ok(());
        }

        let detail = format!(
            "expected to find the string '{expected}' {expected_count} times in the output, but found it {actual} times"
        );
        let detail = with_full_text(t, detail, "output", output);
        severity.report(t, &failure_msg, &detail)
    })
}

/// Counts non-overlapping occurrences, scanning left to right.
pub(super) fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
