use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::HarnessError;

/// Harness settings shared by every helper of one test case.
///
/// Replaces process-wide globals: build one value and hand it to
/// [`TestCase::config`](crate::TestCase::config).
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log the output of failed retry attempts as they happen. When off,
    /// attempt logs are buffered and only the successful attempt is shown.
    pub log_failed_retry_attempts: bool,
    /// Directory that `response_matches_file` resolves fixture names against.
    pub fixtures_dir: PathBuf,
    /// Directory that receives mismatching bodies for manual inspection.
    pub artifacts_dir: PathBuf,
    /// Group selected for this run; test cases outside it are skipped.
    pub test_group: String,
    /// Per-request timeout in milliseconds. `None` leaves requests unbounded.
    pub request_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_failed_retry_attempts: true,
            fixtures_dir: PathBuf::from("testdata/resources/html"),
            artifacts_dir: std::env::temp_dir().join("mesh-harness"),
            test_group: "full".to_owned(),
            request_timeout_ms: None,
        }
    }
}

impl Config {
    /// Creates a config from environment variables, falling back to
    /// [`Config::default`] for anything unset or empty.
    ///
    /// Reads:
    /// - `LOG_FAILED_RETRY_ATTEMPTS`: `true` or `false`
    /// - `FIXTURES_DIR`
    /// - `OUTPUT_DIR`: artifacts directory
    /// - `TEST_GROUP`
    /// - `REQUEST_TIMEOUT_MS`
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads a config from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|err| {
            HarnessError::Config(format!("{} could not be parsed: {err}", path.display()))
        })
    }

    /// Returns the request timeout as a [`Duration`], if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HarnessError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get("LOG_FAILED_RETRY_ATTEMPTS") {
            config.log_failed_retry_attempts = parse_bool("LOG_FAILED_RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = get("FIXTURES_DIR") {
            config.fixtures_dir = PathBuf::from(value);
        }
        if let Some(value) = get("OUTPUT_DIR") {
            config.artifacts_dir = PathBuf::from(value);
        }
        if let Some(value) = get("TEST_GROUP") {
            config.test_group = value;
        }
        if let Some(value) = get("REQUEST_TIMEOUT_MS") {
            let millis = value.trim().parse::<u64>().map_err(|err| {
                HarnessError::Config(format!("REQUEST_TIMEOUT_MS={value:?} is not a number: {err}"))
            })?;
            config.request_timeout_ms = Some(millis);
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, HarnessError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(HarnessError::Config(format!(
            "{key}={other:?} must be \"true\" or \"false\""
        ))),
    }
}
