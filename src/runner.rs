use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tracing::{info, warn};

use crate::{
    helper::{panic_message, Helper},
    Config, Outcome, TestContext, TestFailure, TestHelper,
};

/// A top-level test case.
///
/// ```ignore
/// #[tokio::test]
/// async fn productpage_is_reachable() -> Result<(), TestFailure> {
///     TestCase::new("productpage_is_reachable")
///         .groups(&["full", "smoke"])
///         .run(|t| async move {
///             t.log_step("Check productpage");
///             curl::request(&*t, PRODUCTPAGE, (), &[require::response_status(200)]).await?;
///             Ok(())
///         })
///         .await
/// }
/// ```
pub struct TestCase {
    name: String,
    config: Arc<Config>,
    groups: Vec<String>,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(Config::default()),
            groups: Vec::new(),
        }
    }

    pub fn config(mut self, config: impl Into<Arc<Config>>) -> Self {
        self.config = config.into();
        self
    }

    /// Restricts the test to the given groups. A test with no groups always
    /// runs; otherwise it is skipped unless [`Config::test_group`] is listed.
    pub fn groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| (*g).to_owned()).collect();
        self
    }

    /// Re-runs a failing body up to `max_runs` times in total to tell a
    /// flaky test from a broken one. See [`FlakinessDetector`].
    pub fn detect_flakiness(self, max_runs: u32) -> FlakinessDetector {
        FlakinessDetector {
            test: self,
            max_runs,
            stop_on_first_success: false,
        }
    }

    /// Runs `body`, then the registered cleanups.
    ///
    /// A panic in `body` is recorded as a failure. Returns every recorded
    /// failure as a [`TestFailure`].
    pub async fn run<F, Fut>(self, body: F) -> Result<(), TestFailure>
    where
        F: FnOnce(Helper) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        if !self.is_selected() {
            self.log_skip();
            return Ok(());
        }

        let ctx = TestContext::new(self.name.clone(), self.config);
        execute(&ctx, "Test", body).await;

        let failures = ctx.failures();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TestFailure {
                name: self.name,
                failures,
            })
        }
    }

    fn is_selected(&self) -> bool {
        self.groups.is_empty() || self.groups.contains(&self.config.test_group)
    }

    fn log_skip(&self) {
        info!(
            test = %self.name,
            "This test is being skipped because it is not part of the {:?} test group",
            self.config.test_group
        );
    }
}

/// Runs a [`TestCase`] again after a failure to find out whether it is
/// flaky.
///
/// A body that passes on its first run is not repeated. Otherwise it runs
/// until `max_runs` runs are done, each on a fresh [`TestContext`] with its
/// own cleanups. A test that passes at least once is reported as flaky and
/// succeeds; one that fails every run fails with its last run's failures
/// followed by `TEST FAILED <n> TIMES`.
pub struct FlakinessDetector {
    test: TestCase,
    max_runs: u32,
    stop_on_first_success: bool,
}

impl FlakinessDetector {
    /// Stops at the first passing rerun instead of completing `max_runs`.
    pub fn stop_on_first_success(mut self, stop: bool) -> Self {
        self.stop_on_first_success = stop;
        self
    }

    pub async fn run<F, Fut>(self, mut body: F) -> Result<(), TestFailure>
    where
        F: FnMut(Helper) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let Self {
            test,
            max_runs,
            stop_on_first_success,
        } = self;
        if !test.is_selected() {
            test.log_skip();
            return Ok(());
        }

        let name = test.name.as_str();
        let max_runs = max_runs.max(1);
        let mut passed = 0;
        let mut failed = 0;
        let mut last_failures = Vec::new();

        for run in 0..max_runs {
            if run > 0 {
                info!(test = %name, "=== RERUN #{run}: {name}");
            }
            let ctx = TestContext::new(name, test.config.clone());
            execute(&ctx, "Test", &mut body).await;
            let failures = ctx.failures();

            if run > 0 {
                let verdict = if failures.is_empty() { "PASS" } else { "FAIL" };
                info!(test = %name, "--- {verdict}: {name} (rerun #{run})");
            }
            if failures.is_empty() {
                passed += 1;
                if run == 0 || stop_on_first_success {
                    break;
                }
            } else {
                failed += 1;
                if run == 0 && max_runs > 1 {
                    info!(test = %name, "TEST FAILED: Retesting to detect possible flakiness");
                }
                last_failures = failures;
            }
        }

        if passed > 0 && failed > 0 {
            let runs = passed + failed;
            let detail = if stop_on_first_success {
                format!("passed after {runs} attempts")
            } else {
                format!("passed {passed}/{runs} times")
            };
            warn!(test = %name, "WARNING: {name} is flaky: {detail}");
        }
        if passed > 0 {
            return Ok(());
        }

        last_failures.push(format!("TEST FAILED {failed} TIMES"));
        Err(TestFailure {
            name: test.name,
            failures: last_failures,
        })
    }
}

impl<'h> dyn TestHelper + 'h {
    /// Starts a subtest whose failures are recorded on this helper.
    ///
    /// ```ignore
    /// for version in ["v1", "v2", "v3"] {
    ///     t.subtest(version)
    ///         .run(|t| async move {
    ///             curl::request(&*t, &reviews_url(version), (), &[assert::response_status(200)]).await?;
    ///             Ok(())
    ///         })
    ///         .await;
    /// }
    /// ```
    pub fn subtest(&self, name: impl Into<String>) -> SubTest<'_> {
        SubTest {
            parent: self,
            name: name.into(),
        }
    }
}

/// A named part of a test with its own helper, created by `subtest` on a
/// [`TestHelper`].
pub struct SubTest<'a> {
    parent: &'a dyn TestHelper,
    name: String,
}

impl SubTest<'_> {
    /// Runs `body` on a child helper, then the child's cleanups.
    ///
    /// A fatal failure or panic ends the subtest only. Each child failure is
    /// recorded on the parent prefixed with the subtest name. Returns whether
    /// the subtest passed.
    pub async fn run<F, Fut>(self, body: F) -> bool
    where
        F: FnOnce(Helper) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let name = format!("{}/{}", self.parent.name(), self.name);
        let ctx = TestContext::new(name, self.parent.config().clone());
        execute(&ctx, "Subtest", body).await;

        let failures = ctx.failures();
        for failure in &failures {
            self.parent.record_failure(format!("{}: {failure}", self.name));
        }
        failures.is_empty()
    }
}

/// Runs `body` on `ctx`, records a panic, logs the timing line and runs the
/// cleanups.
async fn execute<F, Fut>(ctx: &Arc<TestContext>, kind: &str, body: F)
where
    F: FnOnce(Helper) -> Fut,
    Fut: Future<Output = Outcome>,
{
    let helper: Helper = ctx.clone();
    let result = AssertUnwindSafe(async move { body(helper).await })
        .catch_unwind()
        .await;

    // an Err(Abort) has already been recorded by `fatal`
    if let Err(panic) = result {
        ctx.error(&format!("Test panic: {}", panic_message(&*panic)));
    }

    ctx.emit("");
    let verdict = if ctx.failed() { "failed" } else { "completed" };
    ctx.emit(&format!(
        "{kind} {verdict} in {:.2}s (excluding cleanup)",
        ctx.elapsed_secs()
    ));
    ctx.run_cleanups();
}
