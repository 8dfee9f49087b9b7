//! `sh -c` commands with output checks.
//!
//! These functions block the calling thread until the command exits.

use std::{
    io::Write,
    process::{Command, ExitStatus, Stdio},
    thread,
};

use tracing::debug;

use crate::{check::OutputCheck, Abort, HarnessError, Result, TestHelper};

/// Captured result of a finished command.
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        combined.push_str(&self.stderr);
        combined
    }
}

/// Runs `cmd` and fails with [`HarnessError::Command`] unless it exits 0.
pub fn run(cmd: &str) -> Result<CommandOutput> {
    run_with(cmd, &[], None)
}

/// Runs `cmd`, aborts the test if it fails, then applies `checks` to its
/// combined output. Returns the output.
pub fn execute(t: &dyn TestHelper, cmd: &str, checks: &[OutputCheck]) -> std::result::Result<String, Abort> {
    execute_with_env_and_input(t, &[], cmd, None, checks)
}

/// Like [`execute`], with `input` written to the command's stdin.
pub fn execute_with_input(
    t: &dyn TestHelper,
    cmd: &str,
    input: &str,
    checks: &[OutputCheck],
) -> std::result::Result<String, Abort> {
    execute_with_env_and_input(t, &[], cmd, Some(input), checks)
}

/// Like [`execute`], with `env` added to the inherited environment.
pub fn execute_with_env(
    t: &dyn TestHelper,
    env: &[(&str, &str)],
    cmd: &str,
    checks: &[OutputCheck],
) -> std::result::Result<String, Abort> {
    execute_with_env_and_input(t, env, cmd, None, checks)
}

pub fn execute_with_env_and_input(
    t: &dyn TestHelper,
    env: &[(&str, &str)],
    cmd: &str,
    input: Option<&str>,
    checks: &[OutputCheck],
) -> std::result::Result<String, Abort> {
    let output = run_with(cmd, env, input).map_err(|err| t.fatal(&err.to_string()))?;
    let combined = output.combined();
    for check in checks {
        check(t, &combined)?;
    }
    Ok(combined)
}

fn run_with(cmd: &str, env: &[(&str, &str)], input: Option<&str>) -> Result<CommandOutput> {
    debug!(command = %cmd, "running shell command");

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(cmd)
        .envs(env.iter().copied())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = command.spawn().map_err(|e| HarnessError::Command {
        command: cmd.to_owned(),
        message: format!("failed to start: {e}"),
    })?;

    // written from another thread so a chatty command can't fill its
    // stdout pipe while we are still blocked on stdin
    let writer = match (input, child.stdin.take()) {
        (Some(input), Some(mut stdin)) => {
            let input = input.to_owned();
            Some(thread::spawn(move || stdin.write_all(input.as_bytes())))
        }
        _ => None,
    };

    let output = child.wait_with_output().map_err(|e| HarnessError::Command {
        command: cmd.to_owned(),
        message: format!("failed to wait for command: {e}"),
    })?;

    if let Some(writer) = writer {
        if let Ok(Err(e)) = writer.join() {
            debug!(command = %cmd, error = %e, "command did not read all of its input");
        }
    }

    let output = CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.success() {
        return Err(HarnessError::Command {
            command: cmd.to_owned(),
            message: format!("{}\n{}", output.status, output.combined().trim_end()),
        });
    }
    Ok(output)
}
