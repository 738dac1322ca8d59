use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of a subprocess run. A timeout or spawn failure is folded
/// into exit code 1 with the error text in stderr, so callers only ever deal
/// with one shape.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn failure(message: String) -> Self {
        Self { exit_code: 1, stdout: String::new(), stderr: message }
    }
}

/// Seam between the panel and the OS. Everything that shells out goes through
/// here so tests can substitute a recording mock.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], sudo: bool) -> Result<CommandOutput>;

    /// Like `run`, but writes `input` to the child's stdin before waiting.
    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
        sudo: bool,
    ) -> Result<CommandOutput>;
}

/// Production runner backed by `tokio::process`.
pub struct SystemRunner;

impl SystemRunner {
    fn build(program: &str, args: &[&str], sudo: bool) -> Command {
        // When already root, prefixing sudo is pointless and may not exist.
        let sudo = sudo && unsafe { libc::getuid() } != 0;
        let mut cmd = if sudo {
            let mut c = Command::new("sudo");
            c.arg("-n").arg(program);
            c
        } else {
            Command::new(program)
        };
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn execute(mut cmd: Command, input: Option<&str>, label: &str) -> Result<CommandOutput> {
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", label, e);
                return Ok(CommandOutput::failure(format!("failed to spawn {}: {}", label, e)));
            }
        };

        if let Some(input) = input {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(input.as_bytes()).await;
                // Dropping stdin closes the pipe so the child sees EOF.
            }
        } else {
            drop(child.stdin.take());
        }

        let output = match tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to collect command output")?,
            Err(_) => {
                warn!("Command timed out: {}", label);
                return Ok(CommandOutput::failure("command execution timeout".to_string()));
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str], sudo: bool) -> Result<CommandOutput> {
        let label = format!("{} {}", program, args.join(" "));
        Self::execute(Self::build(program, args, sudo), None, &label).await
    }

    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
        sudo: bool,
    ) -> Result<CommandOutput> {
        let label = format!("{} {}", program, args.join(" "));
        Self::execute(Self::build(program, args, sudo), Some(input), &label).await
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every invocation and returns canned results. By default every
    /// command succeeds with empty output; `fail_on` and `stdout_for`
    /// override by program name.
    #[derive(Default)]
    pub struct MockRunner {
        pub calls: Mutex<Vec<String>>,
        pub fail_on: HashMap<String, String>,
        pub stdout_for: HashMap<String, String>,
    }

    impl MockRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(program: &str, stderr: &str) -> Self {
            let mut runner = Self::new();
            runner.fail_on.insert(program.to_string(), stderr.to_string());
            runner
        }

        /// Successful runs of `program` produce `stdout`.
        pub fn with_stdout(mut self, program: &str, stdout: &str) -> Self {
            self.stdout_for.insert(program.to_string(), stdout.to_string());
            self
        }

        pub fn recorded(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn respond(&self, program: &str, args: &[&str]) -> CommandOutput {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", program, args.join(" ")));
            match self.fail_on.get(program) {
                Some(stderr) => CommandOutput {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: stderr.clone(),
                },
                None => CommandOutput {
                    exit_code: 0,
                    stdout: self.stdout_for.get(program).cloned().unwrap_or_default(),
                    stderr: String::new(),
                },
            }
        }
    }

    #[async_trait]
    impl CommandRunner for MockRunner {
        async fn run(&self, program: &str, args: &[&str], _sudo: bool) -> Result<CommandOutput> {
            Ok(self.respond(program, args))
        }

        async fn run_with_input(
            &self,
            program: &str,
            args: &[&str],
            _input: &str,
            _sudo: bool,
        ) -> Result<CommandOutput> {
            Ok(self.respond(program, args))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let runner = SystemRunner;
        let out = runner.run("echo", &["hello"], false).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let runner = SystemRunner;
        let out = runner.run("false", &[], false).await.unwrap();
        assert!(!out.success());
    }

    #[tokio::test]
    async fn missing_program_reports_failure_cleanly() {
        let runner = SystemRunner;
        let out = runner.run("skydock-no-such-binary", &[], false).await.unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.contains("failed to spawn"));
    }

    #[tokio::test]
    async fn stdin_is_forwarded() {
        let runner = SystemRunner;
        let out = runner.run_with_input("cat", &[], "piped\n", false).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "piped\n");
    }
}
