//! External command execution.
//!
//! Renderers (dot, plantuml, mmdc, pandoc) are run through the
//! [`CommandRunner`] trait so tests can count and fake invocations.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::RunError;

/// Interval between exit checks while waiting on a child process.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Bytes written to the child's stdin, if any.
    pub stdin: Option<Vec<u8>>,
    pub working_dir: Option<PathBuf>,
    /// The child is killed once this elapses.
    pub timeout: Duration,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            working_dir: None,
            timeout,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn stdin(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(bytes.into());
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Value following the `-o` flag.
    #[must_use]
    pub fn output_arg(&self) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == "-o")
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Short failure description: exit code and first stderr line.
    #[must_use]
    pub fn failure_reason(&self, program: &str) -> String {
        let status = self
            .exit_code
            .map_or_else(|| "killed by signal".to_owned(), |c| format!("exited with {c}"));
        match self.stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(line) => format!("{program} {status}: {line}"),
            None => format!("{program} {status}"),
        }
    }
}

/// Runs external programs.
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion or timeout.
    ///
    /// A non-zero exit is not an error; inspect [`CommandOutput::success`].
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] if the program is missing, cannot be started, or
    /// exceeds its timeout.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError>;
}

/// [`CommandRunner`] backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError> {
        let io_error = |source: std::io::Error| RunError::Io {
            program: spec.program.clone(),
            source,
        };

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!(command = %spec, "running");

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunError::NotFound {
                    program: spec.program.clone(),
                }
            } else {
                io_error(e)
            }
        })?;

        // Pipes are drained on separate threads while polling for exit
        let stdin_thread = match (spec.stdin.clone(), child.stdin.take()) {
            (Some(bytes), Some(mut pipe)) => Some(thread::spawn(move || {
                let _ = pipe.write_all(&bytes);
            })),
            _ => None,
        };
        let stdout_thread = child.stdout.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });
        let stderr_thread = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let deadline = Instant::now() + spec.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(io_error)? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(command = %spec, timeout = ?spec.timeout, "killed after timeout");
                return Err(RunError::Timeout {
                    program: spec.program.clone(),
                    timeout: spec.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        if let Some(handle) = stdin_thread {
            let _ = handle.join();
        }
        let stdout = stdout_thread
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        let stderr = stderr_thread
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockCommandRunner;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::Mutex;

    use super::{CommandOutput, CommandRunner, CommandSpec, RunError};

    type Handler = dyn Fn(&CommandSpec) -> Result<CommandOutput, RunError> + Send + Sync;

    /// Recording [`CommandRunner`] for tests.
    ///
    /// Every call is recorded before the handler runs.
    pub struct MockCommandRunner {
        calls: Mutex<Vec<CommandSpec>>,
        handler: Box<Handler>,
    }

    impl std::fmt::Debug for MockCommandRunner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockCommandRunner")
                .field("calls", &self.calls)
                .finish_non_exhaustive()
        }
    }

    impl MockCommandRunner {
        /// Runner answering every call with `handler`.
        #[must_use]
        pub fn with_handler(
            handler: impl Fn(&CommandSpec) -> Result<CommandOutput, RunError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                handler: Box::new(handler),
            }
        }

        /// Runner that succeeds, creating the `-o` file when one is given and
        /// echoing stdin (or a placeholder) on stdout.
        #[must_use]
        pub fn succeeding() -> Self {
            Self::with_handler(|spec| {
                if let Some(output) = spec.output_arg() {
                    std::fs::write(output, b"rendered").map_err(|source| RunError::Io {
                        program: spec.program.clone(),
                        source,
                    })?;
                }
                Ok(CommandOutput {
                    exit_code: Some(0),
                    stdout: spec.stdin.clone().unwrap_or_else(|| b"rendered".to_vec()),
                    stderr: String::new(),
                })
            })
        }

        /// Runner for which every program is missing.
        #[must_use]
        pub fn missing() -> Self {
            Self::with_handler(|spec| {
                Err(RunError::NotFound {
                    program: spec.program.clone(),
                })
            })
        }

        /// Runner whose programs all exit with `code` and `stderr`.
        #[must_use]
        pub fn failing(code: i32, stderr: &str) -> Self {
            let stderr = stderr.to_owned();
            Self::with_handler(move |_| {
                Ok(CommandOutput {
                    exit_code: Some(code),
                    stdout: Vec::new(),
                    stderr: stderr.clone(),
                })
            })
        }

        /// Recorded calls, oldest first.
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[must_use]
        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of recorded calls.
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl CommandRunner for MockCommandRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError> {
            self.calls.lock().unwrap().push(spec.clone());
            (self.handler)(spec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_arg() {
        let spec = CommandSpec::new("dot", Duration::from_secs(1))
            .arg("-Tpng")
            .arg("-o")
            .arg("/tmp/out.png")
            .arg("in.dot");

        assert_eq!(spec.output_arg(), Some("/tmp/out.png"));
        assert_eq!(spec.to_string(), "dot -Tpng -o /tmp/out.png in.dot");
    }

    #[test]
    fn test_failure_reason() {
        let output = CommandOutput {
            exit_code: Some(2),
            stdout: Vec::new(),
            stderr: "\nError: syntax error in line 1\nmore\n".to_owned(),
        };
        assert_eq!(
            output.failure_reason("dot"),
            "dot exited with 2: Error: syntax error in line 1"
        );

        let killed = CommandOutput::default();
        assert_eq!(killed.failure_reason("mmdc"), "mmdc killed by signal");
    }

    #[test]
    fn test_missing_program() {
        let spec = CommandSpec::new("docket-test-no-such-program", Duration::from_secs(5));
        let err = SystemCommandRunner.run(&spec).unwrap_err();
        assert!(matches!(err, RunError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_exit_code() {
        let spec = CommandSpec::new("sh", Duration::from_secs(5))
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");

        let output = SystemCommandRunner.run(&spec).unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_piped() {
        let spec = CommandSpec::new("cat", Duration::from_secs(5)).stdin("hello");

        let output = SystemCommandRunner.run(&spec).unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_working_dir() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "").unwrap();
        let spec = CommandSpec::new("ls", Duration::from_secs(5)).working_dir(temp.path());

        let output = SystemCommandRunner.run(&spec).unwrap();

        assert!(String::from_utf8_lossy(&output.stdout).contains("marker.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let spec = CommandSpec::new("sleep", Duration::from_millis(100)).arg("10");
        let started = Instant::now();

        let err = SystemCommandRunner.run(&spec).unwrap_err();

        assert!(matches!(err, RunError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_mock_records_calls() {
        let runner = MockCommandRunner::missing();
        let spec = CommandSpec::new("dot", Duration::from_secs(1)).arg("-V");

        assert!(runner.run(&spec).is_err());
        assert_eq!(runner.call_count(), 1);
        assert_eq!(runner.calls()[0].args, vec!["-V"]);
    }
}
