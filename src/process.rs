//! # External Tool Invocation
//!
//! Every backend talks to its VCS by running the tool's executable. This
//! module wraps `std::process::Command` so that all invocations behave the
//! same way:
//!
//! - stdout and stderr are captured and appended to a [`CommandLog`], which
//!   becomes the `raw_log` of the operation's outcome;
//! - a non-zero exit becomes [`Error::VcsTool`] carrying that log;
//! - if a timeout is configured, a hung process is killed and reported as
//!   [`Error::Timeout`] instead of blocking the worker forever;
//! - stdin is closed unless the user asked to be prompted, so tools fail
//!   instead of waiting for input nobody will type.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long a killed command's pipes may take to reach end of file.
const READ_GRACE: Duration = Duration::from_millis(500);

/// Output accumulated over all commands of one operation.
#[derive(Debug, Default, Clone)]
pub struct CommandLog {
    text: String,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, output: &str) {
        if output.is_empty() {
            return;
        }
        self.text.push_str(output);
        if !output.ends_with('\n') {
            self.text.push('\n');
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Captured result of one finished command.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// One VCS executable plus the per-run invocation policy.
#[derive(Debug, Clone)]
pub struct Tool {
    program: String,
    timeout: Option<Duration>,
    interactive: bool,
}

impl Tool {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            timeout: None,
            interactive: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Let the tool read from the terminal (for certificate prompts).
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Run a command that must succeed, returning its stdout.
    ///
    /// Output of the command is appended to `log` whether it succeeds or not.
    pub fn run(&self, args: &[&str], cwd: Option<&Path>, log: &mut CommandLog) -> Result<String> {
        let output = self.execute(args, cwd, log)?;
        log.push(&output.stdout);
        log.push(&output.stderr);
        if !output.success() {
            return Err(Error::VcsTool {
                tool: self.program.clone(),
                command: args.join(" "),
                code: output.status.code(),
                log: log.as_str().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Run a query whose exit status is an answer rather than a failure.
    ///
    /// The command's output is returned but never added to an operation log.
    pub fn probe(&self, args: &[&str], cwd: Option<&Path>) -> Result<ToolOutput> {
        let mut scratch = CommandLog::new();
        self.execute(args, cwd, &mut scratch)
    }

    fn execute(&self, args: &[&str], cwd: Option<&Path>, log: &mut CommandLog) -> Result<ToolOutput> {
        debug!(
            "Running {} {}{}",
            self.program,
            args.join(" "),
            cwd.map(|p| format!(" in {}", p.display()))
                .unwrap_or_default()
        );

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        if self.interactive {
            command.stdin(Stdio::inherit());
        } else {
            command.stdin(Stdio::null()).env("GIT_TERMINAL_PROMPT", "0");
        }

        let child = command.spawn().map_err(|e| {
            let message = format!("failed to run {}: {}", self.program, e);
            log.push(&message);
            Error::VcsTool {
                tool: self.program.clone(),
                command: args.join(" "),
                code: None,
                log: log.as_str().to_string(),
            }
        })?;

        match self.timeout {
            None => {
                let output = child.wait_with_output()?;
                Ok(ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            Some(timeout) => self.wait_with_timeout(child, timeout, args, log),
        }
    }

    fn wait_with_timeout(
        &self,
        mut child: Child,
        timeout: Duration,
        args: &[&str],
        log: &mut CommandLog,
    ) -> Result<ToolOutput> {
        // Drain both pipes on their own threads so a chatty tool cannot
        // block on a full pipe while we poll for its exit.
        let stdout = child.stdout.take().map(PipeReader::spawn);
        let stderr = child.stderr.take().map(PipeReader::spawn);

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                // The process may have exited in the meantime; either way we
                // reap it so no zombie is left behind.
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let Some(status) = status else {
            // Grandchildren may still hold the pipes open, so the readers get
            // a short grace period and keep whatever they read so far.
            for reader in [stdout, stderr].into_iter().flatten() {
                let (text, complete) = reader.finish(Some(READ_GRACE));
                log.push(&text);
                if !complete {
                    log.push(&format!(
                        "[{} output still open after kill, rest dropped]",
                        self.program
                    ));
                }
            }
            return Err(Error::Timeout {
                tool: self.program.clone(),
                command: args.join(" "),
                seconds: timeout.as_secs(),
                log: log.as_str().to_string(),
            });
        };

        Ok(ToolOutput {
            status,
            stdout: stdout.map(|r| r.finish(None).0).unwrap_or_default(),
            stderr: stderr.map(|r| r.finish(None).0).unwrap_or_default(),
        })
    }
}

/// Drains one pipe on its own thread into a buffer that can be read before
/// the pipe closes.
struct PipeReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (sender, done) = mpsc::channel();
        let shared = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Ok(mut buffer) = shared.lock() {
                            buffer.extend_from_slice(&chunk[..n]);
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            let _ = sender.send(());
        });
        Self { buffer, done }
    }

    /// The text read so far, and whether the pipe reached end of file.
    ///
    /// Waits for end of file, or at most `limit` when one is given.
    fn finish(self, limit: Option<Duration>) -> (String, bool) {
        let complete = match limit {
            None => self.done.recv().is_ok(),
            Some(limit) => self.done.recv_timeout(limit).is_ok(),
        };
        let bytes = self
            .buffer
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default();
        (String::from_utf8_lossy(&bytes).into_owned(), complete)
    }
}
