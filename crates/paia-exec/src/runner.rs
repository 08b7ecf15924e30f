use std::io::Read;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::warn;

use crate::contracts::AdapterError;
use crate::contracts::CommandOutput;
use crate::contracts::ExecRequest;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an [`ExecRequest`] to completion.
pub trait CommandRunner {
    fn run(&self, request: &ExecRequest) -> Result<CommandOutput, AdapterError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, request: &ExecRequest) -> Result<CommandOutput, AdapterError> {
        (**self).run(request)
    }
}

/// Spawns a real child process and kills it once `request.timeout` elapses.
///
/// Completion is decided by the child's exit status, not by the pipes
/// closing: a background process that inherits stdout or stderr can keep
/// them open after the child is gone. Once the child exits, the pipes are
/// drained only until the same deadline and whatever was captured is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, request: &ExecRequest) -> Result<CommandOutput, AdapterError> {
        let program = request.program.display().to_string();
        let failure = |message: String| AdapterError::SubprocessFailure {
            program: program.clone(),
            message,
        };

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| failure(format!("failed to start: {err}")))?;
        let deadline = Instant::now() + request.timeout;

        let stdout = child.stdout.take().map(PipeCapture::spawn);
        let stderr = child.stderr.take().map(PipeCapture::spawn);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    kill(&mut child);
                    return Err(failure(timeout_message(request.timeout)));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => return Err(failure(format!("failed to wait: {err}"))),
            }
        };
        debug!(%status, "{program} exited");

        let stdout = stdout.map(|pipe| pipe.finish(deadline)).unwrap_or_default();
        let stderr = stderr
            .map(|pipe| pipe.finish(deadline))
            .unwrap_or_default()
            .trim()
            .to_string();

        if !status.success() {
            let message = if stderr.is_empty() {
                format!("exited with {status}")
            } else {
                format!("exited with {status}: {stderr}")
            };
            return Err(failure(message));
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Reads one child pipe on its own thread into a shared buffer.
struct PipeCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    closed: mpsc::Receiver<()>,
}

impl PipeCapture {
    fn spawn<P: Read + Send + 'static>(mut pipe: P) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (tx, closed) = mpsc::channel();
        let sink = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                }
            }
            let _ = tx.send(());
        });
        Self { buffer, closed }
    }

    /// Waits for end of file until `deadline`, then returns what was read.
    /// A reader still blocked after the deadline is abandoned.
    fn finish(self, deadline: Instant) -> String {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if self.closed.recv_timeout(remaining).is_err() {
            debug!("output pipe still open at deadline, keeping partial output");
        }
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        text
    }
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!("failed to kill timed out process: {err}");
    }
    let _ = child.wait();
}

fn timeout_message(timeout: Duration) -> String {
    format!("timed out after {}s", timeout.as_secs_f64())
}
