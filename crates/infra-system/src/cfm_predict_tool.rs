// cfm-predict subprocess adapter
// reason: tokio for async process management, nix for SIGTERM on timeout

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::io;
use std::process::{ExitStatus, Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use cfmid_core::application::constants::{
    GRACEFUL_KILL_TIMEOUT, KILL_POLL_INTERVAL, STREAM_CHANNEL_CAPACITY,
};
use cfmid_core::domain::Invocation;
use cfmid_core::port::prediction_tool::{
    ByteStream, ExecutionError, ExecutionResult, ExecutionStatus, PredictionTool,
};
use cfmid_core::port::TimeProvider;

type Chunk = io::Result<Bytes>;

/// Runs the external cfm-predict executable, one process per call
pub struct CfmPredictTool {
    time_provider: Arc<dyn TimeProvider>,
    graceful_kill_timeout: Duration,
}

impl CfmPredictTool {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            graceful_kill_timeout: GRACEFUL_KILL_TIMEOUT,
        }
    }

    /// Override the SIGTERM -> SIGKILL grace period
    pub fn with_graceful_kill_timeout(mut self, grace: Duration) -> Self {
        self.graceful_kill_timeout = grace;
        self
    }

    fn spawn(&self, invocation: &Invocation) -> Result<Child, ExecutionError> {
        let args = invocation.args();

        info!(
            command = %invocation.executable.display(),
            args = ?args,
            timeout_ms = invocation.timeout.as_millis() as u64,
            "Starting cfm-predict"
        );

        let mut command = Command::new(&invocation.executable);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop if the owning task is dropped mid-run
            .kill_on_drop(true);

        // Own process group, so background helpers can be stopped with the tool
        #[cfg(unix)]
        command.process_group(0);

        command
            .spawn()
            .map_err(|e| {
                ExecutionError::SpawnFailed(format!(
                    "{}: {}",
                    invocation.executable.display(),
                    e
                ))
            })
    }

    /// Build execution result from process output
    fn build_result(&self, output: Output, duration_ms: i64) -> ExecutionResult {
        let status = if output.status.success() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };

        ExecutionResult {
            status,
            exit_code: output.status.code(),
            duration_ms,
            stdout: Some(String::from_utf8_lossy(&output.stdout).to_string()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        }
    }
}

#[async_trait]
impl PredictionTool for CfmPredictTool {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, ExecutionError> {
        let start_time = self.time_provider.now_millis();
        let mut child = self.spawn(invocation)?;
        let pgid = child.id();

        let mut stdout = tokio::spawn(read_all(child.stdout.take()));
        let mut stderr = tokio::spawn(read_all(child.stderr.take()));

        // One deadline covers the exit and the pipe drain
        let finished = timeout(invocation.timeout, async {
            let status = child
                .wait()
                .await
                .map_err(|e| ExecutionError::IoError(e.to_string()))?;
            Ok::<_, ExecutionError>(Output {
                status,
                stdout: join_output(&mut stdout).await?,
                stderr: join_output(&mut stderr).await?,
            })
        })
        .await;

        let output = match finished {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                stdout.abort();
                stderr.abort();
                kill_group(pgid);
                return Err(e);
            }
            Err(_) => {
                stdout.abort();
                stderr.abort();
                terminate(&mut child, pgid, self.graceful_kill_timeout).await?;
                return Err(ExecutionError::Timeout(timeout_ms(invocation)));
            }
        };

        let duration_ms = self.time_provider.now_millis() - start_time;
        let result = self.build_result(output, duration_ms);

        info!(
            duration_ms = %duration_ms,
            exit_code = ?result.exit_code,
            status = ?result.status,
            "cfm-predict completed"
        );

        Ok(result)
    }

    async fn stream(&self, invocation: &Invocation) -> Result<ByteStream, ExecutionError> {
        let mut child = self.spawn(invocation)?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::IoError("stderr not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::IoError("stdout not captured".to_string()))?;

        let (tx, rx) = mpsc::channel::<Chunk>(STREAM_CHANNEL_CAPACITY);

        // stderr (warnings) first, then stdout
        let stderr_relay = tokio::spawn(relay(stderr, tx.clone()));
        let stdout_relay = tokio::spawn(relay(stdout, tx.clone()));

        let supervisor = Supervisor {
            pgid: child.id(),
            child,
            run_timeout: invocation.timeout,
            grace: self.graceful_kill_timeout,
            time_provider: self.time_provider.clone(),
            tx,
        };
        tokio::spawn(supervisor.run(stderr_relay, stdout_relay));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Owns a streaming child until it is reaped
struct Supervisor {
    child: Child,
    pgid: Option<u32>,
    run_timeout: Duration,
    grace: Duration,
    time_provider: Arc<dyn TimeProvider>,
    tx: mpsc::Sender<Chunk>,
}

impl Supervisor {
    async fn run(self, mut stderr_relay: JoinHandle<()>, mut stdout_relay: JoinHandle<()>) {
        let Supervisor {
            mut child,
            pgid,
            run_timeout,
            grace,
            time_provider,
            tx,
        } = self;
        let start_time = time_provider.now_millis();

        let (failure, stopped) = tokio::select! {
            // Exit plus draining both relays, under one deadline
            finished = timeout(run_timeout, async {
                let status = child.wait().await;
                let _ = (&mut stderr_relay).await;
                let _ = (&mut stdout_relay).await;
                status
            }) => match finished {
                Ok(Ok(status)) => (exit_failure(status), false),
                Ok(Err(e)) => (Some(e), false),
                Err(_) => {
                    if let Err(e) = terminate(&mut child, pgid, grace).await {
                        error!(error = %e, "Failed to stop timed-out cfm-predict");
                    }
                    let timed_out = io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("cfm-predict timed out after {}ms", run_timeout.as_millis()),
                    );
                    (Some(timed_out), true)
                }
            },
            _ = tx.closed() => {
                warn!("Client went away, stopping cfm-predict");
                if let Err(e) = terminate(&mut child, pgid, grace).await {
                    error!(error = %e, "Failed to stop abandoned cfm-predict");
                }
                (None, true)
            }
        };

        if stopped {
            // Orphaned grandchildren may still hold the pipes open
            stderr_relay.abort();
            stdout_relay.abort();
        }

        let duration_ms = time_provider.now_millis() - start_time;
        match failure {
            Some(e) => {
                error!(duration_ms = %duration_ms, error = %e, "cfm-predict error");
                // Surfaces as an aborted body on the HTTP side
                let _ = tx.send(Err(e)).await;
            }
            None => info!(duration_ms = %duration_ms, "cfm-predict stream finished"),
        }
    }
}

fn exit_failure(status: ExitStatus) -> Option<io::Error> {
    if status.success() {
        None
    } else {
        Some(io::Error::other(format!("cfm-predict {}", status)))
    }
}

/// Copy one pipe into the response channel until EOF or the receiver is gone
async fn relay<R>(reader: R, tx: mpsc::Sender<Chunk>)
where
    R: AsyncRead + Unpin,
{
    let mut chunks = ReaderStream::new(reader);
    while let Some(chunk) = chunks.next().await {
        if tx.send(chunk).await.is_err() {
            break;
        }
    }
}

async fn read_all<R>(reader: Option<R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn join_output(
    handle: &mut JoinHandle<io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, ExecutionError> {
    handle
        .await
        .map_err(|e| ExecutionError::IoError(e.to_string()))?
        .map_err(|e| ExecutionError::IoError(e.to_string()))
}

fn timeout_ms(invocation: &Invocation) -> i64 {
    invocation.timeout.as_millis() as i64
}

/// Stop a child: SIGTERM first, SIGKILL once `grace` runs out
///
/// `pgid` is the child's process group, captured at spawn. Whatever is left
/// in the group once the child is gone is killed with it.
async fn terminate(
    child: &mut Child,
    pgid: Option<u32>,
    grace: Duration,
) -> Result<(), ExecutionError> {
    // Already reaped; only leftovers in its group remain
    let Some(pid) = child.id() else {
        kill_group(pgid);
        return Ok(());
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        info!(pid = %pid, "Sending SIGTERM to cfm-predict");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(pid = %pid, error = %e, "SIGTERM failed");
        }

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!(pid = %pid, status = %status, "cfm-predict exited after SIGTERM");
                    kill_group(pgid);
                    return Ok(());
                }
                Ok(None) if tokio::time::Instant::now() >= deadline => break,
                Ok(None) => tokio::time::sleep(KILL_POLL_INTERVAL).await,
                Err(e) => return Err(ExecutionError::Killed(e.to_string())),
            }
        }
        warn!(pid = %pid, "cfm-predict ignored SIGTERM, sending SIGKILL");
    }

    #[cfg(not(unix))]
    let _ = grace;

    let killed = child
        .kill()
        .await
        .map_err(|e| ExecutionError::Killed(format!("pid {}: {}", pid, e)));
    kill_group(pgid);
    killed
}

/// SIGKILL every process left in the tool's group
fn kill_group(pgid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pgid {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            Ok(()) => info!(pgid = %pgid, "Killed leftover cfm-predict processes"),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!(pgid = %pgid, error = %e, "Process group kill failed"),
        }
    }

    #[cfg(not(unix))]
    let _ = pgid;
}
