//! Supervised toolchain processes.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fob_config::ToolchainOptions;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{args, depinfo};
use crate::result::{BuildResult, BuildStatus, elapsed_ms};
use crate::unit::CompilationUnit;

/// How long output readers may keep running after the process is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

enum Exit {
    Status(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Spawns and supervises one toolchain process per call.
///
/// Every call returns only after the child has exited or has been killed and
/// reaped, so no process outlives the `BuildResult` describing it. On unix
/// the toolchain leads its own process group, and termination signals the
/// whole group so compiler and build-script subprocesses go with it.
#[derive(Debug, Clone)]
pub struct ToolchainInvoker {
    options: ToolchainOptions,
    cancel: CancellationToken,
}

impl ToolchainInvoker {
    pub fn new(options: ToolchainOptions, cancel: CancellationToken) -> Self {
        Self { options, cancel }
    }

    pub fn options(&self) -> &ToolchainOptions {
        &self.options
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.options.timeout_secs.max(1))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.options.cargo);
        cmd.env_clear();
        cmd.envs(args::build_env(&self.options));
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    /// Query `<cargo> --version`. Bounded by the configured timeout.
    pub async fn version(&self) -> Option<String> {
        let mut cmd = self.command();
        cmd.arg("--version");

        match tokio::time::timeout(self.timeout(), cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Some(version)
            }
            Ok(Ok(output)) => {
                tracing::warn!(status = %output.status, "toolchain version query failed");
                None
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, program = %self.options.cargo.display(), "could not run toolchain");
                None
            }
            Err(_) => {
                tracing::warn!("toolchain version query timed out");
                None
            }
        }
    }

    /// Compile one unit.
    ///
    /// Failures are reported through the returned status; diagnostics
    /// collected before a failure are always kept.
    pub async fn invoke(&self, unit: &CompilationUnit, root_target_dir: &Path) -> BuildResult {
        let started = Instant::now();

        if self.cancel.is_cancelled() {
            return BuildResult::failed(unit, BuildStatus::Cancelled, Vec::new(), started);
        }

        let build_args = args::build_args(unit, root_target_dir, &self.options);
        tracing::debug!(
            unit = %unit.name,
            program = %self.options.cargo.display(),
            args = ?build_args,
            "spawning toolchain"
        );

        let mut cmd = self.command();
        cmd.args(&build_args)
            .current_dir(&unit.crate_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                let line = format!(
                    "error: failed to spawn `{}`: {err}",
                    self.options.cargo.display()
                );
                return BuildResult::failed(unit, BuildStatus::ToolchainFailure, vec![line], started);
            }
        };

        let diagnostics = Arc::new(Mutex::new(Vec::new()));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| spawn_line_reader(stderr, Arc::clone(&diagnostics)));
        let stdout_task = child.stdout.take().map(|mut stdout| {
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await;
            })
        });

        let exit = tokio::select! {
            status = child.wait() => Exit::Status(status),
            _ = tokio::time::sleep(self.timeout()) => Exit::TimedOut,
            _ = self.cancel.cancelled() => Exit::Cancelled,
        };

        if !matches!(exit, Exit::Status(_)) {
            terminate(&mut child, &unit.name).await;
        }

        drain(stderr_task).await;
        drain(stdout_task).await;
        let mut diagnostics = std::mem::take(&mut *diagnostics.lock());

        let status = match exit {
            Exit::Status(Ok(status)) if status.success() => None,
            Exit::Status(Ok(status)) => {
                tracing::debug!(unit = %unit.name, %status, "toolchain exited with failure");
                Some(BuildStatus::ToolchainFailure)
            }
            Exit::Status(Err(err)) => {
                diagnostics.push(format!("error: failed waiting for toolchain: {err}"));
                Some(BuildStatus::ToolchainFailure)
            }
            Exit::TimedOut => {
                diagnostics.push(format!(
                    "error: toolchain exceeded the {}s timeout and was terminated",
                    self.timeout().as_secs()
                ));
                Some(BuildStatus::Timeout)
            }
            Exit::Cancelled => Some(BuildStatus::Cancelled),
        };

        if let Some(status) = status {
            return BuildResult::failed(unit, status, diagnostics, started);
        }

        let artifact_path = unit.artifact_path(root_target_dir);
        if !artifact_path.is_file() {
            diagnostics.push(format!(
                "error: toolchain reported success but no artifact exists at {}",
                artifact_path.display()
            ));
            return BuildResult::failed(unit, BuildStatus::ToolchainFailure, diagnostics, started);
        }

        let debug_map_path = Some(unit.debug_map_path(root_target_dir)).filter(|p| p.is_file());
        let declared_inputs = depinfo::read(&unit.dep_info_path(root_target_dir));

        BuildResult {
            unit_name: unit.name.clone(),
            status: BuildStatus::Success,
            artifact_path: Some(artifact_path),
            debug_map_path,
            declared_inputs,
            diagnostics,
            duration_ms: elapsed_ms(started),
        }
    }
}

/// Collect lines verbatim and in order; invalid UTF-8 is replaced, not dropped.
fn spawn_line_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    sink: Arc<Mutex<Vec<String>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
                    sink.lock().push(line.to_string());
                }
            }
        }
    })
}

async fn terminate(child: &mut Child, unit: &str) {
    #[cfg(unix)]
    kill_process_group(child, unit);
    // kill() sends SIGKILL and reaps the child
    if let Err(err) = child.kill().await {
        tracing::warn!(unit, error = %err, "failed to kill toolchain process");
    }
}

/// SIGKILL every process in the child's group. The child was spawned with
/// `process_group(0)`, so its pid is the group id.
#[cfg(unix)]
fn kill_process_group(child: &Child, unit: &str) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => {
            tracing::warn!(unit, pgid = pid, error = %err, "failed to kill toolchain process group");
        }
    }
}

async fn drain(task: Option<JoinHandle<()>>) {
    let Some(task) = task else {
        return;
    };
    let abort = task.abort_handle();
    if tokio::time::timeout(DRAIN_GRACE, task).await.is_err() {
        // A grandchild still holds the pipe open
        abort.abort();
    }
}
