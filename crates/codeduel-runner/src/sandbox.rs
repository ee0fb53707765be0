use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use codeduel_core::{
    ExecutionError, ExecutionRequest, ExecutionResult, ExecutionStatus, Result, SandboxConfig,
};
use dashmap::DashSet;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Written to stderr by the shell pipeline when the compile step fails.
pub const COMPILE_FAILED_MARKER: &str = "__codeduel_compile_failed__";

const CONTAINER_PREFIX: &str = "codeduel-";
const ISOLATION_LABEL: &str = "codeduel.isolation";

/// Exit code of the docker client itself failing (daemon error, bad flags).
const DOCKER_CLIENT_FAILURE: i32 = 125;

/// Runs a wrapped program in isolation.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult>;

    /// Runs and classifies: trimmed stdout on a clean exit, otherwise the failure.
    async fn execute(&self, request: ExecutionRequest) -> Result<String> {
        self.run(request).await?.into_output()
    }
}

/// Disposable `docker run` containers: no network, capped memory, one
/// private workspace per execution.
pub struct DockerSandbox {
    config: SandboxConfig,
    ready_images: DashSet<&'static str>,
}

impl DockerSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            ready_images: DashSet::new(),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    fn docker(&self) -> Command {
        docker_command(&self.config.docker_binary, self.config.docker_host.as_deref())
    }

    /// Inspects the image once per sandbox and pulls it when missing.
    async fn ensure_image(&self, image: &'static str) -> Result<()> {
        if !self.config.pull_images || self.ready_images.contains(image) {
            return Ok(());
        }

        let present = self
            .docker()
            .args(["image", "inspect", image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.launch_error(e))?
            .success();

        if !present {
            info!(image, "Pulling image");
            let pull = self
                .docker()
                .args(["pull", image])
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output();

            let timeout = Duration::from_millis(self.config.pull_timeout_ms);
            let output = tokio::time::timeout(timeout, pull)
                .await
                .map_err(|_| {
                    ExecutionError::Container(format!(
                        "Pulling {} timed out after {}ms",
                        image, self.config.pull_timeout_ms
                    ))
                })?
                .map_err(|e| self.launch_error(e))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ExecutionError::Container(format!(
                    "Cannot pull {}: {}",
                    image,
                    stderr.trim()
                )));
            }
        }

        self.ready_images.insert(image);
        Ok(())
    }

    fn run_command(&self, request: &ExecutionRequest, workspace: &Path, container: &str) -> Command {
        let profile = request.language.profile();
        let workdir = &self.config.container_workdir;

        let mut mount = workspace.as_os_str().to_os_string();
        mount.push(":");
        mount.push(workdir);

        let mut cmd = self.docker();
        cmd.args(["run", "-i", "--rm"])
            .arg("--name")
            .arg(container)
            .arg("--label")
            .arg(format!("{}={}", ISOLATION_LABEL, request.isolation_key))
            .arg("-v")
            .arg(mount)
            .arg("-w")
            .arg(workdir)
            .args(["--network", "none"])
            .arg("--memory")
            .arg(&self.config.memory_limit)
            .arg("--memory-swap")
            .arg(&self.config.memory_limit);

        if let Some(pids) = self.config.pids_limit {
            cmd.arg("--pids-limit").arg(pids.to_string());
        }

        cmd.arg(profile.image)
            .args(["sh", "-c"])
            .arg(profile.pipeline(COMPILE_FAILED_MARKER))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }

    fn launch_error(&self, e: std::io::Error) -> ExecutionError {
        ExecutionError::Container(format!(
            "Cannot launch {}: {}",
            self.config.docker_binary, e
        ))
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        let profile = request.language.profile();
        self.ensure_image(profile.image).await?;

        // Private workspace keyed by the execution id; removed when dropped.
        let root = self.config.workspace_root();
        tokio::fs::create_dir_all(&root).await?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("{}{}-", CONTAINER_PREFIX, request.id))
            .tempdir_in(&root)?;
        let source_path = workspace.path().join(&request.program.file_name);
        tokio::fs::write(&source_path, &request.program.source).await?;
        debug!(id = %request.id, path = %source_path.display(), "Staged program");

        let container = format!("{}{}", CONTAINER_PREFIX, request.id);
        let mut command = self.run_command(&request, workspace.path(), &container);
        debug!(id = %request.id, "Docker command: {:?}", command.as_std());

        info!(
            id = %request.id,
            language = %request.language,
            isolation_key = %request.isolation_key,
            "Starting execution"
        );
        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| self.launch_error(e))?;
        let mut guard = ContainerGuard::new(&self.config, container);

        let payload = format!("{}\n", request.stdin);
        let stdin_task = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                // the program may exit without reading its input
                let _ = stdin.write_all(payload.as_bytes()).await;
            })
        });
        let limit = self.config.output_limit_bytes;
        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), limit));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), limit));

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        let exit = match waited {
            Ok(exit) => exit.map_err(|e| ExecutionError::Container(e.to_string()))?,
            Err(_) => {
                warn!(id = %request.id, timeout_ms = self.config.timeout_ms, "Execution timed out");
                let _ = child.kill().await;
                guard.remove().await;
                stdout_task.abort();
                stderr_task.abort();
                if let Some(task) = stdin_task {
                    task.abort();
                }
                close_workspace(workspace);
                return Ok(ExecutionResult {
                    stdout: String::new(),
                    stderr: String::new(),
                    status: ExecutionStatus::TimedOut,
                    wall_time_ms,
                    timeout_ms: self.config.timeout_ms,
                });
            }
        };
        // `--rm` removes the exited container
        guard.disarm();

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        close_workspace(workspace);

        let code = exit.code().unwrap_or(-1);
        if code == DOCKER_CLIENT_FAILURE && stderr.contains("docker:") {
            return Err(ExecutionError::Container(stderr.trim().to_string()));
        }

        let (status, stderr) = classify_exit(code, stderr);
        info!(id = %request.id, ?status, wall_time_ms, "Execution finished");

        Ok(ExecutionResult {
            stdout,
            stderr,
            status,
            wall_time_ms,
            timeout_ms: self.config.timeout_ms,
        })
    }
}

/// Separates a failed compile step from a failed run and strips the marker.
fn classify_exit(code: i32, stderr: String) -> (ExecutionStatus, String) {
    if code == 0 || !stderr.contains(COMPILE_FAILED_MARKER) {
        return (ExecutionStatus::Exited(code), stderr);
    }
    let cleaned = stderr
        .lines()
        .filter(|line| line.trim() != COMPILE_FAILED_MARKER)
        .collect::<Vec<_>>()
        .join("\n");
    (ExecutionStatus::CompileFailed(code), cleaned)
}

/// Reads a stream to the end, keeping at most `limit` bytes.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, limit: usize) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };

    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut dropped = 0usize;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
                dropped += n.saturating_sub(room);
            }
        }
    }
    if dropped > 0 {
        debug!(kept = kept.len(), dropped, "Output exceeded limit");
    }
    String::from_utf8_lossy(&kept).into_owned()
}

fn close_workspace(workspace: tempfile::TempDir) {
    let path = workspace.path().to_path_buf();
    if let Err(e) = workspace.close() {
        warn!(path = %path.display(), "Failed to remove workspace: {}", e);
    }
}

fn docker_command(binary: &str, host: Option<&str>) -> Command {
    let mut cmd = Command::new(binary);
    if let Some(host) = host {
        cmd.env("DOCKER_HOST", host);
    }
    cmd
}

/// Force-removes the container unless disarmed. Covers callers that drop
/// the execution future before the container exits.
struct ContainerGuard {
    binary: String,
    host: Option<String>,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(config: &SandboxConfig, name: String) -> Self {
        Self {
            binary: config.docker_binary.clone(),
            host: config.docker_host.clone(),
            name,
            armed: true,
        }
    }

    async fn remove(&mut self) {
        self.armed = false;
        let removed = docker_command(&self.binary, self.host.as_deref())
            .args(["rm", "-f", &self.name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = removed {
            warn!(container = %self.name, "Failed to remove container: {}", e);
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!(container = %self.name, "Removing abandoned container");
        let binary = self.binary.clone();
        let host = self.host.clone();
        let name = self.name.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = docker_command(&binary, host.as_deref())
                        .args(["rm", "-f", &name])
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status()
                        .await;
                });
            }
            Err(_) => {
                let mut cmd = std::process::Command::new(&binary);
                if let Some(host) = host {
                    cmd.env("DOCKER_HOST", host);
                }
                let _ = cmd
                    .args(["rm", "-f", &name])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status();
            }
        }
    }
}
