/// One supervised child process: spawn, interrupt, wait with a grace
/// period, force-kill if it won't stop.
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Everything needed to spawn one child process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Human-readable label used in log output ("backend", "frontend").
    pub label: &'static str,
    pub command: String,
    pub args: Vec<String>,
    /// Working directory for the child; inherits ours when None.
    pub cwd: Option<PathBuf>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

/// Failed to spawn a child process (executable not found, permission denied).
#[derive(Debug)]
pub struct SpawnError {
    pub label: &'static str,
    pub source: std::io::Error,
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to spawn {} process: {}", self.label, self.source)
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A spawned child process owned by the supervisor.
///
/// The child is placed in its own process group (via `process_group(0)`)
/// so a Ctrl-C in the supervisor's terminal reaches the children only
/// through explicit forwarding, keeping shutdown ordering in our hands.
#[derive(Debug)]
pub struct ManagedProcess {
    label: &'static str,
    child: Child,
    exit: Option<ExitStatus>,
}

impl ManagedProcess {
    /// Spawn a child process from the given spec.
    pub fn spawn(spec: ProcessSpec) -> Result<ManagedProcess, SpawnError> {
        tracing::info!(
            label = spec.label,
            command = %spec.command,
            args = ?spec.args,
            "starting process"
        );

        let mut command = Command::new(&spec.command);
        command.args(&spec.args).process_group(0);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| SpawnError {
            label: spec.label,
            source: e,
        })?;

        tracing::info!(label = spec.label, pid = child.id(), "process started");

        Ok(ManagedProcess {
            label: spec.label,
            child,
            exit: None,
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// PID of the child, if it has not been reaped yet.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the child is still running. Reaps and caches the exit
    /// status as a side effect if the child has already terminated.
    pub fn is_running(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit = Some(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(label = self.label, error = %e, "failed to poll process");
                false
            }
        }
    }

    /// Wait for the child to terminate, returning its exit status.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.exit = Some(status);
        Ok(status)
    }

    /// Send SIGINT to the child if it is still running.
    pub fn interrupt(&mut self) {
        if !self.is_running() {
            return;
        }
        let Some(pid) = self.child.id() else {
            return;
        };
        tracing::info!(label = self.label, pid, "sending SIGINT");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
            tracing::debug!(label = self.label, pid, error = %e, "SIGINT delivery failed");
        }
    }

    /// Stop the child: SIGINT, wait up to `grace`, then SIGKILL.
    ///
    /// Returns `true` if the grace period expired and the child had to be
    /// forcibly killed.
    pub async fn shutdown(&mut self, grace: Duration) -> bool {
        if !self.is_running() {
            tracing::debug!(label = self.label, "process already stopped");
            return false;
        }

        self.interrupt();

        match tokio::time::timeout(grace, self.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(
                    label = self.label,
                    exit_code = ?status.code(),
                    "process stopped"
                );
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(label = self.label, error = %e, "failed to wait for process");
                false
            }
            Err(_) => {
                tracing::warn!(
                    label = self.label,
                    grace_secs = grace.as_secs(),
                    "grace period expired, force-killing process"
                );
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(label = self.label, error = %e, "force-kill failed");
                }
                if let Ok(Some(status)) = self.child.try_wait() {
                    self.exit = Some(status);
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn spec(command: &str, args: &[&str]) -> ProcessSpec {
        ProcessSpec {
            label: "test",
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            env: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_spawn_and_wait_success() {
        let mut proc = ManagedProcess::spawn(spec("true", &[])).unwrap();
        let status = proc.wait().await.unwrap();
        assert_eq!(status.code(), Some(0));
        assert!(!proc.is_running());
    }

    #[tokio::test]
    async fn test_wait_returns_nonzero_exit_code() {
        let mut proc = ManagedProcess::spawn(spec("sh", &["-c", "exit 7"])).unwrap();
        let status = proc.wait().await.unwrap();
        assert_eq!(status.code(), Some(7));
    }

    #[tokio::test]
    async fn test_wait_is_idempotent_after_exit() {
        let mut proc = ManagedProcess::spawn(spec("true", &[])).unwrap();
        let first = proc.wait().await.unwrap();
        let second = proc.wait().await.unwrap();
        assert_eq!(first.code(), second.code());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = ManagedProcess::spawn(spec("nonexistent-binary-xyz", &[])).unwrap_err();
        assert_eq!(err.label, "test");
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn test_cwd_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "x").unwrap();

        let mut spec = spec("sh", &["-c", "test -f marker"]);
        spec.cwd = Some(dir.path().to_path_buf());

        let mut proc = ManagedProcess::spawn(spec).unwrap();
        let status = proc.wait().await.unwrap();
        assert_eq!(status.code(), Some(0));
    }

    #[tokio::test]
    async fn test_env_override_is_visible_to_child() {
        let mut spec = spec("sh", &["-c", r#"test "$PORT" = "9000""#]);
        spec.env = vec![("PORT".to_string(), "9000".to_string())];

        let mut proc = ManagedProcess::spawn(spec).unwrap();
        let status = proc.wait().await.unwrap();
        assert_eq!(status.code(), Some(0));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_within_grace() {
        let mut proc = ManagedProcess::spawn(spec("sleep", &["30"])).unwrap();
        assert!(proc.is_running());

        let start = Instant::now();
        let forced = proc.shutdown(Duration::from_secs(5)).await;

        assert!(!forced);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!proc.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_force_kills_after_grace() {
        // Ignore SIGINT so only the SIGKILL escalation can stop it.
        let mut proc =
            ManagedProcess::spawn(spec("sh", &["-c", r#"trap "" INT; sleep 30"#])).unwrap();
        assert!(proc.is_running());

        let start = Instant::now();
        let forced = proc.shutdown(Duration::from_millis(300)).await;

        assert!(forced);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!proc.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_on_already_exited_process() {
        let mut proc = ManagedProcess::spawn(spec("true", &[])).unwrap();
        proc.wait().await.unwrap();

        let forced = proc.shutdown(Duration::from_secs(5)).await;
        assert!(!forced);
    }

    #[tokio::test]
    async fn test_pid_available_while_running() {
        let mut proc = ManagedProcess::spawn(spec("sleep", &["30"])).unwrap();
        assert!(proc.pid().is_some());
        assert_eq!(proc.label(), "test");
        proc.shutdown(Duration::from_secs(5)).await;
    }
}
