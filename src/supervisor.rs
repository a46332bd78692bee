/// Supervisor: owns the backend and frontend child processes and
/// guarantees neither outlives its own controlled shutdown.
///
/// Run lifecycle: spawn backend, optionally spawn frontend, block until
/// the backend exits or a shutdown signal arrives, then stop every
/// recorded child (SIGINT, 5s grace, SIGKILL). Startup errors take the
/// same shutdown path so an already-started backend is never orphaned.
use crate::config::RunConfig;
use crate::process::{ManagedProcess, ProcessSpec, SpawnError};
use crate::signals::ShutdownSignal;
use crate::status::{StatusTracker, SupervisorState};
use std::path::PathBuf;
use std::time::Duration;

/// Grace period between SIGINT and SIGKILL, per child.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Errors that abort a supervisor run.
#[derive(Debug)]
pub enum SupervisorError {
    /// No directory at the frontend path (missing, or a plain file)
    /// while `skip_frontend` is off.
    FrontendDirMissing { path: PathBuf },
    /// The OS failed to create a child process.
    Spawn(SpawnError),
    /// Waiting on the backend process failed.
    Wait { source: std::io::Error },
}

impl std::fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorError::FrontendDirMissing { path } => {
                write!(f, "frontend directory not found at {}", path.display())
            }
            SupervisorError::Spawn(source) => write!(f, "{}", source),
            SupervisorError::Wait { source } => {
                write!(f, "failed to wait for backend process: {}", source)
            }
        }
    }
}

impl std::error::Error for SupervisorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SupervisorError::FrontendDirMissing { .. } => None,
            SupervisorError::Spawn(source) => Some(source),
            SupervisorError::Wait { source } => Some(source),
        }
    }
}

impl From<SpawnError> for SupervisorError {
    fn from(e: SpawnError) -> Self {
        SupervisorError::Spawn(e)
    }
}

pub struct Supervisor {
    config: RunConfig,
    status: StatusTracker,
    grace: Duration,
}

impl Supervisor {
    pub fn new(config: RunConfig, status_path: PathBuf) -> Self {
        let status = StatusTracker::new(status_path, config.backend_port);
        Self {
            config,
            status,
            grace: GRACE_PERIOD,
        }
    }

    #[cfg(test)]
    fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run both servers until the backend exits or shutdown is requested.
    ///
    /// Returns the backend's exit code (0 for a clean exit or a
    /// signal-triggered shutdown). Every child recorded before the error
    /// or exit is stopped before this returns.
    pub async fn run(
        &mut self,
        shutdown: &mut ShutdownSignal,
    ) -> Result<i32, SupervisorError> {
        self.status.update(SupervisorState::Starting);

        let mut children: Vec<ManagedProcess> = Vec::with_capacity(2);
        let result = self.start_and_wait(&mut children, shutdown).await;

        self.status.update(SupervisorState::ShuttingDown);
        for child in children.iter_mut() {
            child.shutdown(self.grace).await;
        }

        self.status.update(SupervisorState::Terminated);
        self.status.finish();

        result
    }

    async fn start_and_wait(
        &mut self,
        children: &mut Vec<ManagedProcess>,
        shutdown: &mut ShutdownSignal,
    ) -> Result<i32, SupervisorError> {
        let backend = ManagedProcess::spawn(self.backend_spec())?;
        self.status.set_backend_pid(backend.pid());
        children.push(backend);

        if !self.config.skip_frontend {
            if !self.config.frontend_dir.is_dir() {
                return Err(SupervisorError::FrontendDirMissing {
                    path: self.config.frontend_dir.clone(),
                });
            }
            let frontend = ManagedProcess::spawn(self.frontend_spec())?;
            self.status
                .set_frontend(frontend.pid(), self.config.frontend_port);
            children.push(frontend);
            tracing::info!(
                port = self.config.frontend_port,
                "frontend available on localhost"
            );
        }

        tracing::info!(
            host = %self.config.backend_host,
            port = self.config.backend_port,
            "backend running, press Ctrl+C to stop both servers"
        );
        self.status.update(SupervisorState::Running);

        tokio::select! {
            status = children[0].wait() => {
                let status = status.map_err(|e| SupervisorError::Wait { source: e })?;
                let code = status.code().unwrap_or(0);
                tracing::info!(exit_code = code, "backend exited");
                Ok(code)
            }
            _ = shutdown.triggered() => {
                tracing::info!("shutdown requested, stopping both servers");
                Ok(0)
            }
        }
    }

    /// Backend command line: configured command plus `--host`/`--port`
    /// (and `--reload` when requested), with `PORT` exported in the
    /// child's environment.
    fn backend_spec(&self) -> ProcessSpec {
        let config = &self.config;
        let mut args = config.backend_args.clone();
        args.push("--host".to_string());
        args.push(config.backend_host.clone());
        args.push("--port".to_string());
        args.push(config.backend_port.to_string());
        if config.reload {
            args.push("--reload".to_string());
        }

        ProcessSpec {
            label: "backend",
            command: config.backend_command.clone(),
            args,
            cwd: None,
            env: vec![("PORT".to_string(), config.backend_port.to_string())],
        }
    }

    /// Frontend command line: a static file server run from the frontend
    /// directory with the port as its final argument.
    fn frontend_spec(&self) -> ProcessSpec {
        let config = &self.config;
        let mut args = config.frontend_args.clone();
        args.push(config.frontend_port.to_string());

        ProcessSpec {
            label: "frontend",
            command: config.frontend_command.clone(),
            args,
            cwd: Some(config.frontend_dir.clone()),
            env: Vec::new(),
        }
    }
}
