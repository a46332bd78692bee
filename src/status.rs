/// Status file: writes `devpair.status` as JSON on every state transition.
///
/// Uses atomic write pattern: write to temp file then rename.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Supervisor states written to the status file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Terminated,
}

/// The JSON payload written to `devpair.status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusData {
    pub pid: u32,
    pub state: SupervisorState,
    pub backend_pid: Option<u32>,
    pub frontend_pid: Option<u32>,
    pub backend_port: u16,
    pub frontend_port: Option<u16>,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// Errors that can occur while writing the status file.
#[derive(Debug)]
pub enum StatusError {
    Serialize {
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::Serialize { source } => {
                write!(f, "failed to serialize status data: {}", source)
            }
            StatusError::Write { path, source } => {
                write!(f, "failed to write status file {}: {}", path.display(), source)
            }
            StatusError::Rename { from, to, source } => write!(
                f,
                "failed to rename {} to {}: {}",
                from.display(),
                to.display(),
                source
            ),
        }
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatusError::Serialize { source } => Some(source),
            StatusError::Write { source, .. } => Some(source),
            StatusError::Rename { source, .. } => Some(source),
        }
    }
}

/// Manages the status file lifecycle.
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Atomically write status data to the status file.
    ///
    /// Writes to a temporary file in the same directory, then renames
    /// to ensure readers never see a partial write.
    pub fn write(&self, data: &StatusData) -> Result<(), StatusError> {
        let json =
            serde_json::to_string_pretty(data).map_err(|e| StatusError::Serialize { source: e })?;

        let dir = self.path.parent().unwrap_or(Path::new("."));
        let tmp_path = dir.join(format!(".devpair.status.tmp.{}", std::process::id()));

        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| StatusError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| StatusError::Rename {
            from: tmp_path,
            to: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }

    /// Remove the status file (on clean shutdown).
    pub fn remove(&self) {
        let _ = std::fs::remove_file(&self.path);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Mutable state tracker that builds StatusData for each update.
pub struct StatusTracker {
    file: StatusFile,
    pid: u32,
    backend_port: u16,
    frontend_port: Option<u16>,
    backend_pid: Option<u32>,
    frontend_pid: Option<u32>,
    started_at: DateTime<Utc>,
}

impl StatusTracker {
    pub fn new(status_path: PathBuf, backend_port: u16) -> Self {
        Self {
            file: StatusFile::new(status_path),
            pid: std::process::id(),
            backend_port,
            frontend_port: None,
            backend_pid: None,
            frontend_pid: None,
            started_at: Utc::now(),
        }
    }

    pub fn set_backend_pid(&mut self, pid: Option<u32>) {
        self.backend_pid = pid;
    }

    pub fn set_frontend(&mut self, pid: Option<u32>, port: u16) {
        self.frontend_pid = pid;
        self.frontend_port = Some(port);
    }

    /// Update and write the status file with the given state.
    pub fn update(&self, state: SupervisorState) {
        let data = StatusData {
            pid: self.pid,
            state,
            backend_pid: self.backend_pid,
            frontend_pid: self.frontend_pid,
            backend_port: self.backend_port,
            frontend_port: self.frontend_port,
            started_at: self.started_at,
            last_update: Utc::now(),
        };

        if let Err(e) = self.file.write(&data) {
            tracing::warn!(error = %e, "failed to write status file");
        }
    }

    /// Remove the status file once the run is over.
    pub fn finish(&self) {
        self.file.remove();
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data(state: SupervisorState) -> StatusData {
        StatusData {
            pid: 1234,
            state,
            backend_pid: Some(1235),
            frontend_pid: None,
            backend_port: 5001,
            frontend_port: None,
            started_at: Utc::now(),
            last_update: Utc::now(),
        }
    }

    #[test]
    fn test_state_serializes_snake_case() {
        for (state, expected) in [
            (SupervisorState::Idle, "idle"),
            (SupervisorState::Starting, "starting"),
            (SupervisorState::Running, "running"),
            (SupervisorState::ShuttingDown, "shutting_down"),
            (SupervisorState::Terminated, "terminated"),
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{expected}\""));
        }
    }

    #[test]
    fn test_write_produces_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devpair.status");
        let file = StatusFile::new(path.clone());

        file.write(&sample_data(SupervisorState::Running)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["pid"], 1234);
        assert_eq!(parsed["state"], "running");
        assert_eq!(parsed["backend_port"], 5001);
        assert!(parsed["frontend_pid"].is_null());
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devpair.status");
        let file = StatusFile::new(path);

        file.write(&sample_data(SupervisorState::Starting)).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|name| name.contains("tmp"))
            .collect();
        assert!(leftovers.is_empty(), "leftover temp files: {leftovers:?}");
    }

    #[test]
    fn test_remove_deletes_status_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devpair.status");
        let file = StatusFile::new(path.clone());

        file.write(&sample_data(SupervisorState::Running)).unwrap();
        assert!(path.exists());
        file.remove();
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let file = StatusFile::new(dir.path().join("never-written"));
        file.remove();
    }

    #[test]
    fn test_tracker_updates_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devpair.status");
        let mut tracker = StatusTracker::new(path.clone(), 5001);

        tracker.set_backend_pid(Some(42));
        tracker.set_frontend(Some(43), 4173);
        tracker.update(SupervisorState::Running);

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["backend_pid"], 42);
        assert_eq!(parsed["frontend_pid"], 43);
        assert_eq!(parsed["frontend_port"], 4173);

        tracker.finish();
        assert!(!path.exists());
    }
}
