use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from devpair.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct FileConfig {
    pub backend: BackendConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub reload: bool,
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    pub port: u16,
    pub dir: PathBuf,
    pub skip: bool,
    pub command: String,
    pub args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            reload: false,
            command: "python3".to_string(),
            args: vec![
                "-m".to_string(),
                "uvicorn".to_string(),
                "backend.app:app".to_string(),
            ],
        }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            port: 4173,
            dir: PathBuf::from("frontend"),
            skip: false,
            command: "python3".to_string(),
            args: vec!["-m".to_string(), "http.server".to_string()],
        }
    }
}

/// Errors that can occur while loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file contents are not valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config file {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config file {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file at the default path is not an error (built-in defaults
    /// apply); a missing or unreadable file at an explicitly-requested path is.
    pub fn load(path: &Path, explicit: bool) -> Result<FileConfig, ConfigError> {
        if !explicit && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(FileConfig::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// CLI flag values that override file/default configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub backend_host: Option<String>,
    pub backend_port: Option<u16>,
    pub frontend_port: Option<u16>,
    pub frontend_dir: Option<PathBuf>,
    pub skip_frontend: bool,
    pub reload: bool,
}

/// Fully-resolved run configuration handed to the supervisor.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub backend_host: String,
    pub backend_port: u16,
    pub reload: bool,
    pub backend_command: String,
    pub backend_args: Vec<String>,
    pub frontend_port: u16,
    pub frontend_dir: PathBuf,
    pub skip_frontend: bool,
    pub frontend_command: String,
    pub frontend_args: Vec<String>,
}

impl RunConfig {
    /// Merge file config, CLI overrides, and the `PORT` environment variable.
    ///
    /// Precedence for the backend port: CLI flag, then `PORT` (if parseable),
    /// then the config file, then 5001. Boolean flags are OR'd with the file
    /// values since an absent flag cannot un-set a file setting.
    pub fn resolve(file: FileConfig, overrides: Overrides, env_port: Option<&str>) -> RunConfig {
        let backend_port = overrides
            .backend_port
            .or_else(|| env_port.and_then(|v| v.parse().ok()))
            .unwrap_or(file.backend.port);

        RunConfig {
            backend_host: overrides.backend_host.unwrap_or(file.backend.host),
            backend_port,
            reload: overrides.reload || file.backend.reload,
            backend_command: file.backend.command,
            backend_args: file.backend.args,
            frontend_port: overrides.frontend_port.unwrap_or(file.frontend.port),
            frontend_dir: overrides.frontend_dir.unwrap_or(file.frontend.dir),
            skip_frontend: overrides.skip_frontend || file.frontend.skip,
            frontend_command: file.frontend.command,
            frontend_args: file.frontend.args,
        }
    }
}
