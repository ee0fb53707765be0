use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeDuelConfig {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

impl CodeDuelConfig {
    /// Reads a JSON config file (when given) and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("DOCKER_HOST") {
            self.sandbox.docker_host = Some(host);
        }
        if let Ok(bin) = std::env::var("CODEDUEL_DOCKER") {
            self.sandbox.docker_binary = bin;
        }
        if let Some(ms) = env_parse("CODEDUEL_TIMEOUT_MS") {
            self.sandbox.timeout_ms = ms;
        }
        if let Ok(memory) = std::env::var("CODEDUEL_MEMORY") {
            self.sandbox.memory_limit = memory;
        }
        if let Ok(root) = std::env::var("CODEDUEL_WORKSPACE_ROOT") {
            self.sandbox.workspace_root = Some(PathBuf::from(root));
        }
        if let Some(n) = env_parse("CODEDUEL_CONCURRENCY") {
            self.evaluator.concurrency = n;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}: cannot parse {:?}", key, raw);
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub docker_binary: String,
    /// Forwarded as `DOCKER_HOST`, e.g. `tcp://localhost:2375`.
    pub docker_host: Option<String>,
    pub timeout_ms: u64,
    pub memory_limit: String,
    pub pids_limit: Option<u32>,
    /// Mount point and working directory inside the container.
    pub container_workdir: String,
    /// Parent of the per-execution workspaces; system temp dir when unset.
    pub workspace_root: Option<PathBuf>,
    pub output_limit_bytes: usize,
    pub pull_images: bool,
    pub pull_timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            docker_host: None,
            timeout_ms: 10_000,
            memory_limit: "100m".to_string(),
            pids_limit: Some(256),
            container_workdir: "/workspace".to_string(),
            workspace_root: None,
            output_limit_bytes: 1024 * 1024,
            pull_images: true,
            pull_timeout_ms: 300_000,
        }
    }
}

impl SandboxConfig {
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub attempts: usize,
    /// Fixed seed for reproducible inputs; fresh entropy when unset.
    pub seed: Option<u64>,
    pub isolation_key: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            attempts: 50,
            seed: None,
            isolation_key: "hidden-test-generator".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Test cases of one submission evaluated at once. 1 keeps runs sequential.
    pub concurrency: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}
