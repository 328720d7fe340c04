//! Init command implementation
//!
//! Writes a default `ragbench.toml` and creates the data directories it
//! points at.

use super::output::Output;
use crate::utils::toml_config::{EmbeddingBackend, RagBenchConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// ragbench.toml already exists
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite an existing ragbench.toml
    pub force: bool,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
    /// Embedding backend name
    pub backend: String,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing ragbench");

    let base_path = &config.path;
    let config_path = base_path.join("ragbench.toml");
    if config_path.exists() && !config.force {
        output.warning("ragbench.toml already exists!");
        output.hint("Use --force to overwrite it");
        return InitResult::AlreadyExists;
    }

    let toml_content = match generate_config(&config) {
        Ok(content) => content,
        Err(e) => {
            output.error(&e);
            return InitResult::Error(e);
        }
    };

    let defaults = RagBenchConfig::default();
    let directories = [
        defaults
            .storage
            .index_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("data")),
        defaults.storage.documents_path.clone(),
    ];
    for dir in &directories {
        let dir_path = base_path.join(dir);
        if dir_path.exists() {
            output.skipped(&dir.display().to_string(), "already exists");
            continue;
        }
        if let Err(e) = fs::create_dir_all(&dir_path) {
            output.error(&format!("Failed to create {}: {}", dir.display(), e));
            return InitResult::Error(e.to_string());
        }
        output.created("directory", &dir.display().to_string());
    }

    if let Err(e) = fs::write(&config_path, toml_content) {
        output.error(&format!("Failed to write ragbench.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "ragbench.toml");

    output.hint("Start the server with:");
    output.command("ragbench-server");
    InitResult::Success
}

/// Render the default configuration with the requested overrides.
pub fn generate_config(config: &InitConfig) -> Result<String, String> {
    let backend = match config.backend.to_lowercase().as_str() {
        "hashing" => EmbeddingBackend::Hashing,
        "local" => EmbeddingBackend::Local,
        "remote" => EmbeddingBackend::Remote,
        other => {
            return Err(format!(
                "Unknown embedding backend '{}' (expected hashing, local or remote)",
                other
            ))
        }
    };

    let mut toml_config = RagBenchConfig::default();
    toml_config.server.host = config.host.clone();
    toml_config.server.port = config.port;
    toml_config.embedding.backend = backend;
    if backend == EmbeddingBackend::Remote {
        toml_config.embedding.api_key_env = Some("OPENAI_API_KEY".to_string());
    }

    let body = toml_config.to_toml_string().map_err(|e| e.to_string())?;
    Ok(format!(
        "# ragbench configuration\n# Generated by `ragbench-server init`\n\n{}",
        body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_config(path: &Path) -> InitConfig {
        InitConfig {
            path: path.to_path_buf(),
            force: false,
            host: "0.0.0.0".to_string(),
            port: 9000,
            backend: "hashing".to_string(),
        }
    }

    #[test]
    fn test_generated_config_round_trips() {
        let dir = TempDir::new().unwrap();
        let content = generate_config(&init_config(dir.path())).unwrap();
        let parsed = RagBenchConfig::from_toml_str(&content).unwrap();
        assert_eq!(parsed.server.host, "0.0.0.0");
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.embedding.backend, EmbeddingBackend::Hashing);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = init_config(dir.path());
        config.backend = "magic".into();
        assert!(generate_config(&config).is_err());
    }

    #[test]
    fn test_init_creates_files_and_respects_existing() {
        let dir = TempDir::new().unwrap();
        let output = Output::no_color();

        assert_eq!(run(init_config(dir.path()), &output), InitResult::Success);
        assert!(dir.path().join("ragbench.toml").exists());
        assert!(dir.path().join("data/documents").is_dir());
        assert!(dir.path().join("data/vectors").is_dir());

        assert_eq!(run(init_config(dir.path()), &output), InitResult::AlreadyExists);

        let mut forced = init_config(dir.path());
        forced.force = true;
        assert_eq!(run(forced, &output), InitResult::Success);
    }
}
