use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_PORT: u16 = 3000;

/// Which [`DiagramStorage`](crate::storage::DiagramStorage) implementation
/// the application talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Embedded,
    Remote,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Embedded => "embedded",
            Backend::Remote => "remote",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" | "local" => Ok(Backend::Embedded),
            "remote" | "api" => Ok(Backend::Remote),
            other => anyhow::bail!("unknown storage backend '{}' (expected embedded or remote)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    /// Embedded store file.
    pub database: PathBuf,
    /// Record service root, used by the remote backend.
    pub api_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            database: default_database_path(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Service database file.
    pub database: PathBuf,
    /// Allowed browser origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database: PathBuf::from(".chartstore").join("service.db"),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
                "http://localhost:8080".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartstoreConfig {
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

impl ChartstoreConfig {
    /// Apply `CHARTSTORE_*` and `PORT` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("CHARTSTORE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(url) = lookup("CHARTSTORE_API_BASE_URL") {
            self.storage.api_base_url = url;
        }
        if let Some(database) = lookup("CHARTSTORE_DATABASE") {
            self.storage.database = PathBuf::from(database);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT '{}': {}", port, e))?;
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("chartstore.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from(".chartstore").join("chartstore.db")
}

/// Read the config file if present, otherwise defaults, then apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ChartstoreConfig> {
    let mut config = read_config_file(path)?.unwrap_or_default();
    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn read_config_file(path: Option<&Path>) -> anyhow::Result<Option<ChartstoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ChartstoreConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ChartstoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ChartstoreConfig = toml::from_str(
            r#"
            [storage]
            backend = "remote"
            api_base_url = "http://records:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, Backend::Remote);
        assert_eq!(config.storage.api_base_url, "http://records:9000");
        assert_eq!(config.storage.database, default_database_path());
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("CHARTSTORE_BACKEND", "remote"),
            ("CHARTSTORE_DATABASE", "/tmp/d.db"),
            ("PORT", "8081"),
        ]
        .into_iter()
        .collect();

        let mut config = ChartstoreConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.storage.backend, Backend::Remote);
        assert_eq!(config.storage.database, PathBuf::from("/tmp/d.db"));
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.storage.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = ChartstoreConfig::default();
        assert!(config.apply_overrides(|_| Some("cloud".to_string())).is_err());
    }

    #[test]
    fn test_write_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chartstore.toml");
        let config = ChartstoreConfig::default();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = read_config_file(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("store.db");
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
