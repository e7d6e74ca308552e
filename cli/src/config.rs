use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use larder_core::engine::EngineConfig;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub engine: EngineConfig,
}

impl Config {
    /// Resolve the data directory, the database path (`LARDER_DB` wins) and
    /// the optional `config.json` next to the database.
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "larder").context("Could not determine home directory")?;
        let data_dir = proj_dirs.data_dir().to_path_buf();
        let db_override = std::env::var_os("LARDER_DB").map(PathBuf::from);
        Self::load_from(data_dir, db_override)
    }

    fn load_from(data_dir: PathBuf, db_override: Option<PathBuf>) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = db_override.unwrap_or_else(|| data_dir.join("larder.db"));
        let engine = read_engine_config(&data_dir.join("config.json"))?;

        Ok(Config {
            db_path,
            data_dir,
            engine,
        })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

fn read_engine_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("data"), None).unwrap();
        assert!(config.data_dir.exists());
        assert_eq!(config.db_path, dir.path().join("data").join("larder.db"));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_db_override_and_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"default_unit": "piece", "source_language": "it"}"#,
        )
        .unwrap();
        let custom = dir.path().join("elsewhere.db");
        let config = Config::load_from(dir.path().to_path_buf(), Some(custom.clone())).unwrap();
        assert_eq!(config.db_path, custom);
        assert_eq!(config.engine.source_language, "it");
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();
        assert!(Config::load_from(dir.path().to_path_buf(), None).is_err());
    }

    #[test]
    fn test_api_key_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().to_path_buf(), None).unwrap();
        let (key, created) = config.load_or_create_api_key().unwrap();
        assert!(created);
        assert_eq!(key.len(), 64);

        let (again, created) = config.load_or_create_api_key().unwrap();
        assert!(!created);
        assert_eq!(again, key);
    }
}
