use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: String,
    #[serde(default = "default_shortcuts_file")]
    pub shortcuts_file: PathBuf,
    #[serde(default)]
    pub gpu: GpuConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GpuConfig {
    /// Query `nvidia-smi` for GPU utilization.
    #[serde(default = "default_nvidia_smi")]
    pub nvidia_smi: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shortcuts_file: default_shortcuts_file(),
            gpu: GpuConfig::default(),
        }
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            nvidia_smi: default_nvidia_smi(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn is_missing_file(&self) -> bool {
        matches!(self, ConfigError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        Self::from_yaml(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path_display,
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation("listen is required".to_string()));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a host:port socket address".to_string(),
            ));
        }
        if self.shortcuts_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "shortcuts_file must not be empty".to_string(),
            ));
        }
        if self.shortcuts_file.is_dir() {
            return Err(ConfigError::Validation(format!(
                "shortcuts_file '{}' is a directory",
                self.shortcuts_file.display()
            )));
        }
        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_shortcuts_file() -> PathBuf {
    PathBuf::from("data/shortcuts.json")
}

const fn default_nvidia_smi() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_is_valid() {
        let cfg = Config::from_yaml(Config::example_yaml()).expect("example config parses");
        assert_eq!(cfg.listen, "127.0.0.1:3000");
        assert_eq!(cfg.shortcuts_file, PathBuf::from("data/shortcuts.json"));
        assert!(cfg.gpu.nvidia_smi);
    }

    #[test]
    fn optional_sections_default() {
        let cfg = Config::from_yaml("listen: \"0.0.0.0:8080\"\n").expect("minimal config");
        assert_eq!(cfg.shortcuts_file, default_shortcuts_file());
        assert!(cfg.gpu.nvidia_smi);
    }

    #[test]
    fn rejects_bad_listen_address() {
        let err = Config::from_yaml("listen: \"localhost\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = Config::from_yaml("shortcuts_file: x.json\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_detectable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(err.is_missing_file());
    }

    #[test]
    fn directory_is_not_a_shortcuts_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            shortcuts_file: dir.path().to_path_buf(),
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }
}
