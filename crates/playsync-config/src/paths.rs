use anyhow::Result;
use std::path::{Path, PathBuf};

/// Container base path from `PLAYSYNC_BASE_PATH`, defaulting to "/data".
pub fn container_base_path() -> PathBuf {
    std::env::var("PLAYSYNC_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/data"))
}

pub struct PathManager {
    config_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("playsync");
        Ok(Self::from_base(base_dir))
    }

    /// Config files at the base, logs in a subdirectory.
    pub fn from_base(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            log_dir: base.join("logs"),
            config_dir: base,
        }
    }

    pub fn from_docker_env() -> Self {
        Self::from_base(container_base_path())
    }

    /// Explicit directory wins, then the container path, then the platform dir.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        match explicit {
            Some(dir) => Self::from_base(dir),
            None => Self::default(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn log_file_prefix(&self) -> &'static str {
        "playsync.log"
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // The base directory only exists inside the container image
        let base = container_base_path();
        if base.exists() {
            return Self::from_docker_env();
        }
        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_layout() {
        let paths = PathManager::resolve(Some(Path::new("/srv/playsync")));
        assert_eq!(paths.config_file(), PathBuf::from("/srv/playsync/config.toml"));
        assert_eq!(paths.credentials_file(), PathBuf::from("/srv/playsync/credentials.toml"));
        assert_eq!(paths.log_dir(), Path::new("/srv/playsync/logs"));
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = PathManager::from_base(dir.path().join("base"));
        paths.ensure_directories().unwrap();
        assert!(paths.config_dir().is_dir());
        assert!(paths.log_dir().is_dir());
    }
}
