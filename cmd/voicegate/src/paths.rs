//! Path utilities for the voicegate CLI.

use std::io;
use std::path::{Path, PathBuf};

/// Default base directory name under the home directory.
pub const DEFAULT_BASE_DIR: &str = ".voicegate";

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default sample directory name.
pub const DEFAULT_SAMPLES_DIR: &str = "samples";

/// Provides access to the voicegate directory structure.
#[derive(Debug, Clone)]
pub struct Paths {
    /// User's home directory.
    pub home_dir: PathBuf,
}

impl Paths {
    pub fn new() -> io::Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not find home directory")
        })?;
        Ok(Self { home_dir })
    }

    pub fn with_home(home_dir: impl AsRef<Path>) -> Self {
        Self {
            home_dir: home_dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the base directory (~/.voicegate).
    pub fn base_dir(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_BASE_DIR)
    }

    /// Returns the config file path (~/.voicegate/config.yaml).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir().join(DEFAULT_CONFIG_FILE)
    }

    /// Returns the sample store root (~/.voicegate/samples).
    pub fn samples_dir(&self) -> PathBuf {
        self.base_dir().join(DEFAULT_SAMPLES_DIR)
    }
}
