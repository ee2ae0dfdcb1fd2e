use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    /// Resolve the per-user data directory, creating it if needed.
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "carelog").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            db_path: data_dir.join("carelog.db"),
        })
    }
}
