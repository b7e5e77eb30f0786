use std::path::{Path, PathBuf};

use svadharma_common::roadmap::DEFAULT_ROADMAP_KEY;

use crate::error::AppError;

/// Application configuration loaded explicitly from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the file-backed roadmap store.
    pub data_dir: String,
    /// Redis connection URL. When set, saved roadmaps live in Redis instead of `data_dir`.
    pub redis_url: Option<String>,
    /// The single durable key holding the saved roadmap list.
    pub storage_key: String,
    /// Serve MCP over TCP on this address instead of stdio.
    pub tcp_listen_addr: Option<String>,
}

impl Config {
    /// Optional:
    /// - `SVADHARMA_DATA_DIR` (default: "./data")
    /// - `REDIS_URL`
    /// - `SVADHARMA_STORAGE_KEY` (default: "svadharma_plans")
    /// - `MCP_TCP_LISTEN_ADDR`
    pub fn from_env() -> Result<Self, AppError> {
        let data_dir = std::env::var("SVADHARMA_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        if data_dir.trim().is_empty() {
            return Err(AppError::Config(
                "SVADHARMA_DATA_DIR must not be empty".to_string(),
            ));
        }

        let data_path = Path::new(&data_dir);
        if data_path.exists() && !data_path.is_dir() {
            return Err(AppError::Config(format!(
                "SVADHARMA_DATA_DIR is not a directory: {}",
                data_path.display()
            )));
        }

        let storage_key = std::env::var("SVADHARMA_STORAGE_KEY")
            .unwrap_or_else(|_| DEFAULT_ROADMAP_KEY.to_string());
        svadharma_common::kv::validate_key(&storage_key)?;

        Ok(Self {
            data_dir,
            redis_url: std::env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty()),
            storage_key,
            tcp_listen_addr: std::env::var("MCP_TCP_LISTEN_ADDR").ok(),
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).to_path_buf()
    }
}
