// Runtime configuration for the server and the client commands

use directories::ProjectDirs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8787";

const SERVER_DB_FILE: &str = "cards-server.db";
const LOCAL_CACHE_FILE: &str = "local-cache.db";

/// Per-user data directory, or the working directory when none can be resolved
pub fn data_dir() -> PathBuf {
    ProjectDirs::from("app", "cardkeep", "Cardkeep")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
}

impl ServerConfig {
    pub fn resolve(bind: Option<SocketAddr>, db_path: Option<PathBuf>, data_dir: &Path) -> Self {
        Self {
            bind: bind.unwrap_or_else(default_bind),
            db_path: db_path.unwrap_or_else(|| data_dir.join(SERVER_DB_FILE)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub cache_path: PathBuf,
}

impl ClientConfig {
    pub fn resolve(api_url: Option<String>, cache_path: Option<PathBuf>, data_dir: &Path) -> Self {
        Self {
            api_url: api_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            cache_path: cache_path.unwrap_or_else(|| data_dir.join(LOCAL_CACHE_FILE)),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}
