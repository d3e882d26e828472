//! Server configuration, loaded from YAML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::HttpError;

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// URL path prefix this route serves, e.g. `/static`.
    pub path: String,
    /// Directory on disk the prefix maps to.
    pub root: PathBuf,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default)]
    pub autoindex: bool,
}

fn default_index() -> String {
    "index.html".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_requests_per_connection")]
    pub max_requests_per_connection: u32,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    pub routes: Vec<RouteConfig>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_connections() -> usize {
    1024
}
fn default_max_requests_per_connection() -> u32 {
    100
}
fn default_read_buffer_size() -> usize {
    4096
}
fn default_max_header_bytes() -> usize {
    8 * 1024
}
fn default_connection_timeout_secs() -> u64 {
    30
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HttpError> {
        let text = fs::read_to_string(path)?;
        let config: ServerConfig =
            serde_yaml::from_str(&text).map_err(|e| HttpError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        Ok(config)
    }

    /// Finds the longest matching route prefix for a request path, the way
    /// a reverse proxy selects its most specific vhost/location block.
    pub fn find_route(&self, request_path: &str) -> Option<&RouteConfig> {
        self.routes
            .iter()
            .filter(|r| request_path.starts_with(r.path.as_str()))
            .max_by_key(|r| r.path.len())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: default_bind_address(),
            port: default_port(),
            max_connections: default_max_connections(),
            max_requests_per_connection: default_max_requests_per_connection(),
            read_buffer_size: default_read_buffer_size(),
            max_header_bytes: default_max_header_bytes(),
            connection_timeout_secs: default_connection_timeout_secs(),
            routes: vec![RouteConfig {
                path: "/".to_string(),
                root: PathBuf::from("."),
                index: default_index(),
                autoindex: false,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_root_route() {
        let config = ServerConfig::default();
        assert_eq!(config.find_route("/anything").unwrap().path, "/");
    }

    #[test]
    fn loads_from_yaml() {
        let yaml = "
port: 9090
routes:
  - path: /static
    root: /srv/static
  - path: /
    root: /srv/www
";
        let dir = std::env::temp_dir().join(format!("cinder_http_cfg_test_{}", std::process::id()));
        fs::write(&dir, yaml).unwrap();
        let config = ServerConfig::load(&dir).unwrap();
        fs::remove_file(&dir).ok();
        assert_eq!(config.port, 9090);
        assert_eq!(config.find_route("/static/a.css").unwrap().root, PathBuf::from("/srv/static"));
        assert_eq!(config.find_route("/other").unwrap().root, PathBuf::from("/srv/www"));
    }

    #[test]
    fn most_specific_route_wins() {
        let mut config = ServerConfig::default();
        config.routes.push(RouteConfig {
            path: "/api".to_string(),
            root: PathBuf::from("/srv/api"),
            index: default_index(),
            autoindex: false,
        });
        assert_eq!(config.find_route("/api/users").unwrap().path, "/api");
        assert_eq!(config.find_route("/other").unwrap().path, "/");
    }
}
