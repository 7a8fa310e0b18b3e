//! Operator configuration.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! [storage]
//! data_dir = "/var/lib/kubedeck"
//!
//! [log]
//! level = "info"
//!
//! [directory]
//! default_role = "Common User"
//! fallback_email_domain = "corp.io"
//! connect_timeout_secs = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use identity::DirectoryConfig;
use kubedeck_core::ServiceConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub storage: ServiceConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub directory: DirectorySection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectorySection {
    #[serde(default = "default_role")]
    pub default_role: String,

    #[serde(default = "default_email_domain")]
    pub fallback_email_domain: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DirectorySection {
    fn default() -> Self {
        Self {
            default_role: default_role(),
            fallback_email_domain: default_email_domain(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_role() -> String {
    DirectoryConfig::default().default_role
}

fn default_email_domain() -> String {
    DirectoryConfig::default().fallback_email_domain
}

fn default_connect_timeout() -> u64 {
    DirectoryConfig::default().connect_timeout.as_secs()
}

impl ServerConfig {
    /// A bare name resolves to `/etc/kubedeck/<name>.toml`; anything with a
    /// `/` or `.` is used as a path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/kubedeck/{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: ServerConfig = toml::from_str(content)?;
        if config.directory.connect_timeout_secs == 0 {
            anyhow::bail!("directory.connect_timeout_secs must be positive");
        }
        if config.directory.default_role.trim().is_empty() {
            anyhow::bail!("directory.default_role must not be empty");
        }
        Ok(config)
    }

    pub fn directory_config(&self) -> DirectoryConfig {
        DirectoryConfig {
            default_role: self.directory.default_role.clone(),
            fallback_email_domain: self.directory.fallback_email_domain.clone(),
            connect_timeout: Duration::from_secs(self.directory.connect_timeout_secs),
            ..DirectoryConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            ServerConfig::resolve_path("staging"),
            PathBuf::from("/etc/kubedeck/staging.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./kubedeck.toml"),
            PathBuf::from("./kubedeck.toml")
        );
    }

    #[test]
    fn test_parse_full() {
        let config = ServerConfig::parse(
            r#"
            [storage]
            data_dir = "/var/lib/kubedeck"

            [log]
            level = "debug"

            [directory]
            default_role = "Viewer"
            fallback_email_domain = "corp.io"
            connect_timeout_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(
            config.storage.resolve_db_path(),
            PathBuf::from("/var/lib/kubedeck/data.redb")
        );
        assert_eq!(config.log.level, "debug");

        let dir = config.directory_config();
        assert_eq!(dir.default_role, "Viewer");
        assert_eq!(dir.fallback_email_domain, "corp.io");
        assert_eq!(dir.connect_timeout, Duration::from_secs(3));
        assert_eq!(dir.provisioner, "admin");
    }

    #[test]
    fn test_parse_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.storage.resolve_db_path(), PathBuf::from("data.redb"));

        let dir = config.directory_config();
        assert_eq!(dir.default_role, "Common User");
        assert_eq!(dir.fallback_email_domain, "example.com");
        assert_eq!(dir.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_parse_rejects_zero_timeout() {
        assert!(ServerConfig::parse("[directory]\nconnect_timeout_secs = 0\n").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ServerConfig::load(Path::new("/nonexistent/kubedeck.toml")).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
