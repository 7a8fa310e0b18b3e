use std::path::PathBuf;

use serde::Deserialize;

/// Storage configuration shared by every entry point.
///
/// Deserialized from the `[storage]` table of the TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the database and any other state.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Path to the redb database file.
    /// Defaults to `{data_dir}/data.redb` if not specified.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl ServiceConfig {
    /// Resolve the redb database path, falling back to `{data_dir}/data.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.redb"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
