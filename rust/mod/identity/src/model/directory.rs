use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kubedeck_core::{new_id, now_rfc3339};
use kubedeck_store::Record;

/// Connection, search and attribute-mapping settings for the external
/// directory. At most one is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDescriptor {
    #[serde(default)]
    pub id: String,

    /// Host name or IP of the directory server.
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Service-account bind DN.
    #[serde(default)]
    pub username: String,

    /// Service-account password. Never shown by `redacted`.
    #[serde(default)]
    pub password: String,

    /// Use `ldaps://` instead of `ldap://`.
    #[serde(default)]
    pub tls: bool,

    /// Search base DN.
    pub base_dn: String,

    /// Search filter, e.g. `(objectClass=person)`.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Server-side entry limit. 0 means unlimited.
    #[serde(default)]
    pub size_limit: i32,

    /// Server-side time limit in seconds. 0 means unlimited.
    #[serde(default)]
    pub time_limit: i32,

    /// Local user field -> directory attribute name.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,

    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub updated_at: String,
}

fn default_port() -> u16 {
    389
}

fn default_filter() -> String {
    "(objectClass=*)".to_string()
}

impl DirectoryDescriptor {
    /// A copy safe to print or return to a client.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.password.is_empty() {
            copy.password = "******".to_string();
        }
        copy
    }

    /// Connection URL derived from address, port and the TLS flag.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.address, self.port)
    }
}

impl Record for DirectoryDescriptor {
    const BUCKET: &'static str = "directories";

    fn key_value(&self) -> String {
        self.id.clone()
    }

    fn before_create(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        let now = now_rfc3339();
        self.created_at = now.clone();
        self.updated_at = now;
    }

    fn before_update(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

/// The configured directory, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryState {
    NotConfigured,
    Disabled(DirectoryDescriptor),
    Enabled(DirectoryDescriptor),
}

impl DirectoryState {
    pub fn from_descriptor(descriptor: Option<DirectoryDescriptor>) -> Self {
        match descriptor {
            None => DirectoryState::NotConfigured,
            Some(d) if d.enable => DirectoryState::Enabled(d),
            Some(d) => DirectoryState::Disabled(d),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, DirectoryState::Enabled(_))
    }

    pub fn descriptor(&self) -> Option<&DirectoryDescriptor> {
        match self {
            DirectoryState::NotConfigured => None,
            DirectoryState::Disabled(d) | DirectoryState::Enabled(d) => Some(d),
        }
    }
}
