use serde::{Deserialize, Serialize};

use kubedeck_core::{new_id, now_rfc3339};
use kubedeck_store::{FieldKind, Record, Searchable};

/// Where an account came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    /// Registered locally with a password.
    #[default]
    Local,
    /// Provisioned from the external directory; authenticates by directory bind.
    Directory,
}

/// A local identity record. Unique by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUIDv4, no dashes).
    #[serde(default)]
    pub id: String,

    /// Login name.
    pub name: String,

    /// Display name.
    #[serde(default)]
    pub nick_name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub kind: UserKind,

    #[serde(default)]
    pub is_admin: bool,

    /// RFC 3339 creation timestamp.
    #[serde(default)]
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    #[serde(default)]
    pub updated_at: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, kind: UserKind) -> Self {
        let name = name.into();
        Self {
            id: String::new(),
            nick_name: name.clone(),
            name,
            email: email.into(),
            kind,
            is_admin: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == UserKind::Directory
    }
}

impl Record for User {
    const BUCKET: &'static str = "users";

    fn key_value(&self) -> String {
        self.name.clone()
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

impl Searchable for User {
    const QUICK_FIELDS: &'static [&'static str] = &["name", "nick_name", "email"];

    fn field_kind(field: &str) -> Option<FieldKind> {
        match field {
            "is_admin" => Some(FieldKind::Bool),
            "name" | "nick_name" | "email" | "kind" | "id" => Some(FieldKind::Text),
            _ => None,
        }
    }
}

/// A directory user staged for import. Never persisted as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportUser {
    pub name: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub email: String,
    /// False when a local user with the same name or email already exists.
    #[serde(default)]
    pub available: bool,
}

/// Outcome of a synchronous import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// True when no candidate failed.
    pub success: bool,
    pub success_count: usize,
    /// Names of the candidates that were not provisioned.
    pub failures: Vec<String>,
}
