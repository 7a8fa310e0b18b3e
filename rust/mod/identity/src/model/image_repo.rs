use serde::{Deserialize, Serialize};

use kubedeck_core::{new_id, now_rfc3339};
use kubedeck_store::{FieldKind, Record, Searchable};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credential {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

/// A container image registry. Unique by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRepo {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Registry flavour, e.g. "Harbor", "Nexus", "Registry".
    #[serde(default)]
    pub kind: String,
    pub endpoint: String,
    /// Pull address when it differs from the API endpoint.
    #[serde(default)]
    pub download_url: String,
    /// Project or repository inside the registry.
    #[serde(default)]
    pub repo_name: String,
    /// Registry requires credentials.
    #[serde(default)]
    pub auth: bool,
    #[serde(default)]
    pub allow_anonymous: bool,
    #[serde(default)]
    pub credential: Credential,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl ImageRepo {
    /// A copy safe to print or return to a client.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.credential.password.is_empty() {
            copy.credential.password = "******".to_string();
        }
        copy
    }
}

impl Record for ImageRepo {
    const BUCKET: &'static str = "image_repos";

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

impl Searchable for ImageRepo {
    const QUICK_FIELDS: &'static [&'static str] = &["name"];

    fn field_kind(field: &str) -> Option<FieldKind> {
        match field {
            "auth" | "allow_anonymous" => Some(FieldKind::Bool),
            "name" | "kind" | "endpoint" | "repo_name" => Some(FieldKind::Text),
            _ => None,
        }
    }
}
