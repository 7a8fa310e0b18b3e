use serde::{Deserialize, Serialize};

use kubedeck_core::{new_id, now_rfc3339};
use kubedeck_store::{FieldKind, Record, Searchable};

/// Who a binding grants a role to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// "User" for a single account.
    pub kind: String,
    pub name: String,
}

/// Links a subject to a named role. Unique by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBinding {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub subject: Subject,
    /// Name of the bound role.
    pub role_ref: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl RoleBinding {
    /// The binding created for a user, named `role-binding-{role}-{user}`
    /// with the role name slugged.
    pub fn for_user(role: &str, user: &str, created_by: &str) -> Self {
        let slug = role
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        Self {
            id: String::new(),
            name: format!("role-binding-{}-{}", slug, user),
            subject: Subject {
                kind: "User".to_string(),
                name: user.to_string(),
            },
            role_ref: role.to_string(),
            created_by: created_by.to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

impl Record for RoleBinding {
    const BUCKET: &'static str = "role_bindings";

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

impl Searchable for RoleBinding {
    const QUICK_FIELDS: &'static [&'static str] = &["name", "role_ref"];

    fn field_kind(field: &str) -> Option<FieldKind> {
        match field {
            "name" | "role_ref" | "subject.name" | "subject.kind" => Some(FieldKind::Text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_user_naming() {
        let b = RoleBinding::for_user("Common User", "alice", "system");
        assert_eq!(b.name, "role-binding-common-user-alice");
        assert_eq!(b.role_ref, "Common User");
        assert_eq!(b.subject.kind, "User");
        assert_eq!(b.subject.name, "alice");
    }
}
