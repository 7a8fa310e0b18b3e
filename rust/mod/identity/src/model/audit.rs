use serde::{Deserialize, Serialize};

use kubedeck_core::{new_id, now_rfc3339};
use kubedeck_store::{FieldKind, Record, Searchable};

/// An audited administrative action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    #[serde(default)]
    pub id: String,
    /// Name of the acting user.
    pub operator: String,
    /// Verb, e.g. "create" or "delete".
    pub operation: String,
    /// Resource family the action touched, e.g. "users".
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub created_at: String,
}

impl OperationLog {
    pub fn new(
        operator: impl Into<String>,
        operation: impl Into<String>,
        domain: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            operator: operator.into(),
            operation: operation.into(),
            domain: domain.into(),
            detail: detail.into(),
            created_at: String::new(),
        }
    }
}

impl Record for OperationLog {
    const BUCKET: &'static str = "operation_logs";

    fn key_value(&self) -> String {
        self.id.clone()
    }

    fn before_create(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        self.created_at = now_rfc3339();
    }
}

impl Searchable for OperationLog {
    const QUICK_FIELDS: &'static [&'static str] = &["operator", "operation", "detail"];
}

/// A login attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLog {
    #[serde(default)]
    pub id: String,
    pub user_name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub created_at: String,
}

impl LoginLog {
    pub fn new(user_name: impl Into<String>, ip: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            user_name: user_name.into(),
            ip: ip.into(),
            city: city.into(),
            success: true,
            created_at: String::new(),
        }
    }
}

impl Record for LoginLog {
    const BUCKET: &'static str = "login_logs";

    fn key_value(&self) -> String {
        self.id.clone()
    }

    fn before_create(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        self.created_at = now_rfc3339();
    }
}

impl Searchable for LoginLog {
    const QUICK_FIELDS: &'static [&'static str] = &["user_name", "ip", "city"];

    fn field_kind(field: &str) -> Option<FieldKind> {
        match field {
            "success" => Some(FieldKind::Bool),
            "ip" => Some(FieldKind::Text),
            _ => None,
        }
    }
}
