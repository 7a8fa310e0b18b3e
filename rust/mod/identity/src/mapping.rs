//! Attribute Mapper: directory entry attributes -> import candidate fields.

use std::collections::BTreeMap;

use kubedeck_store::condition::normalize_field;

use crate::directory::DirectoryEntry;
use crate::model::ImportUser;
use crate::service::IdentityError;

/// A local user field a directory attribute can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Name,
    NickName,
    Email,
}

impl UserField {
    /// Accepts `name`, `nickName`, `NickName`, `nick_name`, ...
    pub fn parse(field: &str) -> Option<Self> {
        match normalize_field(field).as_str() {
            "name" => Some(UserField::Name),
            "nick_name" => Some(UserField::NickName),
            "email" => Some(UserField::Email),
            _ => None,
        }
    }

    fn setter(self) -> fn(&mut ImportUser, String) {
        match self {
            UserField::Name => |u: &mut ImportUser, v: String| u.name = v,
            UserField::NickName => |u: &mut ImportUser, v: String| u.nick_name = v,
            UserField::Email => |u: &mut ImportUser, v: String| u.email = v,
        }
    }
}

struct Binding {
    attribute: String,
    field: UserField,
    set: fn(&mut ImportUser, String),
}

/// A mapping table resolved to field setters.
pub struct AttributeMapper {
    bindings: Vec<Binding>,
}

impl AttributeMapper {
    /// Resolve `local field -> directory attribute` pairs. An unknown local
    /// field or an empty attribute name is a validation error.
    pub fn compile(mapping: &BTreeMap<String, String>) -> Result<Self, IdentityError> {
        let mut bindings = Vec::with_capacity(mapping.len());
        for (local, attribute) in mapping {
            let field = UserField::parse(local).ok_or_else(|| {
                IdentityError::Validation(format!("unknown user field '{}' in mapping", local))
            })?;
            let attribute = attribute.trim();
            if attribute.is_empty() {
                return Err(IdentityError::Validation(format!(
                    "mapping for '{}' has no directory attribute",
                    local
                )));
            }
            bindings.push(Binding {
                attribute: attribute.to_string(),
                field,
                set: field.setter(),
            });
        }
        Ok(Self { bindings })
    }

    /// Directory attribute bound to `field`, if mapped.
    pub fn attribute_for(&self, field: UserField) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.field == field)
            .map(|b| b.attribute.as_str())
    }

    /// Attributes to request from the directory, deduplicated, in mapping order.
    pub fn attributes(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.bindings.len());
        for b in &self.bindings {
            if !out.contains(&b.attribute) {
                out.push(b.attribute.clone());
            }
        }
        out
    }

    /// Build an import candidate from one entry. Missing attributes leave
    /// fields empty; `available` starts true.
    pub fn map(&self, entry: &DirectoryEntry) -> ImportUser {
        let mut user = ImportUser {
            available: true,
            ..ImportUser::default()
        };
        for b in &self.bindings {
            if let Some(first) = entry.attrs.get(&b.attribute).and_then(|vs| vs.first()) {
                (b.set)(&mut user, first.trim().to_string());
            }
        }
        user
    }
}
