pub mod audit;
pub mod descriptor;
pub mod image_repo;
pub mod pipeline;
pub mod role_binding;
pub mod sync;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use kubedeck_store::{QueryError, Store, StoreError};

use crate::directory::{DirectoryConnector, DirectoryError};
use crate::service::role_binding::{RoleBindingService, StoreRoleBindings};
use crate::service::sync::SyncGuard;
use crate::service::user::{StoreUsers, UserService};

/// Identity service error type.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("invalid filter: {0}")]
    Filter(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// The user + role binding pair could not be written; nothing was kept.
    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<StoreError> for IdentityError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => IdentityError::NotFound(m),
            StoreError::Conflict(m) => IdentityError::Conflict(m),
            StoreError::ReadOnly(m) | StoreError::Serialization(m) => IdentityError::Internal(m),
            StoreError::Storage(m) => IdentityError::Storage(m),
        }
    }
}

impl From<QueryError> for IdentityError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Filter(m) => IdentityError::Filter(m),
            QueryError::Storage(e) => e.into(),
        }
    }
}

impl From<DirectoryError> for IdentityError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Unavailable(m) => IdentityError::DirectoryUnavailable(m),
            DirectoryError::InvalidCredentials => {
                IdentityError::Unauthorized("invalid username or password".into())
            }
            DirectoryError::Cancelled => IdentityError::Internal("directory operation cancelled".into()),
        }
    }
}

impl From<IdentityError> for kubedeck_core::ServiceError {
    fn from(e: IdentityError) -> Self {
        use kubedeck_core::ServiceError;
        match e {
            IdentityError::NotFound(m) => ServiceError::NotFound(m),
            IdentityError::Conflict(m) => ServiceError::Conflict(m),
            IdentityError::Validation(m) => ServiceError::Validation(m),
            IdentityError::Filter(m) => ServiceError::InvalidFilter(m),
            IdentityError::Unauthorized(m) => ServiceError::Unauthorized(m),
            IdentityError::DirectoryUnavailable(m) => ServiceError::DirectoryUnavailable(m),
            IdentityError::Provisioning(m) | IdentityError::Internal(m) => {
                ServiceError::Internal(m)
            }
            IdentityError::Storage(m) => ServiceError::Storage(m),
        }
    }
}

/// Configuration for directory provisioning.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Role bound to every provisioned user.
    pub default_role: String,
    /// Domain for `{name}@{domain}` when an imported user has no email.
    pub fallback_email_domain: String,
    /// TCP connect timeout for directory servers.
    pub connect_timeout: Duration,
    /// Recorded as `created_by` on provisioned role bindings.
    pub provisioner: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            default_role: "Common User".to_string(),
            fallback_email_domain: "example.com".to_string(),
            connect_timeout: Duration::from_secs(10),
            provisioner: "admin".to_string(),
        }
    }
}

/// The identity service. Holds the record store, the directory connector
/// and the user / role-binding collaborators used for provisioning.
pub struct IdentityService {
    pub(crate) store: Arc<Store>,
    pub(crate) connector: Arc<dyn DirectoryConnector>,
    pub(crate) users: Arc<dyn UserService>,
    pub(crate) bindings: Arc<dyn RoleBindingService>,
    pub(crate) config: DirectoryConfig,
    pub(crate) sync_guard: SyncGuard,
}

impl IdentityService {
    /// Create a service with the store-backed user and role-binding services.
    pub fn new(
        store: Arc<Store>,
        connector: Arc<dyn DirectoryConnector>,
        config: DirectoryConfig,
    ) -> Arc<Self> {
        Self::with_services(
            store,
            connector,
            Arc::new(StoreUsers),
            Arc::new(StoreRoleBindings),
            config,
        )
    }

    /// Create a service with explicit user and role-binding collaborators.
    pub fn with_services(
        store: Arc<Store>,
        connector: Arc<dyn DirectoryConnector>,
        users: Arc<dyn UserService>,
        bindings: Arc<dyn RoleBindingService>,
        config: DirectoryConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            connector,
            users,
            bindings,
            config,
            sync_guard: SyncGuard::default(),
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use kubedeck_core::ServiceError;

    #[test]
    fn test_error_mapping() {
        let e: IdentityError = StoreError::Conflict("users/alice".into()).into();
        assert!(matches!(e, IdentityError::Conflict(_)));

        let e: IdentityError = QueryError::Filter("bad".into()).into();
        let svc: ServiceError = e.into();
        assert_eq!(svc.error_code(), kubedeck_core::error_code::INVALID_FILTER);

        let e: IdentityError = DirectoryError::Unavailable("refused".into()).into();
        let svc: ServiceError = e.into();
        assert_eq!(svc.error_code(), kubedeck_core::error_code::DIRECTORY_UNAVAILABLE);

        let e: IdentityError = DirectoryError::InvalidCredentials.into();
        assert!(matches!(e, IdentityError::Unauthorized(_)));
    }
}
