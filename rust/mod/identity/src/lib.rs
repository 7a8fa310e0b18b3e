//! Identity module: local users, role bindings and directory federation.
//!
//! # Resources
//!
//! - **User**: local identity, registered locally or provisioned from the directory
//! - **RoleBinding**: links a user to a named role
//! - **DirectoryDescriptor**: the single external directory (connection, search, mapping)
//! - **OperationLog / LoginLog**: audit trail
//! - **ImageRepo**: container registry with optional credentials
//!
//! # Usage
//!
//! ```ignore
//! use identity::{IdentityService, DirectoryConfig, LdapConnector};
//!
//! let svc = IdentityService::new(store, Arc::new(LdapConnector::new(timeout)), DirectoryConfig::default());
//! let candidates = svc.preview().await?;
//! let result = svc.import_users(&candidates);
//! let handle = svc.sync().await?; // background; drop to detach
//! ```

pub mod directory;
pub mod mapping;
pub mod model;
pub mod service;

pub use directory::ldap::LdapConnector;
pub use directory::{DirectoryClient, DirectoryConnector, DirectoryEntry, DirectoryError, SearchRequest};
pub use mapping::{AttributeMapper, UserField};
pub use service::pipeline::ProvisionOutcome;
pub use service::role_binding::RoleBindingService;
pub use service::sync::{SyncHandle, SyncReport};
pub use service::user::UserService;
pub use service::{DirectoryConfig, IdentityError, IdentityService};
