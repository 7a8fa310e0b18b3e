//! Directory sync / provisioning pipeline.
//!
//! connect -> search -> map -> filter -> dedup -> provision. Provisioning
//! writes the user and its default role binding in one write transaction;
//! the dedup lookup runs inside that same transaction.

use std::sync::Arc;

use kubedeck_store::Transaction;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::directory::ldap::user_filter;
use crate::directory::{DirectoryClient, DirectoryEntry, DirectoryError, SearchRequest};
use crate::mapping::{AttributeMapper, UserField};
use crate::model::{DirectoryDescriptor, ImportResult, ImportUser, RoleBinding, User, UserKind};
use crate::service::descriptor::validate;
use crate::service::sync::{SyncHandle, SyncReport};
use crate::service::{IdentityError, IdentityService};

/// Result of provisioning one candidate.
#[derive(Debug, Clone)]
pub enum ProvisionOutcome {
    /// User and role binding were written.
    Created(User),
    /// A local user already matched by name or email; nothing was written.
    Existing(User),
}

impl IdentityService {
    // ── Shared steps ──

    async fn fetch_entries(
        &self,
        descriptor: &DirectoryDescriptor,
        mapper: &AttributeMapper,
        cancel: &CancellationToken,
    ) -> Result<Vec<DirectoryEntry>, IdentityError> {
        let mut client = self.connector.connect(descriptor).await?;
        let request = SearchRequest::from_descriptor(descriptor, mapper.attributes());
        let result = client.search(&request, cancel).await;
        client.close().await;
        Ok(result?)
    }

    fn existing_user(
        &self,
        candidate: &ImportUser,
        tx: &Transaction<'_>,
    ) -> Result<Option<User>, IdentityError> {
        for key in [candidate.name.as_str(), candidate.email.as_str()] {
            if key.is_empty() {
                continue;
            }
            match self.users.get_user_by_name_or_email(key, tx) {
                Ok(user) => return Ok(Some(user)),
                Err(IdentityError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Provision one candidate: dedup, then create the directory user and
    /// its default role binding atomically. Any failure rolls back both.
    pub fn provision(&self, candidate: &ImportUser) -> Result<ProvisionOutcome, IdentityError> {
        let mut tx = self.store.begin(true)?;
        if let Some(existing) = self.existing_user(candidate, &tx)? {
            tx.rollback();
            return Ok(ProvisionOutcome::Existing(existing));
        }
        match self.provision_in(candidate, &mut tx) {
            Ok(user) => {
                tx.commit().map_err(|e| {
                    IdentityError::Provisioning(format!("{}: {}", candidate.name, e))
                })?;
                Ok(ProvisionOutcome::Created(user))
            }
            Err(e) => {
                tx.rollback();
                Err(IdentityError::Provisioning(format!("{}: {}", candidate.name, e)))
            }
        }
    }

    fn provision_in(
        &self,
        candidate: &ImportUser,
        tx: &mut Transaction<'_>,
    ) -> Result<User, IdentityError> {
        let mut user = User::new(candidate.name.clone(), candidate.email.clone(), UserKind::Directory);
        if !candidate.nick_name.is_empty() {
            user.nick_name = candidate.nick_name.clone();
        }
        self.users.create_user(&mut user, tx)?;

        let mut binding =
            RoleBinding::for_user(&self.config.default_role, &user.name, &self.config.provisioner);
        self.bindings.create_role_binding(&mut binding, tx)?;
        Ok(user)
    }

    fn mark_availability(&self, candidates: &mut [ImportUser]) -> Result<(), IdentityError> {
        let tx = self.store.begin(false)?;
        for candidate in candidates.iter_mut() {
            candidate.available = self.existing_user(candidate, &tx)?.is_none();
        }
        Ok(())
    }

    // ── Interactive modes ──

    /// Search the enabled directory and return import candidates. Entries
    /// without a mapped name are dropped; candidates already present
    /// locally come back with `available = false`.
    pub async fn preview(&self) -> Result<Vec<ImportUser>, IdentityError> {
        let descriptor = self.enabled_directory()?;
        let mapper = AttributeMapper::compile(&descriptor.mapping)?;
        let entries = self
            .fetch_entries(&descriptor, &mapper, &CancellationToken::new())
            .await?;

        let mut candidates: Vec<ImportUser> = entries
            .iter()
            .map(|e| mapper.map(e))
            .filter(|u| !u.name.is_empty())
            .collect();
        self.mark_availability(&mut candidates)?;
        Ok(candidates)
    }

    /// Provision previously previewed candidates. Missing emails default to
    /// `{name}@{fallback_email_domain}`, missing nick names to the name.
    /// Candidates that already exist or fail to provision are reported in
    /// `failures`; the batch always runs to the end.
    pub fn import_users(&self, candidates: &[ImportUser]) -> ImportResult {
        let mut result = ImportResult::default();
        for candidate in candidates {
            let mut candidate = candidate.clone();
            if candidate.name.trim().is_empty() {
                warn!("import: skipping candidate without a name");
                result.failures.push(candidate.name);
                continue;
            }
            if candidate.email.is_empty() {
                candidate.email = format!("{}@{}", candidate.name, self.config.fallback_email_domain);
            }
            if candidate.nick_name.is_empty() {
                candidate.nick_name = candidate.name.clone();
            }

            match self.provision(&candidate) {
                Ok(ProvisionOutcome::Created(_)) => result.success_count += 1,
                Ok(ProvisionOutcome::Existing(existing)) => {
                    warn!(user = %candidate.name, existing = %existing.name, "import: user already exists");
                    result.failures.push(candidate.name);
                }
                Err(e) => {
                    warn!(user = %candidate.name, error = %e, "import: provisioning failed");
                    result.failures.push(candidate.name);
                }
            }
        }
        result.success = result.failures.is_empty();
        info!(
            imported = result.success_count,
            failed = result.failures.len(),
            "directory import finished"
        );
        result
    }

    /// Connect with `descriptor` (which must be enabled) and return how many
    /// entries its search matches. Nothing is written.
    pub async fn test_connect(&self, descriptor: &DirectoryDescriptor) -> Result<usize, IdentityError> {
        if !descriptor.enable {
            return Err(IdentityError::Validation("directory is disabled".into()));
        }
        let mapper = validate(descriptor)?;
        let entries = self
            .fetch_entries(descriptor, &mapper, &CancellationToken::new())
            .await?;
        Ok(entries.len())
    }

    async fn directory_bind(
        &self,
        descriptor: &DirectoryDescriptor,
        username: &str,
        password: &str,
    ) -> Result<(), IdentityError> {
        let mapper = AttributeMapper::compile(&descriptor.mapping)?;
        let name_attribute = mapper.attribute_for(UserField::Name).ok_or_else(|| {
            IdentityError::Validation("mapping does not bind the user name".into())
        })?;
        let request = SearchRequest::from_descriptor(descriptor, vec![])
            .with_filter(user_filter(&descriptor.filter, name_attribute, username));

        let mut client = self.connector.connect(descriptor).await?;
        let result = client.bind(&request, password).await;
        client.close().await;
        Ok(result?)
    }

    /// Check that `username` / `password` bind against the configured directory.
    pub async fn test_login(&self, username: &str, password: &str) -> Result<(), IdentityError> {
        let descriptor = self.get_directory()?;
        self.directory_bind(&descriptor, username, password).await
    }

    /// Authenticate a directory-origin user by binding as them.
    pub async fn login(&self, user: &User, password: &str) -> Result<(), IdentityError> {
        if !user.is_directory() {
            return Err(IdentityError::Validation(format!(
                "user {} is not a directory account",
                user.name
            )));
        }
        let descriptor = self.enabled_directory()?;
        self.directory_bind(&descriptor, &user.name, password).await?;
        info!(user = %user.name, "directory login succeeded");
        Ok(())
    }

    // ── Background sync ──

    /// Start a background sync of the enabled directory. Returns once the
    /// directory connection is established; the search and provisioning
    /// run on the runtime and report through logs and the handle. A second
    /// sync of the same directory while one runs is a `Conflict`.
    pub async fn sync(self: &Arc<Self>) -> Result<SyncHandle, IdentityError> {
        let descriptor = self.enabled_directory()?;
        let mapper = AttributeMapper::compile(&descriptor.mapping)?;
        let permit = self.sync_guard.acquire(&descriptor.id)?;
        let client = self.connector.connect(&descriptor).await?;

        let cancel = CancellationToken::new();
        let svc = Arc::clone(self);
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            let _permit = permit;
            svc.run_sync(client, descriptor, mapper, token).await
        });
        Ok(SyncHandle { join, cancel })
    }

    async fn run_sync(
        &self,
        mut client: Box<dyn DirectoryClient>,
        descriptor: DirectoryDescriptor,
        mapper: AttributeMapper,
        cancel: CancellationToken,
    ) -> Result<SyncReport, IdentityError> {
        info!(directory = %descriptor.id, "directory sync started");
        let request = SearchRequest::from_descriptor(&descriptor, mapper.attributes());
        let result = client.search(&request, &cancel).await;
        client.close().await;

        let entries = match result {
            Ok(entries) => entries,
            Err(DirectoryError::Cancelled) => {
                info!(directory = %descriptor.id, "directory sync cancelled");
                return Ok(SyncReport {
                    cancelled: true,
                    ..SyncReport::default()
                });
            }
            Err(e) => {
                error!(directory = %descriptor.id, error = %e, "directory sync: search failed");
                return Err(e.into());
            }
        };

        let mut report = SyncReport {
            found: entries.len(),
            ..SyncReport::default()
        };
        for entry in &entries {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let mut candidate = mapper.map(entry);
            if candidate.name.is_empty() || candidate.email.is_empty() {
                report.incomplete += 1;
                continue;
            }
            if candidate.nick_name.is_empty() {
                candidate.nick_name = candidate.name.clone();
            }
            match self.provision(&candidate) {
                Ok(ProvisionOutcome::Created(_)) => report.inserted += 1,
                Ok(ProvisionOutcome::Existing(_)) => report.existing += 1,
                Err(e) => {
                    warn!(user = %candidate.name, error = %e, "directory sync: provisioning failed");
                    report.failed += 1;
                }
            }
        }

        info!("directory sync: found {}, inserted {}", report.found, report.inserted);
        Ok(report)
    }
}
