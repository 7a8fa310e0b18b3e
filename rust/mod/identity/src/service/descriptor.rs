use kubedeck_store::Transaction;
use tracing::info;

use crate::mapping::{AttributeMapper, UserField};
use crate::model::{DirectoryDescriptor, DirectoryState};
use crate::service::{IdentityError, IdentityService};

/// The stored descriptor, if any. Several stored descriptors is an error,
/// never resolved by picking one.
pub(crate) fn load_descriptor(
    tx: &Transaction<'_>,
) -> Result<Option<DirectoryDescriptor>, IdentityError> {
    let mut all: Vec<DirectoryDescriptor> = tx.all()?;
    match all.len() {
        0 => Ok(None),
        1 => Ok(all.pop()),
        n => Err(IdentityError::Conflict(format!(
            "{} directory descriptors are stored, expected at most one",
            n
        ))),
    }
}

/// Check a descriptor's fields and resolve its attribute mapping.
pub(crate) fn validate(descriptor: &DirectoryDescriptor) -> Result<AttributeMapper, IdentityError> {
    if descriptor.address.trim().is_empty() {
        return Err(IdentityError::Validation("directory address is required".into()));
    }
    if descriptor.port == 0 {
        return Err(IdentityError::Validation("directory port is required".into()));
    }
    if descriptor.base_dn.trim().is_empty() {
        return Err(IdentityError::Validation("base DN is required".into()));
    }
    if descriptor.size_limit < 0 || descriptor.time_limit < 0 {
        return Err(IdentityError::Validation(
            "size and time limits must not be negative".into(),
        ));
    }
    let mapper = AttributeMapper::compile(&descriptor.mapping)?;
    if mapper.attribute_for(UserField::Name).is_none() {
        return Err(IdentityError::Validation(
            "mapping must bind the user name to a directory attribute".into(),
        ));
    }
    Ok(mapper)
}

impl IdentityService {
    fn read_descriptor(&self) -> Result<Option<DirectoryDescriptor>, IdentityError> {
        let tx = self.store.begin(false)?;
        load_descriptor(&tx)
    }

    /// Configured directory and whether it is enabled.
    pub fn directory_state(&self) -> Result<DirectoryState, IdentityError> {
        Ok(DirectoryState::from_descriptor(self.read_descriptor()?))
    }

    /// The stored descriptor, or `NotFound`.
    pub fn get_directory(&self) -> Result<DirectoryDescriptor, IdentityError> {
        self.read_descriptor()?
            .ok_or_else(|| IdentityError::NotFound("no directory is configured".into()))
    }

    /// The descriptor, which must exist and be enabled.
    pub(crate) fn enabled_directory(&self) -> Result<DirectoryDescriptor, IdentityError> {
        match self.directory_state()? {
            DirectoryState::Enabled(d) => Ok(d),
            DirectoryState::Disabled(_) => {
                Err(IdentityError::Validation("directory is disabled".into()))
            }
            DirectoryState::NotConfigured => {
                Err(IdentityError::Validation("directory is not configured".into()))
            }
        }
    }

    /// True only when a single descriptor is stored and enabled.
    pub fn check_status(&self) -> bool {
        self.directory_state()
            .map(|s| s.is_enabled())
            .unwrap_or(false)
    }

    async fn verify_connect(&self, descriptor: &DirectoryDescriptor) -> Result<(), IdentityError> {
        let mut client = self.connector.connect(descriptor).await?;
        client.close().await;
        Ok(())
    }

    /// Store the directory descriptor after validating it and verifying the
    /// service account can bind. A second descriptor is a `Conflict`.
    pub async fn create_directory(
        &self,
        descriptor: DirectoryDescriptor,
    ) -> Result<DirectoryDescriptor, IdentityError> {
        validate(&descriptor)?;
        if self.read_descriptor()?.is_some() {
            return Err(IdentityError::Conflict("a directory is already configured".into()));
        }
        self.verify_connect(&descriptor).await?;
        let created = self.save_descriptor(descriptor)?;
        info!(id = %created.id, url = %created.url(), "directory configured");
        Ok(created)
    }

    fn save_descriptor(
        &self,
        mut descriptor: DirectoryDescriptor,
    ) -> Result<DirectoryDescriptor, IdentityError> {
        let mut tx = self.store.begin(true)?;
        if load_descriptor(&tx)?.is_some() {
            return Err(IdentityError::Conflict("a directory is already configured".into()));
        }
        descriptor.id.clear();
        tx.save(&mut descriptor)?;
        tx.commit()?;
        Ok(descriptor)
    }

    /// Replace the descriptor `id`. An empty password keeps the stored one;
    /// changed `enable` / `tls` flags are written as field updates before
    /// the full overwrite, in the same transaction.
    pub async fn update_directory(
        &self,
        id: &str,
        mut descriptor: DirectoryDescriptor,
    ) -> Result<DirectoryDescriptor, IdentityError> {
        validate(&descriptor)?;
        let old = self.get_directory_by_id(id)?;
        if descriptor.password.is_empty() {
            descriptor.password = old.password.clone();
        }
        self.verify_connect(&descriptor).await?;
        let updated = self.patch_descriptor(id, descriptor)?;
        info!(id = %updated.id, enable = updated.enable, "directory updated");
        Ok(updated)
    }

    fn get_directory_by_id(&self, id: &str) -> Result<DirectoryDescriptor, IdentityError> {
        let tx = self.store.begin(false)?;
        Ok(tx.get_or_err(id)?)
    }

    fn patch_descriptor(
        &self,
        id: &str,
        mut descriptor: DirectoryDescriptor,
    ) -> Result<DirectoryDescriptor, IdentityError> {
        let mut tx = self.store.begin(true)?;
        let old: DirectoryDescriptor = tx.get_or_err(id)?;
        descriptor.id = old.id.clone();
        descriptor.created_at = old.created_at.clone();

        if descriptor.enable != old.enable {
            tx.update_field(&descriptor, "enable", &descriptor.enable)?;
        }
        if descriptor.tls != old.tls {
            tx.update_field(&descriptor, "tls", &descriptor.tls)?;
        }
        tx.update(&mut descriptor)?;
        tx.commit()?;
        Ok(descriptor)
    }

    /// Remove the descriptor `id`. Provisioned users are kept.
    pub fn delete_directory(&self, id: &str) -> Result<(), IdentityError> {
        let mut tx = self.store.begin(true)?;
        let descriptor: DirectoryDescriptor = tx.get_or_err(id)?;
        tx.delete_struct(&descriptor)?;
        tx.commit()?;
        info!(id = %id, "directory removed");
        Ok(())
    }
}
