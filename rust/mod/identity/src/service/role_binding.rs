use kubedeck_core::Page;
use kubedeck_store::{condition, Condition, Matcher, QueryWindow, Transaction};

use crate::model::RoleBinding;
use crate::service::{IdentityError, IdentityService};

/// Role-binding persistence used by provisioning.
pub trait RoleBindingService: Send + Sync {
    /// Insert a binding inside the caller's transaction.
    fn create_role_binding(
        &self,
        binding: &mut RoleBinding,
        tx: &mut Transaction<'_>,
    ) -> Result<(), IdentityError>;
}

/// `RoleBindingService` over the record store.
pub struct StoreRoleBindings;

impl RoleBindingService for StoreRoleBindings {
    fn create_role_binding(
        &self,
        binding: &mut RoleBinding,
        tx: &mut Transaction<'_>,
    ) -> Result<(), IdentityError> {
        if binding.role_ref.trim().is_empty() {
            return Err(IdentityError::Validation("role binding needs a role".into()));
        }
        if binding.subject.name.trim().is_empty() {
            return Err(IdentityError::Validation("role binding needs a subject".into()));
        }
        tx.save(binding)?;
        Ok(())
    }
}

impl IdentityService {
    /// Create a role binding in its own transaction.
    pub fn create_role_binding(&self, mut binding: RoleBinding) -> Result<RoleBinding, IdentityError> {
        let mut tx = self.store.begin(true)?;
        self.bindings.create_role_binding(&mut binding, &mut tx)?;
        tx.commit()?;
        Ok(binding)
    }

    /// Bindings whose subject is the given user.
    pub fn user_role_bindings(&self, user: &str) -> Result<Vec<RoleBinding>, IdentityError> {
        let tx = self.store.begin(false)?;
        Ok(tx
            .select(vec![
                Matcher::eq("subject.kind", "User"),
                Matcher::eq("subject.name", user),
            ])
            .order_by("created_at")
            .find()?)
    }

    /// Filtered, paged role-binding listing, newest first.
    pub fn search_role_bindings(
        &self,
        conditions: &[Condition],
        window: QueryWindow,
    ) -> Result<Page<RoleBinding>, IdentityError> {
        let tx = self.store.begin(false)?;
        Ok(condition::search(&tx, conditions, window)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::MemoryDirectory;
    use crate::service::testing;

    #[test]
    fn test_create_and_list_for_user() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        svc.create_role_binding(RoleBinding::for_user("Common User", "alice", "admin"))
            .unwrap();
        svc.create_role_binding(RoleBinding::for_user("Auditor", "alice", "admin"))
            .unwrap();

        let bindings = svc.user_role_bindings("alice").unwrap();
        assert_eq!(bindings.len(), 2);
        assert!(svc.user_role_bindings("bob").unwrap().is_empty());

        let err = svc
            .create_role_binding(RoleBinding::for_user("Auditor", "alice", "admin"))
            .unwrap_err();
        assert!(matches!(err, IdentityError::Conflict(_)));
    }

    #[test]
    fn test_validation() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        let err = svc
            .create_role_binding(RoleBinding::for_user(" ", "alice", "admin"))
            .unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));
    }
}
