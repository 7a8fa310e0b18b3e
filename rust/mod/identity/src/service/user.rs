use kubedeck_core::Page;
use kubedeck_store::{condition, Condition, Matcher, QueryWindow, Transaction};

use crate::model::{RoleBinding, User};
use crate::service::{IdentityError, IdentityService};

/// User persistence used by provisioning. Every call runs inside the
/// caller's transaction.
pub trait UserService: Send + Sync {
    /// Insert a user. Fails with `Conflict` when the name or email is taken.
    fn create_user(&self, user: &mut User, tx: &mut Transaction<'_>) -> Result<(), IdentityError>;

    /// Find a user whose name or email equals `name_or_email`.
    /// Returns `NotFound` when there is none.
    fn get_user_by_name_or_email(
        &self,
        name_or_email: &str,
        tx: &Transaction<'_>,
    ) -> Result<User, IdentityError>;
}

/// `UserService` over the record store.
pub struct StoreUsers;

impl UserService for StoreUsers {
    fn create_user(&self, user: &mut User, tx: &mut Transaction<'_>) -> Result<(), IdentityError> {
        if user.name.trim().is_empty() {
            return Err(IdentityError::Validation("user name is required".into()));
        }
        if !user.email.is_empty() {
            let taken: Option<User> = tx
                .select(vec![Matcher::eq("email", user.email.clone())])
                .first()?;
            if let Some(other) = taken {
                return Err(IdentityError::Conflict(format!(
                    "email {} is already used by {}",
                    user.email, other.name
                )));
            }
        }
        tx.save(user)?;
        Ok(())
    }

    fn get_user_by_name_or_email(
        &self,
        name_or_email: &str,
        tx: &Transaction<'_>,
    ) -> Result<User, IdentityError> {
        if let Some(user) = tx.get::<User>(name_or_email)? {
            return Ok(user);
        }
        tx.select(vec![Matcher::eq("email", name_or_email)])
            .first()?
            .ok_or_else(|| IdentityError::NotFound(format!("user {}", name_or_email)))
    }
}

impl IdentityService {
    /// Create a user in its own transaction.
    pub fn create_user(&self, mut user: User) -> Result<User, IdentityError> {
        let mut tx = self.store.begin(true)?;
        self.users.create_user(&mut user, &mut tx)?;
        tx.commit()?;
        Ok(user)
    }

    /// Get a user by name.
    pub fn get_user(&self, name: &str) -> Result<User, IdentityError> {
        let tx = self.store.begin(false)?;
        Ok(tx.get_or_err(name)?)
    }

    /// Look a user up by name or email.
    pub fn find_user(&self, name_or_email: &str) -> Result<Option<User>, IdentityError> {
        let tx = self.store.begin(false)?;
        match self.users.get_user_by_name_or_email(name_or_email, &tx) {
            Ok(user) => Ok(Some(user)),
            Err(IdentityError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a user together with every role binding naming it as subject.
    pub fn delete_user(&self, name: &str) -> Result<(), IdentityError> {
        let mut tx = self.store.begin(true)?;
        let user: User = tx.get_or_err(name)?;
        let bindings: Vec<RoleBinding> = tx
            .select(vec![
                Matcher::eq("subject.kind", "User"),
                Matcher::eq("subject.name", name),
            ])
            .find()?;
        for binding in &bindings {
            tx.delete_struct(binding)?;
        }
        tx.delete_struct(&user)?;
        tx.commit()?;
        Ok(())
    }

    /// Filtered, paged user listing, newest first.
    pub fn search_users(
        &self,
        conditions: &[Condition],
        window: QueryWindow,
    ) -> Result<Page<User>, IdentityError> {
        let tx = self.store.begin(false)?;
        Ok(condition::search(&tx, conditions, window)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::MemoryDirectory;
    use crate::model::UserKind;
    use crate::service::testing;
    use kubedeck_store::Operator;

    #[test]
    fn test_create_and_lookup_by_name_or_email() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        let created = svc
            .create_user(User::new("alice", "alice@corp.io", UserKind::Local))
            .unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.nick_name, "alice");

        assert_eq!(svc.find_user("alice").unwrap().unwrap().id, created.id);
        assert_eq!(svc.find_user("alice@corp.io").unwrap().unwrap().id, created.id);
        assert!(svc.find_user("bob").unwrap().is_none());
        assert!(matches!(svc.get_user("bob"), Err(IdentityError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_name_or_email_conflicts() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        svc.create_user(User::new("alice", "alice@corp.io", UserKind::Local))
            .unwrap();

        let err = svc
            .create_user(User::new("alice", "other@corp.io", UserKind::Local))
            .unwrap_err();
        assert!(matches!(err, IdentityError::Conflict(_)));

        let err = svc
            .create_user(User::new("alice2", "alice@corp.io", UserKind::Local))
            .unwrap_err();
        assert!(matches!(err, IdentityError::Conflict(_)));

        let err = svc
            .create_user(User::new(" ", "", UserKind::Local))
            .unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));
    }

    #[test]
    fn test_delete_user_removes_bindings() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        svc.create_user(User::new("alice", "", UserKind::Local)).unwrap();
        svc.create_role_binding(RoleBinding::for_user("Common User", "alice", "admin"))
            .unwrap();
        svc.create_role_binding(RoleBinding::for_user("Common User", "bob", "admin"))
            .unwrap();

        svc.delete_user("alice").unwrap();
        assert!(svc.find_user("alice").unwrap().is_none());
        let left = svc
            .search_role_bindings(&[], QueryWindow::unbounded())
            .unwrap();
        assert_eq!(left.total, 1);
        assert_eq!(left.items[0].subject.name, "bob");
    }

    #[test]
    fn test_search_users() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        for (name, email, kind) in [
            ("alice", "alice@corp.io", UserKind::Directory),
            ("bob", "bob@corp.io", UserKind::Local),
            ("carol", "carol@other.io", UserKind::Directory),
        ] {
            svc.create_user(User::new(name, email, kind)).unwrap();
        }

        let page = svc
            .search_users(&[Condition::quick("corp")], QueryWindow::new(1, 10))
            .unwrap();
        assert_eq!(page.total, 2);

        let page = svc
            .search_users(
                &[Condition::new("kind", Operator::Eq, "directory")],
                QueryWindow::unbounded(),
            )
            .unwrap();
        let mut names: Vec<_> = page.items.iter().map(|u| u.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["alice", "carol"]);

        let err = svc
            .search_users(
                &[Condition::new("isAdmin", Operator::Eq, "maybe")],
                QueryWindow::unbounded(),
            )
            .unwrap_err();
        assert!(matches!(err, IdentityError::Filter(_)));
    }
}
