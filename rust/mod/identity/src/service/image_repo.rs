use kubedeck_core::Page;
use kubedeck_store::{Condition, QueryWindow};
use tracing::info;

use crate::model::{Credential, ImageRepo};
use crate::service::{IdentityError, IdentityService};

fn validate(repo: &ImageRepo) -> Result<(), IdentityError> {
    if repo.name.trim().is_empty() {
        return Err(IdentityError::Validation("repository name is required".into()));
    }
    if repo.endpoint.trim().is_empty() {
        return Err(IdentityError::Validation("repository endpoint is required".into()));
    }
    Ok(())
}

impl IdentityService {
    pub fn create_image_repo(&self, mut repo: ImageRepo) -> Result<ImageRepo, IdentityError> {
        validate(&repo)?;
        if !repo.auth {
            repo.credential = Credential::default();
        }
        let mut tx = self.store.begin(true)?;
        tx.save(&mut repo)?;
        tx.commit()?;
        info!(name = %repo.name, "image repository created");
        Ok(repo)
    }

    pub fn get_image_repo(&self, name: &str) -> Result<ImageRepo, IdentityError> {
        let tx = self.store.begin(false)?;
        Ok(tx.get_or_err(name)?)
    }

    /// Replace the repository `name`.
    ///
    /// The credential is cleared whenever `auth` ends up false, rewritten
    /// when `auth` flips or a non-empty credential is supplied, and kept
    /// otherwise. `allow_anonymous` and `auth` changes are field updates
    /// ahead of the full overwrite, all in one transaction.
    pub fn update_image_repo(&self, name: &str, mut repo: ImageRepo) -> Result<ImageRepo, IdentityError> {
        let mut tx = self.store.begin(true)?;
        let old: ImageRepo = tx.get_or_err(name)?;
        repo.name = old.name.clone();
        repo.id = old.id.clone();
        repo.created_at = old.created_at.clone();
        validate(&repo)?;

        if !repo.auth {
            repo.credential = Credential::default();
            if !old.credential.is_empty() {
                tx.update_field(&repo, "credential", &repo.credential)?;
            }
        } else if repo.auth == old.auth && repo.credential.is_empty() {
            repo.credential = old.credential.clone();
        }

        if repo.allow_anonymous != old.allow_anonymous {
            tx.update_field(&repo, "allow_anonymous", &repo.allow_anonymous)?;
        }
        if repo.auth != old.auth {
            tx.update_field(&repo, "auth", &repo.auth)?;
        }
        tx.update(&mut repo)?;
        tx.commit()?;
        Ok(repo)
    }

    pub fn delete_image_repo(&self, name: &str) -> Result<(), IdentityError> {
        let mut tx = self.store.begin(true)?;
        let repo: ImageRepo = tx.get_or_err(name)?;
        tx.delete_struct(&repo)?;
        tx.commit()?;
        Ok(())
    }

    pub fn search_image_repos(
        &self,
        conditions: &[Condition],
        window: QueryWindow,
    ) -> Result<Page<ImageRepo>, IdentityError> {
        Ok(self.store.search(conditions, window)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::MemoryDirectory;
    use crate::service::testing;
    use kubedeck_store::Operator;

    fn repo(name: &str, auth: bool) -> ImageRepo {
        ImageRepo {
            id: String::new(),
            name: name.into(),
            kind: "Harbor".into(),
            endpoint: format!("https://{}.corp.io", name),
            download_url: String::new(),
            repo_name: "library".into(),
            auth,
            allow_anonymous: false,
            credential: Credential {
                username: "robot".into(),
                password: "token".into(),
            },
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_create_without_auth_drops_credential() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        let created = svc.create_image_repo(repo("public", false)).unwrap();
        assert!(created.credential.is_empty());
        assert!(svc.get_image_repo("public").unwrap().credential.is_empty());
    }

    #[test]
    fn test_update_keeps_credential_when_not_supplied() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        let created = svc.create_image_repo(repo("harbor", true)).unwrap();

        let mut change = repo("harbor", true);
        change.credential = Credential::default();
        change.allow_anonymous = true;
        let updated = svc.update_image_repo("harbor", change).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        let stored = svc.get_image_repo("harbor").unwrap();
        assert_eq!(stored.credential.password, "token");
        assert!(stored.allow_anonymous);
    }

    #[test]
    fn test_update_rewrites_supplied_credential() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        svc.create_image_repo(repo("harbor", true)).unwrap();

        let mut change = repo("harbor", true);
        change.credential.password = "rotated".into();
        svc.update_image_repo("harbor", change).unwrap();
        assert_eq!(svc.get_image_repo("harbor").unwrap().credential.password, "rotated");
    }

    #[test]
    fn test_auth_flip_clears_or_sets_credential() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        svc.create_image_repo(repo("harbor", true)).unwrap();

        svc.update_image_repo("harbor", repo("harbor", false)).unwrap();
        let stored = svc.get_image_repo("harbor").unwrap();
        assert!(!stored.auth);
        assert!(stored.credential.is_empty());

        let mut enable = repo("harbor", true);
        enable.credential.password = "fresh".into();
        svc.update_image_repo("harbor", enable).unwrap();
        let stored = svc.get_image_repo("harbor").unwrap();
        assert!(stored.auth);
        assert_eq!(stored.credential.password, "fresh");
    }

    #[test]
    fn test_search_and_delete() {
        let (_tmp, svc) = testing::service(&MemoryDirectory::default());
        for (name, auth) in [("prod-harbor", true), ("dev-harbor", false), ("prod-nexus", false)] {
            svc.create_image_repo(repo(name, auth)).unwrap();
        }

        let page = svc
            .search_image_repos(&[Condition::quick("prod")], QueryWindow::new(1, 10))
            .unwrap();
        assert_eq!(page.total, 2);

        let page = svc
            .search_image_repos(
                &[
                    Condition::quick("prod"),
                    Condition::new("auth", Operator::Ne, "true"),
                ],
                QueryWindow::unbounded(),
            )
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "prod-nexus");

        svc.delete_image_repo("prod-nexus").unwrap();
        assert!(matches!(
            svc.get_image_repo("prod-nexus"),
            Err(IdentityError::NotFound(_))
        ));
        assert!(matches!(
            svc.update_image_repo("missing", repo("missing", true)),
            Err(IdentityError::NotFound(_))
        ));
    }
}
