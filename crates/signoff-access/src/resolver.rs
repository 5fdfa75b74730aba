//! Grant and role checks shared by every signoff service.

use signoff_store::{PrincipalStore, TreeStore};
use signoff_types::{DirectoryId, FileId, SignoffError, SignoffResult, UserId};
use std::sync::Arc;

/// Name of the role whose holders may administer principals, workflows, and
/// grants.
pub const ADMIN_ROLE: &str = "admin";

/// Resolves what a user may see or touch.
#[derive(Clone)]
pub struct AccessResolver {
    principals: Arc<dyn PrincipalStore>,
    tree: Arc<dyn TreeStore>,
}

impl AccessResolver {
    pub fn new(principals: Arc<dyn PrincipalStore>, tree: Arc<dyn TreeStore>) -> Self {
        Self { principals, tree }
    }

    /// Require the acting user to hold the admin role.
    pub async fn require_admin(&self, user: UserId) -> SignoffResult<()> {
        let role = self.principals.get_user_role(user).await?;
        if role.name != ADMIN_ROLE {
            return Err(SignoffError::AccessDenied);
        }
        Ok(())
    }

    /// Whether the user holds a grant on the directory. A missing directory
    /// is an error, not a denial.
    pub async fn check_directory_access(
        &self,
        user: UserId,
        directory: DirectoryId,
    ) -> SignoffResult<bool> {
        if self.tree.get_directory(directory).await?.is_none() {
            return Err(SignoffError::DirectoryNotFound(directory));
        }
        self.tree.has_directory_grant(user, directory).await
    }

    /// Whether the user holds a grant on the file. A missing file is an
    /// error, not a denial.
    pub async fn check_file_access(&self, user: UserId, file: FileId) -> SignoffResult<bool> {
        if self.tree.get_file(file).await?.is_none() {
            return Err(SignoffError::FileNotFound(file));
        }
        self.tree.has_file_grant(user, file).await
    }

    pub async fn require_directory_access(
        &self,
        user: UserId,
        directory: DirectoryId,
    ) -> SignoffResult<()> {
        if !self.check_directory_access(user, directory).await? {
            return Err(SignoffError::AccessDenied);
        }
        Ok(())
    }

    pub async fn require_file_access(&self, user: UserId, file: FileId) -> SignoffResult<()> {
        if !self.check_file_access(user, file).await? {
            return Err(SignoffError::AccessDenied);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signoff_store::MemoryStore;
    use signoff_types::DirectoryId;
    use uuid::Uuid;

    fn setup() -> (Arc<MemoryStore>, AccessResolver) {
        let store = Arc::new(MemoryStore::new());
        let resolver = AccessResolver::new(store.clone(), store.clone());
        (store, resolver)
    }

    #[tokio::test]
    async fn admin_gate_follows_the_role_name() {
        let (store, resolver) = setup();
        let admin_role = store.create_role(ADMIN_ROLE).await.unwrap();
        let clerk_role = store.create_role("clerk").await.unwrap();
        let admin = store.create_user("root", admin_role.id).await.unwrap();
        let clerk = store.create_user("clerk", clerk_role.id).await.unwrap();

        resolver.require_admin(admin.id).await.unwrap();
        assert!(matches!(
            resolver.require_admin(clerk.id).await,
            Err(SignoffError::AccessDenied)
        ));
        assert!(matches!(
            resolver.require_admin(UserId::new(999)).await,
            Err(SignoffError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn node_checks_distinguish_missing_from_denied() {
        let (store, resolver) = setup();
        let role = store.create_role("clerk").await.unwrap();
        let owner = store.create_user("owner", role.id).await.unwrap();
        let stranger = store.create_user("stranger", role.id).await.unwrap();

        let dir = store.insert_directory(None, "docs", owner.id).await.unwrap();
        let file = store
            .insert_file(dir.id, "spec.pdf", owner.id, Uuid::new_v4())
            .await
            .unwrap();

        assert!(resolver.check_directory_access(owner.id, dir.id).await.unwrap());
        assert!(!resolver
            .check_directory_access(stranger.id, dir.id)
            .await
            .unwrap());
        assert!(resolver.check_file_access(owner.id, file.id).await.unwrap());

        assert!(matches!(
            resolver
                .check_directory_access(owner.id, DirectoryId::new(404))
                .await,
            Err(SignoffError::DirectoryNotFound(_))
        ));
        assert!(matches!(
            resolver.require_file_access(stranger.id, file.id).await,
            Err(SignoffError::AccessDenied)
        ));
        resolver.require_file_access(owner.id, file.id).await.unwrap();
    }
}
