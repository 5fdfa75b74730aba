//! Administration of users, roles, and access grants.

use crate::resolver::{AccessResolver, ADMIN_ROLE};
use signoff_store::{PrincipalStore, WorkflowStore};
use signoff_types::{
    DirectoryId, FileDirectoryService, FileId, Role, RoleId, RoleUsers, SignoffError,
    SignoffResult, User, UserGrants, UserId,
};
use std::sync::Arc;

/// Administrative surface for principals and their grants.
///
/// Every operation takes the acting user first and is admin-gated. Grant
/// changes go through the file-side contract so the tree service stays the
/// single writer for grant state.
pub struct PrincipalRegistry {
    principals: Arc<dyn PrincipalStore>,
    workflows: Arc<dyn WorkflowStore>,
    files: Arc<dyn FileDirectoryService>,
    access: AccessResolver,
}

impl PrincipalRegistry {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        workflows: Arc<dyn WorkflowStore>,
        files: Arc<dyn FileDirectoryService>,
        access: AccessResolver,
    ) -> Self {
        Self {
            principals,
            workflows,
            files,
            access,
        }
    }

    // ── Roles ────────────────────────────────────────────────────────

    pub async fn create_role(&self, acting: UserId, name: &str) -> SignoffResult<Role> {
        self.access.require_admin(acting).await?;
        let role = self.principals.create_role(name).await?;
        tracing::info!(role = %role.id, name = %name, "Role created");
        Ok(role)
    }

    pub async fn rename_role(&self, acting: UserId, id: RoleId, name: &str) -> SignoffResult<()> {
        self.access.require_admin(acting).await?;
        self.principals.rename_role(id, name).await?;
        tracing::info!(role = %id, name = %name, "Role renamed");
        Ok(())
    }

    /// Delete a role nobody holds anymore.
    pub async fn delete_role(&self, acting: UserId, id: RoleId) -> SignoffResult<()> {
        self.access.require_admin(acting).await?;
        if self.principals.role_in_use(id).await? {
            return Err(SignoffError::RoleInUse(id));
        }
        self.principals.delete_role(id).await?;
        tracing::info!(role = %id, "Role deleted");
        Ok(())
    }

    pub async fn list_roles(&self, acting: UserId) -> SignoffResult<Vec<Role>> {
        self.access.require_admin(acting).await?;
        self.principals.list_roles().await
    }

    // ── Users ────────────────────────────────────────────────────────

    pub async fn register_user(
        &self,
        acting: UserId,
        login: &str,
        role: RoleId,
    ) -> SignoffResult<User> {
        self.access.require_admin(acting).await?;
        let user = self.principals.create_user(login, role).await?;
        tracing::info!(user = %user.id, login = %login, "User registered");
        Ok(user)
    }

    pub async fn update_user(
        &self,
        acting: UserId,
        id: UserId,
        login: &str,
        role: RoleId,
    ) -> SignoffResult<()> {
        self.access.require_admin(acting).await?;
        self.principals.update_user(id, login, role).await?;
        tracing::info!(user = %id, "User updated");
        Ok(())
    }

    /// Delete a user and drop their grants. Admins cannot be deleted, and a
    /// user still occupying a workflow stage blocks deletion.
    pub async fn delete_user(&self, acting: UserId, id: UserId) -> SignoffResult<()> {
        self.access.require_admin(acting).await?;
        let target = self
            .principals
            .get_user(id)
            .await?
            .ok_or(SignoffError::UserNotFound(id))?;
        let role = self.principals.get_user_role(target.id).await?;
        if role.name == ADMIN_ROLE {
            return Err(SignoffError::AccessDenied);
        }
        if self.workflows.user_in_any_workflow(id).await? {
            return Err(SignoffError::UserInWorkflow(id));
        }

        self.principals.delete_user(id).await?;
        self.files.remove_user_grants(id).await?;
        tracing::info!(user = %id, "User deleted");
        Ok(())
    }

    pub async fn list_users_grouped(&self, acting: UserId) -> SignoffResult<Vec<RoleUsers>> {
        self.access.require_admin(acting).await?;
        self.principals.list_users_grouped().await
    }

    // ── Grants ───────────────────────────────────────────────────────

    /// Replace a user's grant sets wholesale.
    pub async fn assign_user(
        &self,
        acting: UserId,
        user: UserId,
        directories: &[DirectoryId],
        files: &[FileId],
    ) -> SignoffResult<()> {
        self.access.require_admin(acting).await?;
        if self.principals.get_user(user).await?.is_none() {
            return Err(SignoffError::UserNotFound(user));
        }
        self.files
            .replace_user_grants(user, directories, files)
            .await?;
        tracing::info!(
            user = %user,
            directories = directories.len(),
            files = files.len(),
            "User grants replaced"
        );
        Ok(())
    }

    pub async fn user_grants(&self, acting: UserId, user: UserId) -> SignoffResult<UserGrants> {
        self.access.require_admin(acting).await?;
        if self.principals.get_user(user).await?.is_none() {
            return Err(SignoffError::UserNotFound(user));
        }
        self.files.grants_for_user(user).await
    }

    /// Drop every grant a user holds without touching the user itself.
    pub async fn remove_user_relations(&self, acting: UserId, user: UserId) -> SignoffResult<()> {
        self.access.require_admin(acting).await?;
        if self.principals.get_user(user).await?.is_none() {
            return Err(SignoffError::UserNotFound(user));
        }
        self.files.remove_user_grants(user).await?;
        tracing::info!(user = %user, "User grants removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use signoff_store::{MemoryStore, TreeStore};
    use signoff_types::{
        FileStatus, FileSummary, FileWithDirectory, WorkflowId, WorkflowStage,
    };
    use uuid::Uuid;

    /// Contract shim delegating straight to the store, standing in for the
    /// tree service.
    struct StoreContract(Arc<MemoryStore>);

    #[async_trait]
    impl FileDirectoryService for StoreContract {
        async fn get_file_with_directory(&self, file: FileId) -> SignoffResult<FileWithDirectory> {
            self.0
                .get_file_with_directory(file)
                .await?
                .ok_or(SignoffError::FileNotFound(file))
        }

        async fn update_file_status(&self, file: FileId, status: FileStatus) -> SignoffResult<()> {
            self.0.update_file_status(file, status).await
        }

        async fn get_files_info(&self, files: &[FileId]) -> SignoffResult<Vec<FileSummary>> {
            self.0.get_files_info(files).await
        }

        async fn check_workflow_in_use(&self, workflow: WorkflowId) -> SignoffResult<bool> {
            self.0.workflow_in_use(workflow).await
        }

        async fn assign_workflow(
            &self,
            workflow: WorkflowId,
            directories: &[DirectoryId],
        ) -> SignoffResult<()> {
            self.0.assign_workflow(workflow, directories).await
        }

        async fn grants_for_user(&self, user: UserId) -> SignoffResult<UserGrants> {
            self.0.grants_for_user(user).await
        }

        async fn replace_user_grants(
            &self,
            user: UserId,
            directories: &[DirectoryId],
            files: &[FileId],
        ) -> SignoffResult<()> {
            self.0.replace_user_grants(user, directories, files).await
        }

        async fn remove_user_grants(&self, user: UserId) -> SignoffResult<()> {
            self.0.remove_user_grants(user).await
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: PrincipalRegistry,
        admin: User,
        clerk_role: Role,
        clerk: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let admin_role = store.create_role(ADMIN_ROLE).await.unwrap();
        let admin = store.create_user("root", admin_role.id).await.unwrap();
        let clerk_role = store.create_role("clerk").await.unwrap();
        let clerk = store.create_user("clerk", clerk_role.id).await.unwrap();

        let access = AccessResolver::new(store.clone(), store.clone());
        let registry = PrincipalRegistry::new(
            store.clone(),
            store.clone(),
            Arc::new(StoreContract(store.clone())),
            access,
        );
        Fixture {
            store,
            registry,
            admin,
            clerk_role,
            clerk,
        }
    }

    #[tokio::test]
    async fn administration_is_admin_only() {
        let fx = fixture().await;

        assert!(matches!(
            fx.registry
                .register_user(fx.clerk.id, "intruder", fx.clerk_role.id)
                .await,
            Err(SignoffError::AccessDenied)
        ));
        assert!(matches!(
            fx.registry.list_roles(fx.clerk.id).await,
            Err(SignoffError::AccessDenied)
        ));

        let user = fx
            .registry
            .register_user(fx.admin.id, "vpetrov", fx.clerk_role.id)
            .await
            .unwrap();
        assert_eq!(user.login, "vpetrov");

        let grouped = fx.registry.list_users_grouped(fx.admin.id).await.unwrap();
        let clerks = grouped
            .iter()
            .find(|g| g.role.id == fx.clerk_role.id)
            .unwrap();
        assert_eq!(clerks.users.len(), 2);
    }

    #[tokio::test]
    async fn delete_user_guards_admins_and_workflow_members() {
        let fx = fixture().await;

        // The admin account itself is off limits.
        assert!(matches!(
            fx.registry.delete_user(fx.admin.id, fx.admin.id).await,
            Err(SignoffError::AccessDenied)
        ));

        // A user on a workflow stage cannot be removed.
        fx.store
            .create_workflow("review", &[WorkflowStage::new(1, fx.clerk.id)])
            .await
            .unwrap();
        assert!(matches!(
            fx.registry.delete_user(fx.admin.id, fx.clerk.id).await,
            Err(SignoffError::UserInWorkflow(_))
        ));

        // A free user goes away together with their grants.
        let loner = fx
            .registry
            .register_user(fx.admin.id, "loner", fx.clerk_role.id)
            .await
            .unwrap();
        let dir = fx
            .store
            .insert_directory(None, "docs", loner.id)
            .await
            .unwrap();
        fx.registry.delete_user(fx.admin.id, loner.id).await.unwrap();
        assert!(fx.store.get_user(loner.id).await.unwrap().is_none());
        assert!(!fx
            .store
            .has_directory_grant(loner.id, dir.id)
            .await
            .unwrap());

        assert!(matches!(
            fx.registry.delete_user(fx.admin.id, UserId::new(999)).await,
            Err(SignoffError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn role_deletion_requires_the_role_to_be_free() {
        let fx = fixture().await;

        assert!(matches!(
            fx.registry.delete_role(fx.admin.id, fx.clerk_role.id).await,
            Err(SignoffError::RoleInUse(_))
        ));

        let spare = fx.registry.create_role(fx.admin.id, "spare").await.unwrap();
        fx.registry
            .rename_role(fx.admin.id, spare.id, "archive-clerk")
            .await
            .unwrap();
        fx.registry.delete_role(fx.admin.id, spare.id).await.unwrap();
        assert!(fx.store.get_role(spare.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn grant_administration_round_trips_through_the_contract() {
        let fx = fixture().await;
        let dir = fx
            .store
            .insert_directory(None, "docs", fx.admin.id)
            .await
            .unwrap();
        let file = fx
            .store
            .insert_file(dir.id, "spec.pdf", fx.admin.id, Uuid::new_v4())
            .await
            .unwrap();

        fx.registry
            .assign_user(fx.admin.id, fx.clerk.id, &[dir.id], &[file.id])
            .await
            .unwrap();
        let grants = fx
            .registry
            .user_grants(fx.admin.id, fx.clerk.id)
            .await
            .unwrap();
        assert_eq!(grants.directories, vec![dir.id]);
        assert_eq!(grants.files, vec![file.id]);

        fx.registry
            .remove_user_relations(fx.admin.id, fx.clerk.id)
            .await
            .unwrap();
        let grants = fx
            .registry
            .user_grants(fx.admin.id, fx.clerk.id)
            .await
            .unwrap();
        assert!(grants.directories.is_empty());
        assert!(grants.files.is_empty());

        assert!(matches!(
            fx.registry
                .assign_user(fx.admin.id, UserId::new(999), &[], &[])
                .await,
            Err(SignoffError::UserNotFound(_))
        ));
    }
}
