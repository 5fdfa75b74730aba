//! Directory tree, file placement, and cascading deletion.
//!
//! Directories form a parent-pointer tree; files hang off directories. Every
//! node starts in draft with a grant for its creator, and all reads and
//! writes funnel through [`AccessResolver`]. Deletion cascades over a whole
//! subtree but only while every descendant file is still draft.
//!
//! The service also implements [`FileDirectoryService`], the contract the
//! workflow and principal services use to reach file state without taking a
//! dependency on this crate.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

use async_trait::async_trait;
use signoff_access::AccessResolver;
use signoff_store::{TreeScope, TreeStore};
use signoff_types::{
    DirectoryId, DirectoryNode, DirectoryStatus, FileDirectoryService, FileId, FileNode,
    FileStatus, FileSummary, FileWithDirectory, SignoffError, SignoffResult, TreeDirectory,
    UserGrants, UserId, WorkflowId,
};
use std::sync::Arc;
use uuid::Uuid;

/// Grant-checked view and mutation surface for the directory/file tree.
pub struct TreeService {
    tree: Arc<dyn TreeStore>,
    access: AccessResolver,
}

impl TreeService {
    pub fn new(tree: Arc<dyn TreeStore>, access: AccessResolver) -> Self {
        Self { tree, access }
    }

    /// Load the tree as one user sees it.
    ///
    /// The archive view is global: any user may read archived nodes. The
    /// active view is grant-filtered, and a user granted nothing gets
    /// `AccessDenied` rather than an empty listing.
    pub async fn get_tree(
        &self,
        user: UserId,
        archive: bool,
    ) -> SignoffResult<Vec<TreeDirectory>> {
        if archive {
            return self.tree.load_tree(TreeScope::Archive).await;
        }
        let tree = self.tree.load_tree(TreeScope::Active(user)).await?;
        if tree.is_empty() {
            return Err(SignoffError::AccessDenied);
        }
        Ok(tree)
    }

    pub async fn get_file_info(&self, user: UserId, file: FileId) -> SignoffResult<FileNode> {
        self.access.require_file_access(user, file).await?;
        self.tree
            .get_file(file)
            .await?
            .ok_or(SignoffError::FileNotFound(file))
    }

    /// Create a directory. A nested directory requires a grant on the
    /// parent; a new root only requires being logged in.
    pub async fn create_directory(
        &self,
        user: UserId,
        parent: Option<DirectoryId>,
        name: &str,
    ) -> SignoffResult<DirectoryNode> {
        if let Some(parent) = parent {
            self.access.require_directory_access(user, parent).await?;
        }
        let directory = self.tree.insert_directory(parent, name, user).await?;
        tracing::info!(directory = %directory.id, owner = %user, "Directory created");
        Ok(directory)
    }

    pub async fn create_file(
        &self,
        user: UserId,
        directory: DirectoryId,
        name: &str,
    ) -> SignoffResult<FileNode> {
        self.access.require_directory_access(user, directory).await?;
        let file = self
            .tree
            .insert_file(directory, name, user, Uuid::new_v4())
            .await?;
        tracing::info!(file = %file.id, directory = %directory, owner = %user, "File created");
        Ok(file)
    }

    /// Move a directory between draft, wip, and archive. Archived nodes drop
    /// out of the active view and become globally readable in the archive
    /// view.
    pub async fn set_directory_status(
        &self,
        user: UserId,
        directory: DirectoryId,
        status: DirectoryStatus,
    ) -> SignoffResult<()> {
        self.access.require_directory_access(user, directory).await?;
        self.tree.update_directory_status(directory, status).await?;
        tracing::info!(directory = %directory, status = %status, "Directory status changed");
        Ok(())
    }

    /// Delete a whole directory subtree.
    ///
    /// Access is checked on the target node only; the store re-scans the
    /// subtree inside its transaction and refuses the cascade if any
    /// descendant file has left draft.
    pub async fn delete_directory(
        &self,
        user: UserId,
        directory: DirectoryId,
    ) -> SignoffResult<()> {
        self.access.require_directory_access(user, directory).await?;
        self.tree.delete_directory_tree(directory).await?;
        tracing::info!(directory = %directory, "Directory subtree deleted");
        Ok(())
    }

    /// Delete a single draft file. Requires grants on both the file and its
    /// owning directory.
    pub async fn delete_file(&self, user: UserId, file: FileId) -> SignoffResult<()> {
        let pair = self
            .tree
            .get_file_with_directory(file)
            .await?
            .ok_or(SignoffError::FileNotFound(file))?;
        self.access
            .require_directory_access(user, pair.directory.id)
            .await?;
        self.access.require_file_access(user, file).await?;
        self.tree.delete_file(file).await?;
        tracing::info!(file = %file, "File deleted");
        Ok(())
    }
}

#[async_trait]
impl FileDirectoryService for TreeService {
    async fn get_file_with_directory(&self, file: FileId) -> SignoffResult<FileWithDirectory> {
        self.tree
            .get_file_with_directory(file)
            .await?
            .ok_or(SignoffError::FileNotFound(file))
    }

    async fn update_file_status(&self, file: FileId, status: FileStatus) -> SignoffResult<()> {
        self.tree.update_file_status(file, status).await
    }

    async fn get_files_info(&self, files: &[FileId]) -> SignoffResult<Vec<FileSummary>> {
        self.tree.get_files_info(files).await
    }

    async fn check_workflow_in_use(&self, workflow: WorkflowId) -> SignoffResult<bool> {
        self.tree.workflow_in_use(workflow).await
    }

    async fn assign_workflow(
        &self,
        workflow: WorkflowId,
        directories: &[DirectoryId],
    ) -> SignoffResult<()> {
        self.tree.assign_workflow(workflow, directories).await
    }

    async fn grants_for_user(&self, user: UserId) -> SignoffResult<UserGrants> {
        self.tree.grants_for_user(user).await
    }

    async fn replace_user_grants(
        &self,
        user: UserId,
        directories: &[DirectoryId],
        files: &[FileId],
    ) -> SignoffResult<()> {
        self.tree.replace_user_grants(user, directories, files).await
    }

    async fn remove_user_grants(&self, user: UserId) -> SignoffResult<()> {
        self.tree.remove_user_grants(user).await
    }
}
