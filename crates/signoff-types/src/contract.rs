//! Cross-service seam between workflow logic and the file tree.
//!
//! Workflow and approval services never touch tree storage directly; they
//! go through this trait. In a single-process deployment the tree service
//! implements it in-process, and a split deployment puts an RPC client
//! behind the same signatures without the callers changing.

use crate::error::SignoffResult;
use crate::id::{DirectoryId, FileId, UserId, WorkflowId};
use crate::node::{FileSummary, FileWithDirectory, UserGrants};
use crate::status::FileStatus;
use async_trait::async_trait;

/// File-side operations offered to the workflow and principal services.
#[async_trait]
pub trait FileDirectoryService: Send + Sync {
    /// Fetch a file together with its owning directory.
    async fn get_file_with_directory(&self, file: FileId) -> SignoffResult<FileWithDirectory>;

    /// Set a file's status.
    async fn update_file_status(&self, file: FileId, status: FileStatus) -> SignoffResult<()>;

    /// Resolve minimal details for a batch of files. Unknown ids are
    /// silently absent from the result.
    async fn get_files_info(&self, files: &[FileId]) -> SignoffResult<Vec<FileSummary>>;

    /// Whether any directory currently references the workflow.
    async fn check_workflow_in_use(&self, workflow: WorkflowId) -> SignoffResult<bool>;

    /// Point the given directories at a workflow. Every directory must exist.
    async fn assign_workflow(
        &self,
        workflow: WorkflowId,
        directories: &[DirectoryId],
    ) -> SignoffResult<()>;

    /// The grant sets currently held by a user.
    async fn grants_for_user(&self, user: UserId) -> SignoffResult<UserGrants>;

    /// Replace a user's grant sets wholesale. Every named node must exist.
    async fn replace_user_grants(
        &self,
        user: UserId,
        directories: &[DirectoryId],
        files: &[FileId],
    ) -> SignoffResult<()>;

    /// Drop every grant held by a user, e.g. when the user is deleted.
    async fn remove_user_grants(&self, user: UserId) -> SignoffResult<()>;
}
