use async_trait::async_trait;
use signoff_types::{
    ApprovalId, ApprovalRecord, DirectoryId, DirectoryNode, DirectoryStatus, FileId, FileNode,
    FileStatus, FileSummary, FileWithDirectory, Role, RoleId, RoleUsers, SignoffResult,
    TreeDirectory, User, UserGrants, UserId, WorkflowDefinition, WorkflowId, WorkflowStage,
    WorkflowSummary,
};
use uuid::Uuid;

/// Scope selector for tree reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeScope {
    /// Archived nodes, visible to every user without grants.
    Archive,
    /// Live nodes the given user holds grants for.
    Active(UserId),
}

/// Storage interface for users and roles.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Create a role. Fails `RoleAlreadyExists` on a duplicate name.
    async fn create_role(&self, name: &str) -> SignoffResult<Role>;

    /// Rename a role, keeping names unique.
    async fn rename_role(&self, id: RoleId, name: &str) -> SignoffResult<()>;

    /// Delete a role. Callers gate on [`role_in_use`](Self::role_in_use) first.
    async fn delete_role(&self, id: RoleId) -> SignoffResult<()>;

    async fn get_role(&self, id: RoleId) -> SignoffResult<Option<Role>>;
    async fn get_role_by_name(&self, name: &str) -> SignoffResult<Option<Role>>;
    async fn list_roles(&self) -> SignoffResult<Vec<Role>>;

    /// Whether any user currently holds the role.
    async fn role_in_use(&self, id: RoleId) -> SignoffResult<bool>;

    /// Create a user. Fails `UserAlreadyExists` on a duplicate login and
    /// `RoleNotFound` when the role does not exist.
    async fn create_user(&self, login: &str, role: RoleId) -> SignoffResult<User>;

    /// Update a user's login and role under the same uniqueness rules.
    async fn update_user(&self, id: UserId, login: &str, role: RoleId) -> SignoffResult<()>;

    /// Delete the user row. Grant cleanup is the tree side's concern.
    async fn delete_user(&self, id: UserId) -> SignoffResult<()>;

    async fn get_user(&self, id: UserId) -> SignoffResult<Option<User>>;
    async fn get_user_by_login(&self, login: &str) -> SignoffResult<Option<User>>;

    /// The role held by a user. Fails `UserNotFound` for unknown users.
    async fn get_user_role(&self, id: UserId) -> SignoffResult<Role>;

    /// The first id in `ids` that names no existing user.
    async fn missing_user(&self, ids: &[UserId]) -> SignoffResult<Option<UserId>>;

    /// Every role with the users holding it, including empty roles.
    async fn list_users_grouped(&self) -> SignoffResult<Vec<RoleUsers>>;
}

/// Storage interface for workflow templates.
///
/// A template is persisted as its stage chain; all stage rows share the
/// workflow id. Stage shape validation happens in the service layer, before
/// these methods are reached.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Persist a new template under a fresh workflow id, atomically.
    async fn create_workflow(
        &self,
        name: &str,
        stages: &[WorkflowStage],
    ) -> SignoffResult<WorkflowDefinition>;

    /// Replace a template's name and stage chain in one atomic swap.
    /// Fails `WorkflowNotFound` when the id is unknown.
    async fn replace_workflow(
        &self,
        id: WorkflowId,
        name: &str,
        stages: &[WorkflowStage],
    ) -> SignoffResult<WorkflowDefinition>;

    /// Delete a template. Fails `WorkflowNotFound` when nothing was deleted.
    async fn delete_workflow(&self, id: WorkflowId) -> SignoffResult<()>;

    async fn get_workflow(&self, id: WorkflowId) -> SignoffResult<Option<WorkflowDefinition>>;

    /// Template summaries ordered by name.
    async fn list_workflows(&self) -> SignoffResult<Vec<WorkflowSummary>>;

    async fn workflow_exists(&self, id: WorkflowId) -> SignoffResult<bool>;

    /// Whether the user occupies a stage in any template.
    async fn user_in_any_workflow(&self, user: UserId) -> SignoffResult<bool>;
}

/// Storage interface for the directory/file tree and access grants.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Insert a directory and the creator's grant on it, atomically.
    /// A given parent must exist.
    async fn insert_directory(
        &self,
        parent: Option<DirectoryId>,
        name: &str,
        owner: UserId,
    ) -> SignoffResult<DirectoryNode>;

    /// Insert a file and the creator's grant on it, atomically.
    async fn insert_file(
        &self,
        directory: DirectoryId,
        name: &str,
        owner: UserId,
        content_key: Uuid,
    ) -> SignoffResult<FileNode>;

    async fn get_directory(&self, id: DirectoryId) -> SignoffResult<Option<DirectoryNode>>;
    async fn get_file(&self, id: FileId) -> SignoffResult<Option<FileNode>>;
    async fn get_file_with_directory(&self, id: FileId)
        -> SignoffResult<Option<FileWithDirectory>>;

    /// Minimal details for a batch of files; unknown ids are absent.
    async fn get_files_info(&self, ids: &[FileId]) -> SignoffResult<Vec<FileSummary>>;

    /// The first id in `ids` that names no existing directory.
    async fn missing_directory(&self, ids: &[DirectoryId]) -> SignoffResult<Option<DirectoryId>>;

    /// The first id in `ids` that names no existing file.
    async fn missing_file(&self, ids: &[FileId]) -> SignoffResult<Option<FileId>>;

    async fn has_directory_grant(
        &self,
        user: UserId,
        directory: DirectoryId,
    ) -> SignoffResult<bool>;
    async fn has_file_grant(&self, user: UserId, file: FileId) -> SignoffResult<bool>;

    /// Directories with their visible files under the given scope.
    async fn load_tree(&self, scope: TreeScope) -> SignoffResult<Vec<TreeDirectory>>;

    /// Set a file's status. Fails `FileNotFound` when nothing was updated.
    async fn update_file_status(&self, id: FileId, status: FileStatus) -> SignoffResult<()>;

    /// Set a directory's status. Fails `DirectoryNotFound` when nothing was
    /// updated.
    async fn update_directory_status(
        &self,
        id: DirectoryId,
        status: DirectoryStatus,
    ) -> SignoffResult<()>;

    /// Delete a draft file together with its grants and approval history,
    /// atomically. Fails `CannotDeleteNonDraftFile` for any other status.
    async fn delete_file(&self, id: FileId) -> SignoffResult<()>;

    /// Delete a directory subtree: every descendant directory and file plus
    /// their grants and approval history, in one transaction. The whole
    /// subtree is re-scanned inside that transaction and the delete fails
    /// `DirectoryContainsNonDraftFiles` without side effects if any
    /// descendant file has left draft.
    async fn delete_directory_tree(&self, id: DirectoryId) -> SignoffResult<()>;

    /// Whether any directory references the workflow.
    async fn workflow_in_use(&self, workflow: WorkflowId) -> SignoffResult<bool>;

    /// Point every listed directory at the workflow, atomically. Fails
    /// `DirectoryNotFound` if any id is unknown, writing nothing.
    async fn assign_workflow(
        &self,
        workflow: WorkflowId,
        directories: &[DirectoryId],
    ) -> SignoffResult<()>;

    async fn grants_for_user(&self, user: UserId) -> SignoffResult<UserGrants>;

    /// Replace a user's grant sets wholesale, atomically. Every named node
    /// must exist.
    async fn replace_user_grants(
        &self,
        user: UserId,
        directories: &[DirectoryId],
        files: &[FileId],
    ) -> SignoffResult<()>;

    /// Drop every grant held by the user.
    async fn remove_user_grants(&self, user: UserId) -> SignoffResult<()>;
}

/// Storage interface for approval records.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Open an approval for a draft file: re-check the draft status, insert
    /// the record at stage 1, and flip the file to `on_approval`, all in one
    /// transaction.
    async fn open_approval(
        &self,
        file: FileId,
        workflow: WorkflowId,
    ) -> SignoffResult<ApprovalRecord>;

    async fn get_approval(&self, id: ApprovalId) -> SignoffResult<Option<ApprovalRecord>>;

    /// Advance the record by one stage, guarded on `(expected_order,
    /// on_approval)`. A record that moved since the caller read it fails
    /// `ConcurrentUpdate`; a missing record fails `ApprovalNotFound`.
    async fn advance_stage(&self, id: ApprovalId, expected_order: i32) -> SignoffResult<()>;

    /// Mark the record annotated with the reviewer's message and return the
    /// file to draft, in one transaction. Permitted while the record is
    /// `on_approval` or already `annotated`; a repeat overwrites the message.
    /// Guarded on `expected_order` like [`advance_stage`](Self::advance_stage).
    async fn annotate(
        &self,
        id: ApprovalId,
        expected_order: i32,
        message: &str,
    ) -> SignoffResult<()>;

    /// Mark the record and its file approved, in one transaction. Guarded on
    /// `(expected_order, on_approval)`.
    async fn finalize(&self, id: ApprovalId, expected_order: i32) -> SignoffResult<()>;

    /// Records in `on_approval` whose current stage is assigned to the user.
    async fn pending_for_user(&self, user: UserId) -> SignoffResult<Vec<ApprovalRecord>>;

    /// Whether any record on this workflow is still awaiting signatures.
    ///
    /// Only `on_approval` counts: an annotated record is parked with its
    /// file back in draft, and an eventual resubmission opens a fresh
    /// record against whatever workflow the directory carries then.
    async fn workflow_has_open_records(&self, workflow: WorkflowId) -> SignoffResult<bool>;
}

/// Unified storage bundle used when one backend serves every concern.
pub trait SignoffStore:
    PrincipalStore + WorkflowStore + TreeStore + ApprovalStore + Send + Sync
{
}

impl<T> SignoffStore for T where
    T: PrincipalStore + WorkflowStore + TreeStore + ApprovalStore + Send + Sync
{
}
