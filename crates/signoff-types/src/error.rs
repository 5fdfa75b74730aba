//! Error taxonomy for the signoff services.

use crate::id::{ApprovalId, DirectoryId, FileId, RoleId, UserId, WorkflowId};
use crate::status::FileStatus;
use thiserror::Error;

/// Result type for signoff operations.
pub type SignoffResult<T> = Result<T, SignoffError>;

/// Coarse classification of an error, for transport layers that need to
/// pick an HTTP status or RPC code without matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PermissionDenied,
    InvalidState,
    Internal,
}

/// Errors surfaced by the signoff services and stores.
#[derive(Debug, Error)]
pub enum SignoffError {
    // ── Missing entities ─────────────────────────────────────────────
    #[error("workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    #[error("directory {0} has no workflow assigned")]
    WorkflowNotAssigned(DirectoryId),

    #[error("approval record {0} not found")]
    ApprovalNotFound(ApprovalId),

    #[error("directory {0} not found")]
    DirectoryNotFound(DirectoryId),

    #[error("file {0} not found")]
    FileNotFound(FileId),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("role {0} not found")]
    RoleNotFound(RoleId),

    // ── Conflicts ────────────────────────────────────────────────────
    #[error("role `{0}` already exists")]
    RoleAlreadyExists(String),

    #[error("user `{0}` already exists")]
    UserAlreadyExists(String),

    #[error("workflow {0} is still in use")]
    WorkflowInUse(WorkflowId),

    #[error("role {0} is still held by users")]
    RoleInUse(RoleId),

    #[error("user {0} occupies a workflow stage")]
    UserInWorkflow(UserId),

    #[error("approval record {0} was modified concurrently")]
    ConcurrentUpdate(ApprovalId),

    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    // ── Permission ───────────────────────────────────────────────────
    #[error("user {user} may not act on approval {approval} at its current stage")]
    NoPermission { user: UserId, approval: ApprovalId },

    #[error("access denied")]
    AccessDenied,

    // ── Status gates ─────────────────────────────────────────────────
    #[error("file {file} has status {status}, which this operation does not allow")]
    InvalidFileStatus { file: FileId, status: FileStatus },

    #[error("directory {0} contains files outside draft status")]
    DirectoryContainsNonDraftFiles(DirectoryId),

    #[error("file {0} can only be deleted while in draft status")]
    CannotDeleteNonDraftFile(FileId),

    #[error("validation failed: {0}")]
    Validation(String),

    // ── Infrastructure ───────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),
}

impl SignoffError {
    /// Classify this error for transport mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignoffError::WorkflowNotFound(_)
            | SignoffError::WorkflowNotAssigned(_)
            | SignoffError::ApprovalNotFound(_)
            | SignoffError::DirectoryNotFound(_)
            | SignoffError::FileNotFound(_)
            | SignoffError::UserNotFound(_)
            | SignoffError::RoleNotFound(_) => ErrorKind::NotFound,

            SignoffError::RoleAlreadyExists(_)
            | SignoffError::UserAlreadyExists(_)
            | SignoffError::WorkflowInUse(_)
            | SignoffError::RoleInUse(_)
            | SignoffError::UserInWorkflow(_)
            | SignoffError::ConcurrentUpdate(_)
            | SignoffError::TransactionConflict(_) => ErrorKind::Conflict,

            SignoffError::NoPermission { .. } | SignoffError::AccessDenied => {
                ErrorKind::PermissionDenied
            }

            SignoffError::InvalidFileStatus { .. }
            | SignoffError::DirectoryContainsNonDraftFiles(_)
            | SignoffError::CannotDeleteNonDraftFile(_)
            | SignoffError::Validation(_) => ErrorKind::InvalidState,

            SignoffError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Build a storage error with call-site context.
    pub fn storage(message: impl Into<String>) -> Self {
        SignoffError::Storage(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_the_transport_buckets() {
        assert_eq!(
            SignoffError::FileNotFound(FileId::new(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SignoffError::ConcurrentUpdate(ApprovalId::new(1)).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(SignoffError::AccessDenied.kind(), ErrorKind::PermissionDenied);
        assert_eq!(
            SignoffError::CannotDeleteNonDraftFile(FileId::new(1)).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            SignoffError::storage("connection reset").kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn messages_name_the_entity() {
        let err = SignoffError::NoPermission {
            user: UserId::new(3),
            approval: ApprovalId::new(9),
        };
        let text = err.to_string();
        assert!(text.contains('3'));
        assert!(text.contains('9'));
    }
}
