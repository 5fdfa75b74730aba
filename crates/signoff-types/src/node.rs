//! Directory and file tree entities.

use crate::id::{DirectoryId, FileId, WorkflowId};
use crate::status::{DirectoryStatus, FileStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Nodes ────────────────────────────────────────────────────────────

/// A directory node in the parent-pointer tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub id: DirectoryId,
    /// `None` marks a root directory.
    pub parent_id: Option<DirectoryId>,
    pub name: String,
    pub status: DirectoryStatus,
    /// Workflow applied to files submitted under this directory.
    /// Unset until an administrator assigns one.
    pub workflow_id: Option<WorkflowId>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A file node. The signoff core tracks status and identity only; file
/// content lives in an external blob store addressed by `content_key`
/// and `version`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: FileId,
    pub directory_id: DirectoryId,
    pub name: String,
    pub status: FileStatus,
    pub version: i32,
    pub content_key: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Read DTOs ────────────────────────────────────────────────────────

/// A file together with its owning directory, as the cross-service
/// contract returns it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileWithDirectory {
    pub file: FileNode,
    pub directory: DirectoryNode,
}

/// Minimal file details for decorating listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: FileId,
    pub name: String,
    pub status: FileStatus,
}

impl From<&FileNode> for FileSummary {
    fn from(node: &FileNode) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            status: node.status,
        }
    }
}

/// A directory with the files visible in the requested tree scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeDirectory {
    pub directory: DirectoryNode,
    pub files: Vec<FileNode>,
}

/// The grant sets held by one user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrants {
    pub directories: Vec<DirectoryId>,
    pub files: Vec<FileId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_summary_carries_identity_and_status() {
        let node = FileNode {
            id: FileId::new(5),
            directory_id: DirectoryId::new(1),
            name: "boiler-spec.pdf".to_string(),
            status: FileStatus::OnApproval,
            version: 1,
            content_key: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let summary = FileSummary::from(&node);
        assert_eq!(summary.id, node.id);
        assert_eq!(summary.name, "boiler-spec.pdf");
        assert_eq!(summary.status, FileStatus::OnApproval);
    }
}
