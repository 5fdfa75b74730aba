//! Approval records: one file's passage through a workflow.

use crate::id::{ApprovalId, FileId, WorkflowId};
use crate::status::ApprovalStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of one submission of a file into its directory's workflow.
///
/// `current_order` names the stage whose approver must act next. It starts
/// at 1 on submission and only ever moves forward by one per signature;
/// an annotation freezes it in place while the file returns to draft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: ApprovalId,
    pub file_id: FileId,
    pub workflow_id: WorkflowId,
    pub current_order: i32,
    pub status: ApprovalStatus,
    /// Reviewer message attached by the most recent annotation, if any.
    pub annotation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending item on an approver's worklist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub approval_id: ApprovalId,
    pub file_id: FileId,
    pub file_name: String,
    pub current_order: i32,
    pub stage_count: i32,
}
