//! The approval chain: a file's passage through its directory's workflow.
//!
//! Submission opens a record at stage 1 and flips the file to
//! `on_approval`. Each signature by the stage's approver advances the
//! record by exactly one stage. The terminal approver must finalize
//! instead of signing; an annotation at any stage sends the file back to
//! draft while the record keeps its position for resubmission context.
//!
//! Authorization here is the workflow itself: the only user who may act
//! on a record is the approver named at `current_order`. Directory grants
//! play no part once a file is submitted.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

use signoff_store::{ApprovalStore, WorkflowStore};
use signoff_types::{
    ApprovalId, ApprovalRecord, ApprovalStatus, FileDirectoryService, FileId, FileStatus,
    PendingApproval, SignoffError, SignoffResult, UserId, WorkflowDefinition,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Drives approval records through their workflow stages.
pub struct ApprovalChain {
    approvals: Arc<dyn ApprovalStore>,
    workflows: Arc<dyn WorkflowStore>,
    files: Arc<dyn FileDirectoryService>,
}

impl ApprovalChain {
    pub fn new(
        approvals: Arc<dyn ApprovalStore>,
        workflows: Arc<dyn WorkflowStore>,
        files: Arc<dyn FileDirectoryService>,
    ) -> Self {
        Self {
            approvals,
            workflows,
            files,
        }
    }

    /// Submit a draft file into its directory's workflow.
    ///
    /// The record opens at stage 1 and the file moves to `on_approval` in
    /// the same transaction.
    pub async fn submit_for_approval(&self, file: FileId) -> SignoffResult<ApprovalRecord> {
        let located = self.files.get_file_with_directory(file).await?;
        let workflow = located
            .directory
            .workflow_id
            .ok_or(SignoffError::WorkflowNotAssigned(located.directory.id))?;
        if located.file.status != FileStatus::Draft {
            return Err(SignoffError::InvalidFileStatus {
                file,
                status: located.file.status,
            });
        }

        let record = self.approvals.open_approval(file, workflow).await?;
        tracing::info!(
            file = %file,
            approval = %record.id,
            workflow = %workflow,
            "File submitted for approval"
        );
        Ok(record)
    }

    /// Sign off the current stage, advancing the record by one.
    ///
    /// Only the approver named at `current_order` may sign, and never at
    /// the terminal stage, where the same approver must finalize instead.
    pub async fn sign(&self, approval: ApprovalId, user: UserId) -> SignoffResult<()> {
        let record = self.open_record(approval).await?;
        let definition = self.definition_of(&record).await?;
        self.require_stage_approver(&definition, &record, user)?;
        if record.current_order == definition.max_order() {
            return Err(SignoffError::NoPermission { user, approval });
        }

        self.approvals
            .advance_stage(approval, record.current_order)
            .await?;
        tracing::info!(
            approval = %approval,
            user = %user,
            stage = record.current_order + 1,
            "Approval signed"
        );
        Ok(())
    }

    /// Send the file back for revision with a reviewer message.
    ///
    /// The record keeps its stage but becomes `annotated`, and the file
    /// returns to draft so the author can edit and resubmit. Re-annotating
    /// the parked record overwrites the message, up until the file is
    /// resubmitted and a fresh record takes over.
    pub async fn annotate(
        &self,
        approval: ApprovalId,
        user: UserId,
        message: &str,
    ) -> SignoffResult<()> {
        let record = self
            .approvals
            .get_approval(approval)
            .await?
            .ok_or(SignoffError::ApprovalNotFound(approval))?;
        if !matches!(
            record.status,
            ApprovalStatus::OnApproval | ApprovalStatus::Annotated
        ) {
            return Err(SignoffError::ApprovalNotFound(approval));
        }
        let definition = self.definition_of(&record).await?;
        self.require_stage_approver(&definition, &record, user)?;

        // A parked record accepts a rewrite only while its file is still in
        // draft. Once the file is resubmitted, the fresh record owns it.
        if record.status == ApprovalStatus::Annotated {
            let located = self.files.get_file_with_directory(record.file_id).await?;
            if located.file.status != FileStatus::Draft {
                return Err(SignoffError::ApprovalNotFound(approval));
            }
        }

        self.approvals
            .annotate(approval, record.current_order, message)
            .await?;
        tracing::info!(
            approval = %approval,
            user = %user,
            "Approval annotated; file returned to draft"
        );
        Ok(())
    }

    /// Approve the file at the terminal stage.
    ///
    /// Record and file both move to `approved` in one transaction.
    pub async fn finalize(&self, approval: ApprovalId, user: UserId) -> SignoffResult<()> {
        let record = self.open_record(approval).await?;
        let definition = self.definition_of(&record).await?;
        if record.current_order != definition.max_order() {
            return Err(SignoffError::NoPermission { user, approval });
        }
        self.require_stage_approver(&definition, &record, user)?;

        self.approvals
            .finalize(approval, record.current_order)
            .await?;
        tracing::info!(approval = %approval, user = %user, "Approval finalized");
        Ok(())
    }

    /// The user's worklist: open records waiting on their signature,
    /// decorated with file names and chain lengths.
    pub async fn pending_for_user(&self, user: UserId) -> SignoffResult<Vec<PendingApproval>> {
        let records = self.approvals.pending_for_user(user).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let file_ids: Vec<FileId> = records.iter().map(|r| r.file_id).collect();
        let names: HashMap<FileId, String> = self
            .files
            .get_files_info(&file_ids)
            .await?
            .into_iter()
            .map(|summary| (summary.id, summary.name))
            .collect();

        let mut stage_counts: HashMap<_, i32> = HashMap::new();
        for record in &records {
            if stage_counts.contains_key(&record.workflow_id) {
                continue;
            }
            if let Some(definition) = self.workflows.get_workflow(record.workflow_id).await? {
                stage_counts.insert(record.workflow_id, definition.stage_count() as i32);
            }
        }

        // Records whose file or workflow vanished mid-listing are dropped.
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let file_name = names.get(&record.file_id)?.clone();
                let stage_count = *stage_counts.get(&record.workflow_id)?;
                Some(PendingApproval {
                    approval_id: record.id,
                    file_id: record.file_id,
                    file_name,
                    current_order: record.current_order,
                    stage_count,
                })
            })
            .collect())
    }

    /// Load a record that is still open for signatures.
    async fn open_record(&self, approval: ApprovalId) -> SignoffResult<ApprovalRecord> {
        let record = self
            .approvals
            .get_approval(approval)
            .await?
            .ok_or(SignoffError::ApprovalNotFound(approval))?;
        if record.status != ApprovalStatus::OnApproval {
            return Err(SignoffError::ApprovalNotFound(approval));
        }
        Ok(record)
    }

    async fn definition_of(&self, record: &ApprovalRecord) -> SignoffResult<WorkflowDefinition> {
        self.workflows
            .get_workflow(record.workflow_id)
            .await?
            .ok_or(SignoffError::WorkflowNotFound(record.workflow_id))
    }

    fn require_stage_approver(
        &self,
        definition: &WorkflowDefinition,
        record: &ApprovalRecord,
        user: UserId,
    ) -> SignoffResult<()> {
        if definition.approver_at(record.current_order) != Some(user) {
            return Err(SignoffError::NoPermission {
                user,
                approval: record.id,
            });
        }
        Ok(())
    }
}
