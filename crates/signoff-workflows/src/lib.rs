//! Approval workflow templates.
//!
//! A workflow is an ordered chain of stages, each naming one approver.
//! Orders run 1..=N without gaps; the same user may hold several stages and
//! then signs once per stage. Templates are attached to directories, and a
//! template stays locked against deletion while any directory or unfinished
//! approval record still references it.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

use signoff_access::AccessResolver;
use signoff_store::{ApprovalStore, PrincipalStore, WorkflowStore};
use signoff_types::{
    validate_stages, DirectoryId, FileDirectoryService, SignoffError, SignoffResult, UserId,
    WorkflowDefinition, WorkflowId, WorkflowStage, WorkflowSummary,
};
use std::sync::Arc;

/// Admin-gated administration of workflow templates.
pub struct WorkflowRegistry {
    workflows: Arc<dyn WorkflowStore>,
    principals: Arc<dyn PrincipalStore>,
    approvals: Arc<dyn ApprovalStore>,
    files: Arc<dyn FileDirectoryService>,
    access: AccessResolver,
}

impl WorkflowRegistry {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        principals: Arc<dyn PrincipalStore>,
        approvals: Arc<dyn ApprovalStore>,
        files: Arc<dyn FileDirectoryService>,
        access: AccessResolver,
    ) -> Self {
        Self {
            workflows,
            principals,
            approvals,
            files,
            access,
        }
    }

    /// Create a template. Stage orders must run 1..=N and every approver
    /// must be a known user.
    pub async fn create(
        &self,
        acting: UserId,
        name: &str,
        stages: &[WorkflowStage],
    ) -> SignoffResult<WorkflowDefinition> {
        self.access.require_admin(acting).await?;
        self.validate(name, stages).await?;
        let definition = self.workflows.create_workflow(name, stages).await?;
        tracing::info!(
            workflow = %definition.id,
            stages = definition.stage_count(),
            "Workflow created"
        );
        Ok(definition)
    }

    /// Replace a template's name and stage chain wholesale.
    pub async fn update(
        &self,
        acting: UserId,
        id: WorkflowId,
        name: &str,
        stages: &[WorkflowStage],
    ) -> SignoffResult<WorkflowDefinition> {
        self.access.require_admin(acting).await?;
        if !self.workflows.workflow_exists(id).await? {
            return Err(SignoffError::WorkflowNotFound(id));
        }
        self.validate(name, stages).await?;
        let definition = self.workflows.replace_workflow(id, name, stages).await?;
        tracing::info!(workflow = %id, stages = definition.stage_count(), "Workflow replaced");
        Ok(definition)
    }

    /// Delete a template no directory and no unfinished approval record
    /// references.
    pub async fn delete(&self, acting: UserId, id: WorkflowId) -> SignoffResult<()> {
        self.access.require_admin(acting).await?;
        if !self.workflows.workflow_exists(id).await? {
            return Err(SignoffError::WorkflowNotFound(id));
        }
        if self.files.check_workflow_in_use(id).await?
            || self.approvals.workflow_has_open_records(id).await?
        {
            return Err(SignoffError::WorkflowInUse(id));
        }
        self.workflows.delete_workflow(id).await?;
        tracing::info!(workflow = %id, "Workflow deleted");
        Ok(())
    }

    pub async fn get(&self, acting: UserId, id: WorkflowId) -> SignoffResult<WorkflowDefinition> {
        self.access.require_admin(acting).await?;
        self.workflows
            .get_workflow(id)
            .await?
            .ok_or(SignoffError::WorkflowNotFound(id))
    }

    pub async fn list(&self, acting: UserId) -> SignoffResult<Vec<WorkflowSummary>> {
        self.access.require_admin(acting).await?;
        self.workflows.list_workflows().await
    }

    /// Attach a template to directories. New submissions from those
    /// directories will run this template.
    pub async fn assign(
        &self,
        acting: UserId,
        workflow: WorkflowId,
        directories: &[DirectoryId],
    ) -> SignoffResult<()> {
        self.access.require_admin(acting).await?;
        if !self.workflows.workflow_exists(workflow).await? {
            return Err(SignoffError::WorkflowNotFound(workflow));
        }
        self.files.assign_workflow(workflow, directories).await?;
        tracing::info!(
            workflow = %workflow,
            directories = directories.len(),
            "Workflow assigned"
        );
        Ok(())
    }

    async fn validate(&self, name: &str, stages: &[WorkflowStage]) -> SignoffResult<()> {
        if name.trim().is_empty() {
            return Err(SignoffError::Validation(
                "workflow name must not be empty".to_string(),
            ));
        }
        validate_stages(stages)?;
        let approvers: Vec<UserId> = stages.iter().map(|s| s.approver).collect();
        if let Some(missing) = self.principals.missing_user(&approvers).await? {
            return Err(SignoffError::UserNotFound(missing));
        }
        Ok(())
    }
}
