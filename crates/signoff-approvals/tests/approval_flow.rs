//! End-to-end approval flows over the in-memory store: a three-stage chain
//! from submission to finalization, duplicate-approver workflows, the
//! annotation round-trip, and the workflow deletion gate.

use signoff_access::{AccessResolver, ADMIN_ROLE};
use signoff_approvals::ApprovalChain;
use signoff_store::{ApprovalStore, MemoryStore, PrincipalStore};
use signoff_tree::TreeService;
use signoff_types::{
    ApprovalStatus, DirectoryNode, FileDirectoryService, FileNode, FileStatus, RoleId,
    SignoffError, User, WorkflowDefinition, WorkflowStage,
};
use signoff_workflows::WorkflowRegistry;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Stack {
    store: Arc<MemoryStore>,
    tree: Arc<TreeService>,
    registry: WorkflowRegistry,
    chain: ApprovalChain,
    admin: User,
    reviewer_role: RoleId,
}

async fn stack() -> Stack {
    let store = Arc::new(MemoryStore::new());
    let admin_role = store.create_role(ADMIN_ROLE).await.unwrap();
    let admin = store.create_user("root", admin_role.id).await.unwrap();
    let reviewer_role = store.create_role("reviewer").await.unwrap().id;

    let access = AccessResolver::new(store.clone(), store.clone());
    let tree = Arc::new(TreeService::new(store.clone(), access.clone()));
    let registry = WorkflowRegistry::new(
        store.clone(),
        store.clone(),
        store.clone(),
        tree.clone(),
        access,
    );
    let chain = ApprovalChain::new(store.clone(), store.clone(), tree.clone());

    Stack {
        store,
        tree,
        registry,
        chain,
        admin,
        reviewer_role,
    }
}

async fn reviewer(sx: &Stack, login: &str) -> User {
    sx.store.create_user(login, sx.reviewer_role).await.unwrap()
}

async fn workflow(sx: &Stack, name: &str, approvers: &[&User]) -> WorkflowDefinition {
    let stages: Vec<WorkflowStage> = approvers
        .iter()
        .enumerate()
        .map(|(index, user)| WorkflowStage::new(index as i32 + 1, user.id))
        .collect();
    sx.registry
        .create(sx.admin.id, name, &stages)
        .await
        .unwrap()
}

async fn draft_under(sx: &Stack, def: &WorkflowDefinition) -> (DirectoryNode, FileNode) {
    let dir = sx
        .tree
        .create_directory(sx.admin.id, None, "contracts")
        .await
        .unwrap();
    sx.registry
        .assign(sx.admin.id, def.id, &[dir.id])
        .await
        .unwrap();
    let file = sx
        .tree
        .create_file(sx.admin.id, dir.id, "terms.pdf")
        .await
        .unwrap();
    (dir, file)
}

async fn file_status(sx: &Stack, file: &FileNode) -> FileStatus {
    sx.tree
        .get_file_with_directory(file.id)
        .await
        .unwrap()
        .file
        .status
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_stage_chain_runs_submit_sign_sign_finalize() {
    let sx = stack().await;
    let u1 = reviewer(&sx, "u1").await;
    let u2 = reviewer(&sx, "u2").await;
    let u3 = reviewer(&sx, "u3").await;
    let def = workflow(&sx, "release", &[&u1, &u2, &u3]).await;
    let (_, file) = draft_under(&sx, &def).await;

    let record = sx.chain.submit_for_approval(file.id).await.unwrap();
    assert_eq!(record.current_order, 1);
    assert_eq!(file_status(&sx, &file).await, FileStatus::OnApproval);

    sx.chain.sign(record.id, u1.id).await.unwrap();
    sx.chain.sign(record.id, u2.id).await.unwrap();
    let at_terminal = sx.store.get_approval(record.id).await.unwrap().unwrap();
    assert_eq!(at_terminal.current_order, 3);

    sx.chain.finalize(record.id, u3.id).await.unwrap();
    let done = sx.store.get_approval(record.id).await.unwrap().unwrap();
    assert_eq!(done.status, ApprovalStatus::Approved);
    assert_eq!(file_status(&sx, &file).await, FileStatus::Approved);
}

#[tokio::test]
async fn worklists_follow_the_chain_stage_by_stage() {
    let sx = stack().await;
    let u1 = reviewer(&sx, "u1").await;
    let u2 = reviewer(&sx, "u2").await;
    let def = workflow(&sx, "review", &[&u1, &u2]).await;
    let (_, file) = draft_under(&sx, &def).await;

    let record = sx.chain.submit_for_approval(file.id).await.unwrap();

    let pending = sx.chain.pending_for_user(u1.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].file_name, "terms.pdf");
    assert_eq!(pending[0].stage_count, 2);
    assert!(sx.chain.pending_for_user(u2.id).await.unwrap().is_empty());

    sx.chain.sign(record.id, u1.id).await.unwrap();
    assert!(sx.chain.pending_for_user(u1.id).await.unwrap().is_empty());
    assert_eq!(sx.chain.pending_for_user(u2.id).await.unwrap().len(), 1);

    sx.chain.finalize(record.id, u2.id).await.unwrap();
    assert!(sx.chain.pending_for_user(u2.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn single_stage_workflow_must_finalize_not_sign() {
    let sx = stack().await;
    let solo = reviewer(&sx, "solo").await;
    let def = workflow(&sx, "rubber-stamp", &[&solo]).await;
    let (_, file) = draft_under(&sx, &def).await;

    let record = sx.chain.submit_for_approval(file.id).await.unwrap();

    // Stage 1 is already terminal.
    assert!(matches!(
        sx.chain.sign(record.id, solo.id).await,
        Err(SignoffError::NoPermission { .. })
    ));

    sx.chain.finalize(record.id, solo.id).await.unwrap();
    assert_eq!(file_status(&sx, &file).await, FileStatus::Approved);
}

#[tokio::test]
async fn duplicate_approver_stages_each_take_one_signature() {
    let sx = stack().await;
    let alice = reviewer(&sx, "alice").await;
    let bob = reviewer(&sx, "bob").await;
    let def = workflow(&sx, "double-check", &[&alice, &alice, &bob]).await;
    let (_, file) = draft_under(&sx, &def).await;

    let record = sx.chain.submit_for_approval(file.id).await.unwrap();

    // Alice holds stages 1 and 2: two separate signatures.
    sx.chain.sign(record.id, alice.id).await.unwrap();
    sx.chain.sign(record.id, alice.id).await.unwrap();
    let handed_over = sx.store.get_approval(record.id).await.unwrap().unwrap();
    assert_eq!(handed_over.current_order, 3);

    // A third one is not hers to give.
    assert!(matches!(
        sx.chain.sign(record.id, alice.id).await,
        Err(SignoffError::NoPermission { .. })
    ));

    // Bob's stage is terminal, so signing is refused as well.
    assert!(matches!(
        sx.chain.sign(record.id, bob.id).await,
        Err(SignoffError::NoPermission { .. })
    ));
    sx.chain.finalize(record.id, bob.id).await.unwrap();
    assert_eq!(file_status(&sx, &file).await, FileStatus::Approved);
}

#[tokio::test]
async fn annotation_parks_the_record_and_resubmission_opens_a_fresh_one() {
    let sx = stack().await;
    let alice = reviewer(&sx, "alice").await;
    let bob = reviewer(&sx, "bob").await;
    let def = workflow(&sx, "review", &[&alice, &bob]).await;
    let (_, file) = draft_under(&sx, &def).await;

    let first = sx.chain.submit_for_approval(file.id).await.unwrap();
    sx.chain
        .annotate(first.id, alice.id, "tighten section 2")
        .await
        .unwrap();
    assert_eq!(file_status(&sx, &file).await, FileStatus::Draft);

    // While parked, the message can be rewritten in place.
    sx.chain
        .annotate(first.id, alice.id, "and fix the appendix")
        .await
        .unwrap();
    let parked = sx.store.get_approval(first.id).await.unwrap().unwrap();
    assert_eq!(parked.status, ApprovalStatus::Annotated);
    assert_eq!(parked.annotation.as_deref(), Some("and fix the appendix"));

    // Resubmission opens a new record at stage 1.
    let second = sx.chain.submit_for_approval(file.id).await.unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.current_order, 1);
    assert_eq!(file_status(&sx, &file).await, FileStatus::OnApproval);

    // The parked record no longer owns the file.
    assert!(matches!(
        sx.chain.annotate(first.id, alice.id, "late note").await,
        Err(SignoffError::ApprovalNotFound(_))
    ));
    assert_eq!(file_status(&sx, &file).await, FileStatus::OnApproval);

    sx.chain.sign(second.id, alice.id).await.unwrap();
    sx.chain.finalize(second.id, bob.id).await.unwrap();
    assert_eq!(file_status(&sx, &file).await, FileStatus::Approved);

    // The annotated record stays behind as review history.
    let history = sx.store.get_approval(first.id).await.unwrap().unwrap();
    assert_eq!(history.status, ApprovalStatus::Annotated);
}

#[tokio::test]
async fn workflow_deletion_gate_tracks_live_records_only() {
    let sx = stack().await;
    let alice = reviewer(&sx, "alice").await;
    let old = workflow(&sx, "old-process", &[&alice]).await;
    let (dir, file) = draft_under(&sx, &old).await;

    let record = sx.chain.submit_for_approval(file.id).await.unwrap();

    // Referenced by a directory and by an open record.
    assert!(matches!(
        sx.registry.delete(sx.admin.id, old.id).await,
        Err(SignoffError::WorkflowInUse(_))
    ));

    // Repoint the directory at a replacement template; the open record
    // still pins the old one.
    let new = workflow(&sx, "new-process", &[&alice]).await;
    sx.registry
        .assign(sx.admin.id, new.id, &[dir.id])
        .await
        .unwrap();
    assert!(matches!(
        sx.registry.delete(sx.admin.id, old.id).await,
        Err(SignoffError::WorkflowInUse(_))
    ));

    // Once annotated, the record is parked and releases the template.
    sx.chain.annotate(record.id, alice.id, "restart").await.unwrap();
    sx.registry.delete(sx.admin.id, old.id).await.unwrap();

    // The parked record survives as history, though its template is gone.
    let stranded = sx.store.get_approval(record.id).await.unwrap().unwrap();
    assert_eq!(stranded.status, ApprovalStatus::Annotated);
    assert!(matches!(
        sx.chain.annotate(record.id, alice.id, "again").await,
        Err(SignoffError::WorkflowNotFound(_))
    ));

    // Resubmission runs under the directory's current template.
    let fresh = sx.chain.submit_for_approval(file.id).await.unwrap();
    assert_eq!(fresh.workflow_id, new.id);
    sx.chain.finalize(fresh.id, alice.id).await.unwrap();
    assert_eq!(file_status(&sx, &file).await, FileStatus::Approved);
}
