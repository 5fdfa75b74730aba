//! In-memory reference implementation for the signoff storage traits.
//!
//! This adapter is deterministic and test-friendly. All maps sit behind a
//! single lock, so the multi-entity writes (record + file status, subtree
//! deletion, node + grant pairs) are atomic with the same observable
//! semantics as the transactional backend.

use crate::traits::{ApprovalStore, PrincipalStore, TreeScope, TreeStore, WorkflowStore};
use async_trait::async_trait;
use chrono::Utc;
use signoff_types::{
    ApprovalId, ApprovalRecord, ApprovalStatus, DirectoryId, DirectoryNode, DirectoryStatus,
    FileId, FileNode, FileStatus, FileSummary, FileWithDirectory, Role, RoleId, RoleUsers,
    SignoffError, SignoffResult, TreeDirectory, User, UserGrants, UserId, WorkflowDefinition,
    WorkflowId, WorkflowStage, WorkflowSummary,
};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct State {
    roles: HashMap<RoleId, Role>,
    users: HashMap<UserId, User>,
    workflows: HashMap<WorkflowId, WorkflowDefinition>,
    directories: HashMap<DirectoryId, DirectoryNode>,
    files: HashMap<FileId, FileNode>,
    directory_grants: HashSet<(UserId, DirectoryId)>,
    file_grants: HashSet<(UserId, FileId)>,
    approvals: HashMap<ApprovalId, ApprovalRecord>,
    next_role: i64,
    next_user: i64,
    next_workflow: i64,
    next_directory: i64,
    next_file: i64,
    next_approval: i64,
}

impl State {
    /// The directory and all its descendants, root first.
    fn subtree_of(&self, root: DirectoryId) -> Vec<DirectoryId> {
        let mut collected = vec![root];
        let mut frontier = vec![root];
        while let Some(current) = frontier.pop() {
            for dir in self.directories.values() {
                if dir.parent_id == Some(current) {
                    collected.push(dir.id);
                    frontier.push(dir.id);
                }
            }
        }
        collected
    }
}

fn bump(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-memory signoff storage adapter.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> SignoffResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| SignoffError::storage("state lock poisoned"))
    }

    fn write(&self) -> SignoffResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| SignoffError::storage("state lock poisoned"))
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn create_role(&self, name: &str) -> SignoffResult<Role> {
        let mut state = self.write()?;
        if state.roles.values().any(|r| r.name == name) {
            return Err(SignoffError::RoleAlreadyExists(name.to_string()));
        }
        let id = RoleId::new(bump(&mut state.next_role));
        let role = Role {
            id,
            name: name.to_string(),
        };
        state.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn rename_role(&self, id: RoleId, name: &str) -> SignoffResult<()> {
        let mut state = self.write()?;
        if state.roles.values().any(|r| r.name == name && r.id != id) {
            return Err(SignoffError::RoleAlreadyExists(name.to_string()));
        }
        let role = state
            .roles
            .get_mut(&id)
            .ok_or(SignoffError::RoleNotFound(id))?;
        role.name = name.to_string();
        Ok(())
    }

    async fn delete_role(&self, id: RoleId) -> SignoffResult<()> {
        let mut state = self.write()?;
        state
            .roles
            .remove(&id)
            .map(|_| ())
            .ok_or(SignoffError::RoleNotFound(id))
    }

    async fn get_role(&self, id: RoleId) -> SignoffResult<Option<Role>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn get_role_by_name(&self, name: &str) -> SignoffResult<Option<Role>> {
        Ok(self.read()?.roles.values().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> SignoffResult<Vec<Role>> {
        let state = self.read()?;
        let mut roles: Vec<_> = state.roles.values().cloned().collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn role_in_use(&self, id: RoleId) -> SignoffResult<bool> {
        Ok(self.read()?.users.values().any(|u| u.role_id == id))
    }

    async fn create_user(&self, login: &str, role: RoleId) -> SignoffResult<User> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&role) {
            return Err(SignoffError::RoleNotFound(role));
        }
        if state.users.values().any(|u| u.login == login) {
            return Err(SignoffError::UserAlreadyExists(login.to_string()));
        }
        let id = UserId::new(bump(&mut state.next_user));
        let user = User {
            id,
            login: login.to_string(),
            role_id: role,
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: UserId, login: &str, role: RoleId) -> SignoffResult<()> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&role) {
            return Err(SignoffError::RoleNotFound(role));
        }
        if state.users.values().any(|u| u.login == login && u.id != id) {
            return Err(SignoffError::UserAlreadyExists(login.to_string()));
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or(SignoffError::UserNotFound(id))?;
        user.login = login.to_string();
        user.role_id = role;
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> SignoffResult<()> {
        let mut state = self.write()?;
        state
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(SignoffError::UserNotFound(id))
    }

    async fn get_user(&self, id: UserId) -> SignoffResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn get_user_by_login(&self, login: &str) -> SignoffResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.login == login)
            .cloned())
    }

    async fn get_user_role(&self, id: UserId) -> SignoffResult<Role> {
        let state = self.read()?;
        let user = state
            .users
            .get(&id)
            .ok_or(SignoffError::UserNotFound(id))?;
        state
            .roles
            .get(&user.role_id)
            .cloned()
            .ok_or(SignoffError::RoleNotFound(user.role_id))
    }

    async fn missing_user(&self, ids: &[UserId]) -> SignoffResult<Option<UserId>> {
        let state = self.read()?;
        Ok(ids.iter().find(|id| !state.users.contains_key(id)).copied())
    }

    async fn list_users_grouped(&self) -> SignoffResult<Vec<RoleUsers>> {
        let state = self.read()?;
        let mut roles: Vec<_> = state.roles.values().cloned().collect();
        roles.sort_by_key(|r| r.id);

        Ok(roles
            .into_iter()
            .map(|role| {
                let mut users: Vec<_> = state
                    .users
                    .values()
                    .filter(|u| u.role_id == role.id)
                    .cloned()
                    .collect();
                users.sort_by_key(|u| u.id);
                RoleUsers { role, users }
            })
            .collect())
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn create_workflow(
        &self,
        name: &str,
        stages: &[WorkflowStage],
    ) -> SignoffResult<WorkflowDefinition> {
        let mut state = self.write()?;
        let id = WorkflowId::new(bump(&mut state.next_workflow));
        let now = Utc::now();
        let mut stages = stages.to_vec();
        stages.sort_by_key(|s| s.order);
        let definition = WorkflowDefinition {
            id,
            name: name.to_string(),
            stages,
            created_at: now,
            updated_at: now,
        };
        state.workflows.insert(id, definition.clone());
        Ok(definition)
    }

    async fn replace_workflow(
        &self,
        id: WorkflowId,
        name: &str,
        stages: &[WorkflowStage],
    ) -> SignoffResult<WorkflowDefinition> {
        let mut state = self.write()?;
        let existing = state
            .workflows
            .get(&id)
            .ok_or(SignoffError::WorkflowNotFound(id))?;
        let created_at = existing.created_at;

        let mut stages = stages.to_vec();
        stages.sort_by_key(|s| s.order);
        let definition = WorkflowDefinition {
            id,
            name: name.to_string(),
            stages,
            created_at,
            updated_at: Utc::now(),
        };
        state.workflows.insert(id, definition.clone());
        Ok(definition)
    }

    async fn delete_workflow(&self, id: WorkflowId) -> SignoffResult<()> {
        let mut state = self.write()?;
        state
            .workflows
            .remove(&id)
            .map(|_| ())
            .ok_or(SignoffError::WorkflowNotFound(id))
    }

    async fn get_workflow(&self, id: WorkflowId) -> SignoffResult<Option<WorkflowDefinition>> {
        Ok(self.read()?.workflows.get(&id).cloned())
    }

    async fn list_workflows(&self) -> SignoffResult<Vec<WorkflowSummary>> {
        let state = self.read()?;
        let mut summaries: Vec<_> = state
            .workflows
            .values()
            .map(|def| WorkflowSummary {
                id: def.id,
                name: def.name.clone(),
                stage_count: def.stage_count() as i32,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    async fn workflow_exists(&self, id: WorkflowId) -> SignoffResult<bool> {
        Ok(self.read()?.workflows.contains_key(&id))
    }

    async fn user_in_any_workflow(&self, user: UserId) -> SignoffResult<bool> {
        Ok(self
            .read()?
            .workflows
            .values()
            .any(|def| def.stages.iter().any(|s| s.approver == user)))
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn insert_directory(
        &self,
        parent: Option<DirectoryId>,
        name: &str,
        owner: UserId,
    ) -> SignoffResult<DirectoryNode> {
        let mut state = self.write()?;
        if let Some(parent) = parent {
            if !state.directories.contains_key(&parent) {
                return Err(SignoffError::DirectoryNotFound(parent));
            }
        }
        let id = DirectoryId::new(bump(&mut state.next_directory));
        let now = Utc::now();
        let node = DirectoryNode {
            id,
            parent_id: parent,
            name: name.to_string(),
            status: DirectoryStatus::Draft,
            workflow_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.directories.insert(id, node.clone());
        state.directory_grants.insert((owner, id));
        Ok(node)
    }

    async fn insert_file(
        &self,
        directory: DirectoryId,
        name: &str,
        owner: UserId,
        content_key: Uuid,
    ) -> SignoffResult<FileNode> {
        let mut state = self.write()?;
        if !state.directories.contains_key(&directory) {
            return Err(SignoffError::DirectoryNotFound(directory));
        }
        let id = FileId::new(bump(&mut state.next_file));
        let now = Utc::now();
        let node = FileNode {
            id,
            directory_id: directory,
            name: name.to_string(),
            status: FileStatus::Draft,
            version: 1,
            content_key,
            created_at: now,
            updated_at: now,
        };
        state.files.insert(id, node.clone());
        state.file_grants.insert((owner, id));
        Ok(node)
    }

    async fn get_directory(&self, id: DirectoryId) -> SignoffResult<Option<DirectoryNode>> {
        Ok(self.read()?.directories.get(&id).cloned())
    }

    async fn get_file(&self, id: FileId) -> SignoffResult<Option<FileNode>> {
        Ok(self.read()?.files.get(&id).cloned())
    }

    async fn get_file_with_directory(
        &self,
        id: FileId,
    ) -> SignoffResult<Option<FileWithDirectory>> {
        let state = self.read()?;
        let Some(file) = state.files.get(&id).cloned() else {
            return Ok(None);
        };
        let directory = state
            .directories
            .get(&file.directory_id)
            .cloned()
            .ok_or_else(|| {
                SignoffError::storage(format!(
                    "file {} references missing directory {}",
                    id, file.directory_id
                ))
            })?;
        Ok(Some(FileWithDirectory { file, directory }))
    }

    async fn get_files_info(&self, ids: &[FileId]) -> SignoffResult<Vec<FileSummary>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.files.get(id))
            .map(FileSummary::from)
            .collect())
    }

    async fn missing_directory(
        &self,
        ids: &[DirectoryId],
    ) -> SignoffResult<Option<DirectoryId>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .find(|id| !state.directories.contains_key(id))
            .copied())
    }

    async fn missing_file(&self, ids: &[FileId]) -> SignoffResult<Option<FileId>> {
        let state = self.read()?;
        Ok(ids.iter().find(|id| !state.files.contains_key(id)).copied())
    }

    async fn has_directory_grant(
        &self,
        user: UserId,
        directory: DirectoryId,
    ) -> SignoffResult<bool> {
        Ok(self.read()?.directory_grants.contains(&(user, directory)))
    }

    async fn has_file_grant(&self, user: UserId, file: FileId) -> SignoffResult<bool> {
        Ok(self.read()?.file_grants.contains(&(user, file)))
    }

    async fn load_tree(&self, scope: TreeScope) -> SignoffResult<Vec<TreeDirectory>> {
        let state = self.read()?;

        let mut directories: Vec<_> = match scope {
            TreeScope::Archive => state
                .directories
                .values()
                .filter(|d| d.status == DirectoryStatus::Archive)
                .cloned()
                .collect(),
            TreeScope::Active(user) => state
                .directories
                .values()
                .filter(|d| d.status != DirectoryStatus::Archive)
                .filter(|d| state.directory_grants.contains(&(user, d.id)))
                .cloned()
                .collect(),
        };
        directories.sort_by_key(|d| d.id);

        Ok(directories
            .into_iter()
            .map(|directory| {
                let mut files: Vec<_> = state
                    .files
                    .values()
                    .filter(|f| f.directory_id == directory.id)
                    .filter(|f| match scope {
                        TreeScope::Archive => f.status == FileStatus::Archive,
                        TreeScope::Active(user) => {
                            f.status != FileStatus::Archive
                                && state.file_grants.contains(&(user, f.id))
                        }
                    })
                    .cloned()
                    .collect();
                files.sort_by_key(|f| f.id);
                TreeDirectory { directory, files }
            })
            .collect())
    }

    async fn update_file_status(&self, id: FileId, status: FileStatus) -> SignoffResult<()> {
        let mut state = self.write()?;
        let file = state
            .files
            .get_mut(&id)
            .ok_or(SignoffError::FileNotFound(id))?;
        file.status = status;
        file.updated_at = Utc::now();
        Ok(())
    }

    async fn update_directory_status(
        &self,
        id: DirectoryId,
        status: DirectoryStatus,
    ) -> SignoffResult<()> {
        let mut state = self.write()?;
        let directory = state
            .directories
            .get_mut(&id)
            .ok_or(SignoffError::DirectoryNotFound(id))?;
        directory.status = status;
        directory.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_file(&self, id: FileId) -> SignoffResult<()> {
        let mut state = self.write()?;
        let file = state.files.get(&id).ok_or(SignoffError::FileNotFound(id))?;
        if file.status != FileStatus::Draft {
            return Err(SignoffError::CannotDeleteNonDraftFile(id));
        }
        state.files.remove(&id);
        state.file_grants.retain(|(_, f)| *f != id);
        state.approvals.retain(|_, r| r.file_id != id);
        Ok(())
    }

    async fn delete_directory_tree(&self, id: DirectoryId) -> SignoffResult<()> {
        let mut state = self.write()?;
        if !state.directories.contains_key(&id) {
            return Err(SignoffError::DirectoryNotFound(id));
        }

        let subtree = state.subtree_of(id);

        // Re-scan before any mutation: a single non-draft file anywhere in
        // the subtree blocks the whole delete.
        let blocked = state
            .files
            .values()
            .any(|f| subtree.contains(&f.directory_id) && f.status != FileStatus::Draft);
        if blocked {
            return Err(SignoffError::DirectoryContainsNonDraftFiles(id));
        }

        let doomed_files: Vec<FileId> = state
            .files
            .values()
            .filter(|f| subtree.contains(&f.directory_id))
            .map(|f| f.id)
            .collect();

        for file in &doomed_files {
            state.files.remove(file);
        }
        state.file_grants.retain(|(_, f)| !doomed_files.contains(f));
        state
            .approvals
            .retain(|_, r| !doomed_files.contains(&r.file_id));
        for directory in &subtree {
            state.directories.remove(directory);
        }
        state
            .directory_grants
            .retain(|(_, d)| !subtree.contains(d));
        Ok(())
    }

    async fn workflow_in_use(&self, workflow: WorkflowId) -> SignoffResult<bool> {
        Ok(self
            .read()?
            .directories
            .values()
            .any(|d| d.workflow_id == Some(workflow)))
    }

    async fn assign_workflow(
        &self,
        workflow: WorkflowId,
        directories: &[DirectoryId],
    ) -> SignoffResult<()> {
        let mut state = self.write()?;
        if let Some(missing) = directories
            .iter()
            .find(|id| !state.directories.contains_key(id))
        {
            return Err(SignoffError::DirectoryNotFound(*missing));
        }
        let now = Utc::now();
        for id in directories {
            if let Some(directory) = state.directories.get_mut(id) {
                directory.workflow_id = Some(workflow);
                directory.updated_at = now;
            }
        }
        Ok(())
    }

    async fn grants_for_user(&self, user: UserId) -> SignoffResult<UserGrants> {
        let state = self.read()?;
        let mut directories: Vec<_> = state
            .directory_grants
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, d)| *d)
            .collect();
        directories.sort();
        let mut files: Vec<_> = state
            .file_grants
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, f)| *f)
            .collect();
        files.sort();
        Ok(UserGrants { directories, files })
    }

    async fn replace_user_grants(
        &self,
        user: UserId,
        directories: &[DirectoryId],
        files: &[FileId],
    ) -> SignoffResult<()> {
        let mut state = self.write()?;
        if let Some(missing) = directories
            .iter()
            .find(|id| !state.directories.contains_key(id))
        {
            return Err(SignoffError::DirectoryNotFound(*missing));
        }
        if let Some(missing) = files.iter().find(|id| !state.files.contains_key(id)) {
            return Err(SignoffError::FileNotFound(*missing));
        }

        state.directory_grants.retain(|(u, _)| *u != user);
        state.file_grants.retain(|(u, _)| *u != user);
        for directory in directories {
            state.directory_grants.insert((user, *directory));
        }
        for file in files {
            state.file_grants.insert((user, *file));
        }
        Ok(())
    }

    async fn remove_user_grants(&self, user: UserId) -> SignoffResult<()> {
        let mut state = self.write()?;
        state.directory_grants.retain(|(u, _)| *u != user);
        state.file_grants.retain(|(u, _)| *u != user);
        Ok(())
    }
}

#[async_trait]
impl ApprovalStore for MemoryStore {
    async fn open_approval(
        &self,
        file: FileId,
        workflow: WorkflowId,
    ) -> SignoffResult<ApprovalRecord> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let node = state
            .files
            .get_mut(&file)
            .ok_or(SignoffError::FileNotFound(file))?;
        if node.status != FileStatus::Draft {
            return Err(SignoffError::InvalidFileStatus {
                file,
                status: node.status,
            });
        }

        let now = Utc::now();
        node.status = FileStatus::OnApproval;
        node.updated_at = now;

        let id = ApprovalId::new(bump(&mut state.next_approval));
        let record = ApprovalRecord {
            id,
            file_id: file,
            workflow_id: workflow,
            current_order: 1,
            status: ApprovalStatus::OnApproval,
            annotation: None,
            created_at: now,
            updated_at: now,
        };
        state.approvals.insert(id, record.clone());
        Ok(record)
    }

    async fn get_approval(&self, id: ApprovalId) -> SignoffResult<Option<ApprovalRecord>> {
        Ok(self.read()?.approvals.get(&id).cloned())
    }

    async fn advance_stage(&self, id: ApprovalId, expected_order: i32) -> SignoffResult<()> {
        let mut state = self.write()?;
        let record = state
            .approvals
            .get_mut(&id)
            .ok_or(SignoffError::ApprovalNotFound(id))?;
        if record.current_order != expected_order || record.status != ApprovalStatus::OnApproval {
            return Err(SignoffError::ConcurrentUpdate(id));
        }
        record.current_order += 1;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn annotate(
        &self,
        id: ApprovalId,
        expected_order: i32,
        message: &str,
    ) -> SignoffResult<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let record = state
            .approvals
            .get_mut(&id)
            .ok_or(SignoffError::ApprovalNotFound(id))?;
        if record.current_order != expected_order
            || !matches!(
                record.status,
                ApprovalStatus::OnApproval | ApprovalStatus::Annotated
            )
        {
            return Err(SignoffError::ConcurrentUpdate(id));
        }
        let file = state.files.get_mut(&record.file_id).ok_or_else(|| {
            SignoffError::storage(format!("approval {} references missing file", id))
        })?;

        let now = Utc::now();
        record.status = ApprovalStatus::Annotated;
        record.annotation = Some(message.to_string());
        record.updated_at = now;
        file.status = FileStatus::Draft;
        file.updated_at = now;
        Ok(())
    }

    async fn finalize(&self, id: ApprovalId, expected_order: i32) -> SignoffResult<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let record = state
            .approvals
            .get_mut(&id)
            .ok_or(SignoffError::ApprovalNotFound(id))?;
        if record.current_order != expected_order || record.status != ApprovalStatus::OnApproval {
            return Err(SignoffError::ConcurrentUpdate(id));
        }
        let file = state.files.get_mut(&record.file_id).ok_or_else(|| {
            SignoffError::storage(format!("approval {} references missing file", id))
        })?;

        let now = Utc::now();
        record.status = ApprovalStatus::Approved;
        record.updated_at = now;
        file.status = FileStatus::Approved;
        file.updated_at = now;
        Ok(())
    }

    async fn pending_for_user(&self, user: UserId) -> SignoffResult<Vec<ApprovalRecord>> {
        let state = self.read()?;
        let mut records: Vec<_> = state
            .approvals
            .values()
            .filter(|r| r.status == ApprovalStatus::OnApproval)
            .filter(|r| {
                state
                    .workflows
                    .get(&r.workflow_id)
                    .and_then(|def| def.approver_at(r.current_order))
                    == Some(user)
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn workflow_has_open_records(&self, workflow: WorkflowId) -> SignoffResult<bool> {
        Ok(self
            .read()?
            .approvals
            .values()
            .any(|r| r.workflow_id == workflow && r.status == ApprovalStatus::OnApproval))
    }
}
