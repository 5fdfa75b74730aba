//! PostgreSQL adapter for the signoff storage traits.
//!
//! This adapter is the transactional source-of-truth backend. Multi-entity
//! writes (approval record plus file status, subtree deletion, grant swaps)
//! run inside a single transaction, and stage transitions are guarded
//! compare-and-set updates so concurrent reviewers cannot double-advance a
//! record.

use crate::traits::{ApprovalStore, PrincipalStore, TreeScope, TreeStore, WorkflowStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signoff_types::{
    ApprovalId, ApprovalRecord, ApprovalStatus, DirectoryId, DirectoryNode, DirectoryStatus,
    FileId, FileNode, FileStatus, FileSummary, FileWithDirectory, Role, RoleId, RoleUsers,
    SignoffError, SignoffResult, TreeDirectory, User, UserGrants, UserId, WorkflowDefinition,
    WorkflowId, WorkflowStage, WorkflowSummary,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Acquire, Row};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const SERIALIZATION_FAILURE: &str = "40001";

/// PostgreSQL-backed signoff storage adapter.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL and initialize the required schema.
    pub async fn connect(database_url: &str) -> SignoffResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> SignoffResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| SignoffError::storage(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> SignoffResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> SignoffResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS signoff_roles (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signoff_users (
                id BIGSERIAL PRIMARY KEY,
                login TEXT NOT NULL UNIQUE,
                role_id BIGINT NOT NULL REFERENCES signoff_roles(id),
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE SEQUENCE IF NOT EXISTS signoff_workflow_ids",
            r#"
            CREATE TABLE IF NOT EXISTS signoff_workflow_stages (
                workflow_id BIGINT NOT NULL,
                stage_order INT NOT NULL,
                approver_id BIGINT NOT NULL REFERENCES signoff_users(id),
                name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (workflow_id, stage_order)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signoff_directories (
                id BIGSERIAL PRIMARY KEY,
                parent_id BIGINT REFERENCES signoff_directories(id),
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                workflow_id BIGINT,
                version INT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signoff_files (
                id BIGSERIAL PRIMARY KEY,
                directory_id BIGINT NOT NULL REFERENCES signoff_directories(id),
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                version INT NOT NULL,
                content_key UUID NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signoff_directory_grants (
                user_id BIGINT NOT NULL,
                directory_id BIGINT NOT NULL REFERENCES signoff_directories(id),
                PRIMARY KEY (user_id, directory_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signoff_file_grants (
                user_id BIGINT NOT NULL,
                file_id BIGINT NOT NULL REFERENCES signoff_files(id),
                PRIMARY KEY (user_id, file_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signoff_approvals (
                id BIGSERIAL PRIMARY KEY,
                file_id BIGINT NOT NULL REFERENCES signoff_files(id),
                workflow_id BIGINT NOT NULL,
                current_order INT NOT NULL,
                status TEXT NOT NULL,
                annotation TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS signoff_directories_parent_idx ON signoff_directories (parent_id)",
            "CREATE INDEX IF NOT EXISTS signoff_files_directory_idx ON signoff_files (directory_id)",
            "CREATE INDEX IF NOT EXISTS signoff_approvals_file_idx ON signoff_approvals (file_id)",
            "CREATE INDEX IF NOT EXISTS signoff_approvals_status_idx ON signoff_approvals (status)",
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| SignoffError::storage(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PrincipalStore for PostgresStore {
    async fn create_role(&self, name: &str) -> SignoffResult<Role> {
        let row = sqlx::query("INSERT INTO signoff_roles (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if pg_code_is(&e, UNIQUE_VIOLATION) {
                    return SignoffError::RoleAlreadyExists(name.to_string());
                }
                db_error(e)
            })?;
        Ok(Role {
            id: RoleId::new(row.try_get("id").map_err(db_error)?),
            name: name.to_string(),
        })
    }

    async fn rename_role(&self, id: RoleId, name: &str) -> SignoffResult<()> {
        let result = sqlx::query("UPDATE signoff_roles SET name = $2 WHERE id = $1")
            .bind(id.0)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if pg_code_is(&e, UNIQUE_VIOLATION) {
                    return SignoffError::RoleAlreadyExists(name.to_string());
                }
                db_error(e)
            })?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::RoleNotFound(id));
        }
        Ok(())
    }

    async fn delete_role(&self, id: RoleId) -> SignoffResult<()> {
        let result = sqlx::query("DELETE FROM signoff_roles WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if pg_code_is(&e, FOREIGN_KEY_VIOLATION) {
                    return SignoffError::RoleInUse(id);
                }
                db_error(e)
            })?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::RoleNotFound(id));
        }
        Ok(())
    }

    async fn get_role(&self, id: RoleId) -> SignoffResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name FROM signoff_roles WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(role_from_row).transpose()
    }

    async fn get_role_by_name(&self, name: &str) -> SignoffResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name FROM signoff_roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(role_from_row).transpose()
    }

    async fn list_roles(&self) -> SignoffResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name FROM signoff_roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.into_iter().map(role_from_row).collect()
    }

    async fn role_in_use(&self, id: RoleId) -> SignoffResult<bool> {
        let row =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM signoff_users WHERE role_id = $1) AS held")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        row.try_get("held").map_err(db_error)
    }

    async fn create_user(&self, login: &str, role: RoleId) -> SignoffResult<User> {
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO signoff_users (login, role_id, created_at) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(login)
        .bind(role.0)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if pg_code_is(&e, UNIQUE_VIOLATION) {
                return SignoffError::UserAlreadyExists(login.to_string());
            }
            if pg_code_is(&e, FOREIGN_KEY_VIOLATION) {
                return SignoffError::RoleNotFound(role);
            }
            db_error(e)
        })?;
        Ok(User {
            id: UserId::new(row.try_get("id").map_err(db_error)?),
            login: login.to_string(),
            role_id: role,
            created_at: now,
        })
    }

    async fn update_user(&self, id: UserId, login: &str, role: RoleId) -> SignoffResult<()> {
        let result = sqlx::query("UPDATE signoff_users SET login = $2, role_id = $3 WHERE id = $1")
            .bind(id.0)
            .bind(login)
            .bind(role.0)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if pg_code_is(&e, UNIQUE_VIOLATION) {
                    return SignoffError::UserAlreadyExists(login.to_string());
                }
                if pg_code_is(&e, FOREIGN_KEY_VIOLATION) {
                    return SignoffError::RoleNotFound(role);
                }
                db_error(e)
            })?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::UserNotFound(id));
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> SignoffResult<()> {
        let result = sqlx::query("DELETE FROM signoff_users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if pg_code_is(&e, FOREIGN_KEY_VIOLATION) {
                    return SignoffError::UserInWorkflow(id);
                }
                db_error(e)
            })?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::UserNotFound(id));
        }
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> SignoffResult<Option<User>> {
        let row =
            sqlx::query("SELECT id, login, role_id, created_at FROM signoff_users WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(user_from_row).transpose()
    }

    async fn get_user_by_login(&self, login: &str) -> SignoffResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, login, role_id, created_at FROM signoff_users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(user_from_row).transpose()
    }

    async fn get_user_role(&self, id: UserId) -> SignoffResult<Role> {
        let row = sqlx::query(
            r#"
            SELECT r.id, r.name
              FROM signoff_users u
              JOIN signoff_roles r ON r.id = u.role_id
             WHERE u.id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        match row {
            Some(row) => role_from_row(row),
            None => Err(SignoffError::UserNotFound(id)),
        }
    }

    async fn missing_user(&self, ids: &[UserId]) -> SignoffResult<Option<UserId>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query("SELECT id FROM signoff_users WHERE id = ANY($1)")
            .bind(&raw)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        let found = ids_from_rows(rows)?;
        Ok(ids.iter().find(|id| !found.contains(&id.0)).copied())
    }

    async fn list_users_grouped(&self) -> SignoffResult<Vec<RoleUsers>> {
        let roles = self.list_roles().await?;
        let rows =
            sqlx::query("SELECT id, login, role_id, created_at FROM signoff_users ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        let users: Vec<User> = rows
            .into_iter()
            .map(user_from_row)
            .collect::<SignoffResult<_>>()?;

        let mut by_role: HashMap<RoleId, Vec<User>> = HashMap::new();
        for user in users {
            by_role.entry(user.role_id).or_default().push(user);
        }
        Ok(roles
            .into_iter()
            .map(|role| {
                let users = by_role.remove(&role.id).unwrap_or_default();
                RoleUsers { role, users }
            })
            .collect())
    }
}

#[async_trait]
impl WorkflowStore for PostgresStore {
    async fn create_workflow(
        &self,
        name: &str,
        stages: &[WorkflowStage],
    ) -> SignoffResult<WorkflowDefinition> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let row = sqlx::query("SELECT nextval('signoff_workflow_ids') AS workflow_id")
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error)?;
        let id: i64 = row.try_get("workflow_id").map_err(db_error)?;

        let now = Utc::now();
        let mut ordered = stages.to_vec();
        ordered.sort_by_key(|s| s.order);
        for stage in &ordered {
            sqlx::query(
                r#"
                INSERT INTO signoff_workflow_stages
                    (workflow_id, stage_order, approver_id, name, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                "#,
            )
            .bind(id)
            .bind(stage.order)
            .bind(stage.approver.0)
            .bind(name)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;

        Ok(WorkflowDefinition {
            id: WorkflowId::new(id),
            name: name.to_string(),
            stages: ordered,
            created_at: now,
            updated_at: now,
        })
    }

    async fn replace_workflow(
        &self,
        id: WorkflowId,
        name: &str,
        stages: &[WorkflowStage],
    ) -> SignoffResult<WorkflowDefinition> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let row = sqlx::query(
            "SELECT MIN(created_at) AS created_at FROM signoff_workflow_stages WHERE workflow_id = $1",
        )
        .bind(id.0)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;
        let created_at: Option<DateTime<Utc>> = row.try_get("created_at").map_err(db_error)?;
        let Some(created_at) = created_at else {
            return Err(SignoffError::WorkflowNotFound(id));
        };

        sqlx::query("DELETE FROM signoff_workflow_stages WHERE workflow_id = $1")
            .bind(id.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;

        let now = Utc::now();
        let mut ordered = stages.to_vec();
        ordered.sort_by_key(|s| s.order);
        for stage in &ordered {
            sqlx::query(
                r#"
                INSERT INTO signoff_workflow_stages
                    (workflow_id, stage_order, approver_id, name, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id.0)
            .bind(stage.order)
            .bind(stage.approver.0)
            .bind(name)
            .bind(created_at)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;

        Ok(WorkflowDefinition {
            id,
            name: name.to_string(),
            stages: ordered,
            created_at,
            updated_at: now,
        })
    }

    async fn delete_workflow(&self, id: WorkflowId) -> SignoffResult<()> {
        let result = sqlx::query("DELETE FROM signoff_workflow_stages WHERE workflow_id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::WorkflowNotFound(id));
        }
        Ok(())
    }

    async fn get_workflow(&self, id: WorkflowId) -> SignoffResult<Option<WorkflowDefinition>> {
        let rows = sqlx::query(
            r#"
            SELECT stage_order, approver_id, name, created_at, updated_at
              FROM signoff_workflow_stages
             WHERE workflow_id = $1
             ORDER BY stage_order
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let name: String = first.try_get("name").map_err(db_error)?;
        let created_at: DateTime<Utc> = first.try_get("created_at").map_err(db_error)?;
        let updated_at: DateTime<Utc> = first.try_get("updated_at").map_err(db_error)?;

        let mut stages = Vec::with_capacity(rows.len());
        for row in &rows {
            let order: i32 = row.try_get("stage_order").map_err(db_error)?;
            let approver: i64 = row.try_get("approver_id").map_err(db_error)?;
            stages.push(WorkflowStage::new(order, UserId::new(approver)));
        }

        Ok(Some(WorkflowDefinition {
            id,
            name,
            stages,
            created_at,
            updated_at,
        }))
    }

    async fn list_workflows(&self) -> SignoffResult<Vec<WorkflowSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT workflow_id, MIN(name) AS name, COUNT(*)::INT AS stage_count
              FROM signoff_workflow_stages
             GROUP BY workflow_id
             ORDER BY MIN(name), workflow_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(WorkflowSummary {
                    id: WorkflowId::new(row.try_get("workflow_id").map_err(db_error)?),
                    name: row.try_get("name").map_err(db_error)?,
                    stage_count: row.try_get("stage_count").map_err(db_error)?,
                })
            })
            .collect()
    }

    async fn workflow_exists(&self, id: WorkflowId) -> SignoffResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM signoff_workflow_stages WHERE workflow_id = $1) AS known",
        )
        .bind(id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        row.try_get("known").map_err(db_error)
    }

    async fn user_in_any_workflow(&self, user: UserId) -> SignoffResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM signoff_workflow_stages WHERE approver_id = $1) AS held",
        )
        .bind(user.0)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        row.try_get("held").map_err(db_error)
    }
}

#[async_trait]
impl TreeStore for PostgresStore {
    async fn insert_directory(
        &self,
        parent: Option<DirectoryId>,
        name: &str,
        owner: UserId,
    ) -> SignoffResult<DirectoryNode> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        if let Some(parent) = parent {
            let row =
                sqlx::query("SELECT EXISTS(SELECT 1 FROM signoff_directories WHERE id = $1) AS known")
                    .bind(parent.0)
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(db_error)?;
            let known: bool = row.try_get("known").map_err(db_error)?;
            if !known {
                return Err(SignoffError::DirectoryNotFound(parent));
            }
        }

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO signoff_directories
                (parent_id, name, status, workflow_id, version, created_at, updated_at)
            VALUES ($1, $2, $3, NULL, 1, $4, $4)
            RETURNING id
            "#,
        )
        .bind(parent.map(|p| p.0))
        .bind(name)
        .bind(DirectoryStatus::Draft.as_str())
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;
        let id: i64 = row.try_get("id").map_err(db_error)?;

        sqlx::query("INSERT INTO signoff_directory_grants (user_id, directory_id) VALUES ($1, $2)")
            .bind(owner.0)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        Ok(DirectoryNode {
            id: DirectoryId::new(id),
            parent_id: parent,
            name: name.to_string(),
            status: DirectoryStatus::Draft,
            workflow_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    async fn insert_file(
        &self,
        directory: DirectoryId,
        name: &str,
        owner: UserId,
        content_key: Uuid,
    ) -> SignoffResult<FileNode> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let row =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM signoff_directories WHERE id = $1) AS known")
                .bind(directory.0)
                .fetch_one(&mut *conn)
                .await
                .map_err(db_error)?;
        let known: bool = row.try_get("known").map_err(db_error)?;
        if !known {
            return Err(SignoffError::DirectoryNotFound(directory));
        }

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO signoff_files
                (directory_id, name, status, version, content_key, created_at, updated_at)
            VALUES ($1, $2, $3, 1, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(directory.0)
        .bind(name)
        .bind(FileStatus::Draft.as_str())
        .bind(content_key)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;
        let id: i64 = row.try_get("id").map_err(db_error)?;

        sqlx::query("INSERT INTO signoff_file_grants (user_id, file_id) VALUES ($1, $2)")
            .bind(owner.0)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        Ok(FileNode {
            id: FileId::new(id),
            directory_id: directory,
            name: name.to_string(),
            status: FileStatus::Draft,
            version: 1,
            content_key,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_directory(&self, id: DirectoryId) -> SignoffResult<Option<DirectoryNode>> {
        let row = sqlx::query(
            r#"
            SELECT id, parent_id, name, status, workflow_id, version, created_at, updated_at
              FROM signoff_directories
             WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(directory_from_row).transpose()
    }

    async fn get_file(&self, id: FileId) -> SignoffResult<Option<FileNode>> {
        let row = sqlx::query(
            r#"
            SELECT id, directory_id, name, status, version, content_key, created_at, updated_at
              FROM signoff_files
             WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(file_from_row).transpose()
    }

    async fn get_file_with_directory(
        &self,
        id: FileId,
    ) -> SignoffResult<Option<FileWithDirectory>> {
        let Some(file) = self.get_file(id).await? else {
            return Ok(None);
        };
        let directory = self.get_directory(file.directory_id).await?.ok_or_else(|| {
            SignoffError::storage(format!(
                "file {} references missing directory {}",
                id, file.directory_id
            ))
        })?;
        Ok(Some(FileWithDirectory { file, directory }))
    }

    async fn get_files_info(&self, ids: &[FileId]) -> SignoffResult<Vec<FileSummary>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query(
            "SELECT id, name, status FROM signoff_files WHERE id = ANY($1) ORDER BY id",
        )
        .bind(&raw)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|row| {
                let status: String = row.try_get("status").map_err(db_error)?;
                Ok(FileSummary {
                    id: FileId::new(row.try_get("id").map_err(db_error)?),
                    name: row.try_get("name").map_err(db_error)?,
                    status: parse_file_status(&status)?,
                })
            })
            .collect()
    }

    async fn missing_directory(&self, ids: &[DirectoryId]) -> SignoffResult<Option<DirectoryId>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query("SELECT id FROM signoff_directories WHERE id = ANY($1)")
            .bind(&raw)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        let found = ids_from_rows(rows)?;
        Ok(ids.iter().find(|id| !found.contains(&id.0)).copied())
    }

    async fn missing_file(&self, ids: &[FileId]) -> SignoffResult<Option<FileId>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query("SELECT id FROM signoff_files WHERE id = ANY($1)")
            .bind(&raw)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        let found = ids_from_rows(rows)?;
        Ok(ids.iter().find(|id| !found.contains(&id.0)).copied())
    }

    async fn has_directory_grant(
        &self,
        user: UserId,
        directory: DirectoryId,
    ) -> SignoffResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM signoff_directory_grants
                 WHERE user_id = $1 AND directory_id = $2
            ) AS granted
            "#,
        )
        .bind(user.0)
        .bind(directory.0)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        row.try_get("granted").map_err(db_error)
    }

    async fn has_file_grant(&self, user: UserId, file: FileId) -> SignoffResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM signoff_file_grants
                 WHERE user_id = $1 AND file_id = $2
            ) AS granted
            "#,
        )
        .bind(user.0)
        .bind(file.0)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        row.try_get("granted").map_err(db_error)
    }

    async fn load_tree(&self, scope: TreeScope) -> SignoffResult<Vec<TreeDirectory>> {
        let (directory_rows, file_rows) = match scope {
            TreeScope::Archive => {
                let directories = sqlx::query(
                    r#"
                    SELECT id, parent_id, name, status, workflow_id, version, created_at, updated_at
                      FROM signoff_directories
                     WHERE status = $1
                     ORDER BY id
                    "#,
                )
                .bind(DirectoryStatus::Archive.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
                let files = sqlx::query(
                    r#"
                    SELECT f.id, f.directory_id, f.name, f.status, f.version, f.content_key,
                           f.created_at, f.updated_at
                      FROM signoff_files f
                      JOIN signoff_directories d ON d.id = f.directory_id
                     WHERE d.status = $1 AND f.status = $2
                     ORDER BY f.id
                    "#,
                )
                .bind(DirectoryStatus::Archive.as_str())
                .bind(FileStatus::Archive.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
                (directories, files)
            }
            TreeScope::Active(user) => {
                let directories = sqlx::query(
                    r#"
                    SELECT d.id, d.parent_id, d.name, d.status, d.workflow_id, d.version,
                           d.created_at, d.updated_at
                      FROM signoff_directories d
                      JOIN signoff_directory_grants g ON g.directory_id = d.id
                     WHERE g.user_id = $1 AND d.status <> $2
                     ORDER BY d.id
                    "#,
                )
                .bind(user.0)
                .bind(DirectoryStatus::Archive.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
                let files = sqlx::query(
                    r#"
                    SELECT f.id, f.directory_id, f.name, f.status, f.version, f.content_key,
                           f.created_at, f.updated_at
                      FROM signoff_files f
                      JOIN signoff_file_grants g ON g.file_id = f.id
                      JOIN signoff_directories d ON d.id = f.directory_id
                      JOIN signoff_directory_grants dg ON dg.directory_id = d.id
                     WHERE g.user_id = $1 AND dg.user_id = $1
                       AND d.status <> $2 AND f.status <> $3
                     ORDER BY f.id
                    "#,
                )
                .bind(user.0)
                .bind(DirectoryStatus::Archive.as_str())
                .bind(FileStatus::Archive.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
                (directories, files)
            }
        };

        let directories: Vec<DirectoryNode> = directory_rows
            .into_iter()
            .map(directory_from_row)
            .collect::<SignoffResult<_>>()?;
        let files: Vec<FileNode> = file_rows
            .into_iter()
            .map(file_from_row)
            .collect::<SignoffResult<_>>()?;

        let mut by_directory: HashMap<DirectoryId, Vec<FileNode>> = HashMap::new();
        for file in files {
            by_directory.entry(file.directory_id).or_default().push(file);
        }
        Ok(directories
            .into_iter()
            .map(|directory| {
                let files = by_directory.remove(&directory.id).unwrap_or_default();
                TreeDirectory { directory, files }
            })
            .collect())
    }

    async fn update_file_status(&self, id: FileId, status: FileStatus) -> SignoffResult<()> {
        let result =
            sqlx::query("UPDATE signoff_files SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(id.0)
                .bind(status.as_str())
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::FileNotFound(id));
        }
        Ok(())
    }

    async fn update_directory_status(
        &self,
        id: DirectoryId,
        status: DirectoryStatus,
    ) -> SignoffResult<()> {
        let result = sqlx::query(
            "UPDATE signoff_directories SET status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id.0)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::DirectoryNotFound(id));
        }
        Ok(())
    }

    async fn delete_file(&self, id: FileId) -> SignoffResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let row = sqlx::query("SELECT status FROM signoff_files WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?;
        let Some(row) = row else {
            return Err(SignoffError::FileNotFound(id));
        };
        let status: String = row.try_get("status").map_err(db_error)?;
        if parse_file_status(&status)? != FileStatus::Draft {
            return Err(SignoffError::CannotDeleteNonDraftFile(id));
        }

        sqlx::query("DELETE FROM signoff_approvals WHERE file_id = $1")
            .bind(id.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        sqlx::query("DELETE FROM signoff_file_grants WHERE file_id = $1")
            .bind(id.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        sqlx::query("DELETE FROM signoff_files WHERE id = $1")
            .bind(id.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn delete_directory_tree(&self, id: DirectoryId) -> SignoffResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;

        let rows = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id FROM signoff_directories WHERE id = $1
                UNION ALL
                SELECT d.id
                  FROM signoff_directories d
                  JOIN subtree s ON d.parent_id = s.id
            )
            SELECT id FROM subtree
            "#,
        )
        .bind(id.0)
        .fetch_all(&mut *conn)
        .await
        .map_err(tx_error)?;
        if rows.is_empty() {
            return Err(SignoffError::DirectoryNotFound(id));
        }
        let mut subtree = Vec::with_capacity(rows.len());
        for row in rows {
            subtree.push(row.try_get::<i64, _>("id").map_err(db_error)?);
        }

        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM signoff_files
                 WHERE directory_id = ANY($1) AND status <> $2
            ) AS blocked
            "#,
        )
        .bind(&subtree)
        .bind(FileStatus::Draft.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(tx_error)?;
        let blocked: bool = row.try_get("blocked").map_err(db_error)?;
        if blocked {
            return Err(SignoffError::DirectoryContainsNonDraftFiles(id));
        }

        sqlx::query(
            r#"
            DELETE FROM signoff_approvals
             WHERE file_id IN (SELECT id FROM signoff_files WHERE directory_id = ANY($1))
            "#,
        )
        .bind(&subtree)
        .execute(&mut *conn)
        .await
        .map_err(tx_error)?;
        sqlx::query(
            r#"
            DELETE FROM signoff_file_grants
             WHERE file_id IN (SELECT id FROM signoff_files WHERE directory_id = ANY($1))
            "#,
        )
        .bind(&subtree)
        .execute(&mut *conn)
        .await
        .map_err(tx_error)?;
        sqlx::query("DELETE FROM signoff_files WHERE directory_id = ANY($1)")
            .bind(&subtree)
            .execute(&mut *conn)
            .await
            .map_err(tx_error)?;
        sqlx::query("DELETE FROM signoff_directory_grants WHERE directory_id = ANY($1)")
            .bind(&subtree)
            .execute(&mut *conn)
            .await
            .map_err(tx_error)?;
        sqlx::query("DELETE FROM signoff_directories WHERE id = ANY($1)")
            .bind(&subtree)
            .execute(&mut *conn)
            .await
            .map_err(tx_error)?;
        tx.commit().await.map_err(tx_error)?;
        Ok(())
    }

    async fn workflow_in_use(&self, workflow: WorkflowId) -> SignoffResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM signoff_directories WHERE workflow_id = $1) AS held",
        )
        .bind(workflow.0)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        row.try_get("held").map_err(db_error)
    }

    async fn assign_workflow(
        &self,
        workflow: WorkflowId,
        directories: &[DirectoryId],
    ) -> SignoffResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let raw: Vec<i64> = directories.iter().map(|id| id.0).collect();
        let rows = sqlx::query("SELECT id FROM signoff_directories WHERE id = ANY($1)")
            .bind(&raw)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;
        let found = ids_from_rows(rows)?;
        if let Some(missing) = directories.iter().find(|id| !found.contains(&id.0)) {
            return Err(SignoffError::DirectoryNotFound(*missing));
        }

        sqlx::query(
            "UPDATE signoff_directories SET workflow_id = $2, updated_at = $3 WHERE id = ANY($1)",
        )
        .bind(&raw)
        .bind(workflow.0)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn grants_for_user(&self, user: UserId) -> SignoffResult<UserGrants> {
        let rows = sqlx::query(
            "SELECT directory_id FROM signoff_directory_grants WHERE user_id = $1 ORDER BY directory_id",
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        let mut directories = Vec::with_capacity(rows.len());
        for row in rows {
            directories.push(DirectoryId::new(
                row.try_get("directory_id").map_err(db_error)?,
            ));
        }

        let rows = sqlx::query(
            "SELECT file_id FROM signoff_file_grants WHERE user_id = $1 ORDER BY file_id",
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        let mut files = Vec::with_capacity(rows.len());
        for row in rows {
            files.push(FileId::new(row.try_get("file_id").map_err(db_error)?));
        }

        Ok(UserGrants { directories, files })
    }

    async fn replace_user_grants(
        &self,
        user: UserId,
        directories: &[DirectoryId],
        files: &[FileId],
    ) -> SignoffResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let raw_directories: Vec<i64> = directories.iter().map(|id| id.0).collect();
        let rows = sqlx::query("SELECT id FROM signoff_directories WHERE id = ANY($1)")
            .bind(&raw_directories)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;
        let found = ids_from_rows(rows)?;
        if let Some(missing) = directories.iter().find(|id| !found.contains(&id.0)) {
            return Err(SignoffError::DirectoryNotFound(*missing));
        }

        let raw_files: Vec<i64> = files.iter().map(|id| id.0).collect();
        let rows = sqlx::query("SELECT id FROM signoff_files WHERE id = ANY($1)")
            .bind(&raw_files)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;
        let found = ids_from_rows(rows)?;
        if let Some(missing) = files.iter().find(|id| !found.contains(&id.0)) {
            return Err(SignoffError::FileNotFound(*missing));
        }

        sqlx::query("DELETE FROM signoff_directory_grants WHERE user_id = $1")
            .bind(user.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        sqlx::query("DELETE FROM signoff_file_grants WHERE user_id = $1")
            .bind(user.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        for directory in directories {
            sqlx::query(
                "INSERT INTO signoff_directory_grants (user_id, directory_id) VALUES ($1, $2)",
            )
            .bind(user.0)
            .bind(directory.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        }
        for file in files {
            sqlx::query("INSERT INTO signoff_file_grants (user_id, file_id) VALUES ($1, $2)")
                .bind(user.0)
                .bind(file.0)
                .execute(&mut *conn)
                .await
                .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn remove_user_grants(&self, user: UserId) -> SignoffResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        sqlx::query("DELETE FROM signoff_directory_grants WHERE user_id = $1")
            .bind(user.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        sqlx::query("DELETE FROM signoff_file_grants WHERE user_id = $1")
            .bind(user.0)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl ApprovalStore for PostgresStore {
    async fn open_approval(
        &self,
        file: FileId,
        workflow: WorkflowId,
    ) -> SignoffResult<ApprovalRecord> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let row = sqlx::query("SELECT status FROM signoff_files WHERE id = $1 FOR UPDATE")
            .bind(file.0)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?;
        let Some(row) = row else {
            return Err(SignoffError::FileNotFound(file));
        };
        let status: String = row.try_get("status").map_err(db_error)?;
        let status = parse_file_status(&status)?;
        if status != FileStatus::Draft {
            return Err(SignoffError::InvalidFileStatus { file, status });
        }

        let now = Utc::now();
        sqlx::query("UPDATE signoff_files SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(file.0)
            .bind(FileStatus::OnApproval.as_str())
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;

        let row = sqlx::query(
            r#"
            INSERT INTO signoff_approvals
                (file_id, workflow_id, current_order, status, annotation, created_at, updated_at)
            VALUES ($1, $2, 1, $3, NULL, $4, $4)
            RETURNING id
            "#,
        )
        .bind(file.0)
        .bind(workflow.0)
        .bind(ApprovalStatus::OnApproval.as_str())
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;
        let id: i64 = row.try_get("id").map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        Ok(ApprovalRecord {
            id: ApprovalId::new(id),
            file_id: file,
            workflow_id: workflow,
            current_order: 1,
            status: ApprovalStatus::OnApproval,
            annotation: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_approval(&self, id: ApprovalId) -> SignoffResult<Option<ApprovalRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, file_id, workflow_id, current_order, status, annotation,
                   created_at, updated_at
              FROM signoff_approvals
             WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(approval_from_row).transpose()
    }

    async fn advance_stage(&self, id: ApprovalId, expected_order: i32) -> SignoffResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE signoff_approvals
               SET current_order = current_order + 1,
                   updated_at = $3
             WHERE id = $1
               AND current_order = $2
               AND status = $4
            "#,
        )
        .bind(id.0)
        .bind(expected_order)
        .bind(Utc::now())
        .bind(ApprovalStatus::OnApproval.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            if self.get_approval(id).await?.is_some() {
                return Err(SignoffError::ConcurrentUpdate(id));
            }
            return Err(SignoffError::ApprovalNotFound(id));
        }
        Ok(())
    }

    async fn annotate(
        &self,
        id: ApprovalId,
        expected_order: i32,
        message: &str,
    ) -> SignoffResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE signoff_approvals
               SET status = $4,
                   annotation = $3,
                   updated_at = $5
             WHERE id = $1
               AND current_order = $2
               AND status IN ($4, $6)
            "#,
        )
        .bind(id.0)
        .bind(expected_order)
        .bind(message)
        .bind(ApprovalStatus::Annotated.as_str())
        .bind(now)
        .bind(ApprovalStatus::OnApproval.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            if self.get_approval(id).await?.is_some() {
                return Err(SignoffError::ConcurrentUpdate(id));
            }
            return Err(SignoffError::ApprovalNotFound(id));
        }

        let result = sqlx::query(
            r#"
            UPDATE signoff_files
               SET status = $2, updated_at = $3
             WHERE id = (SELECT file_id FROM signoff_approvals WHERE id = $1)
            "#,
        )
        .bind(id.0)
        .bind(FileStatus::Draft.as_str())
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::storage(format!(
                "approval {id} references missing file"
            )));
        }
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn finalize(&self, id: ApprovalId, expected_order: i32) -> SignoffResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let conn = tx.acquire().await.map_err(db_error)?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE signoff_approvals
               SET status = $3,
                   updated_at = $4
             WHERE id = $1
               AND current_order = $2
               AND status = $5
            "#,
        )
        .bind(id.0)
        .bind(expected_order)
        .bind(ApprovalStatus::Approved.as_str())
        .bind(now)
        .bind(ApprovalStatus::OnApproval.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            if self.get_approval(id).await?.is_some() {
                return Err(SignoffError::ConcurrentUpdate(id));
            }
            return Err(SignoffError::ApprovalNotFound(id));
        }

        let result = sqlx::query(
            r#"
            UPDATE signoff_files
               SET status = $2, updated_at = $3
             WHERE id = (SELECT file_id FROM signoff_approvals WHERE id = $1)
            "#,
        )
        .bind(id.0)
        .bind(FileStatus::Approved.as_str())
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(SignoffError::storage(format!(
                "approval {id} references missing file"
            )));
        }
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn pending_for_user(&self, user: UserId) -> SignoffResult<Vec<ApprovalRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.file_id, a.workflow_id, a.current_order, a.status, a.annotation,
                   a.created_at, a.updated_at
              FROM signoff_approvals a
              JOIN signoff_workflow_stages s
                ON s.workflow_id = a.workflow_id
               AND s.stage_order = a.current_order
             WHERE a.status = $1
               AND s.approver_id = $2
             ORDER BY a.id
            "#,
        )
        .bind(ApprovalStatus::OnApproval.as_str())
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(approval_from_row).collect()
    }

    async fn workflow_has_open_records(&self, workflow: WorkflowId) -> SignoffResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM signoff_approvals
                 WHERE workflow_id = $1 AND status = $2
            ) AS unfinished
            "#,
        )
        .bind(workflow.0)
        .bind(ApprovalStatus::OnApproval.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        row.try_get("unfinished").map_err(db_error)
    }
}

fn role_from_row(row: PgRow) -> SignoffResult<Role> {
    Ok(Role {
        id: RoleId::new(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
    })
}

fn user_from_row(row: PgRow) -> SignoffResult<User> {
    Ok(User {
        id: UserId::new(row.try_get("id").map_err(db_error)?),
        login: row.try_get("login").map_err(db_error)?,
        role_id: RoleId::new(row.try_get("role_id").map_err(db_error)?),
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

fn directory_from_row(row: PgRow) -> SignoffResult<DirectoryNode> {
    let status: String = row.try_get("status").map_err(db_error)?;
    Ok(DirectoryNode {
        id: DirectoryId::new(row.try_get("id").map_err(db_error)?),
        parent_id: row
            .try_get::<Option<i64>, _>("parent_id")
            .map_err(db_error)?
            .map(DirectoryId::new),
        name: row.try_get("name").map_err(db_error)?,
        status: parse_directory_status(&status)?,
        workflow_id: row
            .try_get::<Option<i64>, _>("workflow_id")
            .map_err(db_error)?
            .map(WorkflowId::new),
        version: row.try_get("version").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn file_from_row(row: PgRow) -> SignoffResult<FileNode> {
    let status: String = row.try_get("status").map_err(db_error)?;
    Ok(FileNode {
        id: FileId::new(row.try_get("id").map_err(db_error)?),
        directory_id: DirectoryId::new(row.try_get("directory_id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        status: parse_file_status(&status)?,
        version: row.try_get("version").map_err(db_error)?,
        content_key: row.try_get("content_key").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn approval_from_row(row: PgRow) -> SignoffResult<ApprovalRecord> {
    let status: String = row.try_get("status").map_err(db_error)?;
    Ok(ApprovalRecord {
        id: ApprovalId::new(row.try_get("id").map_err(db_error)?),
        file_id: FileId::new(row.try_get("file_id").map_err(db_error)?),
        workflow_id: WorkflowId::new(row.try_get("workflow_id").map_err(db_error)?),
        current_order: row.try_get("current_order").map_err(db_error)?,
        status: parse_approval_status(&status)?,
        annotation: row.try_get("annotation").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn ids_from_rows(rows: Vec<PgRow>) -> SignoffResult<HashSet<i64>> {
    let mut ids = HashSet::with_capacity(rows.len());
    for row in rows {
        ids.insert(row.try_get::<i64, _>("id").map_err(db_error)?);
    }
    Ok(ids)
}

fn parse_directory_status(raw: &str) -> SignoffResult<DirectoryStatus> {
    DirectoryStatus::parse(raw)
        .ok_or_else(|| SignoffError::storage(format!("unknown directory status `{raw}`")))
}

fn parse_file_status(raw: &str) -> SignoffResult<FileStatus> {
    FileStatus::parse(raw)
        .ok_or_else(|| SignoffError::storage(format!("unknown file status `{raw}`")))
}

fn parse_approval_status(raw: &str) -> SignoffResult<ApprovalStatus> {
    ApprovalStatus::parse(raw)
        .ok_or_else(|| SignoffError::storage(format!("unknown approval status `{raw}`")))
}

fn db_error(err: sqlx::Error) -> SignoffError {
    SignoffError::storage(err.to_string())
}

fn tx_error(err: sqlx::Error) -> SignoffError {
    if pg_code_is(&err, SERIALIZATION_FAILURE) {
        return SignoffError::TransactionConflict(err.to_string());
    }
    db_error(err)
}

fn pg_code_is(err: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some(code);
    }
    false
}
