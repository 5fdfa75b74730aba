//! Shared domain types for the signoff services.
//!
//! This crate defines the vocabulary every other signoff crate speaks:
//! - typed identifiers for principals, workflows, tree nodes, and approvals
//! - status enums with their stable storage spellings
//! - domain entities and the DTOs read surfaces return
//! - the `SignoffError` taxonomy with its transport-facing classification
//! - the cross-service contract between workflow logic and the file tree
//!
//! Design stance:
//! - Identifiers are opaque `i64` newtypes allocated by the store.
//! - Statuses are closed enums; unknown storage spellings are data corruption,
//!   not extensibility points.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod approval;
pub mod contract;
mod error;
mod id;
mod node;
mod principal;
mod status;
mod workflow;

pub use approval::{ApprovalRecord, PendingApproval};
pub use contract::FileDirectoryService;
pub use error::{ErrorKind, SignoffError, SignoffResult};
pub use id::{ApprovalId, DirectoryId, FileId, RoleId, UserId, WorkflowId};
pub use node::{DirectoryNode, FileNode, FileSummary, FileWithDirectory, TreeDirectory, UserGrants};
pub use principal::{Role, RoleUsers, User};
pub use status::{ApprovalStatus, DirectoryStatus, FileStatus};
pub use workflow::{validate_stages, WorkflowDefinition, WorkflowStage, WorkflowSummary};
