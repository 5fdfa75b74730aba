//! Property tests: random directory trees keep the deletion and visibility
//! invariants.
//!
//! Subtree deletion is all-or-nothing: it removes every descendant exactly
//! when no descendant file has left draft, and otherwise changes nothing.
//! Tree loading partitions nodes by archive status and access grants.

use proptest::prelude::*;
use proptest::sample::Index;
use signoff_store::{MemoryStore, PrincipalStore, TreeScope, TreeStore};
use signoff_types::{DirectoryId, DirectoryNode, DirectoryStatus, FileId, FileStatus, SignoffError};
use std::collections::HashSet;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate a random file status, biased toward draft so deletable subtrees
/// stay common.
fn arb_file_status() -> impl Strategy<Value = FileStatus> {
    prop_oneof![
        4 => Just(FileStatus::Draft),
        1 => Just(FileStatus::OnApproval),
        1 => Just(FileStatus::Annotated),
        1 => Just(FileStatus::Approved),
        1 => Just(FileStatus::Archive),
    ]
}

/// Transitive closure of `target` over the recorded parent edges.
fn expected_subtree(directories: &[DirectoryNode], target: DirectoryId) -> HashSet<DirectoryId> {
    let mut subtree = HashSet::new();
    subtree.insert(target);
    loop {
        let before = subtree.len();
        for dir in directories {
            if let Some(parent) = dir.parent_id {
                if subtree.contains(&parent) {
                    subtree.insert(dir.id);
                }
            }
        }
        if subtree.len() == before {
            return subtree;
        }
    }
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Deleting a random directory in a random forest removes exactly its
    /// subtree when every descendant file is draft, and otherwise fails
    /// without touching a single node.
    #[test]
    fn subtree_delete_is_all_or_nothing(
        dir_count in 1usize..8,
        parent_picks in prop::collection::vec(any::<Index>(), 8),
        file_picks in prop::collection::vec((any::<Index>(), arb_file_status()), 0..12),
        target_pick in any::<Index>(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = MemoryStore::new();
            let role = store.create_role("author").await.unwrap();
            let owner = store.create_user("author", role.id).await.unwrap();

            // Random parent-pointer forest: each directory hangs under an
            // earlier one or starts a new root.
            let mut directories: Vec<DirectoryNode> = Vec::new();
            for i in 0..dir_count {
                let parent = if i == 0 {
                    None
                } else {
                    match parent_picks[i].index(i + 1) {
                        0 => None,
                        pick => Some(directories[pick - 1].id),
                    }
                };
                let dir = store
                    .insert_directory(parent, &format!("d{i}"), owner.id)
                    .await
                    .unwrap();
                directories.push(dir);
            }

            let mut files: Vec<(FileId, DirectoryId, FileStatus)> = Vec::new();
            for (pick, status) in &file_picks {
                let dir = directories[pick.index(directories.len())].id;
                let file = store
                    .insert_file(dir, "doc", owner.id, Uuid::new_v4())
                    .await
                    .unwrap();
                if *status != FileStatus::Draft {
                    store.update_file_status(file.id, *status).await.unwrap();
                }
                files.push((file.id, dir, *status));
            }

            let target = directories[target_pick.index(directories.len())].id;
            let subtree = expected_subtree(&directories, target);
            let blocked = files
                .iter()
                .any(|(_, dir, status)| subtree.contains(dir) && *status != FileStatus::Draft);

            let result = store.delete_directory_tree(target).await;

            if blocked {
                prop_assert!(matches!(
                    result,
                    Err(SignoffError::DirectoryContainsNonDraftFiles(_))
                ));
                for dir in &directories {
                    prop_assert!(store.get_directory(dir.id).await.unwrap().is_some());
                }
                for (file, _, _) in &files {
                    prop_assert!(store.get_file(*file).await.unwrap().is_some());
                }
            } else {
                prop_assert!(result.is_ok());
                for dir in &directories {
                    let survives = store.get_directory(dir.id).await.unwrap().is_some();
                    prop_assert_eq!(survives, !subtree.contains(&dir.id));
                }
                for (file, dir, _) in &files {
                    let survives = store.get_file(*file).await.unwrap().is_some();
                    prop_assert_eq!(survives, !subtree.contains(dir));
                }
            }
            Ok(())
        })?;
    }

    /// The archive scope shows exactly the archived nodes to everyone, and
    /// the active scope shows exactly the granted non-archive nodes.
    #[test]
    fn tree_scopes_partition_by_status_and_grant(
        dir_count in 1usize..6,
        archive_picks in prop::collection::vec(any::<bool>(), 6),
        file_picks in prop::collection::vec((any::<Index>(), arb_file_status()), 0..10),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = MemoryStore::new();
            let role = store.create_role("author").await.unwrap();
            let owner = store.create_user("author", role.id).await.unwrap();
            let outsider = store.create_user("outsider", role.id).await.unwrap();

            let mut directories: Vec<DirectoryNode> = Vec::new();
            for i in 0..dir_count {
                let dir = store
                    .insert_directory(None, &format!("d{i}"), owner.id)
                    .await
                    .unwrap();
                if archive_picks[i] {
                    store
                        .update_directory_status(dir.id, DirectoryStatus::Archive)
                        .await
                        .unwrap();
                }
                directories.push(dir);
            }
            let archived: HashSet<DirectoryId> = directories
                .iter()
                .enumerate()
                .filter(|(i, _)| archive_picks[*i])
                .map(|(_, d)| d.id)
                .collect();

            let mut files: Vec<(FileId, DirectoryId, FileStatus)> = Vec::new();
            for (pick, status) in &file_picks {
                let dir = directories[pick.index(directories.len())].id;
                let file = store
                    .insert_file(dir, "doc", owner.id, Uuid::new_v4())
                    .await
                    .unwrap();
                if *status != FileStatus::Draft {
                    store.update_file_status(file.id, *status).await.unwrap();
                }
                files.push((file.id, dir, *status));
            }

            let archive = store.load_tree(TreeScope::Archive).await.unwrap();
            prop_assert_eq!(archive.len(), archived.len());
            for entry in &archive {
                prop_assert!(archived.contains(&entry.directory.id));
                for file in &entry.files {
                    prop_assert_eq!(file.status, FileStatus::Archive);
                }
            }
            // Every archived file under an archived directory is present.
            for (file, dir, status) in &files {
                if archived.contains(dir) && *status == FileStatus::Archive {
                    prop_assert!(archive
                        .iter()
                        .any(|entry| entry.files.iter().any(|f| f.id == *file)));
                }
            }

            let active = store.load_tree(TreeScope::Active(owner.id)).await.unwrap();
            prop_assert_eq!(active.len(), dir_count - archived.len());
            for entry in &active {
                prop_assert!(!archived.contains(&entry.directory.id));
                for file in &entry.files {
                    prop_assert_ne!(file.status, FileStatus::Archive);
                }
            }

            // No grants, no active view.
            let empty = store
                .load_tree(TreeScope::Active(outsider.id))
                .await
                .unwrap();
            prop_assert!(empty.is_empty());
            Ok(())
        })?;
    }
}
