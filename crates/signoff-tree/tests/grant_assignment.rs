//! Grant administration feeds the tree view: what the registry hands out is
//! exactly what the active view shows.

use signoff_access::{AccessResolver, PrincipalRegistry, ADMIN_ROLE};
use signoff_store::{MemoryStore, PrincipalStore, TreeStore};
use signoff_tree::TreeService;
use signoff_types::{SignoffError, User};
use std::sync::Arc;

async fn stack() -> (
    Arc<MemoryStore>,
    Arc<TreeService>,
    PrincipalRegistry,
    User,
    User,
) {
    let store = Arc::new(MemoryStore::new());
    let admin_role = store.create_role(ADMIN_ROLE).await.unwrap();
    let admin = store.create_user("root", admin_role.id).await.unwrap();
    let clerk_role = store.create_role("clerk").await.unwrap();
    let clerk = store.create_user("clerk", clerk_role.id).await.unwrap();

    let access = AccessResolver::new(store.clone(), store.clone());
    let tree = Arc::new(TreeService::new(store.clone(), access.clone()));
    let registry = PrincipalRegistry::new(store.clone(), store.clone(), tree.clone(), access);
    (store, tree, registry, admin, clerk)
}

#[tokio::test]
async fn assigned_grants_open_the_active_view() {
    let (_store, tree, registry, admin, clerk) = stack().await;

    let dir = tree.create_directory(admin.id, None, "plant").await.unwrap();
    let file = tree.create_file(admin.id, dir.id, "pump.pdf").await.unwrap();

    assert!(matches!(
        tree.get_tree(clerk.id, false).await,
        Err(SignoffError::AccessDenied)
    ));

    registry
        .assign_user(admin.id, clerk.id, &[dir.id], &[file.id])
        .await
        .unwrap();
    let view = tree.get_tree(clerk.id, false).await.unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].files[0].id, file.id);

    registry
        .remove_user_relations(admin.id, clerk.id)
        .await
        .unwrap();
    assert!(matches!(
        tree.get_tree(clerk.id, false).await,
        Err(SignoffError::AccessDenied)
    ));
}

#[tokio::test]
async fn deleting_a_user_drops_their_grants_but_not_their_nodes() {
    let (store, tree, registry, admin, clerk) = stack().await;
    let dir = tree.create_directory(clerk.id, None, "mine").await.unwrap();
    assert!(store.has_directory_grant(clerk.id, dir.id).await.unwrap());

    registry.delete_user(admin.id, clerk.id).await.unwrap();
    assert!(!store.has_directory_grant(clerk.id, dir.id).await.unwrap());
    assert!(store.get_directory(dir.id).await.unwrap().is_some());
}
