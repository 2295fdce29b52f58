//! Store-level tests against a real temp-file database, focused on the
//! multi-row read paths. Rows must be decoded while the statement cursor
//! is on them; these tests fail if decoding slips back outside the loop.

use crate::db::{BlockStore, DatabaseService, TursoStore};
use crate::models::Block;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

async fn test_store() -> (tempfile::TempDir, Arc<dyn BlockStore>) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db = Arc::new(
        DatabaseService::new(dir.path().join("blocks.db"))
            .await
            .expect("Failed to create database"),
    );
    (dir, Arc::new(TursoStore::new(db)))
}

#[tokio::test]
async fn projection_decodes_every_row() {
    let (_dir, store) = test_store().await;
    let root = Uuid::new_v4();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    store
        .create_block(Block::with_id(root, Some("root".to_string()), json!({}), None, 1))
        .await
        .expect("create root");
    store
        .create_block(Block::with_id(
            a,
            Some("a".to_string()),
            json!({"text": "alpha"}),
            Some(root),
            1,
        ))
        .await
        .expect("create a");
    store
        .create_block(Block::with_id(b, None, json!({"text": "beta"}), Some(root), 2))
        .await
        .expect("create b");

    let unknown = Uuid::new_v4();
    let projection = store
        .load_projection(&[root, a, b, unknown])
        .await
        .expect("load projection");

    assert_eq!(projection.len(), 3);
    assert!(!projection.contains_key(&unknown));

    let got_a = &projection[&a];
    assert_eq!(got_a.title.as_deref(), Some("a"));
    assert_eq!(got_a.data, json!({"text": "alpha"}));
    assert_eq!(got_a.parent_id, Some(root));
    assert_eq!(got_a.creator_id, 1);

    let got_b = &projection[&b];
    assert_eq!(got_b.title, None);
    assert_eq!(got_b.data, json!({"text": "beta"}));
    assert_eq!(got_b.creator_id, 2);
    assert_eq!(projection[&root].parent_id, None);
}

#[tokio::test]
async fn children_decode_with_all_fields() {
    let (_dir, store) = test_store().await;
    let root = Uuid::new_v4();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    store
        .create_block(Block::with_id(root, Some("root".to_string()), json!({}), None, 1))
        .await
        .expect("create root");
    for (id, title) in [(first, "first"), (second, "second")] {
        store
            .create_block(Block::with_id(
                id,
                Some(title.to_string()),
                json!({"n": title}),
                Some(root),
                1,
            ))
            .await
            .expect("create child");
    }

    let children = store.list_children(root).await.expect("list children");

    assert_eq!(children.len(), 2);
    for child in &children {
        assert_eq!(child.parent_id, Some(root));
        assert_eq!(child.creator_id, 1);
        let title = child.title.as_deref().expect("title");
        assert_eq!(child.data, json!({"n": title}));
    }
    let titles: Vec<&str> = children.iter().filter_map(|c| c.title.as_deref()).collect();
    assert!(titles.contains(&"first") && titles.contains(&"second"));
}
