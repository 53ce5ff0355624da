use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::tempdir;

use super::StateRegistry;
use crate::test_utils::test_config;
use crate::Operation;

#[tokio::test]
async fn test_open_memoizes_projectors() {
    let dir = tempdir().unwrap();
    let registry = StateRegistry::new(&test_config(dir.path()));

    let a = registry.open("a").await.unwrap();
    let again = registry.open("a").await.unwrap();
    let b = registry.open("b").await.unwrap();

    assert!(Arc::ptr_eq(&a, &again));
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(registry.len(), 2);
    assert!(registry.open("../escape").await.unwrap_err().is_user_error());
}

#[tokio::test(start_paused = true)]
async fn test_projector_outlives_idle_log_store() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.log.idle_timeout_in_ms = 1_000;
    let registry = StateRegistry::new(&config);

    let doc = registry.open("doc").await.unwrap();
    doc.apply(&[Operation::add("/a", json!(1))]).await.unwrap();
    let store_id = registry.logs().open("doc").await.unwrap().id();

    tokio::time::advance(Duration::from_millis(1_001)).await;
    // Let the idle timer run the close
    for _ in 0..10 {
        if !registry.logs().contains("doc") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(!registry.logs().contains("doc"));

    let applied = doc.apply(&[Operation::add("/b", json!(2))]).await.unwrap();
    assert_eq!(applied.v, 2);
    assert_ne!(registry.logs().open("doc").await.unwrap().id(), store_id);
    assert_eq!(doc.reload().await.unwrap(), 2);
    assert_eq!(doc.get("/").unwrap(), json!({"a": 1, "b": 2}));
}

#[tokio::test]
async fn test_close_all_forgets_projectors() {
    let dir = tempdir().unwrap();
    let registry = StateRegistry::new(&test_config(dir.path()));
    let doc = registry.open("doc").await.unwrap();
    doc.apply(&[Operation::add("/a", json!(1))]).await.unwrap();

    registry.close_all().await;
    assert!(registry.is_empty());
    assert!(registry.logs().is_empty());

    let reopened = registry.open("doc").await.unwrap();
    assert_eq!(reopened.version(), 1);
    assert_eq!(reopened.get("/a").unwrap(), json!(1));
}
