//! Integration tests for the christopher-store crate.
//!
//! These tests hammer one store from many tasks to check that exchanges on
//! the same thread stay paired.

use std::collections::HashSet;

use christopher_store::{ThreadStore, USER_SENDER};

#[tokio::test]
async fn concurrent_exchanges_never_interleave() {
    let store = ThreadStore::new();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .record_exchange("shared", &format!("q{i}"), "math", &format!("a{i}"))
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let thread = store.get_thread("shared");
    assert_eq!(thread.len(), 64);
    for pair in thread.chunks(2) {
        assert_eq!(pair[0].sender, USER_SENDER);
        assert_eq!(pair[1].sender, "math");
        let n = pair[0].content.trim_start_matches('q');
        assert_eq!(pair[1].content, format!("a{n}"));
    }

    let ids: HashSet<_> = thread.iter().map(|m| m.id.clone()).collect();
    assert_eq!(ids.len(), 64);
}

#[tokio::test]
async fn threads_are_independent() {
    let store = ThreadStore::new();

    let mut tasks = Vec::new();
    for t in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..10 {
                store
                    .save_message(&format!("thread-{t}"), "user", &format!("{i}"))
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.list_threads().len(), 8);
    for t in 0..8 {
        let contents: Vec<_> = store
            .get_thread(&format!("thread-{t}"))
            .into_iter()
            .map(|m| m.content)
            .collect();
        let expected: Vec<_> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(contents, expected);
    }
}
