//! Races between concurrent callers of the session store.

use parley_core::{ConversationTurn, Role};
use parley_session::SessionStore;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_first_access_creates_one_session() {
    let store = Arc::new(SessionStore::new());

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_or_create("shared").await })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.expect("task panicked"));
    }

    assert_eq!(store.len().await, 1);
    let first = &handles[0];
    assert!(handles.iter().all(|h| h.same_as(first)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn distinct_users_get_distinct_sessions() {
    let store = Arc::new(SessionStore::new());

    let tasks: Vec<_> = (0..100)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let user = format!("user-{i}");
                store.get_or_create(&user).await;
                store
                    .append_turns(
                        &user,
                        [
                            ConversationTurn::user(format!("q{i}")),
                            ConversationTurn::model(format!("a{i}")),
                        ],
                    )
                    .await
                    .expect("session exists")
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.expect("task panicked"), 2);
    }

    assert_eq!(store.len().await, 100);
    for i in 0..100 {
        let handle = store.get(&format!("user-{i}")).await.expect("session exists");
        assert_eq!(
            handle.turns().await,
            vec![
                ConversationTurn::user(format!("q{i}")),
                ConversationTurn::model(format!("a{i}")),
            ]
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_appends_never_interleave() {
    let store = Arc::new(SessionStore::new());
    store.get_or_create("u1").await;

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                store
                    .append_turns(
                        "u1",
                        [
                            ConversationTurn::user(format!("q{i}")),
                            ConversationTurn::model(format!("a{i}")),
                        ],
                    )
                    .await
                    .expect("session exists");
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("task panicked");
    }

    let turns = store.get("u1").await.expect("session exists").turns().await;
    assert_eq!(turns.len(), 100);

    // Whatever order the pairs landed in, each query is followed directly
    // by its own reply.
    for pair in turns.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Model);
        assert_eq!(pair[0].text[1..], pair[1].text[1..]);
    }
}
