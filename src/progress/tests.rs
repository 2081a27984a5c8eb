use serde_json::json;

use super::{ProgressEvent, ProgressHub, ProgressSink, SinkError, TestError, TestProgress};
use crate::model::{CheckKind, CheckStatus, OwnerId, SessionId};

fn progress(session_id: SessionId, completed: usize) -> ProgressEvent {
    ProgressEvent::Progress(TestProgress {
        session_id,
        domain_name: "example.com".into(),
        total_tests: 4,
        completed_tests: completed,
        current_test: CheckKind::Dkim,
        status: CheckStatus::Running,
        results: Vec::new(),
    })
}

#[test]
fn events_serialize_with_type_and_data() {
    let session_id = SessionId::new();
    let value = serde_json::to_value(progress(session_id, 2)).unwrap();
    assert_eq!(value["type"], json!("test_progress"));
    assert_eq!(value["data"]["sessionId"], json!(session_id.to_string()));
    assert_eq!(value["data"]["currentTest"], json!("DKIM"));
    assert_eq!(value["data"]["completedTests"], json!(2));
    assert_eq!(value["data"]["status"], json!("RUNNING"));

    let error = ProgressEvent::Error(TestError {
        session_id,
        error: "store unavailable".into(),
    });
    let value = serde_json::to_value(&error).unwrap();
    assert_eq!(value["type"], json!("test_error"));
    assert_eq!(value["data"]["error"], json!("store unavailable"));
    assert!(error.is_terminal());
}

#[tokio::test]
async fn events_reach_only_their_owner() {
    let hub = ProgressHub::default();
    let alice = OwnerId::new();
    let bob = OwnerId::new();
    let mut alice_conn = hub.connect(alice);
    let mut bob_conn = hub.connect(bob);

    let session = SessionId::new();
    hub.publish(alice, progress(session, 0)).await.unwrap();

    assert_eq!(alice_conn.try_recv(), Some(progress(session, 0)));
    assert_eq!(alice_conn.try_recv(), None);
    assert_eq!(bob_conn.try_recv(), None);
}

#[tokio::test]
async fn session_filter_narrows_delivery_and_empty_filter_means_all() {
    let hub = ProgressHub::default();
    let owner = OwnerId::new();
    let watched = SessionId::new();
    let other = SessionId::new();

    let mut filtered = hub.connect(owner);
    filtered.subscribe_session(watched);
    let mut everything = hub.connect(owner);

    hub.publish(owner, progress(other, 0)).await.unwrap();
    hub.publish(owner, progress(watched, 1)).await.unwrap();

    assert_eq!(filtered.recv().await, Some(progress(watched, 1)));
    assert_eq!(filtered.try_recv(), None);
    assert_eq!(everything.recv().await, Some(progress(other, 0)));
    assert_eq!(everything.recv().await, Some(progress(watched, 1)));

    filtered.unsubscribe_session(watched);
    assert!(filtered.subscribed_sessions().is_empty());
    hub.publish(owner, progress(other, 2)).await.unwrap();
    assert_eq!(filtered.try_recv(), Some(progress(other, 2)));
}

#[tokio::test]
async fn connections_are_counted_and_pruned_on_drop() {
    let hub = ProgressHub::default();
    let owner = OwnerId::new();
    assert!(hub.connected_owners().is_empty());

    let first = hub.connect(owner);
    let second = hub.connect(owner);
    assert_eq!(hub.connection_count(owner), 2);
    assert_eq!(hub.connected_owners(), vec![owner]);

    drop(first);
    assert_eq!(hub.connection_count(owner), 1);
    drop(second);
    assert_eq!(hub.connection_count(owner), 0);
    assert!(hub.connected_owners().is_empty());
}

#[tokio::test]
async fn publishing_without_listeners_succeeds() {
    let hub = ProgressHub::default();
    hub.publish(OwnerId::new(), progress(SessionId::new(), 0))
        .await
        .expect("nobody listening is fine");
}

#[tokio::test]
async fn closed_hub_rejects_events() {
    let hub = ProgressHub::default();
    let owner = OwnerId::new();
    let mut conn = hub.connect(owner);
    hub.close();
    let err = hub
        .publish(owner, progress(SessionId::new(), 0))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::Closed));
    assert_eq!(conn.try_recv(), None);
}
