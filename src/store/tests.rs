use serde_json::json;

use super::{FailPoint, MemoryStore, SessionStore, StoreError};
use crate::model::{
    CheckKind, CheckOutcome, CheckStatus, CheckUpdate, NewCheck, NewSession, OwnerId, SessionId,
    SessionUpdate,
};

async fn seeded_session(store: &MemoryStore, owner: OwnerId) -> (crate::model::Domain, SessionId) {
    let domain = store
        .create_domain(owner, "example.com")
        .await
        .expect("domain");
    let session = store
        .create_session(NewSession {
            domain_id: domain.id,
            owner_id: owner,
            name: "Test session for example.com".into(),
            total_tests: 2,
        })
        .await
        .expect("session");
    (domain, session.id)
}

#[tokio::test]
async fn session_starts_pending_and_applies_partial_updates() {
    let store = MemoryStore::new();
    let owner = OwnerId::new();
    let (_, session_id) = seeded_session(&store, owner).await;

    let session = store.session(session_id).await.unwrap().expect("exists");
    assert_eq!(session.status, CheckStatus::Pending);
    assert_eq!(session.completed_tests, 0);
    assert_eq!(session.overall_score, None);

    store
        .update_session(session_id, SessionUpdate::status(CheckStatus::Running))
        .await
        .unwrap();
    let done = store
        .update_session(session_id, SessionUpdate::completed(2, 75))
        .await
        .unwrap();
    assert_eq!(done.status, CheckStatus::Completed);
    assert_eq!(done.completed_tests, 2);
    assert_eq!(done.overall_score, Some(75));
    assert_eq!(done.total_tests, 2);
    assert!(done.updated_at >= done.created_at);
}

#[tokio::test]
async fn missing_rows_are_reported() {
    let store = MemoryStore::new();
    let missing = SessionId::new();
    assert!(store.session(missing).await.unwrap().is_none());
    let err = store
        .update_session(missing, SessionUpdate::status(CheckStatus::Failed))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::SessionNotFound { id } if id == missing));
}

#[tokio::test]
async fn check_records_keep_creation_order_and_lifecycle() {
    let store = MemoryStore::new();
    let owner = OwnerId::new();
    let (domain, session_id) = seeded_session(&store, owner).await;

    let first = store
        .create_check(NewCheck {
            session_id,
            domain_id: domain.id,
            kind: CheckKind::Dmarc,
        })
        .await
        .unwrap();
    assert_eq!(first.status, CheckStatus::Pending);
    let second = store
        .create_check(NewCheck {
            session_id,
            domain_id: domain.id,
            kind: CheckKind::Spf,
        })
        .await
        .unwrap();

    store
        .update_check(first.id, CheckUpdate::running())
        .await
        .unwrap();
    let completed = store
        .update_check(
            first.id,
            CheckUpdate::completed(
                CheckOutcome::new(90, json!({"policy": "reject"}), vec!["ok".into()]),
                chrono::Utc::now(),
            ),
        )
        .await
        .unwrap();
    assert_eq!(completed.score, Some(90));
    assert!(completed.error_message.is_none());

    let failed = store
        .update_check(second.id, CheckUpdate::failed("timeout", chrono::Utc::now()))
        .await
        .unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("timeout"));
    assert!(failed.score.is_none());
    assert!(failed.result_data.is_none());

    let records = store.checks_for_session(session_id).await.unwrap();
    let kinds: Vec<_> = records.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![CheckKind::Dmarc, CheckKind::Spf]);
}

#[tokio::test]
async fn sessions_for_owner_are_newest_first_and_limited() {
    let store = MemoryStore::new();
    let owner = OwnerId::new();
    let other = OwnerId::new();
    let (_, first) = seeded_session(&store, owner).await;
    let (_, second) = seeded_session(&store, owner).await;
    let (_, third) = seeded_session(&store, owner).await;
    seeded_session(&store, other).await;

    let listed = store.sessions_for_owner(owner, 50).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![third, second, first]);

    let limited = store.sessions_for_owner(owner, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, third);
}

#[tokio::test]
async fn latest_completed_by_domain_keeps_latest_per_kind() {
    let store = MemoryStore::new();
    let owner = OwnerId::new();
    let (domain, session_id) = seeded_session(&store, owner).await;
    let (_, _empty_session) = seeded_session(&store, owner).await;

    for score in [40, 95] {
        let record = store
            .create_check(NewCheck {
                session_id,
                domain_id: domain.id,
                kind: CheckKind::Spf,
            })
            .await
            .unwrap();
        store
            .update_check(
                record.id,
                CheckUpdate::completed(
                    CheckOutcome::new(score, json!({}), Vec::new()),
                    chrono::Utc::now(),
                ),
            )
            .await
            .unwrap();
    }
    let failed = store
        .create_check(NewCheck {
            session_id,
            domain_id: domain.id,
            kind: CheckKind::Dkim,
        })
        .await
        .unwrap();
    store
        .update_check(failed.id, CheckUpdate::failed("boom", chrono::Utc::now()))
        .await
        .unwrap();

    let latest = store.latest_completed_by_domain(owner).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].domain.id, domain.id);
    assert_eq!(latest[0].results.len(), 1);
    assert_eq!(latest[0].results[0].score, Some(95));

    assert!(
        store
            .latest_completed_by_domain(OwnerId::new())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn fail_points_block_writes_until_cleared() {
    let store = MemoryStore::new();
    let owner = OwnerId::new();
    let (_, session_id) = seeded_session(&store, owner).await;
    let writes = store.write_count();
    assert_eq!(writes, 2);

    store.fail_on(FailPoint::CompleteSession);
    store
        .update_session(session_id, SessionUpdate::status(CheckStatus::Running))
        .await
        .expect("non-final updates still pass");
    let err = store
        .update_session(session_id, SessionUpdate::completed(1, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
    assert!(err.to_string().contains("complete_session"));
    assert_eq!(store.write_count(), writes + 1);

    store.clear_failures();
    store
        .update_session(session_id, SessionUpdate::completed(1, 10))
        .await
        .expect("cleared");
    assert_eq!(store.write_count(), writes + 2);
}

#[tokio::test]
async fn complete_check_fail_point_still_lets_failures_through() {
    let store = MemoryStore::new();
    let owner = OwnerId::new();
    let (domain, session_id) = seeded_session(&store, owner).await;
    let record = store
        .create_check(NewCheck {
            session_id,
            domain_id: domain.id,
            kind: CheckKind::Spf,
        })
        .await
        .expect("check");

    store.fail_on(FailPoint::CompleteCheck);
    store
        .update_check(record.id, CheckUpdate::running())
        .await
        .expect("running is not a completion");
    let err = store
        .update_check(
            record.id,
            CheckUpdate::completed(CheckOutcome::new(80, json!({}), Vec::new()), chrono::Utc::now()),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("complete_check"));

    let failed = store
        .update_check(record.id, CheckUpdate::failed("boom", chrono::Utc::now()))
        .await
        .expect("failures pass");
    assert_eq!(failed.status, CheckStatus::Failed);

    store.fail_on(FailPoint::UpdateCheck);
    assert!(
        store
            .update_check(record.id, CheckUpdate::running())
            .await
            .is_err()
    );
}
