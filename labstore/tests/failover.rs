mod common;

use std::{io, sync::Arc};

use common::{Harness, component, notification, student, t0};
use labstore::{
    Component, Error, FailoverRouter, LocalStore, ManualConnectivity, MemoryRemote, Mode,
    RecordKind, Rejection, RemoteError,
};

#[tokio::test]
async fn online_writes_go_to_remote_only() -> anyhow::Result<()> {
    let h = Harness::online();
    h.router.add_component(&component("c1", 3, 3)).await?;

    assert_eq!(h.router.mode(), Mode::RemotePreferred);
    assert_eq!(h.remote.documents(RecordKind::Component).len(), 1);
    assert_eq!(h.router.pending_replication()?, 0);
    Ok(())
}

#[tokio::test]
async fn round_trip_through_remote() -> anyhow::Result<()> {
    let h = Harness::online();
    let user = student("u1");
    h.router.add_user(&user).await?;
    h.router
        .add_notification(&notification("n1", "u1", t0()))
        .await?;

    assert_eq!(h.router.get_user("u1").await?, Some(user));
    assert_eq!(
        h.router.get_user_notifications("u1").await?,
        [notification("n1", "u1", t0())]
    );
    assert_eq!(h.local_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn connectivity_failure_completes_locally() -> anyhow::Result<()> {
    let h = Harness::online();
    // The call fails before the platform reports anything.
    h.remote.set_available(false);

    h.router.add_component(&component("c1", 2, 2)).await?;
    assert_eq!(h.router.mode(), Mode::LocalFallback);
    assert!(h.remote.documents(RecordKind::Component).is_empty());
    assert_eq!(h.router.get_components().await?, [component("c1", 2, 2)]);
    Ok(())
}

#[tokio::test]
async fn no_remote_calls_while_in_fallback() -> anyhow::Result<()> {
    let h = Harness::online();
    h.disconnect();

    h.router.add_component(&component("c1", 1, 1)).await?;
    h.router.get_components().await?;
    h.router.get_requests().await?;
    h.router.add_user(&student("u1")).await?;
    h.router.get_system_stats().await?;

    assert_eq!(h.router.mode(), Mode::LocalFallback);
    assert_eq!(h.remote.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn fallback_after_failed_call_stops_remote_attempts() -> anyhow::Result<()> {
    let h = Harness::online();
    h.remote
        .fail_next(RemoteError::Unavailable("timeout".into()));

    h.router.get_components().await?;
    assert_eq!(h.remote.call_count(), 1);
    h.router.get_components().await?;
    h.router.add_component(&component("c1", 1, 1)).await?;
    assert_eq!(h.remote.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn rejection_never_reaches_local_store() -> anyhow::Result<()> {
    let h = Harness::online();
    h.router.add_component(&component("c1", 1, 1)).await?;

    let duplicate = h.router.add_component(&component("c1", 9, 9)).await;
    assert_eq!(
        duplicate,
        Err(Error::Rejected(Rejection::DuplicateId("c1".into())))
    );
    assert_eq!(h.router.mode(), Mode::RemotePreferred);
    assert_eq!(h.local_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn not_found_surfaces_without_fallback() -> anyhow::Result<()> {
    let h = Harness::online();
    let missing = h.router.mark_notification_as_read("nope").await;
    assert!(matches!(missing, Err(Error::NotFound { kind: RecordKind::Notification, .. })));

    let missing = h.router.delete_component("nope").await;
    assert!(matches!(missing, Err(Error::NotFound { .. })));
    assert_eq!(h.router.mode(), Mode::RemotePreferred);
    assert_eq!(h.local_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn permission_denied_is_surfaced_verbatim() {
    let h = Harness::online();
    h.remote.fail_next(RemoteError::Rejected(Rejection::PermissionDenied(
        "staff only".into(),
    )));
    let result = h.router.delete_component("c1").await;
    assert_eq!(
        result,
        Err(Error::Rejected(Rejection::PermissionDenied("staff only".into())))
    );
}

#[tokio::test]
async fn offline_updates_upsert_locally() -> anyhow::Result<()> {
    let h = Harness::offline();
    let mut user = student("u1");
    user.mobile = Some("+48 600 000 000".into());
    h.router.update_user(&user).await?;
    assert_eq!(h.router.get_user("u1@students.lab").await?, Some(user));
    Ok(())
}

#[tokio::test]
async fn partial_update_of_missing_record_fails_locally() {
    let h = Harness::offline();
    let result = h.router.mark_notification_as_read("n1").await;
    assert!(matches!(result, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn mark_as_read_touches_only_the_flag() -> anyhow::Result<()> {
    let h = Harness::online();
    h.router
        .add_notification(&notification("n1", "u1", t0()))
        .await?;
    h.router.mark_notification_as_read("n1").await?;

    let stored = h.router.get_user_notifications("u1").await?;
    let mut expected = notification("n1", "u1", t0());
    expected.read = true;
    assert_eq!(stored, [expected]);
    Ok(())
}

#[tokio::test]
async fn user_lookup_by_id_then_email() -> anyhow::Result<()> {
    let h = Harness::online();
    h.router.add_user(&student("u1")).await?;

    assert_eq!(h.router.get_user("u1").await?.map(|u| u.id), Some("u1".into()));
    assert_eq!(
        h.router.get_user("u1@students.lab").await?.map(|u| u.id),
        Some("u1".into())
    );
    assert_eq!(h.router.get_user("ghost@students.lab").await?, None);
    Ok(())
}

#[tokio::test]
async fn login_statistics_are_recorded() -> anyhow::Result<()> {
    let h = Harness::online();
    h.router.add_user(&student("u1")).await?;
    h.router.record_login("u1").await?;
    let user = h.router.record_login("u1").await?;

    assert_eq!(user.login_count, 2);
    assert_eq!(user.last_login_at, Some(t0()));
    assert!(user.is_active);
    assert_eq!(h.router.get_user("u1").await?, Some(user));

    let missing = h.router.record_login("ghost").await;
    assert!(matches!(missing, Err(Error::NotFound { kind: RecordKind::User, .. })));
    Ok(())
}

#[tokio::test]
async fn deleted_component_is_gone_from_listing() -> anyhow::Result<()> {
    let h = Harness::online();
    h.router.add_component(&component("c1", 1, 1)).await?;
    h.router.add_component(&component("c2", 1, 1)).await?;
    h.router.delete_component("c1").await?;

    let ids: Vec<_> = h
        .router
        .get_components()
        .await?
        .into_iter()
        .map(|c: Component| c.id)
        .collect();
    assert_eq!(ids, ["c2"]);
    Ok(())
}

/// A local store whose disk is gone.
struct BrokenDisk;

impl LocalStore for BrokenDisk {
    type Error = io::Error;

    fn insert(&mut self, _: &str, _: &str, _: Vec<u8>) -> Result<(), Self::Error> {
        Err(io::Error::other("disk full"))
    }

    fn get(&self, _: &str, _: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Err(io::Error::other("disk gone"))
    }

    fn remove(&mut self, _: &str, _: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Err(io::Error::other("disk gone"))
    }

    fn scan_ids(&self, _: &str) -> Result<Vec<String>, Self::Error> {
        Err(io::Error::other("disk gone"))
    }
}

#[tokio::test]
async fn both_failures_are_reported_together() {
    let remote = MemoryRemote::new();
    remote.set_available(false);
    let router = FailoverRouter::new(
        Arc::new(remote),
        BrokenDisk,
        Arc::new(ManualConnectivity::new(true)),
    );

    match router.add_user(&student("u1")).await {
        Err(Error::BothStoresFailed { remote, local }) => {
            assert!(remote.contains("unreachable"));
            assert!(local.to_string().contains("disk full"));
        }
        other => panic!("expected a combined failure, got {other:?}"),
    }

    // Already in fallback: the local failure alone is reported.
    let result = router.get_user("u1").await;
    assert!(matches!(result, Err(Error::LocalStorage(_))));
}
