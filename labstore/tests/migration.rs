mod common;

use common::{Harness, component, notification, request, student, t0};
use labstore::{
    Error, Mode, RecordKind, Rejection, RemoteError, ReplicationMigrator, RouterOptions,
};

#[tokio::test]
async fn offline_writes_replay_after_reconnecting() -> anyhow::Result<()> {
    let h = Harness::online();
    h.disconnect();

    h.router.add_component(&component("c1", 4, 4)).await?;
    h.router.add_request(&request("r1", "u1", "c1", 1)).await?;
    h.router
        .add_notification(&notification("n1", "u1", t0()))
        .await?;
    h.router.add_user(&student("u1")).await?;
    assert_eq!(h.router.pending_replication()?, 3);
    assert_eq!(h.remote.call_count(), 0);

    h.reconnect();
    let components = h.router.get_components().await?;

    assert_eq!(components, [component("c1", 4, 4)]);
    assert_eq!(h.remote.documents(RecordKind::Component).len(), 1);
    assert_eq!(h.remote.documents(RecordKind::Request).len(), 1);
    assert_eq!(h.remote.documents(RecordKind::Notification).len(), 1);
    // Accounts are never replayed from a device.
    assert!(h.remote.documents(RecordKind::User).is_empty());
    assert_eq!(h.router.pending_replication()?, 0);
    Ok(())
}

#[tokio::test]
async fn local_copy_overwrites_existing_remote_record() -> anyhow::Result<()> {
    let h = Harness::online();
    h.router.add_component(&component("c1", 3, 3)).await?;

    h.disconnect();
    h.router.update_component(&component("c1", 3, 1)).await?;

    h.reconnect();
    assert_eq!(
        h.router.get_component("c1").await?,
        Some(component("c1", 3, 1))
    );
    assert_eq!(h.router.pending_replication()?, 0);
    Ok(())
}

#[tokio::test]
async fn one_pass_per_reconnection() -> anyhow::Result<()> {
    let h = Harness::online();
    h.disconnect();
    h.router.add_component(&component("c1", 1, 1)).await?;
    h.reconnect();

    h.router.get_components().await?;
    // One add for the replayed record, one list for the read.
    assert_eq!(h.remote.call_count(), 2);

    h.router.get_components().await?;
    assert_eq!(h.remote.call_count(), 3);
    Ok(())
}

#[tokio::test]
async fn nothing_pending_means_no_replay() -> anyhow::Result<()> {
    let h = Harness::online();
    h.disconnect();
    h.reconnect();

    h.router.get_components().await?;
    assert_eq!(h.remote.call_count(), 1);
    assert_eq!(h.router.mode(), Mode::RemotePreferred);
    Ok(())
}

#[tokio::test]
async fn connectivity_loss_interrupts_the_pass() -> anyhow::Result<()> {
    let h = Harness::online();
    h.disconnect();
    h.router.add_component(&component("c1", 1, 1)).await?;
    h.router.add_component(&component("c2", 1, 1)).await?;

    h.reconnect();
    h.remote
        .fail_next(RemoteError::Unavailable("dropped".into()));
    let components = h.router.get_components().await?;

    // The read itself was served locally.
    assert_eq!(components.len(), 2);
    assert_eq!(h.router.mode(), Mode::LocalFallback);
    assert_eq!(h.router.pending_replication()?, 2);
    assert!(h.remote.documents(RecordKind::Component).is_empty());

    // The next reconnection finishes the job.
    h.disconnect();
    h.reconnect();
    h.router.get_components().await?;
    assert_eq!(h.remote.documents(RecordKind::Component).len(), 2);
    assert_eq!(h.router.pending_replication()?, 0);
    Ok(())
}

#[tokio::test]
async fn report_lists_refused_records() -> anyhow::Result<()> {
    let h = Harness::offline();
    h.router.add_component(&component("c1", 1, 1)).await?;
    h.router
        .add_notification(&notification("n1", "u1", t0()))
        .await?;

    h.remote.set_available(true);
    h.remote.fail_next(RemoteError::Rejected(Rejection::PermissionDenied(
        "read only".into(),
    )));
    let report = ReplicationMigrator::default().run(&h.router).await;

    assert_eq!(report.replicated, 1);
    assert!(!report.interrupted);
    assert!(!report.is_complete());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, RecordKind::Component);
    assert_eq!(report.failed[0].id, "c1");
    assert_eq!(
        report.failed[0].error,
        Error::Rejected(Rejection::PermissionDenied("read only".into()))
    );
    // The refused record stays pending for the next pass.
    assert_eq!(h.router.pending_replication()?, 1);
    Ok(())
}

#[tokio::test]
async fn sessions_replicate_when_configured() -> anyhow::Result<()> {
    let mut options = RouterOptions::default();
    options.replicate.push(RecordKind::LoginSession);
    let h = Harness::with_options(options);

    h.disconnect();
    h.router.start_session(&student("u1"), "web").await?;
    assert_eq!(h.router.pending_replication()?, 1);

    h.reconnect();
    let sessions = h.router.get_login_sessions().await?;
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_active);
    Ok(())
}

#[test]
fn users_are_never_replicated() {
    let migrator = ReplicationMigrator::new([
        RecordKind::User,
        RecordKind::Component,
        RecordKind::Component,
        RecordKind::Request,
    ]);
    assert_eq!(migrator.kinds(), [RecordKind::Component, RecordKind::Request]);
}
