// Walks the portal through an outage against a store served over HTTP.
//
// An Axum server exposes an in-memory document store; the portal reaches it
// through a reqwest client and keeps a file-backed local store next to it.
// Halfway through, the store goes down: the portal keeps working locally and
// replays what it wrote once the store is back.

mod client;
mod server;

use std::sync::Arc;

use chrono::{Duration, Utc};
use client::HttpRemote;
use labstore::{
    BorrowRequest, Component, FailoverRouter, ManualConnectivity, MemoryRemote, RequestStatus,
    Role, Settings, User,
};
use labstore_fs::FileStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.filter)),
        )
        .init();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, server::create_router(MemoryRemote::new())).await {
            tracing::error!(error = %e, "Server stopped");
        }
    });
    println!("🚀 Document store serving on http://127.0.0.1:{port}");

    let data_dir = tempfile::tempdir()?;
    let remote = HttpRemote::new(port)?;
    let monitor = Arc::new(ManualConnectivity::new(true));
    let router = Arc::new(
        FailoverRouter::new(
            Arc::new(remote.clone()),
            FileStore::new(data_dir.path())?,
            monitor.clone(),
        )
        .with_options(settings.router_options()),
    );

    let now = Utc::now();
    let ada = User {
        id: "u-ada".into(),
        name: "Ada Lovelace".into(),
        email: "ada@students.lab".into(),
        role: Role::Student,
        roll_no: Some("CS-1815".into()),
        mobile: None,
        registered_at: now,
        login_count: 0,
        last_login_at: None,
        is_active: false,
    };
    router.add_user(&ada).await?;
    let ada = router.record_login(&ada.id).await?;
    router.start_session(&ada, "Firefox on Linux").await?;

    let scope = Component {
        id: "c-scope".into(),
        name: "Oscilloscope".into(),
        category: "instruments".into(),
        description: Some("2-channel, 100 MHz".into()),
        total_quantity: 3,
        available_quantity: 3,
    };
    router.add_component(&scope).await?;
    let _feed = router
        .on_components_change(|components| {
            for c in components {
                info!(component = %c.id, available = c.available_quantity, "Stock update");
            }
        })
        .await?;
    println!("✓ Registered user, component and session ({:?})", router.mode());

    // The store goes down and the platform notices.
    remote.set_available(false).await?;
    monitor.set_online(false);

    let mut request = BorrowRequest {
        id: "r-1".into(),
        student_id: ada.id.clone(),
        student_name: ada.name.clone(),
        component_id: scope.id.clone(),
        component_name: scope.name.clone(),
        quantity: 1,
        status: RequestStatus::Pending,
        request_date: now,
        due_date: now + Duration::days(7),
        return_date: None,
        notes: Some("Lab 4".into()),
    };
    router.add_request(&request).await?;
    println!(
        "✓ Filed a request offline ({:?}, {} records pending)",
        router.mode(),
        router.pending_replication()?
    );

    remote.set_available(true).await?;
    monitor.set_online(true);
    let requests = router.get_requests().await?;
    println!(
        "✓ Back online: {} request(s) in the store, {} pending",
        requests.len(),
        router.pending_replication()?
    );

    // Staff approve it; the oscilloscope leaves the shelf.
    request.status = RequestStatus::Approved;
    router.update_request(&request).await?;

    let closed = router.end_session(&ada.id).await?;
    let stats = router.get_system_stats().await?;
    println!("✓ Closed {closed} session(s)");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
