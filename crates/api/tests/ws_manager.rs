//! Connection registry and heartbeat, exercised without HTTP upgrades.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use holdmap_api::background::heartbeat;
use holdmap_api::ws::WsManager;
use tokio_util::sync::CancellationToken;

fn text(body: &str) -> Message {
    Message::Text(body.to_string().into())
}

// ---------------------------------------------------------------------------
// Test: add() and remove() track the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();
    let _rx = manager.add("conn-1".to_string()).await;
    assert_eq!(manager.connection_count().await, 1);

    assert!(manager.remove("conn-1").await);
    assert!(!manager.remove("conn-1").await);
    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: send_to() reaches exactly one connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_targets_one_connection() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;

    assert!(manager.send_to("conn-2", text("snapshot")).await);
    assert!(!manager.send_to("conn-9", text("snapshot")).await);

    assert!(rx1.try_recv().is_err());
    assert!(matches!(rx2.try_recv().unwrap(), Message::Text(t) if t.as_str() == "snapshot"));
}

// ---------------------------------------------------------------------------
// Test: fan_out() with a skip id never echoes to the origin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fan_out_skips_origin() {
    let manager = WsManager::new();
    let mut origin = manager.add("conn-a".to_string()).await;
    let mut peer_b = manager.add("conn-b".to_string()).await;
    let mut peer_c = manager.add("conn-c".to_string()).await;

    let delivered = manager.fan_out(text("unitUpdated"), Some("conn-a")).await;

    assert_eq!(delivered, 2);
    assert!(origin.try_recv().is_err());
    assert!(peer_b.try_recv().is_ok());
    assert!(peer_c.try_recv().is_ok());
}

// ---------------------------------------------------------------------------
// Test: fan_out() does not count connections whose receiver is gone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fan_out_skips_dropped_receivers() {
    let manager = WsManager::new();
    let rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;
    drop(rx1);

    let delivered = manager.fan_out(text("holdsReleased"), None).await;

    assert_eq!(delivered, 1);
    assert!(rx2.try_recv().is_ok());
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close to every connection and clears the map
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_closes_and_clears() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;

    manager.shutdown_all().await;

    assert!(matches!(rx1.try_recv().unwrap(), Message::Close(None)));
    assert!(matches!(rx2.try_recv().unwrap(), Message::Close(None)));
    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: the heartbeat pings every connection and stops on cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_pings_until_cancelled() {
    let manager = Arc::new(WsManager::new());
    let mut rx = manager.add("conn-1".to_string()).await;
    let cancel = CancellationToken::new();

    let task = tokio::spawn(heartbeat::run(
        manager.clone(),
        Duration::from_millis(10),
        cancel.clone(),
    ));

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap();
    assert!(matches!(first, Some(Message::Ping(_))));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
}
