use std::time::Duration;

use super::support::{id, v6, RecordingInstaller};
use crate::lsa::{LsaKey, ROUTER_LSA_TYPE};
use crate::router::Router;
use crate::transport::{MemoryHub, MemoryTransport};

/// a kill announcement whose body is in neither the live nor the dead
/// table, as happens when an acknowledgment arriving on another
/// interface purges the tombstone first. The session must stay alive
/// through its retry budget instead of silently dropping the
/// withdrawal.
#[tokio::test]
async fn kill_flood_outlives_a_purged_tombstone() {
    let hub = MemoryHub::new();
    let transport = MemoryTransport::new(hub);
    transport.attach(1, 1, v6("fe80::1"));
    let router = Router::new(id(1, 1, 1, 1), transport, RecordingInstaller::new());
    let interface = router
        .add_interface(1, id(0, 0, 0, 0), v6("fe80::1"), 10, 1, 10, 40)
        .await
        .unwrap();

    let key = LsaKey::new(ROUTER_LSA_TYPE, id(9, 9, 9, 9), id(0, 0, 0, 0));
    interface
        .flood
        .send_multicast_kill(router.clone(), interface.clone(), vec![key])
        .await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(interface.flood.session_count().await, 1);

    let mut closed = false;
    for _ in 0..70 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if interface.flood.session_count().await == 0 {
            closed = true;
            break;
        }
    }
    assert!(closed, "kill session should close once its retries run out");
    router.shutdown().await;
}
