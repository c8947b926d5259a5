use std::sync::Arc;
use std::time::Duration;

use super::support::{id, v6, RecordingInstaller};
use crate::lsa::{INTRA_AREA_PREFIX_LSA_TYPE, NETWORK_LSA_TYPE, ROUTER_LSA_TYPE};
use crate::neighbor::Status as NeighborStatus;
use crate::router::Router;
use crate::transport::{MemoryHub, MemoryTransport};

async fn full_with(router: &Arc<Router>, peer: std::net::Ipv4Addr) -> bool {
    let interface = match router.interface(1).await {
        Some(interface) => interface,
        None => return false,
    };
    match interface.lookup_neighbor(peer).await {
        Some(neighbor) => neighbor.status().await == NeighborStatus::Full,
        None => false,
    }
}

/// two routers on one segment: discovery, election, database exchange,
/// prefix origination, route installation and teardown.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_routers_converge_and_part() {
    let hub = MemoryHub::new();
    let transport_one = MemoryTransport::new(hub.clone());
    transport_one.attach(1, 100, v6("fe80::1"));
    let transport_two = MemoryTransport::new(hub.clone());
    transport_two.attach(1, 100, v6("fe80::2"));

    let installer_one = RecordingInstaller::new();
    let installer_two = RecordingInstaller::new();
    let one = Router::new(id(1, 1, 1, 1), transport_one, installer_one.clone());
    let two = Router::new(id(2, 2, 2, 2), transport_two, installer_two.clone());
    one.start().await;
    two.start().await;

    let area = id(0, 0, 0, 0);
    one.add_interface(1, area, v6("fe80::1"), 10, 1, 1, 3).await;
    two.add_interface(1, area, v6("fe80::2"), 10, 1, 1, 3).await;

    // discovery, election and database exchange
    let mut converged = false;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if full_with(&one, id(2, 2, 2, 2)).await && full_with(&two, id(1, 1, 1, 1)).await {
            converged = true;
            break;
        }
    }
    assert!(converged, "adjacency never reached full");

    // the higher router id won the election on both ends
    let state_one = one.interface(1).await.unwrap();
    let state_two = two.interface(1).await.unwrap();
    assert_eq!(state_one.state.read().await.dr, id(2, 2, 2, 2));
    assert_eq!(state_two.state.read().await.dr, id(2, 2, 2, 2));
    assert_eq!(state_one.state.read().await.bdr, id(1, 1, 1, 1));

    // routable addresses ride the link and intra-area-prefix LSAs to the
    // other end, which installs a route for the remote prefix only
    one.set_interface_address(1, v6("2001:db8:1::1"), 64).await;
    two.set_interface_address(1, v6("2001:db8:2::1"), 64).await;

    let mut routed = false;
    for _ in 0..30 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if installer_one.installed(v6("2001:db8:2::"))
            && installer_two.installed(v6("2001:db8:1::"))
        {
            routed = true;
            break;
        }
    }
    assert!(routed, "remote prefixes never installed");
    assert!(!installer_one.installed(v6("2001:db8:1::")));
    assert!(!installer_two.installed(v6("2001:db8:2::")));

    // the databases agree on who describes the segment
    let lsdb_one = one.dump_lsdb().await;
    assert!(lsdb_one.contains("2.2.2.2"));

    // taking the designated router down withdraws its router LSA, its
    // network LSA and the folded prefix LSA, and nothing else
    let kills = two.shutdown_interface(1).await;
    let mut kill_types: Vec<u16> = kills.iter().map(|key| key.ls_type).collect();
    kill_types.sort_unstable();
    assert_eq!(
        kill_types,
        vec![ROUTER_LSA_TYPE, NETWORK_LSA_TYPE, INTRA_AREA_PREFIX_LSA_TYPE]
    );
    let mut withdrawn = false;
    for _ in 0..30 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if installer_one.withdrawn(v6("2001:db8:2::")) {
            withdrawn = true;
            break;
        }
    }
    assert!(withdrawn, "remote prefix never withdrawn");

    one.shutdown().await;
    two.shutdown().await;
}
