use std::sync::Arc;

use super::support::{id, v6, RecordingInstaller, RouteEvent};
use crate::lsa::Prefix;
use crate::router::Router;
use crate::rtable::{Adjacency, Node, NodeId, SpfManager};
use crate::transport::{MemoryHub, MemoryTransport};

fn recording_router() -> (Arc<Router>, Arc<RecordingInstaller>) {
    let installer = RecordingInstaller::new();
    let transport = MemoryTransport::new(MemoryHub::new());
    let router = Router::new(id(1, 1, 1, 1), transport, installer.clone());
    (router, installer)
}

fn attach_destination(
    spf: &Arc<SpfManager>,
    node: NodeId,
    cost: u32,
    prefix: Prefix,
) {
    let root = spf.root();
    spf.update_topology(|graph| {
        let entry = graph.ensure_node(Node::new(node, None));
        entry.prefixes.insert(prefix.address, prefix);
        graph.add_edge(root, node, cost);
    });
}

#[tokio::test]
async fn recomputation_installs_only_the_difference() {
    let (router, installer) = recording_router();
    let spf = SpfManager::new(id(0, 0, 0, 0), router.router_id);
    let a = NodeId::Router(id(2, 2, 2, 2));
    let b = NodeId::Router(id(3, 3, 3, 3));
    attach_destination(&spf, a, 5, Prefix::new(v6("2001:db8:a::"), 64, 0, 0));
    attach_destination(&spf, b, 3, Prefix::new(v6("2001:db8:b::"), 64, 0, 0));
    spf.add_adjacency(
        a,
        Adjacency {
            interface: 1,
            next_hop: Some(v6("fe80::2")),
        },
    )
    .await;
    spf.add_adjacency(
        b,
        Adjacency {
            interface: 1,
            next_hop: Some(v6("fe80::3")),
        },
    )
    .await;
    spf.run_once(&router).await;
    let events = installer.take();
    assert_eq!(events.len(), 2);
    assert!(events.contains(&RouteEvent::Install {
        prefix: v6("2001:db8:a::"),
        length: 64,
        interface: 1,
        metric: 5,
    }));
    assert!(events.contains(&RouteEvent::Install {
        prefix: v6("2001:db8:b::"),
        length: 64,
        interface: 1,
        metric: 3,
    }));

    // b disappears, c appears, a is untouched
    let c = NodeId::Router(id(4, 4, 4, 4));
    spf.update_topology(|graph| {
        graph.remove_node(&b);
    });
    spf.remove_adjacency(&b).await;
    attach_destination(&spf, c, 7, Prefix::new(v6("2001:db8:c::"), 64, 0, 0));
    spf.add_adjacency(
        c,
        Adjacency {
            interface: 2,
            next_hop: Some(v6("fe80::4")),
        },
    )
    .await;
    spf.run_once(&router).await;
    let events = installer.take();
    assert_eq!(events.len(), 2);
    assert!(events.contains(&RouteEvent::Install {
        prefix: v6("2001:db8:c::"),
        length: 64,
        interface: 2,
        metric: 7,
    }));
    assert!(events.contains(&RouteEvent::Withdraw {
        prefix: v6("2001:db8:b::"),
        length: 64,
        interface: 1,
    }));
}

#[tokio::test]
async fn moved_first_hop_withdraws_before_reinstalling() {
    let (router, installer) = recording_router();
    let spf = SpfManager::new(id(0, 0, 0, 0), router.router_id);
    let a = NodeId::Router(id(2, 2, 2, 2));
    attach_destination(&spf, a, 5, Prefix::new(v6("2001:db8:a::"), 64, 0, 0));
    spf.add_adjacency(
        a,
        Adjacency {
            interface: 1,
            next_hop: Some(v6("fe80::2")),
        },
    )
    .await;
    spf.run_once(&router).await;
    installer.take();

    // the destination stays but its first hop moves to another interface;
    // the stale kernel entry has to go before the replacement lands
    spf.add_adjacency(
        a,
        Adjacency {
            interface: 2,
            next_hop: Some(v6("fe80::9")),
        },
    )
    .await;
    spf.run_once(&router).await;
    let events = installer.take();
    assert_eq!(
        events,
        vec![
            RouteEvent::Withdraw {
                prefix: v6("2001:db8:a::"),
                length: 64,
                interface: 1,
            },
            RouteEvent::Install {
                prefix: v6("2001:db8:a::"),
                length: 64,
                interface: 2,
                metric: 5,
            },
        ]
    );
}

#[tokio::test]
async fn destination_without_adjacency_skipped() {
    let (router, installer) = recording_router();
    let spf = SpfManager::new(id(0, 0, 0, 0), router.router_id);
    let a = NodeId::Router(id(2, 2, 2, 2));
    attach_destination(&spf, a, 5, Prefix::new(v6("2001:db8:a::"), 64, 0, 0));
    spf.run_once(&router).await;
    assert!(installer.events().is_empty());
}

#[tokio::test]
async fn inter_area_metric_adds_advertised_cost() {
    let (router, installer) = recording_router();
    let spf = SpfManager::new(id(0, 0, 0, 0), router.router_id);
    let border = NodeId::Router(id(2, 2, 2, 2));
    let root = spf.root();
    spf.update_topology(|graph| {
        let node = graph.ensure_node(Node::new(border, None));
        node.inter_area_prefixes.insert(
            v6("2001:db8:f::"),
            Prefix::new(v6("2001:db8:f::"), 64, 30, 0),
        );
        graph.add_edge(root, border, 5);
    });
    spf.add_adjacency(
        border,
        Adjacency {
            interface: 1,
            next_hop: Some(v6("fe80::2")),
        },
    )
    .await;
    spf.run_once(&router).await;
    assert!(installer.events().contains(&RouteEvent::Install {
        prefix: v6("2001:db8:f::"),
        length: 64,
        interface: 1,
        metric: 35,
    }));
}

#[tokio::test]
async fn cheaper_area_takes_the_destination() {
    let (router, _) = recording_router();
    let address = v6("2001:db8:f::");
    let area_a = id(0, 0, 0, 1);
    let area_b = id(0, 0, 0, 2);
    assert!(router.add_route(address, 9, area_a).await);
    // worse offer becomes a backup
    assert!(!router.add_route(address, 20, area_b).await);
    // better offer takes over
    assert!(router.add_route(address, 4, area_b).await);
    // the owner may update its own metric freely
    assert!(router.add_route(address, 6, area_b).await);
}

#[tokio::test]
async fn withdrawal_promotes_the_backup() {
    let (router, _) = recording_router();
    let address = v6("2001:db8:f::");
    let area_a = id(0, 0, 0, 1);
    let area_b = id(0, 0, 0, 2);
    assert!(router.add_route(address, 5, area_a).await);
    assert!(!router.add_route(address, 8, area_b).await);
    // a backup withdrawing is silent
    assert!(!router.remove_route(address, area_b).await);
    assert!(!router.add_route(address, 8, area_b).await);
    // the owner withdrawing promotes the backup
    assert!(router.remove_route(address, area_a).await);
    // the promoted area now owns the destination
    assert!(router.add_route(address, 8, area_b).await);
    // and the final withdrawal clears it
    assert!(router.remove_route(address, area_b).await);
    assert!(!router.remove_route(address, area_b).await);
}
