use std::net;
use std::sync::Arc;

use super::support::{id, v6, RecordingInstaller};
use crate::interface::{Interface, Status};
use crate::neighbor::{Neighbor, Status as NeighborStatus};
use crate::router::Router;
use crate::transport::{MemoryHub, MemoryTransport};
use crate::NULL_ID;

fn quiet_router(router_id: net::Ipv4Addr) -> Arc<Router> {
    let transport = MemoryTransport::new(MemoryHub::new());
    Router::new(router_id, transport, RecordingInstaller::new())
}

async fn candidate(
    interface: &Arc<Interface>,
    id: net::Ipv4Addr,
    address: net::Ipv6Addr,
    priority: u8,
    interface_id: u32,
) -> Arc<Neighbor> {
    let neighbor = Neighbor::new(id, address, interface.area, interface.number, 40);
    {
        let mut state = neighbor.state.write().await;
        state.status = NeighborStatus::TwoWay;
        state.priority = priority;
        state.interface_id = interface_id;
    }
    interface
        .state
        .write()
        .await
        .neighbors
        .insert(id, neighbor.clone());
    neighbor
}

#[tokio::test]
async fn highest_id_wins_among_equal_priorities() {
    let router = quiet_router(id(1, 1, 1, 1));
    let interface = Interface::new(1, id(0, 0, 0, 0), v6("fe80::1"), 10, 1, 10, 40);
    candidate(&interface, id(2, 2, 2, 2), v6("fe80::2"), 1, 4).await;
    candidate(&interface, id(3, 3, 3, 3), v6("fe80::3"), 1, 9).await;
    interface.elect_dr_bdr(&router).await;
    let state = interface.state.read().await;
    assert_eq!(state.dr, id(3, 3, 3, 3));
    assert_eq!(state.dr_interface, 9);
    assert_eq!(state.bdr, id(2, 2, 2, 2));
    assert_eq!(state.status, Status::DrOther);
}

#[tokio::test]
async fn priority_beats_identity() {
    let router = quiet_router(id(1, 1, 1, 1));
    let interface = Interface::new(1, id(0, 0, 0, 0), v6("fe80::1"), 10, 1, 10, 40);
    candidate(&interface, id(2, 2, 2, 2), v6("fe80::2"), 5, 4).await;
    candidate(&interface, id(3, 3, 3, 3), v6("fe80::3"), 1, 9).await;
    interface.elect_dr_bdr(&router).await;
    let state = interface.state.read().await;
    assert_eq!(state.dr, id(2, 2, 2, 2));
    assert_eq!(state.bdr, id(3, 3, 3, 3));
}

#[tokio::test]
async fn established_pair_survives_a_better_candidate() {
    let router = quiet_router(id(1, 1, 1, 1));
    let interface = Interface::new(1, id(0, 0, 0, 0), v6("fe80::1"), 10, 1, 10, 40);
    candidate(&interface, id(2, 2, 2, 2), v6("fe80::2"), 1, 4).await;
    candidate(&interface, id(3, 3, 3, 3), v6("fe80::3"), 1, 9).await;
    interface.elect_dr_bdr(&router).await;
    candidate(&interface, id(9, 9, 9, 9), v6("fe80::9"), 7, 2).await;
    interface.elect_dr_bdr(&router).await;
    let state = interface.state.read().await;
    assert_eq!(state.dr, id(3, 3, 3, 3));
    assert_eq!(state.bdr, id(2, 2, 2, 2));
}

#[tokio::test]
async fn lost_member_forces_a_new_election() {
    let router = quiet_router(id(1, 1, 1, 1));
    let interface = Interface::new(1, id(0, 0, 0, 0), v6("fe80::1"), 10, 1, 10, 40);
    candidate(&interface, id(2, 2, 2, 2), v6("fe80::2"), 1, 4).await;
    candidate(&interface, id(3, 3, 3, 3), v6("fe80::3"), 1, 9).await;
    interface.elect_dr_bdr(&router).await;
    {
        let mut state = interface.state.write().await;
        state.neighbors.remove(&id(3, 3, 3, 3));
        state.dr = NULL_ID;
        state.dr_interface = 0;
    }
    interface.elect_dr_bdr(&router).await;
    let state = interface.state.read().await;
    assert_eq!(state.dr, id(2, 2, 2, 2));
    assert_eq!(state.bdr, id(1, 1, 1, 1));
    assert_eq!(state.status, Status::Backup);
}

#[tokio::test]
async fn zero_priority_interface_never_designated() {
    let router = quiet_router(id(5, 5, 5, 5));
    let interface = Interface::new(1, id(0, 0, 0, 0), v6("fe80::5"), 10, 0, 10, 40);
    candidate(&interface, id(2, 2, 2, 2), v6("fe80::2"), 1, 4).await;
    interface.elect_dr_bdr(&router).await;
    let state = interface.state.read().await;
    assert_eq!(state.dr, id(2, 2, 2, 2));
    assert_eq!(state.bdr, NULL_ID);
    assert_eq!(state.status, Status::DrOther);
}

#[tokio::test]
async fn zero_priority_neighbors_excluded() {
    let router = quiet_router(id(1, 1, 1, 1));
    let interface = Interface::new(1, id(0, 0, 0, 0), v6("fe80::1"), 10, 1, 10, 40);
    candidate(&interface, id(2, 2, 2, 2), v6("fe80::2"), 0, 4).await;
    interface.elect_dr_bdr(&router).await;
    let state = interface.state.read().await;
    assert_eq!(state.dr, id(1, 1, 1, 1));
    assert_eq!(state.bdr, NULL_ID);
    assert_eq!(state.status, Status::Dr);
}

#[tokio::test]
async fn pre_two_way_neighbors_are_not_candidates() {
    let router = quiet_router(id(1, 1, 1, 1));
    let interface = Interface::new(1, id(0, 0, 0, 0), v6("fe80::1"), 10, 1, 10, 40);
    let neighbor = candidate(&interface, id(2, 2, 2, 2), v6("fe80::2"), 1, 4).await;
    neighbor.state.write().await.status = NeighborStatus::Init;
    interface.elect_dr_bdr(&router).await;
    let state = interface.state.read().await;
    assert_eq!(state.dr, id(1, 1, 1, 1));
    assert_eq!(state.status, Status::Dr);
}
