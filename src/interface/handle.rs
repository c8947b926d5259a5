use std::net;
use std::sync::Arc;

use crate::area::lsdb::ReceivingInterface;
use crate::error::OspfError;
use crate::flood;
use crate::lsa::{is_overlay, LsaBody, LsaHeader, LsaKey};
use crate::neighbor::{self, Status as NeighborStatus};
use crate::packet::hello::HelloPacket;
use crate::packet::lsr::LsRequestPacket;
use crate::packet::lsu::LsUpdatePacket;
use crate::packet::{self, Packet};
use crate::router::Router;
use crate::{util, NULL_ID};

use super::{Interface, Status};

/// # recv_loop
/// pull frames off the transport and hand each one to its own worker.
/// The transport's receive timeout doubles as the shutdown poll.
pub async fn recv_loop(router: Arc<Router>, interface: Arc<Interface>) {
    while interface.is_active() {
        let transport = router.transport.clone();
        let number = interface.number;
        let received = tokio::task::spawn_blocking(move || transport.recv(number)).await;
        let (data, source) = match received {
            Ok(Ok(frame)) => frame,
            Ok(Err(_)) => continue,
            Err(_) => break,
        };
        let worker_router = router.clone();
        let worker_interface = interface.clone();
        tokio::spawn(async move {
            process_packet(worker_router, worker_interface, data, source).await;
        });
    }
}

/// validate an incoming frame: checksum, parse, and the area gate. A
/// packet for an area this interface is not attached to is rejected.
pub(crate) fn accept(
    interface: &Interface,
    data: &[u8],
    source: &net::Ipv6Addr,
) -> Result<Packet, OspfError> {
    packet::check_data(data, source, &interface.link_local)?;
    let packet = Packet::try_from_be_bytes(data)?;
    if packet.header().area_id != interface.area {
        return Err(OspfError::UnknownArea(packet.header().area_id));
    }
    Ok(packet)
}

async fn process_packet(
    router: Arc<Router>,
    interface: Arc<Interface>,
    data: Vec<u8>,
    source: net::Ipv6Addr,
) {
    if source == interface.link_local {
        return;
    }
    let packet = match accept(&interface, &data, &source) {
        Ok(packet) => packet,
        Err(err) => {
            util::debug(&format!("dropped packet from {}: {}", source, err));
            return;
        }
    };
    let header = *packet.header();
    if header.router_id == router.router_id {
        return;
    }
    match packet {
        Packet::Hello(hello) => process_hello(&router, &interface, &hello, source).await,
        Packet::DbDescription(dd) => {
            if let Some(neighbor) = interface.lookup_neighbor(header.router_id).await {
                neighbor.deliver_dd(dd).await;
            }
        }
        Packet::LsRequest(request) => {
            process_ls_request(&router, &interface, request, source).await
        }
        Packet::LsUpdate(update) => process_ls_update(&router, &interface, update, source).await,
        Packet::LsAcknowledge(ack) => {
            interface
                .flood
                .acknowledge_received(&router, interface.area, &ack.lsa_headers)
                .await;
        }
    }
}

/// # process_hello
/// feed the neighbor machine, then deal with the segment roles: a hello
/// naming an established pair ends the waiting period early, and a hello
/// disagreeing with our elected pair triggers a re-election.
async fn process_hello(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    hello: &HelloPacket,
    source: net::Ipv6Addr,
) {
    let neighbor = interface
        .ensure_neighbor(router, hello.header.router_id, source)
        .await;
    neighbor::hello_received(router, interface, &neighbor, hello).await;
    let (status, dr, bdr) = {
        let state = interface.state.read().await;
        (state.status, state.dr, state.bdr)
    };
    let elect = match status {
        Status::Waiting => {
            hello.designated_router != NULL_ID && hello.backup_designated_router != NULL_ID
        }
        Status::Dr | Status::Backup | Status::DrOther => {
            (hello.designated_router != dr || hello.backup_designated_router != bdr)
                && neighbor.status().await >= NeighborStatus::TwoWay
        }
        _ => false,
    };
    if elect {
        let (updates, kills) = interface.elect_dr_bdr(router).await;
        flood::multicast_area(router, interface.area, &updates).await;
        flood::multicast_area_kill(router, interface.area, &kills).await;
    }
}

async fn process_ls_request(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    request: LsRequestPacket,
    source: net::Ipv6Addr,
) {
    if request.requests.is_empty() {
        return;
    }
    interface
        .flood
        .send_unicast_update(
            router.clone(),
            interface.clone(),
            source,
            request.requests,
        )
        .await;
}

/// # process_ls_update
/// acknowledge everything first, then fold each LSA into the database.
/// Copies of our own LSAs with a higher sequence number get jumped past
/// and reflooded; everything genuinely new floods onward, area-scoped
/// LSAs within the area and overlay LSAs everywhere. Link LSAs never
/// leave their segment.
pub async fn process_ls_update(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    update: LsUpdatePacket,
    source: net::Ipv6Addr,
) {
    let headers: Vec<LsaHeader> = update.lsas.iter().map(|lsa| lsa.wire_header()).collect();
    flood::send_ack(router, interface, source, headers).await;
    let area = match router.area(interface.area).await {
        Some(area) => area,
        None => return,
    };
    let (cost, is_dr) = {
        let state = interface.state.read().await;
        (state.cost, state.status == Status::Dr)
    };
    let mut forward_area: Vec<LsaKey> = Vec::new();
    let mut forward_all: Vec<LsaKey> = Vec::new();
    let mut updates: Vec<LsaKey> = Vec::new();
    let mut kills: Vec<LsaKey> = Vec::new();
    for lsa in update.lsas {
        let key = lsa.key();
        let header = lsa.header;
        if header.adv_router == router.router_id {
            let bumped = if is_overlay(key.ls_type) {
                router
                    .overlay
                    .bump_self_lsa(key, header.sequence_number)
                    .await
            } else {
                area.lsdb.bump_self_lsa(key, header.sequence_number).await
            };
            if let Some(key) = bumped {
                util::debug(&format!("took back {} past foreign copy", key));
                if is_overlay(key.ls_type) {
                    forward_all.push(key);
                } else {
                    updates.push(key);
                }
            }
            continue;
        }
        let stored = if is_overlay(key.ls_type) {
            router.overlay.sequence_of(key).await
        } else {
            area.lsdb.sequence_of(key).await
        };
        if let Some(sequence) = stored {
            if header.sequence_number <= sequence {
                continue;
            }
        }
        let dead = lsa.is_dead();
        let inter_area = router.is_inter_area();
        match lsa.body {
            LsaBody::Router(body) => {
                area.lsdb.update_router_lsa(header, body, dead).await;
                forward_area.push(key);
            }
            LsaBody::Network(body) => {
                area.lsdb
                    .update_network_lsa(header, body, dead, Some(interface.number))
                    .await;
                forward_area.push(key);
            }
            LsaBody::InterAreaPrefix(body) => {
                area.lsdb
                    .update_inter_area_prefix_lsa(header, body, dead)
                    .await;
                forward_area.push(key);
            }
            LsaBody::IntraAreaPrefix(body) => {
                area.lsdb
                    .update_intra_area_prefix_lsa(header, body, dead)
                    .await;
                forward_area.push(key);
            }
            LsaBody::Link(body) => {
                let receiving = ReceivingInterface {
                    number: interface.number,
                    cost,
                    is_dr,
                };
                let (folded, killed) = area
                    .lsdb
                    .update_link_lsa(header, body, dead, receiving)
                    .await;
                updates.extend(folded);
                kills.extend(killed);
            }
            LsaBody::Abr(body) => {
                router
                    .overlay
                    .update_abr_lsa(header, body, dead, inter_area)
                    .await;
                forward_all.push(key);
            }
            LsaBody::OverlayPrefix(body) => {
                router
                    .overlay
                    .update_prefix_lsa(header, body, dead, inter_area)
                    .await;
                forward_all.push(key);
            }
            LsaBody::Asbr(body) => {
                router
                    .overlay
                    .update_asbr_lsa(header, body, dead)
                    .await;
                forward_all.push(key);
            }
        }
    }
    if !forward_area.is_empty() {
        for other in router.area_interfaces(interface.area).await {
            if other.number == interface.number {
                continue;
            }
            other
                .flood
                .send_multicast_update(router.clone(), other.clone(), forward_area.clone())
                .await;
        }
    }
    if !forward_all.is_empty() {
        let interfaces: Vec<Arc<Interface>> =
            router.interfaces.read().await.values().cloned().collect();
        for other in interfaces {
            if other.number == interface.number {
                continue;
            }
            other
                .flood
                .send_multicast_update(router.clone(), other.clone(), forward_all.clone())
                .await;
        }
    }
    flood::multicast_area(router, interface.area, &updates).await;
    flood::multicast_area_kill(router, interface.area, &kills).await;
}
