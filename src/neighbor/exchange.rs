use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::interface::Interface;
use crate::lsa::{is_overlay, LsaHeader, LsaKey};
use crate::packet::dd::{DbDescriptionPacket, DD_FLAG_I, DD_FLAG_M, DD_FLAG_MS};
use crate::packet::lsr::LsRequestPacket;
use crate::packet::Packet;
use crate::router::Router;
use crate::{util, DEFAULT_RXMT_INTERVAL};

use super::{neighbor_down, seed_dd_sequence, Neighbor, Status};

/// an exchange that makes no progress for this many rounds is abandoned
/// and the neighbor declared down.
const MAX_ROUNDS: u32 = 40;

/// # start
/// begin database synchronization. The side with the higher router id
/// drives the conversation as master. Idempotent while a session runs.
pub async fn start(router: &Arc<Router>, interface: &Arc<Interface>, neighbor: &Arc<Neighbor>) {
    let rx = match neighbor.install_dd_channel().await {
        Some(rx) => rx,
        None => return,
    };
    {
        let mut state = neighbor.state.write().await;
        state.status = Status::ExStart;
        state.master = router.router_id > neighbor.id;
        state.dd_sequence_number = seed_dd_sequence();
    }
    util::debug(&format!("neighbor {} exstart", neighbor.id));
    let session_router = router.clone();
    let session_interface = interface.clone();
    let session_neighbor = neighbor.clone();
    let handle = tokio::spawn(async move {
        run(session_router, session_interface, session_neighbor, rx).await;
    });
    neighbor.push_handle(handle).await;
}

enum Wait {
    Packet(DbDescriptionPacket),
    Timeout,
    Closed,
}

async fn wait(rx: &mut mpsc::Receiver<DbDescriptionPacket>) -> Wait {
    match tokio::time::timeout(Duration::from_secs(DEFAULT_RXMT_INTERVAL), rx.recv()).await {
        Ok(Some(packet)) => Wait::Packet(packet),
        Ok(None) => Wait::Closed,
        Err(_) => Wait::Timeout,
    }
}

async fn send_dd(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    neighbor: &Arc<Neighbor>,
    flags: u8,
    sequence: u32,
    headers: Vec<LsaHeader>,
) {
    let packet = Packet::DbDescription(DbDescriptionPacket::new(
        router.router_id,
        interface.area,
        flags,
        sequence,
        headers,
    ));
    let data = packet.to_be_bytes(&interface.link_local, &neighbor.address);
    if let Err(err) = router.transport.send(interface.number, neighbor.address, &data) {
        util::error(&format!(
            "db description to {} failed: {}",
            neighbor.id, err
        ));
    }
}

async fn collect_headers(router: &Arc<Router>, interface: &Arc<Interface>) -> Vec<LsaHeader> {
    let mut headers = match router.area(interface.area).await {
        Some(area) => area.lsdb.lsa_headers(interface.number).await,
        None => Vec::new(),
    };
    headers.extend(router.overlay.lsa_headers().await);
    headers
}

async fn record_headers(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    neighbor: &Arc<Neighbor>,
    headers: &[LsaHeader],
) {
    let area = router.area(interface.area).await;
    for header in headers {
        if is_overlay(header.ls_type) {
            router.overlay.ls_request(neighbor.id, header).await;
        } else if let Some(area) = &area {
            area.lsdb.ls_request(neighbor.id, header).await;
        }
    }
}

async fn run(
    router: Arc<Router>,
    interface: Arc<Interface>,
    neighbor: Arc<Neighbor>,
    mut rx: mpsc::Receiver<DbDescriptionPacket>,
) {
    let (master, mut sequence) = {
        let state = neighbor.state.read().await;
        (state.master, state.dd_sequence_number)
    };
    let our_headers = collect_headers(&router, &interface).await;
    let mut rounds = 0u32;
    macro_rules! round {
        () => {
            rounds += 1;
            if rounds > MAX_ROUNDS {
                util::error(&format!("exchange with {} stalled", neighbor.id));
                neighbor_down(&router, &interface, &neighbor).await;
                return;
            }
        };
    }

    if master {
        // negotiation: empty initial descriptions until the slave backs
        // down and echoes our sequence with its summary
        loop {
            round!();
            send_dd(
                &router,
                &interface,
                &neighbor,
                DD_FLAG_I | DD_FLAG_M | DD_FLAG_MS,
                sequence,
                Vec::new(),
            )
            .await;
            match wait(&mut rx).await {
                Wait::Packet(dd)
                    if !dd.is_initial()
                        && !dd.is_master()
                        && dd.dd_sequence_number == sequence =>
                {
                    record_headers(&router, &interface, &neighbor, &dd.lsa_headers).await;
                    break;
                }
                Wait::Packet(_) | Wait::Timeout => {}
                Wait::Closed => return,
            }
        }
        neighbor.set_status(Status::Exchange).await;
        // summary round: our headers, more bit still set
        sequence += 1;
        loop {
            round!();
            send_dd(
                &router,
                &interface,
                &neighbor,
                DD_FLAG_M | DD_FLAG_MS,
                sequence,
                our_headers.clone(),
            )
            .await;
            match wait(&mut rx).await {
                Wait::Packet(dd) if !dd.is_master() && dd.dd_sequence_number == sequence => {
                    record_headers(&router, &interface, &neighbor, &dd.lsa_headers).await;
                    break;
                }
                Wait::Packet(_) | Wait::Timeout => {}
                Wait::Closed => return,
            }
        }
        // closing round: more bit cleared
        sequence += 1;
        loop {
            round!();
            send_dd(&router, &interface, &neighbor, DD_FLAG_MS, sequence, Vec::new()).await;
            match wait(&mut rx).await {
                Wait::Packet(dd) if !dd.is_master() && dd.dd_sequence_number == sequence => {
                    record_headers(&router, &interface, &neighbor, &dd.lsa_headers).await;
                    break;
                }
                Wait::Packet(_) | Wait::Timeout => {}
                Wait::Closed => return,
            }
        }
    } else {
        // both sides open claiming mastership; the higher id wins and we
        // adopt its sequence
        loop {
            round!();
            send_dd(
                &router,
                &interface,
                &neighbor,
                DD_FLAG_I | DD_FLAG_M | DD_FLAG_MS,
                sequence,
                Vec::new(),
            )
            .await;
            match wait(&mut rx).await {
                Wait::Packet(dd) if dd.is_initial() && dd.is_master() => {
                    sequence = dd.dd_sequence_number;
                    break;
                }
                Wait::Packet(_) | Wait::Timeout => {}
                Wait::Closed => return,
            }
        }
        neighbor.set_status(Status::Exchange).await;
        send_dd(
            &router,
            &interface,
            &neighbor,
            DD_FLAG_M,
            sequence,
            our_headers.clone(),
        )
        .await;
        let mut more = true;
        while more {
            round!();
            match wait(&mut rx).await {
                Wait::Packet(dd) if dd.is_master() => {
                    if dd.is_initial() || dd.dd_sequence_number == sequence {
                        // duplicate of the negotiation, resend our summary
                        send_dd(
                            &router,
                            &interface,
                            &neighbor,
                            DD_FLAG_M,
                            sequence,
                            our_headers.clone(),
                        )
                        .await;
                    } else if dd.dd_sequence_number == sequence + 1 {
                        sequence += 1;
                        record_headers(&router, &interface, &neighbor, &dd.lsa_headers).await;
                        if dd.flags & DD_FLAG_M == 0 {
                            more = false;
                        }
                        send_dd(&router, &interface, &neighbor, 0, sequence, Vec::new()).await;
                    }
                }
                Wait::Packet(_) | Wait::Timeout => {}
                Wait::Closed => return,
            }
        }
        // answer straggling retransmissions of the final description
        for _ in 0..2 {
            match wait(&mut rx).await {
                Wait::Packet(dd) if dd.is_master() && dd.dd_sequence_number == sequence => {
                    send_dd(&router, &interface, &neighbor, 0, sequence, Vec::new()).await;
                }
                _ => break,
            }
        }
    }
    {
        let mut state = neighbor.state.write().await;
        state.dd_sequence_number = sequence;
        state.status = Status::Loading;
    }
    util::debug(&format!("neighbor {} loading", neighbor.id));
    loading(&router, &interface, &neighbor).await;
}

/// # loading
/// drain the request list once and keep asking for whatever has not
/// arrived yet; everything present completes the adjacency.
async fn loading(router: &Arc<Router>, interface: &Arc<Interface>, neighbor: &Arc<Neighbor>) {
    let area = match router.area(interface.area).await {
        Some(area) => area,
        None => return,
    };
    let mut wanted = area.lsdb.get_ls_requests(neighbor.id).await;
    wanted.extend(router.overlay.get_ls_requests(neighbor.id).await);
    let mut rounds = 0u32;
    loop {
        let mut missing = Vec::new();
        for key in &wanted {
            let present = if is_overlay(key.ls_type) {
                router.overlay.lookup_update(*key).await.is_some()
            } else {
                area.lsdb.get(*key).await.is_some() || area.lsdb.get_dead(*key).await.is_some()
            };
            if !present {
                missing.push(*key);
            }
        }
        if missing.is_empty() {
            break;
        }
        rounds += 1;
        if rounds > MAX_ROUNDS {
            util::error(&format!("loading from {} stalled", neighbor.id));
            neighbor_down(router, interface, neighbor).await;
            return;
        }
        send_ls_request(router, interface, neighbor, missing.clone()).await;
        tokio::time::sleep(Duration::from_secs(DEFAULT_RXMT_INTERVAL)).await;
        wanted = missing;
    }
    neighbor.set_status(Status::Full).await;
    util::log(&format!(
        "neighbor {} full on interface {}",
        neighbor.id, interface.number
    ));
    interface.adjacency_established(router, neighbor).await;
}

async fn send_ls_request(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    neighbor: &Arc<Neighbor>,
    requests: Vec<LsaKey>,
) {
    let packet = Packet::LsRequest(LsRequestPacket::new(
        router.router_id,
        interface.area,
        requests,
    ));
    let data = packet.to_be_bytes(&interface.link_local, &neighbor.address);
    if let Err(err) = router.transport.send(interface.number, neighbor.address, &data) {
        util::error(&format!("ls request to {} failed: {}", neighbor.id, err));
    }
}
