use std::collections::{HashMap, HashSet};
use std::net;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::interface::Interface;
use crate::lsa::{is_overlay, Lsa, LsaHeader, LsaKey, LINK_LSA_TYPE};
use crate::packet::lsack::LsAcknowledgePacket;
use crate::packet::lsu::LsUpdatePacket;
use crate::packet::Packet;
use crate::router::Router;
use crate::{util, AreaId, OSPF_MULTICAST_GROUP, UPDATE_RXMT_INTERVAL};

/// killed LSAs are reflooded a bounded number of times, one second apart.
const KILL_RETRIES: u32 = 5;

type Pending = Arc<Mutex<HashSet<LsaKey>>>;

/// # UpdateManager
/// per-interface reliable flooding. Every send opens a session holding the
/// keys still awaiting acknowledgment; a worker retransmits until the
/// session drains or the interface goes down.
pub struct UpdateManager {
    sessions: Mutex<HashMap<u64, Pending>>,
    counter: AtomicU64,
}

impl Default for UpdateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateManager {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    async fn open(&self, keys: &[LsaKey]) -> (u64, Pending) {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let pending: Pending = Arc::new(Mutex::new(keys.iter().copied().collect()));
        self.sessions.lock().await.insert(id, pending.clone());
        (id, pending)
    }

    async fn close(&self, id: u64) {
        self.sessions.lock().await.remove(&id);
    }

    pub async fn send_unicast_update(
        &self,
        router: Arc<Router>,
        interface: Arc<Interface>,
        destination: net::Ipv6Addr,
        keys: Vec<LsaKey>,
    ) {
        self.send_update(router, interface, destination, keys, false)
            .await;
    }

    pub async fn send_multicast_update(
        &self,
        router: Arc<Router>,
        interface: Arc<Interface>,
        keys: Vec<LsaKey>,
    ) {
        self.send_update(router, interface, OSPF_MULTICAST_GROUP, keys, false)
            .await;
    }

    pub async fn send_multicast_kill(
        &self,
        router: Arc<Router>,
        interface: Arc<Interface>,
        keys: Vec<LsaKey>,
    ) {
        self.send_update(router, interface, OSPF_MULTICAST_GROUP, keys, true)
            .await;
    }

    async fn send_update(
        &self,
        router: Arc<Router>,
        interface: Arc<Interface>,
        destination: net::Ipv6Addr,
        keys: Vec<LsaKey>,
        kill: bool,
    ) {
        if keys.is_empty() {
            return;
        }
        let (id, pending) = self.open(&keys).await;
        tokio::spawn(async move {
            let mut retries = 0u32;
            loop {
                let snapshot: HashSet<LsaKey> =
                    pending.lock().await.iter().copied().collect();
                if snapshot.is_empty() || !interface.is_active() {
                    break;
                }
                let lsas =
                    resolve(&router, interface.area, interface.number, &snapshot).await;
                if kill {
                    // an acknowledgment on another interface may purge the
                    // tombstone before this session has transmitted; keep
                    // retrying within the budget instead of giving up
                    if lsas.is_empty() {
                        util::debug(&format!(
                            "kill flood on interface {} waiting for {} bodies",
                            interface.number,
                            snapshot.len()
                        ));
                    } else {
                        send_lsu(&router, &interface, destination, lsas).await;
                    }
                    retries += 1;
                    if retries >= KILL_RETRIES {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                } else {
                    if lsas.is_empty() {
                        break;
                    }
                    send_lsu(&router, &interface, destination, lsas).await;
                    if !interface.has_neighbor().await {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(UPDATE_RXMT_INTERVAL)).await;
                }
            }
            interface.flood.close(id).await;
        });
    }

    /// # acknowledge_received
    /// drop acknowledged keys from every open session. An acknowledgment
    /// counts when its sequence number is at least the one we are
    /// flooding; link LSAs are acknowledged by identity.
    pub async fn acknowledge_received(
        &self,
        router: &Arc<Router>,
        area_id: AreaId,
        headers: &[LsaHeader],
    ) {
        let area = router.area(area_id).await;
        let mut acked = Vec::new();
        for header in headers {
            let key = header.key();
            let confirmed = if is_overlay(key.ls_type) {
                match router.overlay.sequence_of(key).await {
                    Some(sequence) => header.sequence_number >= sequence,
                    None => {
                        if let Some(sequence) = router.overlay.dead_sequence_of(key).await {
                            if header.sequence_number >= sequence {
                                router.overlay.remove_dead(key).await;
                            }
                            header.sequence_number >= sequence
                        } else {
                            true
                        }
                    }
                }
            } else if key.ls_type == LINK_LSA_TYPE {
                true
            } else if let Some(area) = &area {
                match area.lsdb.sequence_of(key).await {
                    Some(sequence) => header.sequence_number >= sequence,
                    None => {
                        if let Some(sequence) = area.lsdb.dead_sequence_of(key).await {
                            if header.sequence_number >= sequence {
                                area.lsdb.remove_dead(key).await;
                            }
                            header.sequence_number >= sequence
                        } else {
                            true
                        }
                    }
                }
            } else {
                true
            };
            if confirmed {
                acked.push(key);
            }
        }
        if acked.is_empty() {
            return;
        }
        let sessions = self.sessions.lock().await;
        for pending in sessions.values() {
            let mut pending = pending.lock().await;
            for key in &acked {
                pending.remove(key);
            }
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// look up the LSAs behind a set of keys, live table first, tombstones
/// second. Link LSAs flood only on the interface that owns them.
async fn resolve(
    router: &Arc<Router>,
    area_id: AreaId,
    interface_number: u32,
    keys: &HashSet<LsaKey>,
) -> Vec<Lsa> {
    let area = router.area(area_id).await;
    let mut lsas = Vec::new();
    for key in keys {
        if is_overlay(key.ls_type) {
            if let Some(lsa) = router.overlay.lookup_update(*key).await {
                lsas.push(lsa);
            }
            continue;
        }
        let area = match &area {
            Some(area) => area,
            None => continue,
        };
        if key.ls_type == LINK_LSA_TYPE {
            match area.lsdb.link_lsa_interface(*key).await {
                Some(owner) if owner == interface_number => {}
                _ => continue,
            }
        }
        if let Some(lsa) = area.lsdb.get(*key).await {
            lsas.push(lsa);
        } else if let Some(lsa) = area.lsdb.get_dead(*key).await {
            lsas.push(lsa);
        }
    }
    lsas
}

async fn send_lsu(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    destination: net::Ipv6Addr,
    lsas: Vec<Lsa>,
) {
    let packet = Packet::LsUpdate(LsUpdatePacket::new(
        router.router_id,
        interface.area,
        lsas,
    ));
    let data = packet.to_be_bytes(&interface.link_local, &destination);
    if let Err(err) = router.transport.send(interface.number, destination, &data) {
        util::error(&format!(
            "ls update on interface {} failed: {}",
            interface.number, err
        ));
    }
}

pub async fn send_ack(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    destination: net::Ipv6Addr,
    headers: Vec<LsaHeader>,
) {
    if headers.is_empty() {
        return;
    }
    let packet = Packet::LsAcknowledge(LsAcknowledgePacket::new(
        router.router_id,
        interface.area,
        headers,
    ));
    let data = packet.to_be_bytes(&interface.link_local, &destination);
    if let Err(err) = router.transport.send(interface.number, destination, &data) {
        util::error(&format!(
            "ls acknowledge on interface {} failed: {}",
            interface.number, err
        ));
    }
}

/// # multicast_area
/// flood a set of keys out every interface attached to one area.
pub async fn multicast_area(router: &Arc<Router>, area: AreaId, keys: &[LsaKey]) {
    for interface in router.area_interfaces(area).await {
        interface
            .flood
            .send_multicast_update(router.clone(), interface.clone(), keys.to_vec())
            .await;
    }
}

pub async fn multicast_area_kill(router: &Arc<Router>, area: AreaId, keys: &[LsaKey]) {
    for interface in router.area_interfaces(area).await {
        interface
            .flood
            .send_multicast_kill(router.clone(), interface.clone(), keys.to_vec())
            .await;
    }
}

/// # multicast_all
/// flood out every interface regardless of area, used for the overlay
/// scope.
pub async fn multicast_all(router: &Arc<Router>, keys: &[LsaKey]) {
    let interfaces: Vec<Arc<Interface>> =
        router.interfaces.read().await.values().cloned().collect();
    for interface in interfaces {
        interface
            .flood
            .send_multicast_update(router.clone(), interface.clone(), keys.to_vec())
            .await;
    }
}
