use std::collections::{HashMap, HashSet};
use std::net;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::flood::{self, UpdateManager};
use crate::lsa::{LsaKey, Prefix, RouterLink};
use crate::neighbor::{self, Neighbor, Status as NeighborStatus};
use crate::packet::hello::HelloPacket;
use crate::packet::Packet;
use crate::router::Router;
use crate::rtable::{Adjacency, NodeId};
use crate::{util, AreaId, RouterId, NULL_ID, OSPF_MULTICAST_GROUP};

pub mod handle;
pub mod status;

pub use status::Status;

use crate::area::lsdb::PREFIX_OPTION_LA;

/// # InterfaceState
/// the mutable half of an interface: election results, the neighbor
/// table and which of those neighbors are full adjacencies.
pub struct InterfaceState {
    pub status: Status,
    pub cost: u16,
    pub dr: RouterId,
    pub dr_interface: u32,
    pub bdr: RouterId,
    pub neighbors: HashMap<RouterId, Arc<Neighbor>>,
    pub adjacencies: HashSet<RouterId>,
    pub full_address: Option<(net::Ipv6Addr, u8)>,
}

/// # Interface
/// one attachment to a segment. Identity and timers are fixed at
/// creation; everything an election or a neighbor can change lives in
/// `state`.
pub struct Interface {
    pub number: u32,
    pub area: AreaId,
    pub link_local: net::Ipv6Addr,
    pub hello_interval: u16,
    pub dead_interval: u16,
    pub priority: u8,
    pub flood: UpdateManager,
    pub state: RwLock<InterfaceState>,
    active: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Interface {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        number: u32,
        area: AreaId,
        link_local: net::Ipv6Addr,
        cost: u16,
        priority: u8,
        hello_interval: u16,
        dead_interval: u16,
    ) -> Arc<Self> {
        Arc::new(Self {
            number,
            area,
            link_local,
            hello_interval,
            dead_interval,
            priority,
            flood: UpdateManager::new(),
            state: RwLock::new(InterfaceState {
                status: Status::Down,
                cost,
                dr: NULL_ID,
                dr_interface: 0,
                bdr: NULL_ID,
                neighbors: HashMap::new(),
                adjacencies: HashSet::new(),
                full_address: None,
            }),
            active: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn has_neighbor(&self) -> bool {
        let state = self.state.read().await;
        for neighbor in state.neighbors.values() {
            if neighbor.status().await >= NeighborStatus::Exchange {
                return true;
            }
        }
        false
    }

    pub async fn cost(&self) -> u16 {
        self.state.read().await.cost
    }

    /// # start
    /// originate our per-interface LSAs and spawn the hello, wait and
    /// receive loops. A priority of zero skips waiting; the interface can
    /// never be (backup) designated router.
    pub async fn start(self: &Arc<Self>, router: &Arc<Router>) {
        self.active.store(true, Ordering::SeqCst);
        if let Err(err) = router.transport.join_multicast(self.number) {
            util::error(&format!(
                "interface {} multicast join failed: {}",
                self.number, err
            ));
        }
        if let Some(area) = router.area(self.area).await {
            area.lsdb.create_router_lsa(router.is_inter_area()).await;
            let full_address = self.state.read().await.full_address;
            area.lsdb
                .create_link_lsa(self.number, self.priority, self.link_local, full_address)
                .await;
        }
        {
            let mut state = self.state.write().await;
            state.status = if self.priority == 0 {
                Status::DrOther
            } else {
                Status::Waiting
            };
        }
        let mut handles = self.handles.lock().await;
        let hello_router = router.clone();
        let hello_interface = self.clone();
        handles.push(tokio::spawn(async move {
            hello_interface.hello_loop(hello_router).await;
        }));
        if self.priority > 0 {
            let wait_router = router.clone();
            let wait_interface = self.clone();
            handles.push(tokio::spawn(async move {
                wait_interface.wait_loop(wait_router).await;
            }));
        }
        handles.push(tokio::spawn(handle::recv_loop(
            router.clone(),
            self.clone(),
        )));
        util::log(&format!(
            "interface {} up in area {} ({})",
            self.number, self.area, self.link_local
        ));
    }

    async fn hello_loop(self: Arc<Self>, router: Arc<Router>) {
        loop {
            self.send_hello(&router).await;
            tokio::time::sleep(Duration::from_secs(self.hello_interval as u64)).await;
        }
    }

    pub async fn send_hello(&self, router: &Arc<Router>) {
        let (dr, bdr, neighbors) = {
            let state = self.state.read().await;
            (
                state.dr,
                state.bdr,
                state.neighbors.keys().copied().collect::<Vec<_>>(),
            )
        };
        let packet = Packet::Hello(HelloPacket::new(
            router.router_id,
            self.area,
            self.number,
            self.priority,
            self.hello_interval,
            self.dead_interval,
            dr,
            bdr,
            neighbors,
        ));
        let data = packet.to_be_bytes(&self.link_local, &OSPF_MULTICAST_GROUP);
        if let Err(err) = router
            .transport
            .send(self.number, OSPF_MULTICAST_GROUP, &data)
        {
            util::error(&format!("hello on {} failed: {}", self.number, err));
        }
    }

    /// the waiting period ends after one dead interval unless a hello
    /// carrying an established pair ended it early.
    async fn wait_loop(self: Arc<Self>, router: Arc<Router>) {
        tokio::time::sleep(Duration::from_secs(self.dead_interval as u64)).await;
        if self.state.read().await.status == Status::Waiting {
            let (updates, kills) = self.elect_dr_bdr(&router).await;
            flood::multicast_area(&router, self.area, &updates).await;
            flood::multicast_area_kill(&router, self.area, &kills).await;
        }
    }

    pub async fn should_adjacency(&self, neighbor: &Arc<Neighbor>) -> bool {
        let state = self.state.read().await;
        match state.status {
            Status::Dr | Status::Backup | Status::PointToPoint => true,
            _ => neighbor.id == state.dr || neighbor.id == state.bdr,
        }
    }

    /// # elect_dr_bdr
    /// deterministic election over ourselves and every bidirectional
    /// neighbor with a nonzero priority: highest (priority, id) wins,
    /// the runner-up becomes backup. An established pair is left alone
    /// while both members are still candidates, so the outcome is stable
    /// under hello churn.
    pub async fn elect_dr_bdr(self: &Arc<Self>, router: &Arc<Router>) -> (Vec<LsaKey>, Vec<LsaKey>) {
        let mut updates = Vec::new();
        let mut kills = Vec::new();
        let mut candidates: Vec<(u8, RouterId, u32)> = Vec::new();
        if self.priority > 0 {
            candidates.push((self.priority, router.router_id, self.number));
        }
        let snapshot: Vec<Arc<Neighbor>> = self
            .state
            .read()
            .await
            .neighbors
            .values()
            .cloned()
            .collect();
        for neighbor in &snapshot {
            let state = neighbor.state.read().await;
            if state.status >= NeighborStatus::TwoWay && state.priority > 0 {
                candidates.push((state.priority, neighbor.id, state.interface_id));
            }
        }
        if candidates.is_empty() {
            return (updates, kills);
        }
        let (old_status, outcome) = {
            let mut state = self.state.write().await;
            if state.dr != NULL_ID && state.bdr != NULL_ID {
                let alive =
                    |id: RouterId| candidates.iter().any(|(_, candidate, _)| *candidate == id);
                if alive(state.dr) && alive(state.bdr) {
                    return (updates, kills);
                }
            }
            let dr = match candidates.iter().max_by_key(|(priority, id, _)| (*priority, *id)) {
                Some(found) => *found,
                None => return (updates, kills),
            };
            let bdr = candidates
                .iter()
                .filter(|(_, id, _)| *id != dr.1)
                .max_by_key(|(priority, id, _)| (*priority, *id))
                .copied();
            let old_status = state.status;
            state.dr = dr.1;
            state.dr_interface = dr.2;
            state.bdr = bdr.map(|(_, id, _)| id).unwrap_or(NULL_ID);
            state.status = if dr.1 == router.router_id {
                Status::Dr
            } else if state.bdr == router.router_id {
                Status::Backup
            } else {
                Status::DrOther
            };
            (old_status, (state.status, dr.1, dr.2, state.bdr, state.cost))
        };
        let (status, dr, dr_interface, bdr, cost) = outcome;
        util::log(&format!(
            "interface {} elected dr {} bdr {} ({})",
            self.number, dr, bdr, status
        ));
        if let Some(area) = router.area(self.area).await {
            if let Some(key) = area
                .lsdb
                .update_self_router_lsa_update_dr(RouterLink::new(
                    cost,
                    self.number,
                    dr_interface,
                    dr,
                ))
                .await
            {
                updates.push(key);
            }
            if old_status == Status::Dr && status != Status::Dr {
                if let Some(key) = area.lsdb.kill_self_network_lsa(self.number).await {
                    kills.push(key);
                }
                if let Some(key) = area
                    .lsdb
                    .kill_self_intra_area_prefix_network(self.number)
                    .await
                {
                    kills.push(key);
                }
            }
            if status == Status::Dr && old_status != Status::Dr {
                let full: Vec<RouterId> = self
                    .state
                    .read()
                    .await
                    .adjacencies
                    .iter()
                    .copied()
                    .collect();
                if !full.is_empty() {
                    updates.push(area.lsdb.create_network_lsa(self.number, full).await);
                }
            }
        }
        for neighbor in &snapshot {
            neighbor::reevaluate(router, self, neighbor).await;
        }
        (updates, kills)
    }

    pub async fn lookup_neighbor(&self, id: RouterId) -> Option<Arc<Neighbor>> {
        self.state.read().await.neighbors.get(&id).cloned()
    }

    pub async fn ensure_neighbor(
        self: &Arc<Self>,
        router: &Arc<Router>,
        id: RouterId,
        source: net::Ipv6Addr,
    ) -> Arc<Neighbor> {
        if let Some(existing) = self.lookup_neighbor(id).await {
            return existing;
        }
        let neighbor = Neighbor::new(id, source, self.area, self.number, self.dead_interval);
        neighbor
            .start_inactivity(router.clone(), self.clone())
            .await;
        self.state
            .write()
            .await
            .neighbors
            .insert(id, neighbor.clone());
        util::log(&format!(
            "neighbor {} discovered on interface {}",
            id, self.number
        ));
        neighbor
    }

    /// # adjacency_established
    /// a neighbor reached full. The first full adjacency puts the transit
    /// link into our router LSA; as designated router we also reoriginate
    /// the segment's network LSA.
    pub async fn adjacency_established(self: &Arc<Self>, router: &Arc<Router>, neighbor: &Arc<Neighbor>) {
        let (first, is_dr, cost, dr, dr_interface, full, full_address) = {
            let mut state = self.state.write().await;
            state.adjacencies.insert(neighbor.id);
            (
                state.adjacencies.len() == 1,
                state.status == Status::Dr,
                state.cost,
                state.dr,
                state.dr_interface,
                state.adjacencies.iter().copied().collect::<Vec<_>>(),
                state.full_address,
            )
        };
        let area = match router.area(self.area).await {
            Some(area) => area,
            None => return,
        };
        area.spf
            .add_adjacency(
                NodeId::Router(neighbor.id),
                Adjacency {
                    interface: self.number,
                    next_hop: Some(neighbor.address),
                },
            )
            .await;
        let mut updates = Vec::new();
        if first {
            if let Some(key) = area
                .lsdb
                .update_self_router_lsa_add_interface(RouterLink::new(
                    cost,
                    self.number,
                    dr_interface,
                    dr,
                ))
                .await
            {
                updates.push(key);
            }
        }
        if is_dr {
            updates.push(area.lsdb.create_network_lsa(self.number, full).await);
            if let Some((address, length)) = full_address {
                if length < 128 {
                    if let Some(key) = area
                        .lsdb
                        .update_self_intra_area_prefix_network_add(
                            self.number,
                            vec![Prefix::new(address, length, 0, 0)],
                        )
                        .await
                    {
                        updates.push(key);
                    }
                }
            }
        }
        flood::multicast_area(router, self.area, &updates).await;
    }

    pub async fn remove_adjacency(self: &Arc<Self>, router: &Arc<Router>, neighbor: &Arc<Neighbor>) {
        let (last, is_dr) = {
            let mut state = self.state.write().await;
            if !state.adjacencies.remove(&neighbor.id) {
                return;
            }
            (state.adjacencies.is_empty(), state.status == Status::Dr)
        };
        let area = match router.area(self.area).await {
            Some(area) => area,
            None => return,
        };
        area.spf.remove_adjacency(&NodeId::Router(neighbor.id)).await;
        let mut updates = Vec::new();
        let mut kills = Vec::new();
        if is_dr {
            if last {
                if let Some(key) = area.lsdb.kill_self_network_lsa(self.number).await {
                    kills.push(key);
                }
                if let Some(key) = area
                    .lsdb
                    .kill_self_intra_area_prefix_network(self.number)
                    .await
                {
                    kills.push(key);
                }
            } else if let Some(key) = area
                .lsdb
                .update_self_network_lsa_remove(self.number, neighbor.id)
                .await
            {
                updates.push(key);
            }
        }
        if last {
            if let Some(key) = area
                .lsdb
                .update_self_router_lsa_remove_interface(self.number)
                .await
            {
                updates.push(key);
            }
        }
        flood::multicast_area(router, self.area, &updates).await;
        flood::multicast_area_kill(router, self.area, &kills).await;
    }

    /// # neighbor_down
    /// forget a dead neighbor and re-elect if it held a role on the
    /// segment.
    pub async fn neighbor_down(self: &Arc<Self>, router: &Arc<Router>, neighbor: &Arc<Neighbor>) {
        self.remove_adjacency(router, neighbor).await;
        let reelect = {
            let mut state = self.state.write().await;
            state.neighbors.remove(&neighbor.id);
            let was_dr = state.dr == neighbor.id;
            let was_bdr = state.bdr == neighbor.id;
            if was_dr {
                state.dr = NULL_ID;
                state.dr_interface = 0;
            }
            if was_bdr {
                state.bdr = NULL_ID;
            }
            was_dr || was_bdr
        };
        neighbor.stop().await;
        if let Some(area) = router.area(self.area).await {
            area.lsdb.get_ls_requests(neighbor.id).await;
        }
        router.overlay.get_ls_requests(neighbor.id).await;
        if reelect {
            let (updates, kills) = self.elect_dr_bdr(router).await;
            flood::multicast_area(router, self.area, &updates).await;
            flood::multicast_area_kill(router, self.area, &kills).await;
        }
    }

    /// # set_full_address
    /// configure the interface's routable address. It rides the link LSA
    /// toward the segment and, depending on its length, either the
    /// router-referenced or the network-referenced intra-area-prefix LSA.
    pub async fn set_full_address(
        self: &Arc<Self>,
        router: &Arc<Router>,
        address: net::Ipv6Addr,
        length: u8,
    ) {
        let is_dr = {
            let mut state = self.state.write().await;
            state.full_address = Some((address, length));
            state.status == Status::Dr
        };
        let area = match router.area(self.area).await {
            Some(area) => area,
            None => return,
        };
        let options = if length == 128 { PREFIX_OPTION_LA } else { 0 };
        let prefix = Prefix::new(address, length, 0, options);
        let mut updates = Vec::new();
        if let Some(key) = area
            .lsdb
            .update_self_link_lsa(self.number, prefix, true)
            .await
        {
            updates.push(key);
        }
        if length == 128 {
            if let Some(key) = area
                .lsdb
                .update_self_intra_area_prefix_router(prefix, true)
                .await
            {
                updates.push(key);
            }
        } else if is_dr {
            if let Some(key) = area
                .lsdb
                .update_self_intra_area_prefix_network_add(self.number, vec![prefix])
                .await
            {
                updates.push(key);
            }
        }
        flood::multicast_area(router, self.area, &updates).await;
    }

    pub async fn change_cost(self: &Arc<Self>, router: &Arc<Router>, cost: u16) {
        {
            let mut state = self.state.write().await;
            state.cost = cost;
        }
        if let Some(area) = router.area(self.area).await {
            if let Some(key) = area
                .lsdb
                .update_self_router_lsa_update_cost(self.number, cost)
                .await
            {
                flood::multicast_area(router, self.area, &[key]).await;
            }
        }
    }

    /// # shutdown
    /// stop all tasks and withdraw what this interface originated.
    /// Returns the keys to flood as updates and as kills; the caller
    /// floods them before dropping the interface, since flooding needs
    /// the remaining interfaces.
    pub async fn shutdown(self: &Arc<Self>, router: &Arc<Router>) -> (Vec<LsaKey>, Vec<LsaKey>) {
        self.active.store(false, Ordering::SeqCst);
        for handle in self.handles.lock().await.drain(..) {
            handle.abort();
        }
        if let Err(err) = router.transport.leave_multicast(self.number) {
            util::error(&format!(
                "interface {} multicast leave failed: {}",
                self.number, err
            ));
        }
        let (neighbors, adjacencies, is_dr) = {
            let mut state = self.state.write().await;
            let neighbors: Vec<Arc<Neighbor>> = state.neighbors.drain().map(|(_, n)| n).collect();
            let adjacencies: Vec<RouterId> = state.adjacencies.drain().collect();
            let is_dr = state.status == Status::Dr;
            state.status = Status::Down;
            state.dr = NULL_ID;
            state.bdr = NULL_ID;
            (neighbors, adjacencies, is_dr)
        };
        for neighbor in &neighbors {
            neighbor.stop().await;
        }
        let mut updates = Vec::new();
        let mut kills = Vec::new();
        if let Some(area) = router.area(self.area).await {
            for id in &adjacencies {
                area.spf.remove_adjacency(&NodeId::Router(*id)).await;
            }
            if is_dr {
                if let Some(key) = area.lsdb.kill_self_network_lsa(self.number).await {
                    kills.push(key);
                }
                if let Some(key) = area
                    .lsdb
                    .kill_self_intra_area_prefix_network(self.number)
                    .await
                {
                    kills.push(key);
                }
            }
            if let Some(key) = area
                .lsdb
                .update_self_router_lsa_remove_interface(self.number)
                .await
            {
                updates.push(key);
            }
            area.lsdb.kill_self_link_lsa(self.number).await;
        }
        util::log(&format!("interface {} down", self.number));
        (updates, kills)
    }
}
