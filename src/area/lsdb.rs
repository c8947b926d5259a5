use std::collections::{BTreeMap, HashMap};
use std::net;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::lsa::{
    IntraAreaPrefixLsa, InterAreaPrefixLsa, LinkLsa, Lsa, LsaBody, LsaHeader, LsaKey, NetworkLsa,
    Prefix, RouterLink, RouterLsa, INTER_AREA_PREFIX_LSA_TYPE, INTRA_AREA_PREFIX_LSA_TYPE,
    LINK_LSA_TYPE, NETWORK_LSA_TYPE, ROUTER_LSA_TYPE,
};
use crate::lsa::router::ROUTER_FLAG_B;
use crate::lsa::default_lsa_options;
use crate::rtable::{Adjacency, Node, NodeId, SpfManager};
use crate::{util, AreaId, RouterId, MAX_AGE, NULL_ID, REFRESH_AGE};

/// prefix options bit marking a local /128 address.
pub const PREFIX_OPTION_LA: u8 = 0x02;

pub fn lsid_number(lsid: net::Ipv4Addr) -> u32 {
    u32::from_be_bytes(lsid.octets())
}

pub fn number_lsid(number: u32) -> net::Ipv4Addr {
    net::Ipv4Addr::from(number)
}

/// receiving-interface facts the link LSA handler needs.
#[derive(Clone, Copy, Debug)]
pub struct ReceivingInterface {
    pub number: u32,
    pub cost: u16,
    pub is_dr: bool,
}

#[derive(Default)]
struct InterAreaIds {
    by_prefix: HashMap<(net::Ipv6Addr, u8), net::Ipv4Addr>,
    counter: u32,
}

/// # Lsdb
/// the per-area link state database: five live tables, a tombstone table
/// and the request bookkeeping for adjacencies in progress. Every mutation
/// pushes its delta into the area's shortest-path graph before the table
/// lock is released.
pub struct Lsdb {
    pub area: AreaId,
    router_id: RouterId,
    spf: Arc<SpfManager>,
    router_ls: RwLock<HashMap<LsaKey, Lsa>>,
    network_ls: RwLock<HashMap<LsaKey, Lsa>>,
    inter_area_prefix_ls: RwLock<HashMap<LsaKey, Lsa>>,
    link_ls: RwLock<HashMap<LsaKey, Lsa>>,
    intra_area_prefix_ls: RwLock<HashMap<LsaKey, Lsa>>,
    dead: RwLock<HashMap<LsaKey, Lsa>>,
    requests: Mutex<HashMap<RouterId, Vec<LsaKey>>>,
    link_owner: Mutex<HashMap<LsaKey, u32>>,
    inter_area_ids: Mutex<InterAreaIds>,
}

impl Lsdb {
    pub fn new(area: AreaId, router_id: RouterId, spf: Arc<SpfManager>) -> Self {
        Self {
            area,
            router_id,
            spf,
            router_ls: RwLock::new(HashMap::new()),
            network_ls: RwLock::new(HashMap::new()),
            inter_area_prefix_ls: RwLock::new(HashMap::new()),
            link_ls: RwLock::new(HashMap::new()),
            intra_area_prefix_ls: RwLock::new(HashMap::new()),
            dead: RwLock::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            link_owner: Mutex::new(HashMap::new()),
            inter_area_ids: Mutex::new(InterAreaIds::default()),
        }
    }

    fn table(&self, ls_type: u16) -> &RwLock<HashMap<LsaKey, Lsa>> {
        match ls_type {
            ROUTER_LSA_TYPE => &self.router_ls,
            NETWORK_LSA_TYPE => &self.network_ls,
            INTER_AREA_PREFIX_LSA_TYPE => &self.inter_area_prefix_ls,
            LINK_LSA_TYPE => &self.link_ls,
            _ => &self.intra_area_prefix_ls,
        }
    }

    fn self_router_key(&self) -> LsaKey {
        LsaKey::new(ROUTER_LSA_TYPE, self.router_id, NULL_ID)
    }

    pub async fn get(&self, key: LsaKey) -> Option<Lsa> {
        self.table(key.ls_type).read().await.get(&key).cloned()
    }

    pub async fn get_dead(&self, key: LsaKey) -> Option<Lsa> {
        self.dead.read().await.get(&key).cloned()
    }

    pub async fn remove_dead(&self, key: LsaKey) {
        self.dead.write().await.remove(&key);
    }

    pub async fn sequence_of(&self, key: LsaKey) -> Option<u32> {
        self.table(key.ls_type)
            .read()
            .await
            .get(&key)
            .map(|lsa| lsa.header.sequence_number)
    }

    pub async fn dead_sequence_of(&self, key: LsaKey) -> Option<u32> {
        self.dead
            .read()
            .await
            .get(&key)
            .map(|lsa| lsa.header.sequence_number)
    }

    /// # lsa_headers
    /// wire headers of every live LSA, used for database description.
    /// Link LSAs are scoped to the interface they were learned on.
    pub async fn lsa_headers(&self, own_interface: u32) -> Vec<LsaHeader> {
        let mut headers = Vec::new();
        for ls_type in [
            ROUTER_LSA_TYPE,
            NETWORK_LSA_TYPE,
            INTER_AREA_PREFIX_LSA_TYPE,
            INTRA_AREA_PREFIX_LSA_TYPE,
        ] {
            for lsa in self.table(ls_type).read().await.values() {
                headers.push(lsa.wire_header());
            }
        }
        let owners = self.link_owner.lock().await;
        for (key, lsa) in self.link_ls.read().await.iter() {
            if owners.get(key) == Some(&own_interface) {
                headers.push(lsa.wire_header());
            }
        }
        headers
    }

    pub async fn link_lsa_interface(&self, key: LsaKey) -> Option<u32> {
        self.link_owner.lock().await.get(&key).copied()
    }

    // ------------------------------------------------------------------
    // request bookkeeping

    pub async fn ls_request(&self, from: RouterId, header: &LsaHeader) {
        let key = header.key();
        let wanted = match self.get(key).await {
            None => true,
            Some(stored) => stored.header.sequence_number <= header.sequence_number,
        };
        if !wanted {
            return;
        }
        let mut requests = self.requests.lock().await;
        let entry = requests.entry(from).or_default();
        if !entry.contains(&key) {
            entry.push(key);
        }
    }

    pub async fn get_ls_requests(&self, from: RouterId) -> Vec<LsaKey> {
        self.requests.lock().await.remove(&from).unwrap_or_default()
    }

    pub async fn has_requests(&self, from: RouterId) -> bool {
        self.requests
            .lock()
            .await
            .get(&from)
            .map(|list| !list.is_empty())
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // aging

    /// # age_tick
    /// one second of aging across every table. Expired LSAs are removed
    /// from the graph and tombstoned (Link LSAs are dropped outright);
    /// self-originated LSAs reaching the refresh age are renewed and
    /// returned for reflooding.
    pub async fn age_tick(&self) -> Vec<LsaKey> {
        let mut refreshed = Vec::new();
        for ls_type in [
            ROUTER_LSA_TYPE,
            NETWORK_LSA_TYPE,
            INTER_AREA_PREFIX_LSA_TYPE,
            LINK_LSA_TYPE,
            INTRA_AREA_PREFIX_LSA_TYPE,
        ] {
            let mut table = self.table(ls_type).write().await;
            let mut expired = Vec::new();
            for (key, lsa) in table.iter_mut() {
                lsa.header.age = lsa.header.age.saturating_add(1);
                if lsa.header.age > MAX_AGE {
                    expired.push(*key);
                    continue;
                }
                if lsa.header.age == REFRESH_AGE && lsa.header.adv_router == self.router_id {
                    lsa.refresh();
                    refreshed.push(*key);
                }
            }
            for key in expired {
                if let Some(lsa) = table.remove(&key) {
                    util::debug(&format!("lsa {} aged out", key));
                    self.process_delete(&lsa);
                    if key.ls_type == LINK_LSA_TYPE {
                        self.link_owner.lock().await.remove(&key);
                    } else {
                        self.dead.write().await.insert(key, lsa);
                    }
                }
            }
        }
        refreshed
    }

    /// remove everything an LSA contributed to the graph.
    fn process_delete(&self, lsa: &Lsa) {
        let header = lsa.header;
        match &lsa.body {
            LsaBody::Router(_) => {
                self.spf.update_topology(|graph| {
                    graph.remove_node(&NodeId::Router(header.adv_router));
                });
            }
            LsaBody::Network(_) => {
                let node = NodeId::Network(header.adv_router, lsid_number(header.link_state_id));
                self.spf.update_topology(|graph| {
                    graph.remove_node(&node);
                });
            }
            LsaBody::IntraAreaPrefix(body) => {
                let node = Self::intra_reference(body);
                let addresses: Vec<_> = body.prefixes.keys().copied().collect();
                self.spf.update(|graph| {
                    if let Some(node) = graph.node_mut(&node) {
                        for address in &addresses {
                            node.prefixes.remove(address);
                        }
                    }
                });
            }
            LsaBody::InterAreaPrefix(body) => {
                let node = NodeId::Router(header.adv_router);
                let address = body.prefix.address;
                self.spf.update(|graph| {
                    if let Some(node) = graph.node_mut(&node) {
                        node.inter_area_prefixes.remove(&address);
                    }
                });
            }
            _ => {}
        }
    }

    fn intra_reference(body: &IntraAreaPrefixLsa) -> NodeId {
        if body.ref_ls_type == ROUTER_LSA_TYPE {
            NodeId::Router(body.ref_adv_router)
        } else {
            NodeId::Network(body.ref_adv_router, lsid_number(body.ref_link_state_id))
        }
    }

    fn stale(stored: Option<&Lsa>, header: &LsaHeader) -> bool {
        match stored {
            Some(lsa) => header.sequence_number <= lsa.header.sequence_number,
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // router LSA

    /// # create_router_lsa
    /// origination happens once per area; later interface changes go
    /// through the `update_self_router_lsa_*` methods.
    pub async fn create_router_lsa(&self, abr: bool) -> LsaKey {
        let key = self.self_router_key();
        let mut table = self.router_ls.write().await;
        if table.contains_key(&key) {
            return key;
        }
        let flags = if abr { ROUTER_FLAG_B } else { 0 };
        let body = RouterLsa::new(flags, default_lsa_options());
        table.insert(
            key,
            Lsa::new(
                LsaHeader::new(ROUTER_LSA_TYPE, NULL_ID, self.router_id),
                LsaBody::Router(body),
            ),
        );
        let root = self.spf.root();
        self.spf.update(|graph| {
            graph.ensure_node(Node::new(root, Some(key)));
            if let Some(node) = graph.node_mut(&root) {
                node.is_abr = abr;
            }
        });
        key
    }

    pub async fn update_self_router_lsa_add_interface(&self, link: RouterLink) -> Option<LsaKey> {
        let key = self.self_router_key();
        let mut table = self.router_ls.write().await;
        let lsa = table.get_mut(&key)?;
        if let LsaBody::Router(body) = &mut lsa.body {
            body.add_link(link);
            lsa.refresh();
            let root = self.spf.root();
            self.spf.update_topology(|graph| {
                if let Some(node) = graph.node_mut(&root) {
                    node.interfaces.insert(link.interface_id, link.metric);
                }
                if link.neighbor_router_id != NULL_ID {
                    graph.add_edge(
                        root,
                        NodeId::Network(link.neighbor_router_id, link.neighbor_interface_id),
                        link.metric as u32,
                    );
                }
            });
            return Some(key);
        }
        None
    }

    pub async fn update_self_router_lsa_remove_interface(
        &self,
        interface_id: u32,
    ) -> Option<LsaKey> {
        let key = self.self_router_key();
        let mut table = self.router_ls.write().await;
        let lsa = table.get_mut(&key)?;
        if let LsaBody::Router(body) = &mut lsa.body {
            let removed = body.links.get(&interface_id).copied();
            if !body.remove_link(interface_id) {
                return None;
            }
            lsa.refresh();
            let root = self.spf.root();
            self.spf.update_topology(|graph| {
                if let Some(node) = graph.node_mut(&root) {
                    node.interfaces.remove(&interface_id);
                }
                if let Some(link) = removed {
                    if link.neighbor_router_id != NULL_ID {
                        graph.remove_edge(
                            &root,
                            &NodeId::Network(
                                link.neighbor_router_id,
                                link.neighbor_interface_id,
                            ),
                        );
                    }
                }
            });
            return Some(key);
        }
        None
    }

    /// # update_self_router_lsa_update_dr
    /// repoint an interface link after a designated router change.
    pub async fn update_self_router_lsa_update_dr(&self, link: RouterLink) -> Option<LsaKey> {
        let key = self.self_router_key();
        let mut table = self.router_ls.write().await;
        let lsa = table.get_mut(&key)?;
        if let LsaBody::Router(body) = &mut lsa.body {
            let old = body.links.get(&link.interface_id).copied();
            if !body.update_link_neighbor(
                link.interface_id,
                link.neighbor_interface_id,
                link.neighbor_router_id,
            ) {
                return None;
            }
            lsa.refresh();
            let root = self.spf.root();
            self.spf.update_topology(|graph| {
                if let Some(old) = old {
                    if old.neighbor_router_id != NULL_ID {
                        graph.remove_edge(
                            &root,
                            &NodeId::Network(old.neighbor_router_id, old.neighbor_interface_id),
                        );
                    }
                }
                if link.neighbor_router_id != NULL_ID {
                    graph.add_edge(
                        root,
                        NodeId::Network(link.neighbor_router_id, link.neighbor_interface_id),
                        link.metric as u32,
                    );
                }
            });
            return Some(key);
        }
        None
    }

    pub async fn update_self_router_lsa_update_cost(
        &self,
        interface_id: u32,
        cost: u16,
    ) -> Option<LsaKey> {
        let key = self.self_router_key();
        let mut table = self.router_ls.write().await;
        let lsa = table.get_mut(&key)?;
        if let LsaBody::Router(body) = &mut lsa.body {
            if !body.update_link_cost(interface_id, cost) {
                return None;
            }
            let link = body.links.get(&interface_id).copied();
            lsa.refresh();
            let root = self.spf.root();
            self.spf.update(|graph| {
                if let Some(node) = graph.node_mut(&root) {
                    node.interfaces.insert(interface_id, cost);
                }
                if let Some(link) = link {
                    if link.neighbor_router_id != NULL_ID {
                        graph.set_cost(
                            root,
                            NodeId::Network(link.neighbor_router_id, link.neighbor_interface_id),
                            cost as u32,
                        );
                    }
                }
            });
            return Some(key);
        }
        None
    }

    pub async fn kill_self_router_lsa(&self) -> Option<LsaKey> {
        let key = self.self_router_key();
        let mut table = self.router_ls.write().await;
        let lsa = table.get_mut(&key)?;
        lsa.kill();
        Some(key)
    }

    /// # update_self_router_abr
    /// toggle the border flag, reflooding only when it actually changed.
    pub async fn update_self_router_abr(&self, abr: bool) -> Option<LsaKey> {
        let key = self.self_router_key();
        let mut table = self.router_ls.write().await;
        let lsa = table.get_mut(&key)?;
        if let LsaBody::Router(body) = &mut lsa.body {
            if !body.set_abr(abr) {
                return None;
            }
            lsa.refresh();
            let root = self.spf.root();
            self.spf.update(|graph| {
                if let Some(node) = graph.node_mut(&root) {
                    node.is_abr = abr;
                }
            });
            return Some(key);
        }
        None
    }

    /// # bump_self_lsa
    /// a copy of one of our own LSAs arrived with a higher sequence
    /// number; jump past it and reflood.
    pub async fn bump_self_lsa(&self, key: LsaKey, foreign_sequence: u32) -> Option<LsaKey> {
        let mut table = self.table(key.ls_type).write().await;
        let lsa = table.get_mut(&key)?;
        if foreign_sequence < lsa.header.sequence_number {
            return None;
        }
        lsa.set_sequence_number(foreign_sequence + 1);
        Some(key)
    }

    pub async fn update_router_lsa(&self, header: LsaHeader, body: RouterLsa, dead: bool) {
        let key = header.key();
        let mut table = self.router_ls.write().await;
        if Self::stale(table.get(&key), &header) {
            util::debug(&format!("stale {} dropped", key));
            return;
        }
        let old = table.insert(key, Lsa::new(header, LsaBody::Router(body.clone())));
        if dead {
            return;
        }
        let old_links = match old {
            Some(Lsa {
                body: LsaBody::Router(old_body),
                ..
            }) => old_body.links,
            _ => BTreeMap::new(),
        };
        let node_id = NodeId::Router(header.adv_router);
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut changed = Vec::new();
        for (id, link) in &body.links {
            match old_links.get(id) {
                None => added.push(*link),
                Some(old_link) if old_link != link => changed.push((*old_link, *link)),
                _ => {}
            }
        }
        for (id, old_link) in &old_links {
            if !body.links.contains_key(id) {
                removed.push(*old_link);
            }
        }
        let is_abr = body.is_abr();
        self.spf.update_topology(|graph| {
            graph.ensure_node(Node::new(node_id, Some(key)));
            if let Some(node) = graph.node_mut(&node_id) {
                node.is_abr = is_abr;
                for link in &added {
                    node.interfaces.insert(link.interface_id, link.metric);
                }
                for (_, link) in &changed {
                    node.interfaces.insert(link.interface_id, link.metric);
                }
                for link in &removed {
                    node.interfaces.remove(&link.interface_id);
                }
            }
            for link in &added {
                if link.neighbor_router_id != NULL_ID {
                    graph.add_edge(
                        node_id,
                        NodeId::Network(link.neighbor_router_id, link.neighbor_interface_id),
                        link.metric as u32,
                    );
                }
            }
            for link in &removed {
                if link.neighbor_router_id != NULL_ID {
                    graph.remove_edge(
                        &node_id,
                        &NodeId::Network(link.neighbor_router_id, link.neighbor_interface_id),
                    );
                }
            }
            for (old_link, link) in &changed {
                if old_link.neighbor_router_id != NULL_ID {
                    graph.remove_edge(
                        &node_id,
                        &NodeId::Network(
                            old_link.neighbor_router_id,
                            old_link.neighbor_interface_id,
                        ),
                    );
                }
                if link.neighbor_router_id != NULL_ID {
                    graph.add_edge(
                        node_id,
                        NodeId::Network(link.neighbor_router_id, link.neighbor_interface_id),
                        link.metric as u32,
                    );
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // network LSA

    fn apply_network_graph(
        &self,
        key: LsaKey,
        node_id: NodeId,
        old_attached: &[RouterId],
        attached: &[RouterId],
    ) {
        let added: Vec<RouterId> = attached
            .iter()
            .filter(|id| !old_attached.contains(id))
            .copied()
            .collect();
        let removed: Vec<RouterId> = old_attached
            .iter()
            .filter(|id| !attached.contains(id))
            .copied()
            .collect();
        self.spf.update_topology(|graph| {
            graph.ensure_node(Node::new(node_id, Some(key)));
            for router in &added {
                let peer = NodeId::Router(*router);
                graph.ensure_node(Node::new(peer, None));
                graph.add_edge(node_id, peer, 0);
                if !graph.costs.contains_key(&(peer, node_id)) {
                    graph.add_edge(peer, node_id, 0);
                }
            }
            for router in &removed {
                let peer = NodeId::Router(*router);
                graph.remove_edge(&node_id, &peer);
                graph.remove_edge(&peer, &node_id);
            }
        });
    }

    /// # create_network_lsa
    /// (re)originate the segment LSA as designated router, listing every
    /// fully adjacent neighbor plus ourselves.
    pub async fn create_network_lsa(
        &self,
        interface_number: u32,
        mut attached: Vec<RouterId>,
    ) -> LsaKey {
        if !attached.contains(&self.router_id) {
            attached.push(self.router_id);
        }
        let key = LsaKey::new(
            NETWORK_LSA_TYPE,
            self.router_id,
            number_lsid(interface_number),
        );
        let node_id = NodeId::Network(self.router_id, interface_number);
        let mut table = self.network_ls.write().await;
        let old_attached = match table.get_mut(&key) {
            Some(lsa) => {
                let old = match &lsa.body {
                    LsaBody::Network(body) => body.attached.clone(),
                    _ => Vec::new(),
                };
                lsa.body = LsaBody::Network(NetworkLsa::new(default_lsa_options(), attached.clone()));
                lsa.refresh();
                old
            }
            None => {
                table.insert(
                    key,
                    Lsa::new(
                        LsaHeader::new(NETWORK_LSA_TYPE, number_lsid(interface_number), self.router_id),
                        LsaBody::Network(NetworkLsa::new(default_lsa_options(), attached.clone())),
                    ),
                );
                Vec::new()
            }
        };
        self.apply_network_graph(key, node_id, &old_attached, &attached);
        self.spf
            .add_adjacency(
                node_id,
                Adjacency {
                    interface: interface_number,
                    next_hop: None,
                },
            )
            .await;
        key
    }

    pub async fn update_self_network_lsa_remove(
        &self,
        interface_number: u32,
        neighbor: RouterId,
    ) -> Option<LsaKey> {
        let key = LsaKey::new(
            NETWORK_LSA_TYPE,
            self.router_id,
            number_lsid(interface_number),
        );
        let node_id = NodeId::Network(self.router_id, interface_number);
        let mut table = self.network_ls.write().await;
        let lsa = table.get_mut(&key)?;
        if let LsaBody::Network(body) = &mut lsa.body {
            let old = body.attached.clone();
            if !body.remove_router(neighbor) {
                return None;
            }
            let attached = body.attached.clone();
            lsa.refresh();
            drop(table);
            self.apply_network_graph(key, node_id, &old, &attached);
            return Some(key);
        }
        None
    }

    pub async fn kill_self_network_lsa(&self, interface_number: u32) -> Option<LsaKey> {
        let key = LsaKey::new(
            NETWORK_LSA_TYPE,
            self.router_id,
            number_lsid(interface_number),
        );
        let mut table = self.network_ls.write().await;
        let lsa = table.get_mut(&key)?;
        lsa.kill();
        let node_id = NodeId::Network(self.router_id, interface_number);
        self.spf.update_topology(|graph| {
            graph.remove_node(&node_id);
        });
        Some(key)
    }

    pub async fn update_network_lsa(
        &self,
        header: LsaHeader,
        body: NetworkLsa,
        dead: bool,
        own_interface: Option<u32>,
    ) {
        let key = header.key();
        let mut table = self.network_ls.write().await;
        if Self::stale(table.get(&key), &header) {
            util::debug(&format!("stale {} dropped", key));
            return;
        }
        let old = table.insert(key, Lsa::new(header, LsaBody::Network(body.clone())));
        if dead {
            return;
        }
        drop(table);
        let old_attached = match old {
            Some(Lsa {
                body: LsaBody::Network(old_body),
                ..
            }) => old_body.attached,
            _ => Vec::new(),
        };
        let node_id = NodeId::Network(header.adv_router, lsid_number(header.link_state_id));
        self.apply_network_graph(key, node_id, &old_attached, &body.attached);
        if body.attached.contains(&self.router_id) {
            if let Some(interface) = own_interface {
                self.spf
                    .add_adjacency(
                        node_id,
                        Adjacency {
                            interface,
                            next_hop: None,
                        },
                    )
                    .await;
            }
        }
    }

    // ------------------------------------------------------------------
    // link LSA

    pub async fn create_link_lsa(
        &self,
        interface_number: u32,
        priority: u8,
        link_local: net::Ipv6Addr,
        full_address: Option<(net::Ipv6Addr, u8)>,
    ) -> LsaKey {
        let key = LsaKey::new(LINK_LSA_TYPE, self.router_id, number_lsid(interface_number));
        let mut body = LinkLsa::new(priority, default_lsa_options(), link_local);
        if let Some((address, length)) = full_address {
            let options = if length == 128 { PREFIX_OPTION_LA } else { 0 };
            body.add_prefix(Prefix::new(address, length, 0, options));
        }
        self.link_ls.write().await.insert(
            key,
            Lsa::new(
                LsaHeader::new(LINK_LSA_TYPE, number_lsid(interface_number), self.router_id),
                LsaBody::Link(body),
            ),
        );
        self.link_owner.lock().await.insert(key, interface_number);
        key
    }

    pub async fn update_self_link_lsa(
        &self,
        interface_number: u32,
        prefix: Prefix,
        add: bool,
    ) -> Option<LsaKey> {
        let key = LsaKey::new(LINK_LSA_TYPE, self.router_id, number_lsid(interface_number));
        let mut table = self.link_ls.write().await;
        let lsa = table.get_mut(&key)?;
        if let LsaBody::Link(body) = &mut lsa.body {
            let changed = if add {
                body.add_prefix(prefix)
            } else {
                body.remove_prefix(prefix.address)
            };
            if !changed {
                return None;
            }
            lsa.refresh();
            return Some(key);
        }
        None
    }

    pub async fn kill_self_link_lsa(&self, interface_number: u32) -> Option<LsaKey> {
        let key = LsaKey::new(LINK_LSA_TYPE, self.router_id, number_lsid(interface_number));
        let mut table = self.link_ls.write().await;
        let lsa = table.get_mut(&key)?;
        lsa.kill();
        Some(key)
    }

    /// # update_link_lsa
    /// store a neighbor's link LSA and learn its link-local address as the
    /// next hop toward it. When we are the designated router of the
    /// receiving segment the LSA's prefixes are folded into our
    /// intra-area-prefix LSA; the returned keys need flooding.
    pub async fn update_link_lsa(
        &self,
        header: LsaHeader,
        body: LinkLsa,
        dead: bool,
        receiving: ReceivingInterface,
    ) -> (Vec<LsaKey>, Vec<LsaKey>) {
        let key = header.key();
        let mut table = self.link_ls.write().await;
        if Self::stale(table.get(&key), &header) {
            util::debug(&format!("stale {} dropped", key));
            return (Vec::new(), Vec::new());
        }
        let old = table.insert(key, Lsa::new(header, LsaBody::Link(body.clone())));
        drop(table);
        self.link_owner.lock().await.insert(key, receiving.number);
        if dead {
            return (Vec::new(), Vec::new());
        }
        self.spf
            .add_adjacency(
                NodeId::Router(header.adv_router),
                Adjacency {
                    interface: receiving.number,
                    next_hop: Some(body.link_local),
                },
            )
            .await;
        let mut updates = Vec::new();
        let mut kills = Vec::new();
        if receiving.is_dr {
            let old_prefixes: Vec<Prefix> = match old {
                Some(Lsa {
                    body: LsaBody::Link(old_body),
                    ..
                }) => old_body
                    .prefixes
                    .values()
                    .filter(|p| p.length < 128)
                    .copied()
                    .collect(),
                _ => Vec::new(),
            };
            let new_prefixes: Vec<Prefix> = body
                .prefixes
                .values()
                .filter(|p| p.length < 128)
                .map(|p| Prefix::new(p.address, p.length, receiving.cost, p.options))
                .collect();
            let added: Vec<Prefix> = new_prefixes
                .iter()
                .filter(|p| !old_prefixes.iter().any(|o| o.address == p.address))
                .copied()
                .collect();
            let removed: Vec<net::Ipv6Addr> = old_prefixes
                .iter()
                .filter(|o| !new_prefixes.iter().any(|p| p.address == o.address))
                .map(|o| o.address)
                .collect();
            if !added.is_empty() {
                if let Some(update) = self
                    .update_self_intra_area_prefix_network_add(receiving.number, added)
                    .await
                {
                    updates.push(update);
                }
            }
            if !removed.is_empty() {
                let (update, killed) = self
                    .update_self_intra_area_prefix_network_remove(receiving.number, &removed)
                    .await;
                if let Some(update) = update {
                    if killed {
                        kills.push(update);
                    } else {
                        updates.push(update);
                    }
                }
            }
        }
        (updates, kills)
    }

    // ------------------------------------------------------------------
    // intra-area prefix LSA

    /// # update_self_intra_area_prefix_network_add
    /// fold prefixes into the segment-scoped LSA referenced from our
    /// network LSA, creating it on first use.
    pub async fn update_self_intra_area_prefix_network_add(
        &self,
        interface_number: u32,
        prefixes: Vec<Prefix>,
    ) -> Option<LsaKey> {
        let key = LsaKey::new(
            INTRA_AREA_PREFIX_LSA_TYPE,
            self.router_id,
            number_lsid(interface_number),
        );
        let node_id = NodeId::Network(self.router_id, interface_number);
        let mut table = self.intra_area_prefix_ls.write().await;
        let mut changed = false;
        match table.get_mut(&key) {
            Some(lsa) => {
                if let LsaBody::IntraAreaPrefix(body) = &mut lsa.body {
                    for prefix in &prefixes {
                        changed |= body.add_prefix(*prefix);
                    }
                    if changed {
                        lsa.refresh();
                    }
                }
            }
            None => {
                let mut body = IntraAreaPrefixLsa::new(
                    NETWORK_LSA_TYPE,
                    number_lsid(interface_number),
                    self.router_id,
                );
                for prefix in &prefixes {
                    body.add_prefix(*prefix);
                }
                table.insert(
                    key,
                    Lsa::new(
                        LsaHeader::new(
                            INTRA_AREA_PREFIX_LSA_TYPE,
                            number_lsid(interface_number),
                            self.router_id,
                        ),
                        LsaBody::IntraAreaPrefix(body),
                    ),
                );
                changed = true;
            }
        }
        if !changed {
            return None;
        }
        self.spf.update(|graph| {
            if let Some(node) = graph.node_mut(&node_id) {
                for prefix in &prefixes {
                    node.prefixes.insert(prefix.address, *prefix);
                }
            }
        });
        Some(key)
    }

    /// returns the LSA key and whether the removal emptied and killed it.
    pub async fn update_self_intra_area_prefix_network_remove(
        &self,
        interface_number: u32,
        addresses: &[net::Ipv6Addr],
    ) -> (Option<LsaKey>, bool) {
        let key = LsaKey::new(
            INTRA_AREA_PREFIX_LSA_TYPE,
            self.router_id,
            number_lsid(interface_number),
        );
        let node_id = NodeId::Network(self.router_id, interface_number);
        let mut table = self.intra_area_prefix_ls.write().await;
        let lsa = match table.get_mut(&key) {
            Some(lsa) => lsa,
            None => return (None, false),
        };
        let mut changed = false;
        let mut empty = false;
        if let LsaBody::IntraAreaPrefix(body) = &mut lsa.body {
            for address in addresses {
                changed |= body.remove_prefix(*address);
            }
            empty = body.prefixes.is_empty();
        }
        if !changed {
            return (None, false);
        }
        if empty {
            lsa.kill();
        } else {
            lsa.refresh();
        }
        self.spf.update(|graph| {
            if let Some(node) = graph.node_mut(&node_id) {
                for address in addresses {
                    node.prefixes.remove(address);
                }
            }
        });
        (Some(key), empty)
    }

    /// # update_self_intra_area_prefix_router
    /// host-scope prefixes (local /128 addresses) ride a router-referenced
    /// LSA keyed by our router id.
    pub async fn update_self_intra_area_prefix_router(
        &self,
        prefix: Prefix,
        add: bool,
    ) -> Option<LsaKey> {
        let key = LsaKey::new(INTRA_AREA_PREFIX_LSA_TYPE, self.router_id, self.router_id);
        let root = self.spf.root();
        let mut table = self.intra_area_prefix_ls.write().await;
        let mut changed = false;
        match table.get_mut(&key) {
            Some(lsa) => {
                if let LsaBody::IntraAreaPrefix(body) = &mut lsa.body {
                    changed = if add {
                        body.add_prefix(prefix)
                    } else {
                        body.remove_prefix(prefix.address)
                    };
                    if changed {
                        lsa.refresh();
                    }
                }
            }
            None if add => {
                let mut body =
                    IntraAreaPrefixLsa::new(ROUTER_LSA_TYPE, NULL_ID, self.router_id);
                body.add_prefix(prefix);
                table.insert(
                    key,
                    Lsa::new(
                        LsaHeader::new(INTRA_AREA_PREFIX_LSA_TYPE, self.router_id, self.router_id),
                        LsaBody::IntraAreaPrefix(body),
                    ),
                );
                changed = true;
            }
            None => {}
        }
        if !changed {
            return None;
        }
        self.spf.update(|graph| {
            if let Some(node) = graph.node_mut(&root) {
                if add {
                    node.prefixes.insert(prefix.address, prefix);
                } else {
                    node.prefixes.remove(&prefix.address);
                }
            }
        });
        Some(key)
    }

    pub async fn kill_self_intra_area_prefix_router(&self) -> Option<LsaKey> {
        let key = LsaKey::new(INTRA_AREA_PREFIX_LSA_TYPE, self.router_id, self.router_id);
        let root = self.spf.root();
        let mut table = self.intra_area_prefix_ls.write().await;
        let lsa = table.get_mut(&key)?;
        let addresses: Vec<net::Ipv6Addr> = match &lsa.body {
            LsaBody::IntraAreaPrefix(body) => body.prefixes.keys().copied().collect(),
            _ => Vec::new(),
        };
        lsa.kill();
        self.spf.update(|graph| {
            if let Some(node) = graph.node_mut(&root) {
                for address in &addresses {
                    node.prefixes.remove(address);
                }
            }
        });
        Some(key)
    }

    pub async fn kill_self_intra_area_prefix_network(
        &self,
        interface_number: u32,
    ) -> Option<LsaKey> {
        let key = LsaKey::new(
            INTRA_AREA_PREFIX_LSA_TYPE,
            self.router_id,
            number_lsid(interface_number),
        );
        let node_id = NodeId::Network(self.router_id, interface_number);
        let mut table = self.intra_area_prefix_ls.write().await;
        let lsa = table.get_mut(&key)?;
        let addresses: Vec<net::Ipv6Addr> = match &lsa.body {
            LsaBody::IntraAreaPrefix(body) => body.prefixes.keys().copied().collect(),
            _ => Vec::new(),
        };
        lsa.kill();
        self.spf.update(|graph| {
            if let Some(node) = graph.node_mut(&node_id) {
                for address in &addresses {
                    node.prefixes.remove(address);
                }
            }
        });
        Some(key)
    }

    pub async fn update_intra_area_prefix_lsa(
        &self,
        header: LsaHeader,
        body: IntraAreaPrefixLsa,
        dead: bool,
    ) {
        let key = header.key();
        let mut table = self.intra_area_prefix_ls.write().await;
        if Self::stale(table.get(&key), &header) {
            util::debug(&format!("stale {} dropped", key));
            return;
        }
        let old = table.insert(key, Lsa::new(header, LsaBody::IntraAreaPrefix(body.clone())));
        if dead {
            return;
        }
        let old_prefixes = match old {
            Some(Lsa {
                body: LsaBody::IntraAreaPrefix(old_body),
                ..
            }) => old_body.prefixes,
            _ => BTreeMap::new(),
        };
        let node_id = Self::intra_reference(&body);
        let removed: Vec<net::Ipv6Addr> = old_prefixes
            .keys()
            .filter(|address| !body.prefixes.contains_key(address))
            .copied()
            .collect();
        self.spf.update(|graph| {
            graph.ensure_node(Node::new(node_id, None));
            if let Some(node) = graph.node_mut(&node_id) {
                for prefix in body.prefixes.values() {
                    node.prefixes.insert(prefix.address, *prefix);
                }
                for address in &removed {
                    node.prefixes.remove(address);
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // inter-area prefix LSA

    /// # update_self_inter_area_prefix_lsas
    /// reconcile our summarized prefixes for this area against the wanted
    /// set: originate new ones, adjust metrics, kill the disappeared.
    /// Returns every key that needs flooding.
    pub async fn update_self_inter_area_prefix_lsas(
        &self,
        wanted: HashMap<(net::Ipv6Addr, u8), u32>,
    ) -> Vec<LsaKey> {
        let mut flood = Vec::new();
        let root = self.spf.root();
        let mut ids = self.inter_area_ids.lock().await;
        let mut table = self.inter_area_prefix_ls.write().await;
        let gone: Vec<(net::Ipv6Addr, u8)> = ids
            .by_prefix
            .keys()
            .filter(|prefix| !wanted.contains_key(prefix))
            .copied()
            .collect();
        for prefix in gone {
            if let Some(lsid) = ids.by_prefix.remove(&prefix) {
                let key = LsaKey::new(INTER_AREA_PREFIX_LSA_TYPE, self.router_id, lsid);
                if let Some(lsa) = table.get_mut(&key) {
                    lsa.kill();
                    flood.push(key);
                }
                self.spf.update(|graph| {
                    if let Some(node) = graph.node_mut(&root) {
                        node.inter_area_prefixes.remove(&prefix.0);
                    }
                });
            }
        }
        for ((address, length), cost) in wanted {
            let metric = cost.min(u16::MAX as u32) as u16;
            match ids.by_prefix.get(&(address, length)).copied() {
                Some(lsid) => {
                    let key = LsaKey::new(INTER_AREA_PREFIX_LSA_TYPE, self.router_id, lsid);
                    if let Some(lsa) = table.get_mut(&key) {
                        if let LsaBody::InterAreaPrefix(body) = &mut lsa.body {
                            if body.prefix.update_metric(metric) {
                                lsa.refresh();
                                flood.push(key);
                                self.spf.update(|graph| {
                                    if let Some(node) = graph.node_mut(&root) {
                                        if let Some(p) = node.inter_area_prefixes.get_mut(&address)
                                        {
                                            p.metric = metric;
                                        }
                                    }
                                });
                            }
                        }
                    }
                }
                None => {
                    ids.counter += 1;
                    let lsid = number_lsid(ids.counter);
                    ids.by_prefix.insert((address, length), lsid);
                    let key = LsaKey::new(INTER_AREA_PREFIX_LSA_TYPE, self.router_id, lsid);
                    let prefix = Prefix::new(address, length, metric, 0);
                    table.insert(
                        key,
                        Lsa::new(
                            LsaHeader::new(INTER_AREA_PREFIX_LSA_TYPE, lsid, self.router_id),
                            LsaBody::InterAreaPrefix(InterAreaPrefixLsa::new(prefix)),
                        ),
                    );
                    flood.push(key);
                    self.spf.update(|graph| {
                        if let Some(node) = graph.node_mut(&root) {
                            node.inter_area_prefixes.insert(address, prefix);
                        }
                    });
                }
            }
        }
        flood
    }

    /// # clear_inter_area_lsas
    /// kill every summarized prefix we originated into this area, used
    /// when the overlay tier deactivates.
    pub async fn clear_inter_area_lsas(&self) -> Vec<LsaKey> {
        let mut flood = Vec::new();
        let root = self.spf.root();
        let mut ids = self.inter_area_ids.lock().await;
        let mut table = self.inter_area_prefix_ls.write().await;
        for ((address, _), lsid) in ids.by_prefix.drain() {
            let key = LsaKey::new(INTER_AREA_PREFIX_LSA_TYPE, self.router_id, lsid);
            if let Some(lsa) = table.get_mut(&key) {
                lsa.kill();
                flood.push(key);
            }
            self.spf.update(|graph| {
                if let Some(node) = graph.node_mut(&root) {
                    node.inter_area_prefixes.remove(&address);
                }
            });
        }
        ids.counter = 0;
        flood
    }

    pub async fn update_inter_area_prefix_lsa(
        &self,
        header: LsaHeader,
        body: InterAreaPrefixLsa,
        dead: bool,
    ) {
        let key = header.key();
        let mut table = self.inter_area_prefix_ls.write().await;
        if Self::stale(table.get(&key), &header) {
            util::debug(&format!("stale {} dropped", key));
            return;
        }
        let prefix = body.prefix;
        table.insert(key, Lsa::new(header, LsaBody::InterAreaPrefix(body)));
        if dead {
            return;
        }
        let node_id = NodeId::Router(header.adv_router);
        self.spf.update(|graph| {
            graph.ensure_node(Node::new(node_id, None));
            if let Some(node) = graph.node_mut(&node_id) {
                node.inter_area_prefixes.insert(prefix.address, prefix);
            }
        });
    }

    // ------------------------------------------------------------------

    pub async fn dump(&self) -> String {
        let mut out = String::new();
        for (name, ls_type) in [
            ("router", ROUTER_LSA_TYPE),
            ("network", NETWORK_LSA_TYPE),
            ("inter-area-prefix", INTER_AREA_PREFIX_LSA_TYPE),
            ("link", LINK_LSA_TYPE),
            ("intra-area-prefix", INTRA_AREA_PREFIX_LSA_TYPE),
        ] {
            let table = self.table(ls_type).read().await;
            out.push_str(&format!("{} ({})\n", name, table.len()));
            for lsa in table.values() {
                out.push_str(&format!(
                    "  {} seq {:#010x} age {}\n",
                    lsa.key(),
                    lsa.header.sequence_number,
                    lsa.header.age
                ));
            }
        }
        let dead = self.dead.read().await;
        out.push_str(&format!("dead ({})\n", dead.len()));
        for key in dead.keys() {
            out.push_str(&format!("  {}\n", key));
        }
        out
    }
}
