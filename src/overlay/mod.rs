use std::collections::HashMap;
use std::net;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::lsa::{
    AbrLsa, AsbrLsa, Lsa, LsaBody, LsaHeader, LsaKey, OverlayPrefixLsa, Prefix,
    OVERLAY_ABR_LSA_TYPE, OVERLAY_ASBR_LSA_TYPE, OVERLAY_PREFIX_LSA_TYPE,
};
use crate::rtable::{Node, NodeId};
use crate::{util, AreaId, RouterId, MAX_AGE, NULL_ID, REFRESH_AGE};

pub mod spf;

pub use spf::OverlaySpf;

/// what one area's shortest-path run exported into the overlay.
#[derive(Default, Clone)]
struct AreaExport {
    neighbors: HashMap<RouterId, u32>,
    prefixes: HashMap<(net::Ipv6Addr, u8), u32>,
}

/// # OverlayLsdb
/// the database of the inter-area tier: reachability between area border
/// routers and the prefixes each can reach inside its areas. Flooded with
/// no area scope, aged like any other database.
pub struct OverlayLsdb {
    router_id: RouterId,
    abr_ls: RwLock<HashMap<LsaKey, Lsa>>,
    prefix_ls: RwLock<HashMap<LsaKey, Lsa>>,
    asbr_ls: RwLock<HashMap<LsaKey, Lsa>>,
    dead: RwLock<HashMap<LsaKey, Lsa>>,
    requests: Mutex<HashMap<RouterId, Vec<LsaKey>>>,
    exports: Mutex<HashMap<AreaId, AreaExport>>,
    pub spf: Arc<OverlaySpf>,
}

impl OverlayLsdb {
    pub fn new(router_id: RouterId) -> Arc<Self> {
        Arc::new(Self {
            router_id,
            abr_ls: RwLock::new(HashMap::new()),
            prefix_ls: RwLock::new(HashMap::new()),
            asbr_ls: RwLock::new(HashMap::new()),
            dead: RwLock::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            exports: Mutex::new(HashMap::new()),
            spf: OverlaySpf::new(router_id),
        })
    }

    fn table(&self, ls_type: u16) -> &RwLock<HashMap<LsaKey, Lsa>> {
        match ls_type {
            OVERLAY_ABR_LSA_TYPE => &self.abr_ls,
            OVERLAY_ASBR_LSA_TYPE => &self.asbr_ls,
            _ => &self.prefix_ls,
        }
    }

    fn self_abr_key(&self) -> LsaKey {
        LsaKey::new(OVERLAY_ABR_LSA_TYPE, self.router_id, NULL_ID)
    }

    fn self_prefix_key(&self) -> LsaKey {
        LsaKey::new(OVERLAY_PREFIX_LSA_TYPE, self.router_id, NULL_ID)
    }

    pub async fn get(&self, key: LsaKey) -> Option<Lsa> {
        self.table(key.ls_type).read().await.get(&key).cloned()
    }

    pub async fn lookup_update(&self, key: LsaKey) -> Option<Lsa> {
        if let Some(lsa) = self.get(key).await {
            return Some(lsa);
        }
        self.dead.read().await.get(&key).cloned()
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

    pub async fn remove_dead(&self, key: LsaKey) {
        self.dead.write().await.remove(&key);
    }

    pub async fn lsa_headers(&self) -> Vec<LsaHeader> {
        let mut headers = Vec::new();
        for ls_type in [
            OVERLAY_ABR_LSA_TYPE,
            OVERLAY_PREFIX_LSA_TYPE,
            OVERLAY_ASBR_LSA_TYPE,
        ] {
            for lsa in self.table(ls_type).read().await.values() {
                headers.push(lsa.wire_header());
            }
        }
        headers
    }

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

    pub async fn bump_self_lsa(&self, key: LsaKey, foreign_sequence: u32) -> Option<LsaKey> {
        let mut table = self.table(key.ls_type).write().await;
        let lsa = table.get_mut(&key)?;
        if foreign_sequence < lsa.header.sequence_number {
            return None;
        }
        lsa.set_sequence_number(foreign_sequence + 1);
        Some(key)
    }

    // ------------------------------------------------------------------
    // self origination

    /// # update_neighbors
    /// one area reported which border routers it can reach and at what
    /// cost. Merge across areas, keeping the cheapest, and reoriginate
    /// our border LSA when the merged view changed.
    pub async fn update_neighbors(
        &self,
        area: AreaId,
        neighbors: HashMap<RouterId, u32>,
    ) -> Option<LsaKey> {
        let merged = {
            let mut exports = self.exports.lock().await;
            exports.entry(area).or_default().neighbors = neighbors;
            let mut merged: HashMap<RouterId, u32> = HashMap::new();
            for export in exports.values() {
                for (router, cost) in &export.neighbors {
                    let entry = merged.entry(*router).or_insert(*cost);
                    if cost < entry {
                        *entry = *cost;
                    }
                }
            }
            merged
        };
        let key = self.self_abr_key();
        let mut body = AbrLsa::new();
        for (router, cost) in &merged {
            body.add_neighbor(*router, (*cost).min(u8::MAX as u32) as u8);
        }
        let mut table = self.abr_ls.write().await;
        let changed = match table.get_mut(&key) {
            Some(lsa) => {
                let changed = !matches!(&lsa.body, LsaBody::Abr(old) if *old == body);
                if changed {
                    lsa.body = LsaBody::Abr(body.clone());
                    lsa.refresh();
                }
                changed
            }
            None => {
                table.insert(
                    key,
                    Lsa::new(
                        LsaHeader::new(OVERLAY_ABR_LSA_TYPE, NULL_ID, self.router_id),
                        LsaBody::Abr(body.clone()),
                    ),
                );
                true
            }
        };
        if !changed {
            return None;
        }
        let root = NodeId::Router(self.router_id);
        self.spf.update(|graph| {
            graph.ensure_node(Node::new(root, Some(key)));
            let old: Vec<NodeId> = graph.edges.get(&root).cloned().unwrap_or_default();
            for to in old {
                if !body.neighbors.contains_key(&to.router_id()) {
                    graph.remove_edge(&root, &to);
                }
            }
            for (router, metric) in &body.neighbors {
                graph.add_edge(root, NodeId::Router(*router), *metric as u32);
            }
        });
        Some(key)
    }

    /// # update_prefixes
    /// same reconciliation for the prefixes reachable inside our areas.
    pub async fn update_prefixes(
        &self,
        area: AreaId,
        prefixes: HashMap<(net::Ipv6Addr, u8), u32>,
    ) -> Option<LsaKey> {
        let merged = {
            let mut exports = self.exports.lock().await;
            exports.entry(area).or_default().prefixes = prefixes;
            let mut merged: HashMap<(net::Ipv6Addr, u8), u32> = HashMap::new();
            for export in exports.values() {
                for (prefix, cost) in &export.prefixes {
                    let entry = merged.entry(*prefix).or_insert(*cost);
                    if cost < entry {
                        *entry = *cost;
                    }
                }
            }
            merged
        };
        let key = self.self_prefix_key();
        let mut body = OverlayPrefixLsa::new();
        for ((address, length), cost) in &merged {
            body.add_prefix(Prefix::new(
                *address,
                *length,
                (*cost).min(u16::MAX as u32) as u16,
                0,
            ));
        }
        let mut table = self.prefix_ls.write().await;
        let changed = match table.get_mut(&key) {
            Some(lsa) => {
                let changed = !matches!(&lsa.body, LsaBody::OverlayPrefix(old) if *old == body);
                if changed {
                    lsa.body = LsaBody::OverlayPrefix(body.clone());
                    lsa.refresh();
                }
                changed
            }
            None => {
                table.insert(
                    key,
                    Lsa::new(
                        LsaHeader::new(OVERLAY_PREFIX_LSA_TYPE, NULL_ID, self.router_id),
                        LsaBody::OverlayPrefix(body.clone()),
                    ),
                );
                true
            }
        };
        if !changed {
            return None;
        }
        let root = NodeId::Router(self.router_id);
        self.spf.update(|graph| {
            graph.ensure_node(Node::new(root, Some(key)));
            if let Some(node) = graph.node_mut(&root) {
                node.prefixes.clear();
                for prefix in body.prefixes.values() {
                    node.prefixes.insert(prefix.address, *prefix);
                }
            }
        });
        Some(key)
    }

    /// # local_prefix_cost
    /// the intra-area cost one of our areas reported for a prefix, used
    /// to suppress summaries that cannot beat the intra route.
    pub async fn local_prefix_cost(&self, area: AreaId, prefix: (net::Ipv6Addr, u8)) -> Option<u32> {
        self.exports
            .lock()
            .await
            .get(&area)
            .and_then(|export| export.prefixes.get(&prefix).copied())
    }

    /// # kill_self_lsas
    /// withdraw our overlay presence, used when we stop being a border
    /// router.
    pub async fn kill_self_lsas(&self) -> Vec<LsaKey> {
        let mut kills = Vec::new();
        for key in [self.self_abr_key(), self.self_prefix_key()] {
            let mut table = self.table(key.ls_type).write().await;
            if let Some(lsa) = table.get_mut(&key) {
                lsa.kill();
                kills.push(key);
            }
        }
        self.exports.lock().await.clear();
        let root = NodeId::Router(self.router_id);
        self.spf.update(|graph| {
            graph.remove_node(&root);
            graph.ensure_node(Node::new(root, None));
        });
        kills
    }

    // ------------------------------------------------------------------
    // foreign LSAs

    fn stale(stored: Option<&Lsa>, header: &LsaHeader) -> bool {
        match stored {
            Some(lsa) => header.sequence_number <= lsa.header.sequence_number,
            None => false,
        }
    }

    pub async fn update_abr_lsa(
        &self,
        header: LsaHeader,
        body: AbrLsa,
        dead: bool,
        inter_area: bool,
    ) {
        let key = header.key();
        let mut table = self.abr_ls.write().await;
        if Self::stale(table.get(&key), &header) {
            util::debug(&format!("stale {} dropped", key));
            return;
        }
        table.insert(key, Lsa::new(header, LsaBody::Abr(body.clone())));
        if dead || !inter_area {
            return;
        }
        let node_id = NodeId::Router(header.adv_router);
        self.spf.update(|graph| {
            graph.ensure_node(Node::new(node_id, Some(key)));
            let old: Vec<NodeId> = graph.edges.get(&node_id).cloned().unwrap_or_default();
            for to in old {
                if !body.neighbors.contains_key(&to.router_id()) {
                    graph.remove_edge(&node_id, &to);
                }
            }
            for (router, metric) in &body.neighbors {
                graph.add_edge(node_id, NodeId::Router(*router), *metric as u32);
            }
        });
    }

    pub async fn update_prefix_lsa(
        &self,
        header: LsaHeader,
        body: OverlayPrefixLsa,
        dead: bool,
        inter_area: bool,
    ) {
        let key = header.key();
        let mut table = self.prefix_ls.write().await;
        if Self::stale(table.get(&key), &header) {
            util::debug(&format!("stale {} dropped", key));
            return;
        }
        table.insert(key, Lsa::new(header, LsaBody::OverlayPrefix(body.clone())));
        if dead || !inter_area {
            return;
        }
        let node_id = NodeId::Router(header.adv_router);
        self.spf.update(|graph| {
            graph.ensure_node(Node::new(node_id, Some(key)));
            if let Some(node) = graph.node_mut(&node_id) {
                node.prefixes.clear();
                for prefix in body.prefixes.values() {
                    node.prefixes.insert(prefix.address, *prefix);
                }
            }
        });
    }

    pub async fn update_asbr_lsa(&self, header: LsaHeader, body: AsbrLsa, dead: bool) {
        let key = header.key();
        let mut table = self.asbr_ls.write().await;
        if Self::stale(table.get(&key), &header) {
            util::debug(&format!("stale {} dropped", key));
            return;
        }
        let _ = dead;
        table.insert(key, Lsa::new(header, LsaBody::Asbr(body)));
    }

    // ------------------------------------------------------------------
    // aging

    /// # age_tick
    /// same lifecycle as the area databases: refresh our own LSAs at the
    /// refresh age, tombstone everything that exceeds the maximum age.
    pub async fn age_tick(&self) -> Vec<LsaKey> {
        let mut refreshed = Vec::new();
        for ls_type in [
            OVERLAY_ABR_LSA_TYPE,
            OVERLAY_PREFIX_LSA_TYPE,
            OVERLAY_ASBR_LSA_TYPE,
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
                    util::debug(&format!("overlay lsa {} aged out", key));
                    let node_id = NodeId::Router(key.adv_router);
                    match key.ls_type {
                        OVERLAY_ABR_LSA_TYPE => {
                            self.spf.update(|graph| {
                                graph.remove_node(&node_id);
                            });
                        }
                        OVERLAY_PREFIX_LSA_TYPE => {
                            self.spf.update(|graph| {
                                if let Some(node) = graph.node_mut(&node_id) {
                                    node.prefixes.clear();
                                }
                            });
                        }
                        _ => {}
                    }
                    self.dead.write().await.insert(key, lsa);
                }
            }
        }
        refreshed
    }

    pub async fn dump(&self) -> String {
        let mut out = String::new();
        for (name, ls_type) in [
            ("abr", OVERLAY_ABR_LSA_TYPE),
            ("prefix", OVERLAY_PREFIX_LSA_TYPE),
            ("asbr", OVERLAY_ASBR_LSA_TYPE),
        ] {
            let table = self.table(ls_type).read().await;
            out.push_str(&format!("overlay {} ({})\n", name, table.len()));
            for lsa in table.values() {
                out.push_str(&format!(
                    "  {} seq {:#010x} age {}\n",
                    lsa.key(),
                    lsa.header.sequence_number,
                    lsa.header.age
                ));
            }
        }
        out
    }
}
