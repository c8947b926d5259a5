use std::collections::{BTreeMap, HashMap};
use std::net;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::OspfError;
use crate::lsa::{LsaKey, Prefix, ROUTER_LSA_TYPE};
use crate::router::Router;
use crate::{util, AreaId, RouterId, NULL_ID, SPF_POLL_INTERVAL};

pub mod graph;

pub use graph::{next_hop, shortest_paths, Graph, Node, NodeId};

/// # RouteInstaller
/// the boundary to the forwarding plane. Installs are idempotent, a second
/// install for the same prefix replaces the previous one.
pub trait RouteInstaller: Send + Sync {
    fn install(
        &self,
        prefix: net::Ipv6Addr,
        length: u8,
        interface: u32,
        next_hop: Option<net::Ipv6Addr>,
        metric: u32,
    ) -> Result<(), OspfError>;
    fn withdraw(&self, prefix: net::Ipv6Addr, length: u8, interface: u32)
        -> Result<(), OspfError>;
}

/// # LoggingInstaller
/// logs what the forwarding plane would be told. The console binary runs
/// with this by default.
pub struct LoggingInstaller;

impl RouteInstaller for LoggingInstaller {
    fn install(
        &self,
        prefix: net::Ipv6Addr,
        length: u8,
        interface: u32,
        next_hop: Option<net::Ipv6Addr>,
        metric: u32,
    ) -> Result<(), OspfError> {
        match next_hop {
            Some(via) => util::log(&format!(
                "route {}/{} via {} dev {} metric {}",
                prefix, length, via, interface, metric
            )),
            None => util::log(&format!(
                "route {}/{} dev {} metric {}",
                prefix, length, interface, metric
            )),
        }
        Ok(())
    }

    fn withdraw(
        &self,
        prefix: net::Ipv6Addr,
        length: u8,
        interface: u32,
    ) -> Result<(), OspfError> {
        util::log(&format!("route del {}/{} dev {}", prefix, length, interface));
        Ok(())
    }
}

/// # Route
/// one installed destination.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Route {
    pub prefix: Prefix,
    pub metric: u32,
    pub interface: u32,
    pub next_hop: Option<net::Ipv6Addr>,
}

/// # RouteTable
/// the routes one shortest-path run produced. Diffed against the previous
/// run to drive installs and withdrawals.
#[derive(Clone, Default, Debug)]
pub struct RouteTable {
    pub routes: BTreeMap<net::Ipv6Addr, Route>,
}

impl RouteTable {
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for route in self.routes.values() {
            match route.next_hop {
                Some(via) => out.push_str(&format!(
                    "{} via {} dev {} metric {}\n",
                    route.prefix, via, route.interface, route.metric
                )),
                None => out.push_str(&format!(
                    "{} dev {} metric {}\n",
                    route.prefix, route.interface, route.metric
                )),
            }
        }
        out
    }
}

/// # Adjacency
/// how to actually reach a first hop: the outgoing interface and, unless
/// the hop is a directly attached segment, the neighbor's link-local
/// address.
#[derive(Clone, Copy, Debug)]
pub struct Adjacency {
    pub interface: u32,
    pub next_hop: Option<net::Ipv6Addr>,
}

/// # SpfResult
/// snapshot of one shortest-path run.
pub struct SpfResult {
    pub graph: Graph,
    pub distances: BTreeMap<NodeId, u32>,
    pub parents: BTreeMap<NodeId, NodeId>,
    pub hops: BTreeMap<NodeId, NodeId>,
}

/// # RouteManager
/// turns a shortest-path result into a route table and reconciles it with
/// the previously installed one.
pub struct RouteManager {
    pub area: AreaId,
    adjacencies: HashMap<NodeId, Adjacency>,
}

impl RouteManager {
    pub fn new(area: AreaId) -> Self {
        Self {
            area,
            adjacencies: HashMap::new(),
        }
    }

    pub fn add_adjacency(&mut self, node: NodeId, adjacency: Adjacency) {
        self.adjacencies.insert(node, adjacency);
    }

    pub fn remove_adjacency(&mut self, node: &NodeId) {
        self.adjacencies.remove(node);
    }

    async fn consider(
        &self,
        router: &Router,
        table: &mut RouteTable,
        prefix: Prefix,
        metric: u32,
        adjacency: Adjacency,
    ) {
        if let Some(existing) = table.routes.get(&prefix.address) {
            if existing.metric <= metric {
                return;
            }
        }
        if router.covers_local_address(&prefix).await {
            return;
        }
        table.routes.insert(
            prefix.address,
            Route {
                prefix,
                metric,
                interface: adjacency.interface,
                next_hop: adjacency.next_hop,
            },
        );
    }

    pub async fn build_table(
        &self,
        router: &Router,
        result: &SpfResult,
        root: NodeId,
    ) -> RouteTable {
        let mut table = RouteTable::default();
        for (id, cost) in &result.distances {
            if *id == root {
                continue;
            }
            let node = match result.graph.node(id) {
                Some(node) => node,
                None => continue,
            };
            let hop = match result.hops.get(id) {
                Some(hop) => *hop,
                None => continue,
            };
            let adjacency = match self.adjacencies.get(&hop) {
                Some(adjacency) => *adjacency,
                None => {
                    util::debug(&format!("no adjacency toward {} for {}", hop, id));
                    continue;
                }
            };
            for prefix in node.prefixes.values() {
                self.consider(router, &mut table, *prefix, *cost, adjacency)
                    .await;
            }
            for prefix in node.inter_area_prefixes.values() {
                self.consider(
                    router,
                    &mut table,
                    *prefix,
                    *cost + prefix.metric as u32,
                    adjacency,
                )
                .await;
            }
        }
        table
    }

    pub async fn process_routes(&self, router: &Router, old: &RouteTable, new: &RouteTable) {
        for (address, route) in &new.routes {
            let previous = old.routes.get(address);
            let changed = match previous {
                None => true,
                Some(existing) => existing != route,
            };
            if !changed {
                continue;
            }
            let install = router.add_route(*address, route.metric, self.area).await;
            if !install {
                continue;
            }
            // a moved first hop gets withdrawn before the new entry goes
            // in, otherwise the kernel keeps both
            if let Some(existing) = previous {
                if existing.interface != route.interface || existing.next_hop != route.next_hop {
                    if let Err(err) = router.installer.withdraw(
                        existing.prefix.address,
                        existing.prefix.length,
                        existing.interface,
                    ) {
                        util::error(&format!("withdraw {} failed: {}", existing.prefix, err));
                    }
                }
            }
            if let Err(err) = router.installer.install(
                route.prefix.address,
                route.prefix.length,
                route.interface,
                route.next_hop,
                route.metric,
            ) {
                util::error(&format!("install {} failed: {}", route.prefix, err));
            }
        }
        for (address, route) in &old.routes {
            if new.routes.contains_key(address) {
                continue;
            }
            if !router.remove_route(*address, self.area).await {
                continue;
            }
            if let Err(err) =
                router
                    .installer
                    .withdraw(route.prefix.address, route.prefix.length, route.interface)
            {
                util::error(&format!("withdraw {} failed: {}", route.prefix, err));
            }
        }
    }
}

struct RouteState {
    manager: RouteManager,
    table: RouteTable,
}

/// # SpfManager
/// per-area shortest-path scheduler. The database pushes graph deltas in
/// and marks it dirty; a poll loop recomputes and reconciles routes.
pub struct SpfManager {
    pub area: AreaId,
    root: NodeId,
    graph: StdMutex<Graph>,
    dirty: AtomicBool,
    topology_change: AtomicBool,
    active: AtomicBool,
    routes: Mutex<RouteState>,
}

impl SpfManager {
    pub fn new(area: AreaId, router_id: RouterId) -> Arc<Self> {
        let root = NodeId::Router(router_id);
        let mut graph = Graph::new();
        graph.ensure_node(Node::new(
            root,
            Some(LsaKey::new(ROUTER_LSA_TYPE, router_id, NULL_ID)),
        ));
        Arc::new(Self {
            area,
            root,
            graph: StdMutex::new(graph),
            dirty: AtomicBool::new(true),
            topology_change: AtomicBool::new(false),
            active: AtomicBool::new(true),
            routes: Mutex::new(RouteState {
                manager: RouteManager::new(area),
                table: RouteTable::default(),
            }),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// # update
    /// apply a graph delta and schedule a recomputation.
    pub fn update<T>(&self, apply: impl FnOnce(&mut Graph) -> T) -> T {
        let mut graph = match self.graph.lock() {
            Ok(graph) => graph,
            Err(poisoned) => poisoned.into_inner(),
        };
        let out = apply(&mut graph);
        self.dirty.store(true, Ordering::SeqCst);
        out
    }

    /// # update_topology
    /// like `update` for deltas that add or remove vertices; other areas
    /// get re-evaluated too, since inter-area reachability may change.
    pub fn update_topology<T>(&self, apply: impl FnOnce(&mut Graph) -> T) -> T {
        let out = self.update(apply);
        self.topology_change.store(true, Ordering::SeqCst);
        out
    }

    pub fn snapshot(&self) -> Graph {
        match self.graph.lock() {
            Ok(graph) => graph.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn refresh_routing(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub async fn add_adjacency(&self, node: NodeId, adjacency: Adjacency) {
        self.routes.lock().await.manager.add_adjacency(node, adjacency);
        self.refresh_routing();
    }

    pub async fn remove_adjacency(&self, node: &NodeId) {
        self.routes.lock().await.manager.remove_adjacency(node);
        self.refresh_routing();
    }

    /// # compute
    /// one shortest-path pass over the current graph.
    pub fn compute(&self) -> SpfResult {
        let graph = self.snapshot();
        let (distances, parents) = shortest_paths(&graph, self.root);
        let mut hops = BTreeMap::new();
        for id in distances.keys() {
            if *id == self.root {
                continue;
            }
            if let Some(hop) = next_hop(&parents, self.root, *id) {
                hops.insert(*id, hop);
            }
        }
        SpfResult {
            graph,
            distances,
            parents,
            hops,
        }
    }

    pub async fn run_once(&self, router: &Arc<Router>) {
        let result = self.compute();
        let mut state = self.routes.lock().await;
        let old = std::mem::take(&mut state.table);
        let table = state.manager.build_table(router, &result, self.root).await;
        state.manager.process_routes(router, &old, &table).await;
        state.table = table;
        drop(state);
        if router.is_inter_area() {
            self.export_overlay(router, &result).await;
        }
    }

    async fn export_overlay(&self, router: &Arc<Router>, result: &SpfResult) {
        let mut neighbors: HashMap<RouterId, u32> = HashMap::new();
        let mut prefixes: HashMap<(net::Ipv6Addr, u8), u32> = HashMap::new();
        for (id, cost) in &result.distances {
            let node = match result.graph.node(id) {
                Some(node) => node,
                None => continue,
            };
            if let NodeId::Router(router_id) = id {
                if node.is_abr && *cost > 0 {
                    neighbors.insert(*router_id, *cost);
                }
            }
            for prefix in node.prefixes.values() {
                let entry = prefixes
                    .entry((prefix.address, prefix.length))
                    .or_insert(*cost);
                if *cost < *entry {
                    *entry = *cost;
                }
            }
        }
        let mut keys = Vec::new();
        if let Some(key) = router.overlay.update_neighbors(self.area, neighbors).await {
            keys.push(key);
        }
        if let Some(key) = router.overlay.update_prefixes(self.area, prefixes).await {
            keys.push(key);
        }
        if !keys.is_empty() {
            crate::flood::multicast_all(router, &keys).await;
        }
    }

    pub async fn run(self: Arc<Self>, router: Arc<Router>) {
        loop {
            tokio::time::sleep(Duration::from_secs(SPF_POLL_INTERVAL)).await;
            if !self.active.load(Ordering::SeqCst) {
                break;
            }
            if !self.dirty.swap(false, Ordering::SeqCst) {
                continue;
            }
            self.run_once(&router).await;
            if self.topology_change.swap(false, Ordering::SeqCst) {
                for (id, area) in router.areas.read().await.iter() {
                    if *id != self.area {
                        area.spf.refresh_routing();
                    }
                }
            }
        }
    }

    pub async fn dump_routes(&self) -> String {
        self.routes.lock().await.table.dump()
    }

    pub fn dump_graph(&self) -> String {
        self.snapshot().dump()
    }
}
