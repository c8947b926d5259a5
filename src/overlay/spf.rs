use std::collections::HashMap;
use std::net;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use crate::flood;
use crate::router::Router;
use crate::rtable::{shortest_paths, Graph, Node, NodeId};
use crate::{RouterId, OVERLAY_SPF_POLL_INTERVAL};

/// # OverlaySpf
/// shortest paths over the border-router graph. Results do not install
/// routes directly; they decide which prefixes each area gets summarized
/// into it and at what metric.
pub struct OverlaySpf {
    root: NodeId,
    graph: StdMutex<Graph>,
    dirty: AtomicBool,
    active: AtomicBool,
}

impl OverlaySpf {
    pub fn new(router_id: RouterId) -> Arc<Self> {
        let root = NodeId::Router(router_id);
        let mut graph = Graph::new();
        graph.ensure_node(Node::new(root, None));
        Arc::new(Self {
            root,
            graph: StdMutex::new(graph),
            dirty: AtomicBool::new(false),
            active: AtomicBool::new(true),
        })
    }

    pub fn update<T>(&self, apply: impl FnOnce(&mut Graph) -> T) -> T {
        let mut graph = match self.graph.lock() {
            Ok(graph) => graph,
            Err(poisoned) => poisoned.into_inner(),
        };
        let out = apply(&mut graph);
        self.dirty.store(true, Ordering::SeqCst);
        out
    }

    pub fn snapshot(&self) -> Graph {
        match self.graph.lock() {
            Ok(graph) => graph.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn refresh(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// # best_prefixes
    /// cheapest overlay cost per prefix: distance to the advertising
    /// border router plus the metric it advertised.
    pub fn best_prefixes(&self) -> HashMap<(net::Ipv6Addr, u8), u32> {
        let graph = self.snapshot();
        let (distances, _) = shortest_paths(&graph, self.root);
        let mut best: HashMap<(net::Ipv6Addr, u8), u32> = HashMap::new();
        for (id, cost) in &distances {
            if *id == self.root {
                continue;
            }
            let node = match graph.node(id) {
                Some(node) => node,
                None => continue,
            };
            for prefix in node.prefixes.values() {
                let candidate = *cost + prefix.metric as u32;
                let entry = best
                    .entry((prefix.address, prefix.length))
                    .or_insert(candidate);
                if candidate < *entry {
                    *entry = candidate;
                }
            }
        }
        best
    }

    /// # run
    /// the poll loop. Each pass recomputes the overlay view and
    /// reconciles every area's summarized prefixes, suppressing any the
    /// area already reaches intra-area at the same or better cost.
    pub async fn run(self: Arc<Self>, router: Arc<Router>) {
        loop {
            tokio::time::sleep(Duration::from_secs(OVERLAY_SPF_POLL_INTERVAL)).await;
            if !self.active.load(Ordering::SeqCst) {
                break;
            }
            if !router.is_inter_area() {
                continue;
            }
            if !self.dirty.swap(false, Ordering::SeqCst) {
                continue;
            }
            self.run_once(&router).await;
        }
    }

    pub async fn run_once(&self, router: &Arc<Router>) {
        let best = self.best_prefixes();
        let areas: Vec<_> = router
            .areas
            .read()
            .await
            .iter()
            .map(|(id, area)| (*id, area.clone()))
            .collect();
        for (area_id, area) in areas {
            let mut wanted = HashMap::new();
            for (prefix, cost) in &best {
                match router.overlay.local_prefix_cost(area_id, *prefix).await {
                    Some(local) if local <= *cost => {}
                    _ => {
                        wanted.insert(*prefix, *cost);
                    }
                }
            }
            let keys = area.lsdb.update_self_inter_area_prefix_lsas(wanted).await;
            if !keys.is_empty() {
                flood::multicast_area(router, area_id, &keys).await;
            }
        }
    }
}
