use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::net;

use crate::lsa::{LsaKey, Prefix};
use crate::RouterId;

/// # NodeId
/// identity of a shortest-path vertex. Transit segments become pseudonodes
/// keyed by their designated router and its interface number, so a DR
/// change produces a different vertex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Router(RouterId),
    Network(RouterId, u32),
}

impl NodeId {
    pub fn is_network(&self) -> bool {
        matches!(self, NodeId::Network(_, _))
    }

    pub fn router_id(&self) -> RouterId {
        match self {
            NodeId::Router(id) => *id,
            NodeId::Network(id, _) => *id,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeId::Router(id) => write!(f, "{}", id),
            NodeId::Network(id, interface) => write!(f, "{}.0.0.0.{}", id, interface),
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// # Node
/// a vertex with the reachability information its LSAs contributed.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub lsa: Option<LsaKey>,
    pub is_abr: bool,
    pub interfaces: HashMap<u32, u16>,
    pub prefixes: HashMap<net::Ipv6Addr, Prefix>,
    pub inter_area_prefixes: HashMap<net::Ipv6Addr, Prefix>,
}

impl Node {
    pub fn new(id: NodeId, lsa: Option<LsaKey>) -> Self {
        Self {
            id,
            lsa,
            is_abr: false,
            interfaces: HashMap::new(),
            prefixes: HashMap::new(),
            inter_area_prefixes: HashMap::new(),
        }
    }
}

/// # Graph
/// adjacency structure fed by the link state database. Directed edges with
/// their own costs: router to pseudonode carries the link metric, the
/// reverse direction is free.
#[derive(Clone, Default, Debug)]
pub struct Graph {
    pub nodes: BTreeMap<NodeId, Node>,
    pub edges: BTreeMap<NodeId, Vec<NodeId>>,
    pub costs: HashMap<(NodeId, NodeId), u32>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_node(&mut self, node: Node) -> &mut Node {
        self.nodes.entry(node.id).or_insert(node)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn remove_node(&mut self, id: &NodeId) {
        self.nodes.remove(id);
        self.edges.remove(id);
        for neighbors in self.edges.values_mut() {
            neighbors.retain(|n| n != id);
        }
        self.costs.retain(|(from, to), _| from != id && to != id);
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, cost: u32) {
        let neighbors = self.edges.entry(from).or_default();
        if !neighbors.contains(&to) {
            neighbors.push(to);
        }
        self.costs.insert((from, to), cost);
    }

    pub fn remove_edge(&mut self, from: &NodeId, to: &NodeId) {
        if let Some(neighbors) = self.edges.get_mut(from) {
            neighbors.retain(|n| n != to);
        }
        self.costs.remove(&(*from, *to));
    }

    pub fn set_cost(&mut self, from: NodeId, to: NodeId, cost: u32) -> bool {
        match self.costs.get_mut(&(from, to)) {
            Some(existing) if *existing != cost => {
                *existing = cost;
                true
            }
            _ => false,
        }
    }

    pub fn is_neighbor(&self, of: &NodeId, candidate: &NodeId) -> bool {
        self.edges
            .get(of)
            .map(|neighbors| neighbors.contains(candidate))
            .unwrap_or(false)
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (id, node) in &self.nodes {
            let neighbors = self
                .edges
                .get(id)
                .map(|edges| {
                    edges
                        .iter()
                        .map(|n| {
                            format!("{}({})", n, self.costs.get(&(*id, *n)).copied().unwrap_or(0))
                        })
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            out.push_str(&format!(
                "{}{} -> [{}] prefixes {:?}\n",
                id,
                if node.is_abr { " [abr]" } else { "" },
                neighbors,
                node.prefixes.keys().collect::<Vec<_>>()
            ));
        }
        out
    }
}

/// # shortest_paths
/// Dijkstra from the root. Among unvisited vertices with the same tentative
/// distance the lowest vertex identity is taken, so the result is fully
/// deterministic.
pub fn shortest_paths(
    graph: &Graph,
    root: NodeId,
) -> (BTreeMap<NodeId, u32>, BTreeMap<NodeId, NodeId>) {
    let mut distances: BTreeMap<NodeId, u32> = BTreeMap::new();
    let mut parents: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut visited: BTreeSet<NodeId> = BTreeSet::new();
    distances.insert(root, 0);
    loop {
        let current = distances
            .iter()
            .filter(|(id, _)| !visited.contains(*id))
            .map(|(id, distance)| (*distance, *id))
            .min();
        let (distance, current) = match current {
            Some(found) => found,
            None => break,
        };
        visited.insert(current);
        let neighbors = match graph.edges.get(&current) {
            Some(neighbors) => neighbors,
            None => continue,
        };
        for next in neighbors {
            if visited.contains(next) || !graph.nodes.contains_key(next) {
                continue;
            }
            let cost = graph.costs.get(&(current, *next)).copied().unwrap_or(0);
            let candidate = distance + cost;
            if distances.get(next).map_or(true, |d| candidate < *d) {
                distances.insert(*next, candidate);
                parents.insert(*next, current);
            }
        }
    }
    distances.retain(|id, _| visited.contains(id));
    (distances, parents)
}

/// # next_hop
/// walk the parent chain back toward the root. When the last hop before
/// the root is a pseudonode the destination sits on a directly attached
/// segment and the router behind it is returned instead.
pub fn next_hop(
    parents: &BTreeMap<NodeId, NodeId>,
    root: NodeId,
    destination: NodeId,
) -> Option<NodeId> {
    let mut hop = *parents.get(&destination)?;
    let mut previous = destination;
    let mut router_hop = previous;
    while hop != root {
        router_hop = previous;
        previous = hop;
        hop = *parents.get(&hop)?;
    }
    if previous.is_network() {
        Some(router_hop)
    } else {
        Some(previous)
    }
}
