use std::collections::HashMap;
use std::net;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::area::Area;
use crate::flood;
use crate::interface::Interface;
use crate::lsa::{LsaKey, Prefix};
use crate::overlay::OverlayLsdb;
use crate::rtable::RouteInstaller;
use crate::transport::Transport;
use crate::{util, AreaId, RouterId};

/// which area owns the installed route for a destination, and which
/// other areas could take over.
struct RouteOwner {
    area: AreaId,
    metric: u32,
    backups: HashMap<AreaId, u32>,
}

/// metric assigned to a promoted backup so the owning area's next
/// shortest-path pass wins the arbitration and reinstalls properly.
const PROMOTED_METRIC: u32 = 1000;

/// # Router
/// the owning context everything runs under: transport, forwarding
/// boundary, areas, interfaces and the overlay tier. Handed around as an
/// `Arc`, never global.
pub struct Router {
    pub router_id: RouterId,
    pub transport: Arc<dyn Transport>,
    pub installer: Arc<dyn RouteInstaller>,
    pub areas: RwLock<HashMap<AreaId, Arc<Area>>>,
    pub interfaces: RwLock<HashMap<u32, Arc<Interface>>>,
    pub overlay: Arc<OverlayLsdb>,
    routes: Mutex<HashMap<net::Ipv6Addr, RouteOwner>>,
    addresses: RwLock<Vec<(net::Ipv6Addr, u8)>>,
    inter_area: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Router {
    pub fn new(
        router_id: RouterId,
        transport: Arc<dyn Transport>,
        installer: Arc<dyn RouteInstaller>,
    ) -> Arc<Self> {
        Arc::new(Self {
            router_id,
            transport,
            installer,
            areas: RwLock::new(HashMap::new()),
            interfaces: RwLock::new(HashMap::new()),
            overlay: OverlayLsdb::new(router_id),
            routes: Mutex::new(HashMap::new()),
            addresses: RwLock::new(Vec::new()),
            inter_area: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// # start
    /// spawn the overlay aging and overlay shortest-path loops.
    pub async fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock().await;
        let aging_router = self.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let refreshed = aging_router.overlay.age_tick().await;
                if !refreshed.is_empty() && aging_router.is_inter_area() {
                    flood::multicast_all(&aging_router, &refreshed).await;
                }
            }
        }));
        handles.push(tokio::spawn(
            self.overlay.spf.clone().run(self.clone()),
        ));
        util::log(&format!("router {} started", self.router_id));
    }

    pub fn is_inter_area(&self) -> bool {
        self.inter_area.load(Ordering::SeqCst)
    }

    pub async fn area(&self, id: AreaId) -> Option<Arc<Area>> {
        self.areas.read().await.get(&id).cloned()
    }

    pub async fn interface(&self, number: u32) -> Option<Arc<Interface>> {
        self.interfaces.read().await.get(&number).cloned()
    }

    pub async fn area_interfaces(&self, area: AreaId) -> Vec<Arc<Interface>> {
        self.interfaces
            .read()
            .await
            .values()
            .filter(|interface| interface.area == area)
            .cloned()
            .collect()
    }

    /// # add_interface
    /// attach an interface, creating its area on first use. Gaining a
    /// second area makes us a border router.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_interface(
        self: &Arc<Self>,
        number: u32,
        area_id: AreaId,
        link_local: net::Ipv6Addr,
        cost: u16,
        priority: u8,
        hello_interval: u16,
        dead_interval: u16,
    ) -> Option<Arc<Interface>> {
        if self.interfaces.read().await.contains_key(&number) {
            util::error(&format!("interface {} already exists", number));
            return None;
        }
        {
            let mut areas = self.areas.write().await;
            if !areas.contains_key(&area_id) {
                let area = Area::new(area_id, self.router_id);
                areas.insert(area_id, area.clone());
                area.start(self).await;
                util::log(&format!("area {} created", area_id));
            }
        }
        let interface = Interface::new(
            number,
            area_id,
            link_local,
            cost,
            priority,
            hello_interval,
            dead_interval,
        );
        self.interfaces
            .write()
            .await
            .insert(number, interface.clone());
        interface.start(self).await;
        self.recheck_inter_area().await;
        Some(interface)
    }

    /// # set_interface_address
    /// configure a routable address on an interface. The router remembers
    /// it so route computation never overrides a directly connected
    /// destination.
    pub async fn set_interface_address(
        self: &Arc<Self>,
        number: u32,
        address: net::Ipv6Addr,
        length: u8,
    ) {
        let interface = match self.interface(number).await {
            Some(interface) => interface,
            None => {
                util::error(&format!("no interface {}", number));
                return;
            }
        };
        self.addresses.write().await.push((address, length));
        interface.set_full_address(self, address, length).await;
    }

    pub async fn change_interface_cost(self: &Arc<Self>, number: u32, cost: u16) {
        match self.interface(number).await {
            Some(interface) => interface.change_cost(self, cost).await,
            None => util::error(&format!("no interface {}", number)),
        }
    }

    /// # shutdown_interface
    /// bring an interface down, withdraw its originations, and return the
    /// flooded kill set. Losing the area's last interface also withdraws
    /// our presence in the area.
    pub async fn shutdown_interface(self: &Arc<Self>, number: u32) -> Vec<LsaKey> {
        let interface = match self.interface(number).await {
            Some(interface) => interface,
            None => return Vec::new(),
        };
        let (updates, mut kills) = interface.shutdown(self).await;
        let area_id = interface.area;
        self.interfaces.write().await.remove(&number);
        let remaining = self.area_interfaces(area_id).await;
        if remaining.is_empty() {
            if let Some(area) = self.area(area_id).await {
                if let Some(key) = area.lsdb.kill_self_router_lsa().await {
                    kills.push(key);
                }
                if let Some(key) = area.lsdb.kill_self_intra_area_prefix_router().await {
                    kills.push(key);
                }
            }
        }
        flood::multicast_area(self, area_id, &updates).await;
        flood::multicast_area_kill(self, area_id, &kills).await;
        self.recheck_inter_area().await;
        kills
    }

    /// border status follows the number of areas with live interfaces.
    async fn recheck_inter_area(self: &Arc<Self>) {
        let mut areas: Vec<AreaId> = self
            .interfaces
            .read()
            .await
            .values()
            .map(|interface| interface.area)
            .collect();
        areas.sort_unstable();
        areas.dedup();
        let active = areas.len() > 1;
        self.update_is_inter_area(active).await;
    }

    pub async fn update_is_inter_area(self: &Arc<Self>, active: bool) {
        if self.inter_area.swap(active, Ordering::SeqCst) == active {
            return;
        }
        let areas: Vec<(AreaId, Arc<Area>)> = self
            .areas
            .read()
            .await
            .iter()
            .map(|(id, area)| (*id, area.clone()))
            .collect();
        if active {
            util::log(&format!("router {} is now a border router", self.router_id));
            for (id, area) in &areas {
                if let Some(key) = area.lsdb.update_self_router_abr(true).await {
                    flood::multicast_area(self, *id, &[key]).await;
                }
                area.spf.refresh_routing();
            }
            self.overlay.spf.refresh();
        } else {
            util::log(&format!(
                "router {} is no longer a border router",
                self.router_id
            ));
            let kills = self.overlay.kill_self_lsas().await;
            flood::multicast_all(self, &kills).await;
            for (id, area) in &areas {
                let cleared = area.lsdb.clear_inter_area_lsas().await;
                flood::multicast_area_kill(self, *id, &cleared).await;
                if let Some(key) = area.lsdb.update_self_router_abr(false).await {
                    flood::multicast_area(self, *id, &[key]).await;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // route arbitration across areas

    /// # add_route
    /// decide whether an area's route wins the destination. The losing
    /// area is remembered as a backup.
    pub async fn add_route(&self, address: net::Ipv6Addr, metric: u32, area: AreaId) -> bool {
        let mut routes = self.routes.lock().await;
        match routes.get_mut(&address) {
            None => {
                routes.insert(
                    address,
                    RouteOwner {
                        area,
                        metric,
                        backups: HashMap::new(),
                    },
                );
                true
            }
            Some(owner) if owner.area == area => {
                owner.metric = metric;
                true
            }
            Some(owner) if metric < owner.metric => {
                let previous = (owner.area, owner.metric);
                owner.backups.insert(previous.0, previous.1);
                owner.backups.remove(&area);
                owner.area = area;
                owner.metric = metric;
                true
            }
            Some(owner) => {
                owner.backups.insert(area, metric);
                false
            }
        }
    }

    /// # remove_route
    /// a withdrawal from the owning area promotes the best backup and
    /// nudges its area to recompute; a withdrawal from a backup is
    /// silent.
    pub async fn remove_route(&self, address: net::Ipv6Addr, area: AreaId) -> bool {
        let mut routes = self.routes.lock().await;
        let owner = match routes.get_mut(&address) {
            Some(owner) => owner,
            None => return false,
        };
        if owner.area != area {
            owner.backups.remove(&area);
            return false;
        }
        let promoted = owner
            .backups
            .iter()
            .min_by_key(|(backup_area, metric)| (**metric, **backup_area))
            .map(|(backup_area, _)| *backup_area);
        match promoted {
            Some(backup_area) => {
                owner.backups.remove(&backup_area);
                owner.area = backup_area;
                owner.metric = PROMOTED_METRIC;
                if let Some(area) = self.areas.read().await.get(&backup_area) {
                    area.spf.refresh_routing();
                }
            }
            None => {
                routes.remove(&address);
            }
        }
        true
    }

    /// # covers_local_address
    /// a prefix containing one of our own configured addresses is
    /// directly connected and never installed from the graph.
    pub async fn covers_local_address(&self, prefix: &Prefix) -> bool {
        let addresses = self.addresses.read().await;
        addresses
            .iter()
            .any(|(address, _)| prefix.covers(*address))
    }

    // ------------------------------------------------------------------
    // console surface

    pub async fn dump_lsdb(&self) -> String {
        let mut out = String::new();
        for (id, area) in self.areas.read().await.iter() {
            out.push_str(&format!("area {}\n", id));
            out.push_str(&area.lsdb.dump().await);
        }
        out.push_str(&self.overlay.dump().await);
        out
    }

    pub async fn dump_routes(&self) -> String {
        let mut out = String::new();
        for (id, area) in self.areas.read().await.iter() {
            out.push_str(&format!("area {}\n", id));
            out.push_str(&area.spf.dump_routes().await);
        }
        out
    }

    pub async fn dump_graph(&self) -> String {
        let mut out = String::new();
        for (id, area) in self.areas.read().await.iter() {
            out.push_str(&format!("area {}\n", id));
            out.push_str(&area.spf.dump_graph());
        }
        if self.is_inter_area() {
            out.push_str("overlay\n");
            out.push_str(&self.overlay.spf.snapshot().dump());
        }
        out
    }

    pub async fn dump_neighbors(&self) -> String {
        let mut out = String::new();
        for interface in self.interfaces.read().await.values() {
            let state = interface.state.read().await;
            out.push_str(&format!(
                "interface {} ({}) dr {} bdr {}\n",
                interface.number, state.status, state.dr, state.bdr
            ));
            for neighbor in state.neighbors.values() {
                out.push_str(&format!(
                    "  {} {} via {}\n",
                    neighbor.id,
                    neighbor.status().await,
                    neighbor.address
                ));
            }
        }
        out
    }

    /// # shutdown
    /// take every interface down and stop every loop.
    pub async fn shutdown(self: &Arc<Self>) {
        let numbers: Vec<u32> = self.interfaces.read().await.keys().copied().collect();
        for number in numbers {
            self.shutdown_interface(number).await;
        }
        for area in self.areas.read().await.values() {
            area.shutdown().await;
        }
        self.overlay.spf.shutdown();
        for handle in self.handles.lock().await.drain(..) {
            handle.abort();
        }
        util::log(&format!("router {} stopped", self.router_id));
    }
}
