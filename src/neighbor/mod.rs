use std::net;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::interface::Interface;
use crate::packet::dd::DbDescriptionPacket;
use crate::packet::hello::HelloPacket;
use crate::router::Router;
use crate::{util, AreaId, RouterId, NULL_ID};

pub mod exchange;
pub mod status;

pub use status::Status;

/// # NeighborState
/// everything learned from the neighbor's hellos plus the bookkeeping of
/// an exchange in progress.
pub struct NeighborState {
    pub status: Status,
    pub priority: u8,
    pub interface_id: u32,
    pub dr: RouterId,
    pub bdr: RouterId,
    pub neighbors: Vec<RouterId>,
    pub master: bool,
    pub dd_sequence_number: u32,
    pub inactivity: u16,
}

/// # Neighbor
/// one conversation on one interface. The identity fields never change;
/// a neighbor that comes back with a different link-local address is a
/// new neighbor.
pub struct Neighbor {
    pub id: RouterId,
    pub address: net::Ipv6Addr,
    pub area: AreaId,
    pub interface_number: u32,
    pub state: RwLock<NeighborState>,
    dd_tx: Mutex<Option<mpsc::Sender<DbDescriptionPacket>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    inactivity_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Neighbor {
    pub fn new(
        id: RouterId,
        address: net::Ipv6Addr,
        area: AreaId,
        interface_number: u32,
        dead_interval: u16,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            address,
            area,
            interface_number,
            state: RwLock::new(NeighborState {
                status: Status::Down,
                priority: 0,
                interface_id: 0,
                dr: NULL_ID,
                bdr: NULL_ID,
                neighbors: Vec::new(),
                master: false,
                dd_sequence_number: 0,
                inactivity: dead_interval,
            }),
            dd_tx: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
            inactivity_handle: Mutex::new(None),
        })
    }

    pub async fn status(&self) -> Status {
        self.state.read().await.status
    }

    pub async fn set_status(&self, status: Status) {
        let mut state = self.state.write().await;
        if state.status != status {
            util::debug(&format!("neighbor {} {} -> {}", self.id, state.status, status));
            state.status = status;
        }
    }

    pub async fn push_handle(&self, handle: JoinHandle<()>) {
        self.handles.lock().await.push(handle);
    }

    /// tear down any exchange in progress. The inactivity countdown keeps
    /// running; it is owned by the interface lifecycle.
    pub async fn abort_sessions(&self) {
        *self.dd_tx.lock().await = None;
        for handle in self.handles.lock().await.drain(..) {
            handle.abort();
        }
    }

    pub async fn stop(&self) {
        self.abort_sessions().await;
        if let Some(handle) = self.inactivity_handle.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn deliver_dd(&self, packet: DbDescriptionPacket) {
        let sender = self.dd_tx.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(packet).await;
        }
    }

    async fn install_dd_channel(&self) -> Option<mpsc::Receiver<DbDescriptionPacket>> {
        let mut slot = self.dd_tx.lock().await;
        if slot.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::channel(32);
        *slot = Some(tx);
        Some(rx)
    }

    /// # start_inactivity
    /// countdown refreshed by every hello; hitting zero declares the
    /// neighbor dead.
    pub async fn start_inactivity(
        self: &Arc<Self>,
        router: Arc<Router>,
        interface: Arc<Interface>,
    ) {
        let neighbor = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let expired = {
                    let mut state = neighbor.state.write().await;
                    if state.status == Status::Down {
                        continue;
                    }
                    state.inactivity = state.inactivity.saturating_sub(1);
                    state.inactivity == 0
                };
                if expired {
                    util::log(&format!("neighbor {} inactivity expired", neighbor.id));
                    neighbor_down(&router, &interface, &neighbor).await;
                    break;
                }
            }
        });
        *self.inactivity_handle.lock().await = Some(handle);
    }
}

pub fn seed_dd_sequence() -> u32 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u32)
        .unwrap_or(1);
    (millis % 1000).max(1)
}

/// # hello_received
/// refresh what we know about the neighbor and advance the conversation.
/// Seeing our own router id in the hello proves bidirectionality; losing
/// it regresses the neighbor to init.
pub async fn hello_received(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    neighbor: &Arc<Neighbor>,
    hello: &HelloPacket,
) {
    let seen = hello.neighbors.contains(&router.router_id);
    let previous;
    {
        let mut state = neighbor.state.write().await;
        previous = state.status;
        state.priority = hello.priority;
        state.interface_id = hello.interface_id;
        state.dr = hello.designated_router;
        state.bdr = hello.backup_designated_router;
        state.neighbors = hello.neighbors.clone();
        state.inactivity = hello.dead_interval;
        if state.status == Status::Down {
            state.status = Status::Init;
        }
        if !seen && state.status > Status::Init {
            state.status = Status::Init;
        }
    }
    if !seen {
        if previous >= Status::ExStart {
            util::log(&format!("neighbor {} regressed to init", neighbor.id));
            neighbor.abort_sessions().await;
            if previous == Status::Full {
                interface.remove_adjacency(router, neighbor).await;
            }
        }
        return;
    }
    if previous <= Status::Init {
        two_way(router, interface, neighbor).await;
    }
}

/// # two_way
/// bidirectionality established. An exchange starts only when one end of
/// the pair is (backup) designated router; two drothers stay two-way.
pub async fn two_way(router: &Arc<Router>, interface: &Arc<Interface>, neighbor: &Arc<Neighbor>) {
    if neighbor.status().await < Status::TwoWay {
        neighbor.set_status(Status::TwoWay).await;
    }
    if interface.should_adjacency(neighbor).await {
        exchange::start(router, interface, neighbor).await;
    }
}

/// re-check a two-way neighbor after an election changed who is
/// designated router. The exchange starts from its own task: elections
/// also run inside an exchange worker that is tearing a neighbor down,
/// and the restart must not chain onto that worker's future.
///
/// Returns a boxed future rather than using `async fn`: the exchange
/// worker awaits this future and this future spawns the exchange
/// worker, and the compiler cannot resolve that `Send` cycle through
/// two opaque types.
pub fn reevaluate<'a>(
    router: &'a Arc<Router>,
    interface: &'a Arc<Interface>,
    neighbor: &'a Arc<Neighbor>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if neighbor.status().await == Status::TwoWay && interface.should_adjacency(neighbor).await {
            let router = router.clone();
            let interface = interface.clone();
            let neighbor = neighbor.clone();
            tokio::spawn(async move {
                exchange::start(&router, &interface, &neighbor).await;
            });
        }
    })
}

pub async fn neighbor_down(
    router: &Arc<Router>,
    interface: &Arc<Interface>,
    neighbor: &Arc<Neighbor>,
) {
    util::log(&format!(
        "neighbor {} down on interface {}",
        neighbor.id, interface.number
    ));
    neighbor.abort_sessions().await;
    neighbor.set_status(Status::Down).await;
    interface.neighbor_down(router, neighbor).await;
}
