use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::router::Router;
use crate::rtable::SpfManager;
use crate::{flood, AreaId, RouterId};

pub mod lsdb;

pub use lsdb::Lsdb;

/// # Area
/// everything scoped to one area: the link state database and the
/// shortest-path manager it feeds. Interfaces reference their area by id
/// through the router context.
pub struct Area {
    pub id: AreaId,
    pub lsdb: Lsdb,
    pub spf: Arc<SpfManager>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Area {
    pub fn new(id: AreaId, router_id: RouterId) -> Arc<Self> {
        let spf = SpfManager::new(id, router_id);
        Arc::new(Self {
            id,
            lsdb: Lsdb::new(id, router_id, spf.clone()),
            spf,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// # start
    /// spawn the aging and shortest-path loops.
    pub async fn start(self: &Arc<Self>, router: &Arc<Router>) {
        let mut handles = self.handles.lock().await;
        let area = self.clone();
        let aging_router = router.clone();
        handles.push(tokio::spawn(async move {
            area.aging_loop(aging_router).await;
        }));
        handles.push(tokio::spawn(self.spf.clone().run(router.clone())));
    }

    async fn aging_loop(self: Arc<Self>, router: Arc<Router>) {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let refreshed = self.lsdb.age_tick().await;
            if !refreshed.is_empty() {
                flood::multicast_area(&router, self.id, &refreshed).await;
            }
        }
    }

    pub async fn shutdown(&self) {
        self.spf.shutdown();
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}
