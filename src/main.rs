use std::sync::Arc;

use ospfv3_lib::router::Router;
use ospfv3_lib::rtable::LoggingInstaller;
use ospfv3_lib::transport::RawTransport;
use ospfv3_lib::{cli, util};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let router_id = util::input_router_id();
    let transport = Arc::new(RawTransport::new()?);
    let router = Router::new(router_id, transport, Arc::new(LoggingInstaller));
    router.start().await;
    cli::cli(router).await?;
    Ok(())
}
