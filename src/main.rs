use anyhow::Context;
use log::info;

use asset_proxy::{server, ProxyConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ProxyConfig::from_env().context("invalid proxy configuration")?;
    info!("starting asset_proxy {}", env!("CARGO_PKG_VERSION"));

    server::serve(config).await
}
