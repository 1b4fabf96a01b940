mod api;
mod bloom;
mod bundles;
mod config;
mod cursor;
mod db;
mod errors;
mod locations;
mod resolvers;
mod store;
mod supervisor;

use api::{ApiState, run_api};
use bundles::BundleManagerClient;
use resolvers::Resolvers;
use store::MetadataStore;
use supervisor::Supervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::loader::load_with_discovery().unwrap_or_else(|e| {
        tracing::warn!("failed to load config ({}), falling back to defaults", e);
        config::Config::default()
    });

    let pool = db::init_pool().await?;

    let store = MetadataStore::new(pool, config.resolver.clone());
    let bundles = BundleManagerClient::new(config.resolver.bundle_manager_url.clone());
    let resolvers = Resolvers::new(store, bundles, config.resolver.clone());

    let mut supervisor = Supervisor::new();

    let bind_address = config.resolver.bind_address.clone();
    supervisor.spawn("api", move |shutdown| async move {
        let state = ApiState { resolvers, shutdown: shutdown.clone() };
        run_api(&bind_address, state, shutdown).await
    });

    supervisor.run().await
}
