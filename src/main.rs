use std::sync::Arc;

use acompute_api::infrastructure::config::AppConfig;
use acompute_api::infrastructure::object_store::build_store;
use acompute_api::infrastructure::registry::DataSourceRegistry;
use acompute_api::interfaces::http::{start_server, ApiState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let store = match build_store(&config) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "failed to initialize storage backend");
            std::process::exit(1);
        }
    };

    let registry = Arc::new(DataSourceRegistry::discover(store, &config.data_dir).await);

    info!(
        host = %config.host,
        port = config.port,
        storage = config.storage_mode(),
        "starting server"
    );

    let server = start_server(ApiState::new(config, registry))?;
    server.await
}
