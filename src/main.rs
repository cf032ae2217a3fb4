use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use log::{error, info};
use std::io;
use std::sync::Arc;

use medisched::config::{AppConfig, StoreBackend};
use medisched::handlers;
use medisched::logger::setup_logger;
use medisched::middleware::RequestLogger;
use medisched::{AssistantGateway, HuggingFaceGateway, MemoryStore, PgStore, Store};

fn open_store(config: &AppConfig) -> io::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "DATABASE_URL must be set"))?;
            info!("Connecting to database");
            let store = PgStore::connect(url, config.db_pool_size).map_err(|e| {
                error!("Failed to open database: {}", e);
                io::Error::new(io::ErrorKind::Other, e.to_string())
            })?;
            Ok(Arc::new(store))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    setup_logger();

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        error!("Configuration validation error: {}", e);
        return Err(io::Error::new(io::ErrorKind::InvalidInput, e));
    }

    let store = open_store(&config)?;
    let gateway: Arc<dyn AssistantGateway> = Arc::new(HuggingFaceGateway::new(&config.assistant));

    let bind = (config.host.clone(), config.port);
    let workers = config.workers;
    info!("Starting HTTP server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(RequestLogger)
            .app_data(web::Data::from(store.clone()))
            .app_data(web::Data::from(gateway.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(handlers::configure)
    })
    .workers(workers)
    .keep_alive(std::time::Duration::from_secs(75))
    .shutdown_timeout(30)
    .bind(bind)?
    .run()
    .await
}
