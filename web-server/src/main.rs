// web-server/src/main.rs
use actix::Actor;
use actix_web::{App, HttpServer};
use sneradar_common::{setup_tracing, Config, MemoryStore, SystemClock};
use sneradar_web::middleware::RateLimiter;
use sneradar_web::sweeper::StoreSweeper;
use sneradar_web::{api, AppState};
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = Config::from_env();

    // Setup tracing
    setup_tracing(&config.log_level);

    let server_addr = config.web_server_addr.clone();
    tracing::info!(
        "Starting SNE Radar auth server on {} (domain {}, chain {})",
        server_addr,
        config.auth.challenge.domain,
        config.auth.challenge.chain_id
    );

    let state = AppState::new(
        &config.auth,
        Arc::new(MemoryStore::new()),
        Arc::new(SystemClock),
    );

    // Start the expiry sweeper
    StoreSweeper::new(
        state.service.clone(),
        Duration::from_secs(config.auth.sweep_interval_secs),
    )
    .start();

    let limiter = RateLimiter::new(&config.rate_limit);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .wrap(limiter.clone())
            .configure(|cfg| state.register(cfg))
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
