//! linktrace - Link tracking service with Hexagonal Architecture
//!
//! This is the composition root that wires together all the components.

use linktrace::adapters::inbound::{ApiServer, ApiState};
use linktrace::adapters::outbound::{
    build_client, standard_resolvers, DashMapLinkRepository, NominatimReverseGeocoder,
    SqliteLinkRepository,
};
use linktrace::application::{LocationWorker, TrackingService};
use linktrace::config::load_config;
use linktrace::domain::ports::{LinkRepository, ReverseGeocoder};
use linktrace::domain::services::{GeoChain, MaskTemplate};
use linktrace::infrastructure::shutdown_signal;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting linktrace listen={} (hexagonal architecture)",
        cfg.listen_addr
    );

    // ===== COMPOSITION ROOT =====
    // Wire up all adapters and services

    // 1. Create outbound adapters

    // Link repository (SQLite when a path is configured, DashMap otherwise)
    let repo: Arc<dyn LinkRepository> = match &cfg.db_path {
        Some(path) => {
            let repo = SqliteLinkRepository::open(path)?;
            tracing::info!("link store: sqlite at {}", path);
            Arc::new(repo)
        }
        None => {
            tracing::info!("link store: in-memory (data is lost on exit)");
            Arc::new(DashMapLinkRepository::new())
        }
    };

    // Geo resolvers (HTTP providers sharing one client)
    let client = build_client(cfg.geo_timeout())?;
    let geo = GeoChain::new(standard_resolvers(client.clone(), cfg.abstractapi_key.clone()));
    tracing::info!("geo resolvers: {}", geo.resolver_names().join(" -> "));

    // Reverse geocoding worker (Nominatim)
    let (locations, worker) = if cfg.reverse_geocoding_enabled {
        let geocoder: Arc<dyn ReverseGeocoder> = match &cfg.nominatim_url {
            Some(url) => Arc::new(NominatimReverseGeocoder::with_base_url(client, url)),
            None => Arc::new(NominatimReverseGeocoder::new(client)),
        };
        let (handle, join) = LocationWorker::spawn(geocoder, repo.clone(), cfg.worker_queue);
        (Some(handle), Some(join))
    } else {
        tracing::info!("reverse geocoding disabled");
        (None, None)
    };

    // 2. Create application service
    let service = Arc::new(TrackingService::new(
        repo,
        geo,
        locations,
        MaskTemplate::from_id(&cfg.default_template),
    ));

    // 3. Create inbound adapter and run
    let state = ApiState::new(service)
        .with_public_url(cfg.public_url.clone())
        .with_admin_token(cfg.admin_token.clone());
    let server = ApiServer::new(cfg.listen_addr.clone(), state);

    server.run(shutdown_signal()).await?;

    // The server owned the last handle; let the worker drain what is queued
    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            tracing::error!("reverse geocoding worker panicked: {}", e);
        }
    }

    tracing::info!("linktrace stopped");
    Ok(())
}
