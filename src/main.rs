//! Equiptrack Server - Equipment Borrow-Return Tracking
//!
//! REST server around the borrow-return ticket lifecycle engine.

use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use equiptrack_server::{
    api,
    config::AppConfig,
    repository::Repository,
    services::{events::EventPublisher, scheduler::TransitionRunner, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("equiptrack_server={},tower_http=debug", config.logging.level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Equiptrack Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Save server address and scheduler settings before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let scheduler_config = config.scheduler.clone();

    // Create repository, event channel and services
    let repository = Repository::new(pool);
    let events = EventPublisher::new(scheduler_config.event_buffer);
    let services = Services::new(repository.clone(), events.clone());

    // Log every outbound event; real delivery subscribes the same way
    let mut event_log = events.subscribe();
    tokio::spawn(async move {
        loop {
            match event_log.recv().await {
                Ok(envelope) => tracing::info!(
                    event = envelope.event.name(),
                    ticket_id = envelope.event.ticket_id(),
                    "outbound event"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Start the scheduled transition runner
    let runner = TransitionRunner::new(
        repository,
        services.tickets.clone(),
        events,
        scheduler_config,
    );
    tokio::spawn(runner.run());

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Devices & inventory
        .route("/devices", get(api::devices::list_devices))
        .route("/devices", post(api::devices::create_device))
        .route("/devices/:id", get(api::devices::get_device))
        .route("/devices/:id/flow", get(api::devices::get_device_flow))
        .route("/devices/:id/units", post(api::devices::add_unit))
        .route("/units/:id", delete(api::devices::retire_unit))
        .route("/units/:id/history", get(api::devices::unit_history))
        .route("/units/:id/repair", post(api::devices::start_repair))
        .route("/units/:id/repair/complete", post(api::devices::complete_repair))
        .route("/units/:id/repairs", get(api::devices::repair_history))
        // Tickets
        .route("/tickets", post(api::tickets::create_ticket))
        .route("/tickets", get(api::tickets::list_my_tickets))
        .route("/tickets/inbox", get(api::tickets::approver_inbox))
        .route("/tickets/:id", get(api::tickets::get_ticket))
        .route("/tickets/:id/stages/:step", post(api::tickets::act_on_stage))
        .route("/tickets/:id/pickup", post(api::tickets::pickup))
        .route("/tickets/:id/return", post(api::tickets::complete_ticket))
        .route("/tickets/:id/history", get(api::tickets::ticket_history))
        // Availability
        .route("/availability", get(api::availability::device_availability))
        .route("/availability/check", post(api::availability::check_units))
        // Events
        .route("/events", get(api::events::stream_events))
        .with_state(state.clone());

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
