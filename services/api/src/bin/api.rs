//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        file_store::{LEDGER_FILE, SUBSCRIBERS_FILE},
        JsonLedger, JsonSubscriberStore, PgStore, SolarCalculator, TelegramTransport,
    },
    config::Config,
    error::ApiError,
    tasks::{FollowUps, LedgerReset, NotifierSettings, PrayerNotifier},
    web::{self, rest::ApiDoc, state::AppState},
};
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use axum::Router;
use salat_core::ports::{DedupLedger, SubscriberRepository};
use salat_core::timezone::StaticTimezoneResolver;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// How long shutdown waits for the background loops and pending follow-ups.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting service...");

    // --- 2. Open Storage (PostgreSQL or JSON files) ---
    let (subscribers, ledger) = open_storage(&config).await?;

    // --- 3. Initialize Service Adapters ---
    let transport = Arc::new(TelegramTransport::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        config.external_call_timeout,
    )?);
    let calculator = Arc::new(SolarCalculator::new());
    let timezones = Arc::new(StaticTimezoneResolver);

    // --- 4. Start the Background Tasks ---
    let cancel = CancellationToken::new();
    let follow_ups = FollowUps::new(
        transport.clone(),
        config.followup_delay,
        config.external_call_timeout,
    );
    let notifier = PrayerNotifier::new(
        subscribers.clone(),
        ledger.clone(),
        transport,
        calculator.clone(),
        follow_ups.clone(),
        NotifierSettings {
            interval: config.notifier_interval,
            call_timeout: config.external_call_timeout,
            mini_app_url: config.mini_app_url.clone(),
        },
    );
    let notifier_cancel = cancel.clone();
    let notifier_handle = tokio::spawn(async move { notifier.run(notifier_cancel).await });

    let ledger_reset = LedgerReset::new(
        ledger,
        config.ledger_reset_timezone,
        config.external_call_timeout,
    );
    let reset_handle = tokio::spawn(ledger_reset.run(config.notifier_interval, cancel.clone()));

    // --- 5. Build the Shared AppState & Web Router ---
    let app_state = Arc::new(AppState {
        subscribers,
        calculator,
        timezones,
        config: config.clone(),
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Serve Until a Shutdown Signal ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 7. Stop the Background Tasks ---
    info!("HTTP server stopped; stopping background tasks");
    cancel.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, notifier_handle).await.is_err() {
        warn!("Notification cycle did not finish in time");
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, reset_handle).await.is_err() {
        warn!("Ledger reset job did not finish in time");
    }
    let pending = follow_ups.pending();
    if !follow_ups.drain(SHUTDOWN_GRACE).await {
        warn!(pending, "Dropping follow-ups still pending at shutdown");
    }

    info!("Graceful shutdown complete");
    Ok(())
}

async fn open_storage(
    config: &Config,
) -> Result<(Arc<dyn SubscriberRepository>, Arc<dyn DedupLedger>), ApiError> {
    match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let store = Arc::new(PgStore::new(pool));
            info!("Running database migrations...");
            store.run_migrations().await?;
            info!("Database migrations complete.");

            let subscribers: Arc<dyn SubscriberRepository> = store.clone();
            let ledger: Arc<dyn DedupLedger> = store;
            Ok((subscribers, ledger))
        }
        None => {
            info!(data_dir = %config.data_dir.display(), "No DATABASE_URL; using JSON file storage");
            let subscribers: Arc<dyn SubscriberRepository> =
                Arc::new(JsonSubscriberStore::open(config.data_dir.join(SUBSCRIBERS_FILE)).await?);
            let ledger: Arc<dyn DedupLedger> =
                Arc::new(JsonLedger::open(config.data_dir.join(LEDGER_FILE)).await?);
            Ok((subscribers, ledger))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
