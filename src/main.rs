use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wax_labs_notifications::{
    build_router,
    jobs::proposal_status_sync::start_proposal_status_sync_job,
    services::{
        notifier::TelegramNotifier, proposal_cache::ProposalCache,
        status_tracker::ProposalStatusTracker,
    },
    settings::Settings,
    wax::{TableRowsSource, WaxChainClient},
    AppState,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = Settings::from_env().expect("Invalid configuration");

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&settings.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let chain: Arc<dyn TableRowsSource> = Arc::new(
        WaxChainClient::new(settings.wax_rpc_url.clone(), settings.wax_request_timeout)
            .expect("Failed to create WAX client"),
    );
    let proposals = ProposalCache::new(settings.proposal_cache_ttl);

    let notifier = match &settings.telegram_bot_token {
        Some(token) => Some(TelegramNotifier::new(
            settings.telegram_api_url.clone(),
            token.clone(),
            settings.wax_request_timeout,
        )),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, status changes will only be logged");
            None
        }
    };

    let tracker = ProposalStatusTracker::new(
        db.clone(),
        chain.clone(),
        settings.contract.clone(),
        notifier,
    )
    .with_cache(proposals.clone());
    start_proposal_status_sync_job(tracker, settings.status_poll_interval).await;

    let bind_addr = settings.bind_addr;
    let state = AppState {
        db,
        chain,
        contract: settings.contract.clone(),
        proposals,
        settings: Arc::new(settings),
    };

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!(
        "Server started, listening on {}",
        listener.local_addr().map(|a| a.to_string()).unwrap_or_default()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received, stopping server");
        })
        .await
        .expect("Server error");
}
