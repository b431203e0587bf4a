//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LocalStore},
    config::{Config, StorageMode},
    error::ApiError,
    web::{build_router, rest::ApiDoc, state::AppState},
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_tracker_core::ports::{AccountService, StudyStore};
use study_tracker_core::workspace::Workspaces;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Store ---
    let (store, accounts): (Arc<dyn StudyStore>, Option<Arc<dyn AccountService>>) =
        match &config.storage {
            StorageMode::Remote { database_url } => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                let store: Arc<dyn StudyStore> = db_adapter.clone();
                let accounts: Arc<dyn AccountService> = db_adapter;
                (store, Some(accounts))
            }
            StorageMode::Local { data_dir, .. } => {
                let store: Arc<dyn StudyStore> = Arc::new(LocalStore::new(data_dir.clone()));
                (store, None)
            }
        };

    // --- 3. Build the Shared AppState ---
    let workspaces = Arc::new(Workspaces::new(store));
    if let StorageMode::Local { user_id, .. } = &config.storage {
        // Load the single local user's data before taking requests.
        let workspace = workspaces.activate(*user_id).await;
        if let Some(report) = workspace.load_report() {
            info!("Local data loaded (seeded: {})", report.seeded);
        }
    }
    let app_state = Arc::new(AppState {
        accounts,
        workspaces,
        config: config.clone(),
    });

    // --- 4. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(build_router(app_state)?)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
