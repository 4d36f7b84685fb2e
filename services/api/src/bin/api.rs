//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, InMemoryMetadataAdapter, OpenAiSummarizerAdapter},
    config::Config,
    documents::PdfFont,
    error::ApiError,
    web::{build_router, session::CookieSigner, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use summarizer_core::ports::{LanguageModelService, SessionMetadataService};
use summarizer_core::SummarizerService;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let metadata: Arc<dyn SessionMetadataService> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; session metadata is kept in memory only.");
            Arc::new(InMemoryMetadataAdapter::new())
        }
    };

    // --- 3. Initialize Service Adapters ---
    let model: Option<Arc<dyn LanguageModelService>> = match &config.openai_api_key {
        Some(key) => {
            let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(key));
            info!("Using language model '{}'.", config.openai_model);
            Some(Arc::new(OpenAiSummarizerAdapter::new(
                openai_client,
                config.openai_model.clone(),
                config.llm_timeout,
            )))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; generations use the offline fallback.");
            None
        }
    };
    let summarizer = SummarizerService::new(model);

    let signer = CookieSigner::new(&config.secret_key)
        .map_err(|e| ApiError::Internal(format!("Invalid SECRET_KEY: {}", e)))?;

    let pdf_font = PdfFont::discover(config.pdf_font_path.as_deref());
    if let PdfFont::Embedded(font) = &pdf_font {
        info!("PDF exports embed the '{}' font.", font.name());
    }

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        metadata,
        summarizer,
        signer,
        pdf_font,
    ));
    let app = build_router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
