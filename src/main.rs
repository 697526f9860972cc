use mcp_registry::{
    config::{EmbeddingConfig, RegistryConfig},
    create_router, db,
    index::{Embedder, HashingEmbedder, OpenAiEmbedder, SearchIndex, VectorIndex},
    mcp::{EndpointIntrospection, EndpointIntrospector},
    repositories::{InMemoryServerRepository, ServerRepository, SqliteServerRepository},
    services::{DiscoveryService, RegistrationService},
    AppState,
};

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mcp_registry=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RegistryConfig::from_env()?;

    // Registry Store
    let store: Arc<dyn ServerRepository> = if config.use_memory_store {
        tracing::warn!("USE_MEMORY_STORE is set; records will not survive a restart");
        Arc::new(InMemoryServerRepository::new())
    } else {
        let pool = db::create_pool(&config.database_url).await?;
        let repository = SqliteServerRepository::connect(pool, &config.table).await?;
        tracing::info!(
            database_url = %config.database_url,
            table = %repository.table(),
            "Registry store connected"
        );
        Arc::new(repository)
    };

    // Search Index
    let embedder: Arc<dyn Embedder> = match &config.embedding {
        EmbeddingConfig::OpenAi {
            api_url,
            api_key,
            model,
            dimensions,
        } => {
            tracing::info!(
                api_url = %api_url,
                model = %model,
                dimensions,
                "Using remote embeddings"
            );
            Arc::new(
                OpenAiEmbedder::new(
                    api_url.clone(),
                    api_key.clone(),
                    model.clone(),
                    config.backend_timeout,
                )?
                .with_dimensions(*dimensions),
            )
        }
        EmbeddingConfig::Hashing => {
            tracing::info!("No embedding API key configured; using local hashing embedder");
            Arc::new(HashingEmbedder::new())
        }
    };
    let index: Arc<dyn SearchIndex> =
        Arc::new(VectorIndex::new(embedder).with_min_score(config.search_min_score));

    let introspector: Arc<dyn EndpointIntrospection> =
        Arc::new(EndpointIntrospector::new(config.introspection_timeout)?);

    // Initialize services
    let registration_service = Arc::new(RegistrationService::new(
        store.clone(),
        index.clone(),
        introspector,
        config.backend_timeout,
    ));
    let discovery_service = Arc::new(DiscoveryService::new(
        store,
        index,
        config.search_top_k,
        config.backend_timeout,
    ));

    tracing::info!("Rebuilding search index from store...");
    if let Err(e) = registration_service.rebuild_index().await {
        tracing::warn!("Failed to rebuild search index: {}", e);
    }

    let app_state = AppState {
        registration_service,
        discovery_service,
    };
    let app = create_router(app_state);

    // Start server
    let addr = config.socket_addr()?;
    tracing::info!("Registry running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
