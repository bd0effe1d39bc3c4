use std::sync::Arc;

use crate::catalog::{embeddings, Catalog};
use crate::chat::ChatService;
use crate::config::Config;
use crate::llm::{ChatProvider, EmbeddingProvider, LlmClient};
use crate::scan::ScanStore;
use crate::search::SearchEngine;

/// Shared application state. Everything behind an `Arc` is read-only after
/// startup except the scan log, which locks internally.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub engine: Arc<SearchEngine>,
    pub chat: Arc<ChatService>,
    pub scans: Arc<ScanStore>,
    pub chat_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    /// Load the catalog, attach embeddings (cached or freshly generated) and
    /// open the scan log. A missing or malformed catalog is fatal; embedding
    /// failures only disable semantic search.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        let llm = Arc::new(LlmClient::new(http_client, config.llm.clone()));

        let mut catalog = Catalog::load(&config.catalog_path())?;

        if catalog.is_empty() {
            tracing::warn!("Catalog is empty; semantic search disabled");
        } else {
            let cache_path = config.embeddings_cache_path();
            let cache = config.cache_embeddings.then_some(cache_path.as_path());
            match embeddings::load_or_generate(
                llm.as_ref(),
                catalog.products(),
                config.search.embedding_batch_size,
                cache,
            )
            .await
            {
                Ok(vectors) => catalog.attach_embeddings(vectors)?,
                Err(e) => {
                    tracing::warn!("Could not prepare embeddings: {e}");
                    tracing::warn!("Search functionality will be limited without embeddings.");
                }
            }
        }

        let scans = ScanStore::open(&config.scan_log_path())?;

        Ok(Self::from_parts(config, catalog, llm.clone(), llm, scans))
    }

    /// Wire services around an already-loaded catalog.
    pub fn from_parts(
        config: Config,
        catalog: Catalog,
        embedder: Arc<dyn EmbeddingProvider>,
        chat_provider: Arc<dyn ChatProvider>,
        scans: ScanStore,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let engine = Arc::new(SearchEngine::new(
            catalog.clone(),
            embedder,
            chat_provider,
            config.search.clone(),
        ));
        let chat = Arc::new(ChatService::new(engine.clone(), config.llm.is_configured()));
        let max_concurrent_chats = config.max_concurrent_chats.max(1);

        Self {
            config,
            catalog,
            engine,
            chat,
            scans: Arc::new(scans),
            chat_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_chats)),
        }
    }
}
