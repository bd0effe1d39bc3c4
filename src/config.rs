use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the catalog, embedding cache and scan log live
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Product catalog JSON file (defaults to `<data_dir>/products.json`)
    pub catalog_path: Option<PathBuf>,
    /// Persist generated embeddings between restarts
    pub cache_embeddings: bool,
    /// LLM provider configuration
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub scan: ScanConfig,
    /// Maximum concurrent chat generations
    pub max_concurrent_chats: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for chat/refinement
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (required for the openai provider)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// Retrieval and ranking knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Candidates kept from semantic retrieval
    pub top_k_semantic: usize,
    /// Final number of products returned after refinement
    pub top_k_final: usize,
    /// Minimum cosine similarity for a candidate
    pub similarity_threshold: f32,
    /// Product slots offered to the chat model
    pub chat_max_products: usize,
    /// Products per embedding request during catalog indexing
    pub embedding_batch_size: usize,
    pub refine_max_tokens: u32,
    pub chat_max_tokens: u32,
    pub stream_max_tokens: u32,
}

/// Which classification drives the persisted scan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanRiskPolicy {
    /// Certificate-presence heuristic (Green = EPD certificate, Yellow = other
    /// certificate, Red = none).
    #[default]
    Certificates,
    /// EPD link / issue-date decision tree.
    Rules,
}

impl ScanRiskPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "certificates" | "certificate" | "certs" => Some(Self::Certificates),
            "rules" | "rule" | "epd_rules" => Some(Self::Rules),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Identifiers processed per scan; extras are dropped silently
    pub max_ids: usize,
    pub risk_policy: ScanRiskPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:5001".to_string(),
            catalog_path: None,
            cache_embeddings: true,
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            scan: ScanConfig::default(),
            max_concurrent_chats: 3,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-5-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k_semantic: 30,
            top_k_final: 15,
            similarity_threshold: 0.3,
            chat_max_products: 10,
            embedding_batch_size: 100,
            refine_max_tokens: 2000,
            chat_max_tokens: 4000,
            stream_max_tokens: 2000,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_ids: 5000,
            risk_policy: ScanRiskPolicy::default(),
        }
    }
}

impl LlmConfig {
    /// Whether calls can be attempted at all. Ollama runs keyless.
    pub fn is_configured(&self) -> bool {
        self.provider == "ollama" || self.api_key.is_some()
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("PRODUCT_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("PRODUCT_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("PRODUCT_SEARCH_CATALOG") {
            config.catalog_path = Some(PathBuf::from(path));
        }
        if let Ok(val) = std::env::var("PRODUCT_SEARCH_CACHE_EMBEDDINGS") {
            config.cache_embeddings = !matches!(val.trim(), "0" | "false" | "no");
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        config.llm.api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| load_api_key_file(Path::new(".")));

        if let Ok(val) = std::env::var("SEARCH_TOP_K_SEMANTIC") {
            if let Ok(v) = val.parse() {
                config.search.top_k_semantic = v;
            }
        }
        if let Ok(val) = std::env::var("SEARCH_TOP_K_FINAL") {
            if let Ok(v) = val.parse() {
                config.search.top_k_final = v;
            }
        }
        if let Ok(val) = std::env::var("SEARCH_SIMILARITY_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.search.similarity_threshold = v;
            }
        }
        if let Ok(val) = std::env::var("CHAT_MAX_PRODUCTS") {
            if let Ok(v) = val.parse() {
                config.search.chat_max_products = v;
            }
        }
        if let Ok(val) = std::env::var("EMBEDDING_BATCH_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.search.embedding_batch_size = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("EPD_SCAN_MAX_IDS") {
            if let Ok(v) = val.parse() {
                config.scan.max_ids = v;
            }
        }
        if let Ok(val) = std::env::var("EPD_SCAN_RISK_POLICY") {
            match ScanRiskPolicy::parse(&val) {
                Some(policy) => config.scan.risk_policy = policy,
                None => tracing::warn!("Ignoring unknown EPD_SCAN_RISK_POLICY '{val}'"),
            }
        }

        config
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("products.json"))
    }

    pub fn embeddings_cache_path(&self) -> PathBuf {
        self.data_dir.join("embeddings_cache.json")
    }

    pub fn scan_log_path(&self) -> PathBuf {
        self.data_dir.join("scans.jsonl")
    }
}

/// Read an API key from one of the well-known key files in `dir`.
/// Contents shorter than 11 characters are ignored.
pub fn load_api_key_file(dir: &Path) -> Option<String> {
    ["openai-api.md", "openai_apikey.md"]
        .iter()
        .map(|name| dir.join(name))
        .filter(|p| p.exists())
        .find_map(|p| {
            let key = std::fs::read_to_string(&p).ok()?.trim().to_string();
            (key.len() > 10).then_some(key)
        })
}
