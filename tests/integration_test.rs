//! Integration tests for the product-search service.
//!
//! These tests exercise catalog loading, retrieval, scanning and the HTTP
//! surface with in-process providers, so no LLM endpoint is needed.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use product_search::catalog::{embeddings, Catalog};
use product_search::config::{Config, ScanConfig, ScanRiskPolicy};
use product_search::error::{Error, Result};
use product_search::llm::{ChatProvider, ChatStream, EmbeddingProvider};
use product_search::models::ChatMessage;
use product_search::risk::{self, RiskTier};
use product_search::scan::{self, table, ScanStore};
use product_search::search::SearchEngine;
use product_search::state::AppState;

/// Two-axis embedder: wood-like words and clay-like words.
struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                let wood = if t.contains("oak") || t.contains("timber") { 1.0 } else { 0.0 };
                let clay = if t.contains("brick") || t.contains("clay") { 1.0 } else { 0.0 };
                vec![wood, clay]
            })
            .collect())
    }
}

/// Chat model that always answers with the same text.
struct CannedChat(&'static str);

#[async_trait]
impl ChatProvider for CannedChat {
    async fn complete(&self, _messages: &[ChatMessage], _max_tokens: u32) -> Result<String> {
        Ok(self.0.to_string())
    }

    async fn stream(&self, _messages: Vec<ChatMessage>, _max_tokens: u32) -> Result<ChatStream> {
        Err(Error::Generation("streaming not scripted".into()))
    }
}

fn sample_catalog_json() -> Value {
    json!([
        {
            "id": 1,
            "product_name": "Oak Floor Board",
            "manufacturer_name": "Timberline",
            "product_categories": [{ "category_name": "Flooring" }],
            "certifications": [{ "certification": "FSC" }],
            "epd_url": "https://epd.example/oak.pdf",
            "epd_issue_date": "2023-05-01",
            "net_carbon_emissions": 12.5
        },
        {
            "id": 2,
            "product_name": "Clay Face Brick",
            "manufacturer_name": "Brickworks",
            "sku": "CB-2",
            "product_categories": [{ "category_name": "Masonry" }],
            "epd_url": "/docs/brick.pdf"
        },
        {
            "id": "3",
            "product_name": "Timber Veneer Panel",
            "manufacturer_name": "Timberline",
            "product_categories": [{ "name": "Wall Linings" }],
            "certifications": [{ "certification": "Environmental Product Declaration" }]
        },
        {
            "id": 4,
            "product_name": "Float Glass",
            "manufacturer_name": "Glassco",
            "description": ""
        }
    ])
}

fn write_catalog(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("products.json");
    std::fs::write(&path, sample_catalog_json().to_string()).unwrap();
    path
}

async fn embedded_catalog(dir: &Path) -> Catalog {
    let mut catalog = Catalog::load(&write_catalog(dir)).unwrap();
    let vectors = embeddings::load_or_generate(&KeywordEmbedder::new(), catalog.products(), 2, None)
        .await
        .unwrap();
    catalog.attach_embeddings(vectors).unwrap();
    catalog
}

#[test]
fn test_catalog_load_builds_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::load(&write_catalog(dir.path())).unwrap();

    assert_eq!(catalog.len(), 4);
    assert!(catalog.embeddings().is_none());

    let options = catalog.filter_options();
    let categories: Vec<&str> = options.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(categories, vec!["Flooring", "Masonry", "Wall Linings"]);
    assert_eq!(options.manufacturers[0].name, "Timberline");
    assert_eq!(options.manufacturers[0].count, 2);
    assert_eq!(
        options.certifications,
        vec!["Environmental Product Declaration", "FSC"]
    );

    // Blank text collapses at load time
    assert!(catalog.get_by_id("4").unwrap().description.is_none());
    assert_eq!(catalog.find_by_any_id("CB-2").unwrap().id.key(), "2");
    assert!(matches!(catalog.get_by_id("99"), Err(Error::NotFound(_))));
}

#[test]
fn test_catalog_load_missing_file_is_data_source_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Catalog::load(&dir.path().join("nope.json")).err().unwrap();
    assert!(matches!(err, Error::DataSource(_)));
}

#[test]
fn test_catalog_load_malformed_file_is_data_source_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("products.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(Catalog::load(&path), Err(Error::DataSource(_))));
}

#[tokio::test]
async fn test_embedding_cache_reused_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::load(&write_catalog(dir.path())).unwrap();
    let cache = dir.path().join("embeddings.json");

    let first = KeywordEmbedder::new();
    let generated = embeddings::load_or_generate(&first, catalog.products(), 3, Some(&cache))
        .await
        .unwrap();
    assert_eq!(first.calls.load(Ordering::SeqCst), 2);
    assert!(cache.exists());

    let second = KeywordEmbedder::new();
    let cached = embeddings::load_or_generate(&second, catalog.products(), 3, Some(&cache))
        .await
        .unwrap();
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    assert_eq!(generated, cached);
}

#[tokio::test]
async fn test_search_falls_back_to_semantic_order_on_bad_refinement() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SearchEngine::new(
        Arc::new(embedded_catalog(dir.path()).await),
        Arc::new(KeywordEmbedder::new()),
        Arc::new(CannedChat("I'd rather not answer in JSON")),
        Default::default(),
    );

    let results = engine.search("timber", None, true).await.unwrap();
    let ids: Vec<String> = results.iter().map(|p| p.id().key()).collect();
    assert_eq!(ids, vec!["1", "3"]);
    assert!(results.iter().all(|p| p.llm_rank.is_none()));
    assert!(results[0].similarity_score >= results[1].similarity_score);
}

#[tokio::test]
async fn test_similar_excludes_source_product() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SearchEngine::new(
        Arc::new(embedded_catalog(dir.path()).await),
        Arc::new(KeywordEmbedder::new()),
        Arc::new(CannedChat("[]")),
        Default::default(),
    );

    let similar = engine.similar("1").await.unwrap();
    assert!(similar.iter().all(|p| p.id().key() != "1"));
    assert!(similar.iter().any(|p| p.id().key() == "3"));
    assert!(matches!(engine.similar("99").await, Err(Error::NotFound(_))));
}

#[test]
fn test_risk_rules_every_outcome_has_one_reason_and_advisory() {
    let cases = [
        (None, None, RiskTier::Red),
        (Some("/rel/path.pdf"), None, RiskTier::Yellow),
        (Some("/rel/path.pdf"), Some("2024-01-01"), RiskTier::Yellow),
        (Some("https://a.example/x.pdf"), None, RiskTier::Yellow),
        (Some("HTTPS://a.example/x.pdf"), Some("2024-01-01"), RiskTier::Green),
    ];
    for (url, date, tier) in cases {
        let assessment = risk::evaluate(url, date);
        assert_eq!(assessment.tier, tier, "url={url:?} date={date:?}");
        assert_eq!(assessment.reasons.len(), 1);
        assert_eq!(assessment.advisories, vec![risk::VERIFY_ADVISORY]);
    }
}

#[test]
fn test_scan_persists_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::load(&write_catalog(dir.path())).unwrap();
    let log = dir.path().join("scans.jsonl");

    let ids = scan::normalize_ids(["1", " CB-2 ", "", "3", "unknown"], 5000).unwrap();
    let (stored, rows) = scan::run_scan(&catalog, &ids, &ScanConfig::default());
    assert_eq!(rows.len(), 4);
    // Certificate policy: an EPD link or EPD certificate is green, unknown ids are red
    assert_eq!(stored.counts.total, 4);
    assert_eq!(stored.counts.low, 3);
    assert_eq!(stored.counts.medium, 0);
    assert_eq!(stored.counts.high, 1);
    assert_eq!(rows[3].risk_level, RiskTier::Red);

    let scan_id = stored.scan_id;
    {
        let store = ScanStore::open(&log).unwrap();
        store.append(stored).unwrap();
    }

    let reopened = ScanStore::open(&log).unwrap();
    assert_eq!(reopened.len(), 1);
    let replayed = reopened.get(&scan_id.to_string()).unwrap();
    assert_eq!(replayed.results.len(), 4);
    assert_eq!(replayed.results[1].input_product_id, "CB-2");

    let csv = table::export_csv(&replayed).unwrap();
    assert!(csv.starts_with(&[0xEF, 0xBB, 0xBF]));
    let text = String::from_utf8(csv[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("input_product_id,"));

    assert!(matches!(reopened.get("not-a-uuid"), Err(Error::NotFound(_))));
}

#[test]
fn test_scan_rules_policy_uses_decision_tree() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::load(&write_catalog(dir.path())).unwrap();
    let config = ScanConfig {
        max_ids: 2,
        risk_policy: ScanRiskPolicy::Rules,
    };

    let ids: Vec<String> = ["1", "2", "3"].iter().map(|s| s.to_string()).collect();
    let (stored, rows) = scan::run_scan(&catalog, &ids, &config);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].risk_level, RiskTier::Green);
    assert_eq!(rows[1].risk_level, RiskTier::Yellow);
    assert_eq!(stored.counts.total, 2);
}

#[test]
fn test_uploaded_table_ids() {
    let upload = "\u{feff}Name,Product_ID\r\nOak,1\r\n\"Brick, clay\",CB-2\r\n,\r\n";
    let ids = table::parse_ids(upload.as_bytes()).unwrap();
    assert_eq!(ids, vec!["1", "CB-2"]);
}

/// Serve the router on an ephemeral port and return its base URL.
async fn spawn_server(dir: &Path) -> String {
    let config = Config {
        data_dir: dir.to_path_buf(),
        ..Config::default()
    };
    let catalog = embedded_catalog(dir).await;
    let scans = ScanStore::open(&config.scan_log_path()).unwrap();
    let state = AppState::from_parts(
        config,
        catalog,
        Arc::new(KeywordEmbedder::new()),
        Arc::new(CannedChat("[]")),
        scans,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, product_search::api::router(state))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_http_search_products_and_health() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["products_loaded"], 4);
    assert_eq!(health["embeddings_ready"], true);
    assert_eq!(health["api_configured"], false);

    let search: Value = client
        .post(format!("{base}/api/search"))
        .json(&json!({ "query": "brick", "use_llm_refinement": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(search["success"], true);
    assert_eq!(search["total"], 1);
    assert_eq!(search["results"][0]["id"], 2);

    let listing: Value = client
        .post(format!("{base}/api/search"))
        .json(&json!({ "query": "", "page": 1, "per_page": 3 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // per_page is clamped up to the minimum page size
    assert_eq!(listing["total"], 4);
    assert_eq!(listing["count"], 4);
    assert_eq!(listing["per_page"], 10);
    assert_eq!(listing["total_pages"], 1);

    let missing = client
        .get(format!("{base}/api/products/99"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let flexible: Value = client
        .get(format!("{base}/api/product?id=CB-2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(flexible["product_name"], "Clay Face Brick");

    let no_id = client.get(format!("{base}/api/product")).send().await.unwrap();
    assert_eq!(no_id.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_http_chat_without_credentials_apologises() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();

    let reply: Value = client
        .post(format!("{base}/api/chat"))
        .json(&json!({ "query": "oak flooring?", "stream": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["success"], true);
    assert_eq!(
        reply["response"],
        product_search::chat::NOT_CONFIGURED_REPLY
    );

    let blank = client
        .post(format!("{base}/api/chat"))
        .json(&json!({ "query": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_http_malformed_bodies_answer_json_400() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();

    let bad_bodies = [
        ("search", json!({ "query": 5 })),
        ("search", json!({ "query": "oak", "page": 2.5 })),
        ("chat", json!({ "query": ["oak"] })),
        ("assess-products", json!({ "products": 5 })),
    ];
    for (route, body) in bad_bodies {
        let resp = client
            .post(format!("{base}/api/{route}"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST, "{route} {body}");
        let envelope: Value = resp.json().await.unwrap();
        assert_eq!(envelope["success"], false);
        assert!(envelope["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    let not_json = client
        .post(format!("{base}/api/search"))
        .body("query=oak")
        .send()
        .await
        .unwrap();
    assert_eq!(not_json.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_http_chat_history_turn_without_content() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/chat"))
        .json(&json!({
            "query": "hi",
            "stream": false,
            "history": [{ "role": "user" }, { "content": "earlier answer" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let reply: Value = resp.json().await.unwrap();
    assert_eq!(reply["success"], true);
}

#[tokio::test]
async fn test_http_scan_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/api/epd/scan"))
        .json(&json!({ "product_ids": [1, "3", "ghost"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["success"], true);
    assert_eq!(created["summary"]["counts"]["total"], 3);
    assert_eq!(created["results"].as_array().unwrap().len(), 3);
    let scan_id = created["summary"]["scan_id"].as_str().unwrap().to_string();

    let fetched: Value = client
        .get(format!("{base}/api/epd/scan/{scan_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["source"], "local_index");
    assert_eq!(fetched["results"][2]["input_product_id"], "ghost");
    assert_eq!(fetched["results"][2]["risk_level"], "Red");

    let export = client
        .get(format!("{base}/api/epd/export/{scan_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(export.status(), reqwest::StatusCode::OK);
    let disposition = export.headers()[reqwest::header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, format!("attachment; filename=epd_scan_{scan_id}.csv"));

    let unsupported = client
        .get(format!("{base}/api/epd/export/{scan_id}?format=xlsx"))
        .send()
        .await
        .unwrap();
    assert_eq!(unsupported.status(), reqwest::StatusCode::BAD_REQUEST);

    let empty = client
        .post(format!("{base}/api/epd/scan"))
        .json(&json!({ "product_ids": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);

    // The scan log survives a restart
    let reopened = ScanStore::open(&dir.path().join("scans.jsonl")).unwrap();
    assert!(reopened.get(&scan_id).is_ok());
}
