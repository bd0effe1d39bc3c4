use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::llm::{refine, ChatProvider, EmbeddingProvider};
use crate::models::{ScoredProduct, SearchFilters};
use crate::search::vector;

const SIMILAR_CANDIDATES: usize = 11;
const SIMILAR_MAX: usize = 10;

/// Two-stage retrieval: full-scan semantic ranking, then optional generative
/// refinement that always degrades to the semantic order.
pub struct SearchEngine {
    catalog: Arc<Catalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        config: SearchConfig,
    ) -> Self {
        Self {
            catalog,
            embedder,
            chat,
            config,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn chat_provider(&self) -> &Arc<dyn ChatProvider> {
        &self.chat
    }

    /// Top `top_k` products by cosine similarity, thresholded and filtered.
    pub async fn semantic_search(
        &self,
        query: &str,
        filters: Option<&SearchFilters>,
        top_k: usize,
    ) -> Result<Vec<ScoredProduct>> {
        let embeddings = self.catalog.embeddings().ok_or_else(|| {
            Error::EmbeddingUnavailable("Product embeddings are not loaded".to_string())
        })?;

        let query_embedding = self.embedder.embed_one(query).await?;

        Ok(vector::rank(
            &self.catalog,
            embeddings,
            &query_embedding,
            filters,
            top_k,
            self.config.similarity_threshold,
        ))
    }

    /// Semantic retrieval followed by refinement when requested.
    pub async fn search(
        &self,
        query: &str,
        filters: Option<&SearchFilters>,
        use_llm_refinement: bool,
    ) -> Result<Vec<ScoredProduct>> {
        let candidates = self
            .semantic_search(query, filters, self.config.top_k_semantic)
            .await?;
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let top_k_final = self.config.top_k_final;
        if !use_llm_refinement {
            return Ok(refine::fallback(&candidates, top_k_final));
        }

        let refined = refine::refine(
            self.chat.as_ref(),
            query,
            &candidates,
            top_k_final,
            self.config.refine_max_tokens,
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Refinement skipped, using semantic order: {e}");
            refine::fallback(&candidates, top_k_final)
        });

        tracing::info!(
            "Search '{}' returned {} of {} candidates",
            query,
            refined.len(),
            candidates.len()
        );
        Ok(refined)
    }

    /// Products semantically close to the one with `id`, excluding itself.
    pub async fn similar(&self, id: &str) -> Result<Vec<ScoredProduct>> {
        let product = self.catalog.get_by_id(id)?;
        let query = format!(
            "{} {}",
            product.product_name.as_deref().unwrap_or_default(),
            product.product_description.as_deref().unwrap_or_default()
        );
        let own_id = product.id.clone();

        let mut results = self
            .semantic_search(&query, None, SIMILAR_CANDIDATES)
            .await?;
        results.retain(|r| r.id() != &own_id);
        results.truncate(SIMILAR_MAX);
        Ok(results)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::ChatStream;
    use crate::models::{ChatMessage, Product, ProductId};
    use async_trait::async_trait;

    /// Maps each text onto a 2-d vector keyed by a few words.
    pub(crate) struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
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

    pub(crate) struct FixedReply(pub String);

    #[async_trait]
    impl ChatProvider for FixedReply {
        async fn complete(&self, _messages: &[ChatMessage], _max_tokens: u32) -> Result<String> {
            Ok(self.0.clone())
        }

        async fn stream(&self, _messages: Vec<ChatMessage>, _max_tokens: u32) -> Result<ChatStream> {
            Err(Error::Generation("not used".into()))
        }
    }

    fn catalog() -> Catalog {
        let names = ["Oak Board", "Clay Brick", "Oak Veneer", "Glass Pane"];
        let products: Vec<Product> = names
            .iter()
            .enumerate()
            .map(|(i, n)| Product {
                id: ProductId::Num(i as i64 + 1),
                product_name: Some(n.to_string()),
                ..Product::default()
            })
            .collect();
        let mut catalog = Catalog::from_products(products);
        catalog
            .attach_embeddings(vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![0.9, 0.1],
                vec![0.0, 0.0],
            ])
            .unwrap();
        catalog
    }

    fn engine(reply: &str) -> SearchEngine {
        SearchEngine::new(
            Arc::new(catalog()),
            Arc::new(KeywordEmbedder),
            Arc::new(FixedReply(reply.to_string())),
            SearchConfig::default(),
        )
    }

    fn keys(products: &[ScoredProduct]) -> Vec<String> {
        products.iter().map(|p| p.id().key()).collect()
    }

    #[tokio::test]
    async fn test_search_uses_refined_order() {
        let engine = engine(r#"[{"product_id": 3, "rank": 1}, {"product_id": 1, "rank": 2}]"#);
        let results = engine.search("oak", None, true).await.unwrap();
        assert_eq!(keys(&results), vec!["3", "1"]);
        assert_eq!(results[0].llm_rank, Some(1));
    }

    #[tokio::test]
    async fn test_search_without_refinement_keeps_semantic_order() {
        let engine = engine("ignored");
        let results = engine.search("oak", None, false).await.unwrap();
        assert_eq!(keys(&results), vec!["1", "3"]);
        assert!(results[0].llm_rank.is_none());
    }

    #[tokio::test]
    async fn test_bad_refinement_degrades() {
        let engine = engine("not json at all");
        let results = engine.search("oak", None, true).await.unwrap();
        assert_eq!(keys(&results), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_missing_embeddings_is_unavailable() {
        let engine = SearchEngine::new(
            Arc::new(Catalog::from_products(vec![Product::default()])),
            Arc::new(KeywordEmbedder),
            Arc::new(FixedReply(String::new())),
            SearchConfig::default(),
        );
        let err = engine.search("oak", None, true).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_similar_excludes_self() {
        let engine = engine("");
        let results = engine.similar("1").await.unwrap();
        assert_eq!(keys(&results), vec!["3"]);
        assert!(matches!(engine.similar("42").await, Err(Error::NotFound(_))));
    }
}
