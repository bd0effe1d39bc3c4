//! # product-search
//!
//! A Rust web service for searching a building-materials catalog with
//! embedding similarity and optional LLM reranking, holding multi-turn
//! product conversations, and screening products for EPD risk.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────┐
//!                       │  User Query   │
//!                       └──────┬───────┘
//!                              │
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │  Query Embedding      │
//!                  │  (Ollama / OpenAI)    │
//!                  └───────────┬───────────┘
//!                              │
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │  Cosine Full Scan     │
//!                  │  threshold + filters  │
//!                  │  keep top 30          │
//!                  └───────────┬───────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!   ┌───────────────────────┐     ┌───────────────────────┐
//!   │  LLM Refinement       │     │  Chat Context Merge   │
//!   │  JSON ranking, top 15 │     │  (ID: X) history refs │
//!   │  fallback: cosine     │     │  follow-up detection  │
//!   └───────────┬───────────┘     └───────────┬───────────┘
//!               │                             │
//!               ▼                             ▼
//!   ┌───────────────────────┐     ┌───────────────────────┐
//!   │  Paginated Results    │     │  SSE Chat Stream      │
//!   └───────────────────────┘     └───────────────────────┘
//! ```
//!
//! EPD screening runs beside the search path: [`risk`] classifies single
//! products and [`scan`] evaluates batches of ids, persisting each scan to an
//! append-only log and exporting it as CSV.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data paths, LLM and scan settings
//! - [`models`] - Shared data types: `Product`, `ScoredProduct`, request/response types
//! - [`catalog`] - Catalog loading, filter indexes, statistics and the embedding cache
//! - [`search::vector`] - Cosine similarity over the in-memory product vectors
//! - [`search::filters`] - Attribute filter predicates
//! - [`search::engine`] - Semantic search, refinement fallback and similar products
//! - [`llm::embeddings`] - Batch embedding generation via Ollama or OpenAI-compatible APIs
//! - [`llm::refine`] - LLM reranking of semantic candidates
//! - [`llm::chat_stream`] - Blocking and streaming chat completions
//! - [`chat`] - Conversation context tracking, prompting and the streaming producer
//! - [`risk`] - EPD rule engine and certificate heuristic
//! - [`scan`] - Batch scans, the scan log and CSV import/export
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state wiring the services together

pub mod api;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod risk;
pub mod scan;
pub mod search;
pub mod state;

pub use error::{Error, Result};
