//! # pgedge-rag-server
//!
//! A multi-tenant retrieval-augmented generation (RAG) server for
//! PostgreSQL + pgvector. Each configured pipeline binds a database, an
//! embedding provider, and a completion provider; queries flow through a
//! hybrid retrieval stage before the LLM answers.
//!
//! ## Query pipeline
//!
//! ```text
//!  ┌─────────────┐
//!  │  HTTP query  │  POST /v1/pipelines/{name}
//!  └──────┬──────┘
//!         ▼
//!  ┌─────────────┐      ┌───────────────────────────┐
//!  │ Embed query  │─────▶│ per table source:          │
//!  └─────────────┘      │   pgvector similarity      │
//!                       │   fetch docs → BM25 index  │
//!                       │   RRF fusion               │
//!                       └─────────────┬─────────────┘
//!                                     ▼
//!                       ┌───────────────────────────┐
//!                       │ dedupe across sources      │
//!                       │ pack context (token budget)│
//!                       │ completion (JSON or SSE)   │
//!                       └───────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - YAML configuration: schema, discovery, defaults cascade, validation, API keys
//! - [`search`] - Tokenizer, per-request BM25 index, reciprocal rank fusion
//! - [`db`] - Postgres gateway: connection pool, parameterized filter compiler, vector search
//! - [`llm`] - Embedding and completion provider traits with per-vendor adapters
//! - [`pipeline`] - The RAG orchestrator and the pipeline manager
//! - [`api`] - Axum HTTP surface: JSON endpoints and SSE streaming

pub mod api;
pub mod config;
pub mod db;
pub mod llm;
pub mod pipeline;
pub mod search;
