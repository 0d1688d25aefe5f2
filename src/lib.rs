//! # Context Recall
//!
//! A local retrieval-augmented-generation core: chunk documents, embed them
//! into a durable vector index, and serve ranked, paginated, cached
//! semantic search to a chat front end that remembers its own exchanges.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────────────┐
//! │  Loader  │──▶│ Chunker │──▶│     VectorIndex      │
//! │ txt/pdf… │   │ 1200 ch │   │ Embedding + SQLite   │
//! └──────────┘   └─────────┘   └──────────┬───────────┘
//!                                         │ generation
//!                      ┌──────────────────┤
//!                      ▼                  ▼
//!               ┌────────────┐     ┌────────────┐
//!               │ QueryCache │◀───▶│  Engine    │──▶ ChatSession ──▶ LLM
//!               │  LRU, gen  │     │ search/batch│        │
//!               └────────────┘     └────────────┘        └──▶ record_exchange
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init
//! recall ingest ./policies
//! recall search "access reviews" --k 3 --page 2
//! recall batch "mfa" "encryption at rest" --flatten
//! recall ask "What does our policy say about MFA?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Engine error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Fixed-width text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Storage trait, in-memory and SQLite backends |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`index`] | Embedding plus persistence, serialized writes |
//! | [`cache`] | Bounded query cache |
//! | [`engine`] | Ingest, search, batch search, reset |
//! | [`batch`] | Batch options, cancellation, outcomes |
//! | [`extract`] | PDF / DOCX / XLSX text extraction |
//! | [`loader`] | File-to-text by extension |
//! | [`llm`] | Language model client and prompts |
//! | [`exchange_log`] | JSON-lines audit log |
//! | [`chat`] | One question/answer turn |

pub mod batch;
pub mod cache;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod exchange_log;
pub mod extract;
pub mod index;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod store;

pub use engine::RetrievalEngine;
pub use error::{EngineError, Result};
