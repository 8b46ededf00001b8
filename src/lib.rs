//! # Podsearch
//!
//! A hybrid search engine for podcast episodes, combining dense semantic
//! embeddings with sparse lexical (BM25-style) vectors fused into a single
//! ranking. Built for multilingual corpora with first-class Arabic support.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │   SQLite    │──▶│   Pipeline    │──▶│  Qdrant   │
//! │ episodes DB │   │ Clean+Embed  │   │ dense+bm25│
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │(podsearch)│      │ /search  │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! podsearch init                        # create episode database schema
//! podsearch ingest --podcast-ids 50,51  # embed and index episodes
//! podsearch search "تطوير المنتجعات"     # hybrid search
//! podsearch serve                       # start the HTTP search endpoint
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`text`] | HTML cleanup and Arabic normalization |
//! | [`document`] | Canonical episode document construction |
//! | [`embedding`] | Dense (local/remote) and sparse embedding providers |
//! | [`index`] | Vector index abstraction (Qdrant, in-memory) |
//! | [`ingest`] | Ingestion pipeline: episodes → vectors → index |
//! | [`search`] | Hybrid retrieval engine with RRF fusion |
//! | [`server`] | HTTP search endpoint |
//! | [`db`] | Episode store (SQLite) |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod document;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod text;
