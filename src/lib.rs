//! # QA Forge
//!
//! A documentation-grounded pipeline for generating QA artifacts.
//!
//! QA Forge ingests product documentation (Markdown, JSON, HTML, PDF),
//! chunks and embeds it into a local SQLite vector store, and uses
//! retrieval-grounded prompting to generate structured test cases and
//! Selenium automation scripts that only reference behavior actually
//! present in the ingested material.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Parsers    │──▶│   Pipeline   │──▶│  SQLite    │
//! │ md/json/html │   │ Chunk+Embed  │   │ vectors    │
//! │     /pdf     │   └──────────────┘   └────┬──────┘
//! └──────────────┘                           │
//!                                            ▼
//!                                    ┌──────────────┐
//!                                    │   Agents     │
//!                                    │ test cases / │
//!                                    │   scripts    │
//!                                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qag init                                # create database
//! qag ingest ./docs login_page.html      # parse, chunk, embed, store
//! qag query "password reset flow"        # inspect retrieval
//! qag generate "test cases for login"    # grounded test cases (JSON)
//! qag script cases.json --index 0        # Selenium script for one case
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`parse`] | Format adapters (text, JSON, HTML, PDF) |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store trait plus SQLite and in-memory backends |
//! | [`kb`] | The knowledge base: ingestion, retrieval, session state |
//! | [`context`] | Retrieved chunks → grounded prompt context |
//! | [`llm`] | Generative model abstraction |
//! | [`agents`] | Test-case and script generation agents |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod agents;
pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod kb;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod store;
