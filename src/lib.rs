//! # Mirqab
//!
//! Backend for the Mirqab camouflaged-personnel detection system:
//! SQLite-backed report storage, snapshot storage, a JSON HTTP API for
//! the operations dashboard and field devices, and the Moraqib RAG
//! assistant for natural-language questions over the stored reports.
//!
//! The retrieval pipeline itself lives in the `mirqab-core` crate; this
//! crate supplies the SQLite store, the Gemini generation provider, the
//! HTTP server, and the CLI.

pub mod config;
pub mod db;
pub mod generation;
pub mod migrate;
pub mod reports;
pub mod server;
pub mod sqlite_store;
pub mod storage;
