//! # Mirqab Core
//!
//! Shared logic for the Mirqab detection backend: detection report models,
//! the report store abstraction, and the Moraqib RAG query pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP, or other service-layer
//! dependencies. The store and generation capability are consumed through
//! traits so the pipeline can run against fakes in tests.

pub mod models;
pub mod rag;
pub mod store;
