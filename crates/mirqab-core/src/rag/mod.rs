//! The Moraqib RAG query pipeline.
//!
//! Answers free-text questions over the detection report history in three
//! stages: retrieval (strategy chosen by [`strategy::classify`]), context
//! assembly ([`context::assemble_context`]), and guarded generation
//! ([`pipeline::MoraqibPipeline`]).
//!
//! Each query is stateless end-to-end. The store and the generation
//! capability are injected as trait objects, so every stage is testable
//! with fakes.

pub mod context;
pub mod device;
pub mod keywords;
pub mod pipeline;
pub mod strategy;
pub mod time_window;
