//! # Krira RAG Engine
//!
//! Core engine for the Krira retrieval-augmented generation service. It
//! covers the full dataset lifecycle (load, chunk, embed, upsert), the
//! serving path (retrieve, ground, generate) and the batch evaluator that
//! stresses both against a labeled question/answer set.
//!
//! The HTTP surface lives in the sibling `krira-server` crate; this crate is
//! deliberately transport-agnostic so the pipelines can be exercised
//! directly from tests and tools.

pub mod chat;
pub mod context;
pub mod engine;
pub mod evaluation;
pub mod ingest;
pub mod providers;
pub mod text;
pub mod types;

pub use engine::{EngineConfig, RagEngine};
pub use types::{Chunk, DatasetPayload, DatasetType, PineconeConfig, PipelineConfig, RetrievedContext};
