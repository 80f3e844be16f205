pub mod catalog;
pub mod embedding;
pub mod gateway;

pub use catalog::{list_models, ModelsResponse, Provider};
pub use embedding::{EmbeddingModel, EmbeddingService};
pub use gateway::{ChatOptions, GatewayClient, TokenUsage};
