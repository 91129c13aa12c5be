// Embeddings module
// Document chunking, input truncation and the remote embedding client

pub mod chunking;
pub mod client;
pub mod truncate;

pub use chunking::{ChunkingConfig, TextChunk, chunk_text, estimate_token_count};
pub use client::EmbeddingClient;
pub use truncate::Truncator;
