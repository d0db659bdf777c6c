//! Embedding provider implementations.

pub mod charfreq;
pub mod ollama;
pub mod trigram;
