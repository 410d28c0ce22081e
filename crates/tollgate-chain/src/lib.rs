pub mod client;
pub mod error;

pub use client::{ChainClient, HttpChainClient};
pub use error::ChainError;
