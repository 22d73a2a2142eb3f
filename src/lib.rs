pub mod cli;
pub mod clip;
pub mod config;
pub mod gemini;
pub mod imgutil;
pub mod qdrant;
pub mod redesign;
pub mod searcher;
pub mod server;

pub use config::Opts;
pub use searcher::{FurnitureSearcher, SearchResult};
