//! Stream resolution for third-party embed pages: turns an embed URL (or a
//! movie/series descriptor) into directly playable media URLs without running
//! the page's scripts.

pub mod api;
pub mod config;
pub mod extractors;
pub mod models;
pub mod utils;

pub use api::StreamEngine;
pub use config::ResolverConfig;
pub use models::{ContentType, EmbedTarget, StreamCandidate};
