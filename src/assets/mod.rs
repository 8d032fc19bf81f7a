//! CPU-side asset plumbing: shader source text and shared decoded images.

pub mod source;
pub mod texture_cache;

pub use source::{load_source, load_source_with};
pub use texture_cache::TextureCache;
