//! Cache implementations for grid processing.

mod layer_cache;

pub use layer_cache::LayerCache;
