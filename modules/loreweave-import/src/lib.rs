pub mod aggregator;
pub mod api;
pub mod media;
pub mod pipeline;
pub mod resolver;
pub mod synthesizer;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod wikitext;
pub mod writer;
