// Media pipeline: candidate collection, relevance classification, and the
// keyed verdict store the reconciliation passes run against.

pub mod classifier;
pub mod collector;
pub mod relevance;

pub use classifier::classify;
pub use collector::{collect, collect_candidates};
pub use relevance::{Provenance, RelevanceStore};
