//! Multimodal fusion and result publication

pub mod combiner;
pub mod subscribers;

pub use combiner::{fuse, FusionCombiner, FusionWeights};
pub use subscribers::{SubscriberId, SubscriberList, Subscription};
