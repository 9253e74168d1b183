//! Custom Resource Definitions handled by the webhook.
//!
//! - `TemporalCluster`: a Temporal server deployment

mod temporal_cluster;

pub use temporal_cluster::*;
