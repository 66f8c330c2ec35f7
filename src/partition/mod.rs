//! Partition routing module
//!
//! Supports: Single partition (default), List
//!
//! # Overview
//!
//! Partitions split a stream into independent slices that are read one
//! after another, each paginated separately. A router also contributes
//! per-slice request parameters, headers and body fields, e.g. a static
//! list of regions or accounts sent as a query parameter.

mod routers;
mod types;

pub use routers::{ListPartitionRouter, Router, SinglePartitionRouter};
pub use types::PartitionRouter;
