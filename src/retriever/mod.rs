//! Retrieval pipeline
//!
//! Turns a stream definition into pages of records:
//! - [`Requester`] renders the templated request for a slice and token
//! - [`RecordSelector`] extracts, filters and transforms records
//! - [`SimpleRetriever`] drives both with a partition router and a paginator
//!
//! Consumers drive a [`Retriever`] slice by slice with
//! [`Retriever::start_slice`] and [`Retriever::fetch_next_page`].

mod requester;
mod selector;
mod simple;
mod types;

pub use requester::{RequestParts, Requester};
pub use selector::{AddedField, RecordSelector, Transformation};
pub use simple::SimpleRetriever;
pub use types::{PageFetch, Retriever};
