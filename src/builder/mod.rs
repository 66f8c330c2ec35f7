//! Bounded test reads for manifest development
//!
//! - [`TestReader`] drives a retriever under [`TestReadLimits`] and returns
//!   a [`StreamRead`] report, never an error
//! - [`LimitedRetriever`] enforces the slice and page ceilings
//! - [`handle_request`] answers the `__command` protocol

mod handler;
mod limited;
mod reader;
mod types;

pub use handler::{
    clean_config, create_source, get_command, handle_request, read_stream, resolve_manifest,
    Command,
};
pub use limited::LimitedRetriever;
pub use reader::TestReader;
pub use types::{
    get_limits, LogMessage, Message, RecordMessage, StreamRead, StreamReadPages, StreamReadSlices,
    TestReadLimits, COMMAND, DEFAULT_MAXIMUM_NUMBER_OF_PAGES_PER_SLICE,
    DEFAULT_MAXIMUM_NUMBER_OF_SLICES, DEFAULT_MAXIMUM_RECORDS, INJECTED_MANIFEST, TEST_READ_CONFIG,
};
