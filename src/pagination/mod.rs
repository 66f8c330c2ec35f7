//! Pagination module
//!
//! Supports: Cursor (response body, headers, `Link`), Page Increment,
//! Offset Increment
//!
//! # Overview
//!
//! A [`PaginationStrategy`] decides from the page just fetched whether
//! another page exists and which token requests it. A [`Paginator`] wraps
//! a strategy and injects its token and page size into the next request.
//! [`PaginationCursor`] tracks one partition's progress through the
//! `AwaitingFirstPage -> HasNext* -> Exhausted` state machine.

mod paginator;
mod strategies;
mod types;

pub use paginator::{DefaultPaginator, NoPagination, Paginator};
pub use strategies::{
    CursorPaginationStrategy, OffsetIncrementStrategy, PageIncrementStrategy, Pagination,
};
pub use types::{PageTokenOption, PaginationCursor, PaginationState, PaginationStrategy};
