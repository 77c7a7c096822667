//! Paged, lazily fetched data lists.
//!
//! For UI-facing collections (a virtualizing vector and an incremental loading list), see the
//! `datalist-adapter` crate.
//!
//! This crate provides the data side of list virtualization: sources that fetch a large remote
//! sequence a page at a time, a page-granular item cache with an LRU budget, and `skip` / `take`
//! windows that re-index both reads and change notifications.
//!
//! It is runtime-agnostic. The host is expected to provide:
//! - a [`PageFetcher`] (or [`ItemsFetcher`]) that answers count, page size and page requests
//! - an executor to drive the returned futures
//!
//! Every source reports changes as [`DataListUpdate`]s to listeners registered with
//! [`DataListSource::subscribe`].
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod error;
mod fetcher;
mod operators;
mod page;
mod page_list;
mod paged;
mod simple;
mod source;
mod sparse_list;
mod subscription;
mod update;


pub use error::{Error, FetchError, Result};
pub use fetcher::{CountFn, DEFAULT_PAGE_SIZE, FnPageFetcher, ItemsFetcher, PageFetcher, RequestFn};
pub use operators::{DataListSourceExt, Skip, Take};
pub use page::DataListPageResult;
pub use page_list::PageVirtualizingList;
pub use paged::{PagedDataListSource, PagedSourceOptions};
pub use simple::SimpleDataListSource;
pub use source::{DataItem, DataListSource};
pub use sparse_list::VirtualizingList;
pub use subscription::{Subscription, UpdateHub, UpdateListener};
pub use update::{DataListUpdate, UpdateAction};
