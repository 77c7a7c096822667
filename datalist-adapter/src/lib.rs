//! UI-facing collections for the `datalist` crate.
//!
//! The `datalist` crate is asynchronous: every read may have to fetch. List widgets want the
//! opposite, a synchronous indexer plus change notifications. This crate bridges the two:
//!
//! - [`VirtualizingVector`]: reads return immediately, with `None` as a placeholder for items
//!   still being fetched, followed by an `ItemReplaced` event once they arrive
//! - [`IncrementalLoadingList`]: the same, but items only become visible through explicit
//!   "load more" calls
//!
//! Background work runs on a caller-provided [`Spawner`]. [`TaskQueue`] is a minimal one for UI
//! loops that prefer to drain work themselves.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod events;
mod incremental;
mod options;
mod queue;
mod shared;
mod vector;

#[cfg(test)]
mod tests;

pub use events::{LoadMoreItemsResult, Property, VectorEvent};
pub use incremental::IncrementalLoadingList;
pub use options::{EventCallback, Spawner, VectorOptions};
pub use queue::TaskQueue;
pub use vector::VirtualizingVector;
