use std::sync::Arc;

use async_trait::async_trait;

use crate::{Result, Subscription, UpdateListener};

/// Bounds shared by every item type stored in a data list.
pub trait DataItem: Clone + PartialEq + Send + Sync + 'static {}
impl<T: Clone + PartialEq + Send + Sync + 'static> DataItem for T {}

/// An asynchronous, index-addressable sequence of items that reports its own changes.
#[async_trait]
pub trait DataListSource<T>: Send + Sync {
    /// Total number of items.
    async fn count(&self) -> Result<usize>;

    /// The item at `index`, fetching it first if necessary.
    async fn item(&self, index: usize) -> Result<T>;

    /// Position of `item` among the items that are already known, if any.
    fn index_of(&self, item: &T) -> Option<usize>;

    /// Registers `listener` for change notifications until the returned handle is dropped.
    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> Subscription;
}
