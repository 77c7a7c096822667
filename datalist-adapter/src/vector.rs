use std::sync::Arc;

use datalist::{DataItem, DataListSource, DataListUpdate, Result, Subscription, UpdateListener};
use futures::FutureExt;
use futures::future::try_join_all;

use crate::shared::{VectorCore, WhileLoading};
use crate::{Spawner, VectorOptions};

/// A synchronous, change-notifying view over a [`DataListSource`].
///
/// `get` never blocks: an item that is not available yet reads as `None` and is announced with
/// [`crate::VectorEvent::ItemReplaced`] once the background fetch completes. Source changes are
/// forwarded as events for as long as the vector is alive.
pub struct VirtualizingVector<T, S: ?Sized> {
    core: Arc<VectorCore<T>>,
    _subscription: Subscription,
    source: Arc<S>,
}

impl<T, S> VirtualizingVector<T, S>
where
    T: DataItem,
    S: DataListSource<T> + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, spawner: Spawner) -> Self {
        Self::with_options(source, spawner, VectorOptions::default())
    }

    pub fn with_options(source: Arc<S>, spawner: Spawner, options: VectorOptions) -> Self {
        let core = VectorCore::new(spawner, options, WhileLoading::Ignore);
        let weak = Arc::downgrade(&core);
        let listener: Arc<dyn UpdateListener> = Arc::new(move |update: DataListUpdate| {
            if let Some(core) = weak.upgrade() {
                core.apply_update(update);
            }
        });
        let subscription = source.subscribe(listener);
        Self {
            core,
            _subscription: subscription,
            source,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// The last known item count, `0` until the source has reported one.
    pub fn count(&self) -> usize {
        let source = Arc::clone(&self.source);
        self.core
            .count(move || async move { source.count().await }.boxed())
    }

    pub fn get(&self, index: usize) -> Result<Option<T>> {
        let source = Arc::clone(&self.source);
        self.core
            .item(index, move || async move { source.item(index).await }.boxed())
    }

    /// Whether the item count is being resolved. Source changes are ignored meanwhile.
    pub fn is_loading(&self) -> bool {
        self.core.is_loading()
    }

    pub fn is_fetching(&self, index: usize) -> bool {
        self.core.is_fetching(index)
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.source.index_of(item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Fetches every item of the source, in order.
    pub async fn to_vec(&self) -> Result<Vec<T>> {
        let count = self.source.count().await?;
        try_join_all((0..count).map(|index| self.source.item(index))).await
    }
}

impl<T, S: ?Sized> core::fmt::Debug for VirtualizingVector<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VirtualizingVector")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}
