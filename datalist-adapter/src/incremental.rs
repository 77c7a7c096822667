use std::sync::Arc;

use datalist::{
    DataItem, DataListSource, DataListUpdate, Error, Result, Subscription, UpdateAction,
    UpdateListener,
};
use futures::FutureExt;
use futures::future::{self, try_join_all};
use parking_lot::Mutex;

use crate::shared::{VectorCore, WhileLoading};
use crate::{LoadMoreItemsResult, Property, Spawner, VectorEvent, VectorOptions};

#[derive(Debug)]
struct LoadWindow {
    /// Items made visible so far.
    visible: usize,
    /// Last known source count; `None` until the first load or after a reset.
    source_count: Option<usize>,
    minimum_paging_size: usize,
    /// Bumped on reset; a load started before it reveals nothing.
    generation: u64,
}

struct Inner<T> {
    core: Arc<VectorCore<T>>,
    window: Mutex<LoadWindow>,
}

impl<T: DataItem> Inner<T> {
    fn apply_update(&self, update: DataListUpdate) {
        match update.action() {
            UpdateAction::Add => {
                let visible_add = {
                    let mut w = self.window.lock();
                    w.source_count = w.source_count.map(|c| c + update.count());
                    if update.index() > w.visible {
                        false
                    } else {
                        w.visible += update.count();
                        true
                    }
                };
                if visible_add {
                    self.core.items_added(update.index(), update.count());
                }
            }
            UpdateAction::Remove => {
                let removed = {
                    let mut w = self.window.lock();
                    w.source_count = w.source_count.map(|c| c.saturating_sub(update.count()));
                    if update.index() >= w.visible {
                        0
                    } else {
                        let removed = update.count().min(w.visible - update.index());
                        w.visible -= removed;
                        removed
                    }
                };
                if removed > 0 {
                    self.core.items_removed(update.index(), removed);
                }
            }
            UpdateAction::Reset => {
                {
                    let mut w = self.window.lock();
                    w.visible = 0;
                    w.source_count = None;
                    w.generation = w.generation.wrapping_add(1);
                }
                self.core.reset();
                self.core
                    .emit(VectorEvent::PropertyChanged(Property::HasMoreItems));
            }
        }
    }
}

/// A vector that grows on demand, for "load more" style lists.
///
/// Nothing is visible until [`IncrementalLoadingList::load_more_items`] is called. Each call
/// fetches the next batch of items from the source and then reveals them with an
/// [`VectorEvent::ItemsAdded`] event. Source changes that fall inside the visible range are
/// forwarded; changes past it only update the known source count.
pub struct IncrementalLoadingList<T, S: ?Sized> {
    inner: Arc<Inner<T>>,
    _subscription: Subscription,
    source: Arc<S>,
}

impl<T, S> IncrementalLoadingList<T, S>
where
    T: DataItem,
    S: DataListSource<T> + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, spawner: Spawner) -> Self {
        Self::with_options(source, spawner, VectorOptions::default())
    }

    pub fn with_options(source: Arc<S>, spawner: Spawner, options: VectorOptions) -> Self {
        // Loads keep `is_loading` set while they fetch; source changes still apply meanwhile.
        let core = VectorCore::new(spawner, options, WhileLoading::Apply);
        let inner = Arc::new(Inner {
            window: Mutex::new(LoadWindow {
                visible: 0,
                source_count: None,
                minimum_paging_size: core.options().minimum_paging_size,
                generation: 0,
            }),
            core,
        });
        let weak = Arc::downgrade(&inner);
        let listener: Arc<dyn UpdateListener> = Arc::new(move |update: DataListUpdate| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_update(update);
            }
        });
        let subscription = source.subscribe(listener);
        Self {
            inner,
            _subscription: subscription,
            source,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Number of visible items.
    pub fn count(&self) -> usize {
        let visible = self.inner.window.lock().visible;
        self.inner
            .core
            .count(move || future::ready(Ok(visible)).boxed())
    }

    pub fn get(&self, index: usize) -> Result<Option<T>> {
        let visible = self.inner.window.lock().visible;
        if index >= visible {
            return Err(Error::IndexOutOfRange {
                index,
                count: visible,
            });
        }
        let source = Arc::clone(&self.source);
        self.inner
            .core
            .item(index, move || async move { source.item(index).await }.boxed())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.core.is_loading()
    }

    pub fn is_fetching(&self, index: usize) -> bool {
        self.inner.core.is_fetching(index)
    }

    /// `true` until the source count is known and every item is visible.
    pub fn has_more_items(&self) -> bool {
        let w = self.inner.window.lock();
        match w.source_count {
            Some(source_count) => w.visible < source_count,
            None => true,
        }
    }

    pub fn minimum_paging_size(&self) -> usize {
        self.inner.window.lock().minimum_paging_size
    }

    pub fn set_minimum_paging_size(&self, minimum_paging_size: usize) {
        let changed = {
            let mut w = self.inner.window.lock();
            let changed = w.minimum_paging_size != minimum_paging_size;
            w.minimum_paging_size = minimum_paging_size;
            changed
        };
        if changed {
            self.inner
                .core
                .emit(VectorEvent::PropertyChanged(Property::MinimumPagingSize));
        }
    }

    /// Position of `item` if it is known to the source and currently visible.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        let visible = self.inner.window.lock().visible;
        self.source.index_of(item).filter(|&index| index < visible)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Fetches up to `count` more items (at least the minimum paging size) and makes them
    /// visible.
    ///
    /// The batch is clamped to the items remaining in the source. All items of the batch are
    /// fetched before any becomes visible; if one fails, nothing is revealed and the error is
    /// returned.
    pub async fn load_more_items(&self, count: usize) -> Result<LoadMoreItemsResult> {
        self.inner.core.set_loading(true);
        let result = self.load_batch(count).await;
        if result.is_err() {
            self.inner.core.set_loading(false);
        }
        result
    }

    async fn load_batch(&self, count: usize) -> Result<LoadMoreItemsResult> {
        let (known, generation) = {
            let w = self.inner.window.lock();
            (w.source_count, w.generation)
        };
        let source_count = match known {
            Some(source_count) => source_count,
            None => {
                let source_count = self.source.count().await?;
                let mut w = self.inner.window.lock();
                if w.generation == generation {
                    w.source_count = Some(source_count);
                }
                source_count
            }
        };

        let (start, batch) = {
            let w = self.inner.window.lock();
            let wanted = count.max(w.minimum_paging_size);
            (w.visible, wanted.min(source_count.saturating_sub(w.visible)))
        };
        ddebug!(start, batch, source_count, "IncrementalLoadingList::load_more_items");
        try_join_all((start..start + batch).map(|index| self.source.item(index))).await?;

        // Source changes that arrived during the fetch may have moved the visible boundary.
        let revealed = {
            let mut w = self.inner.window.lock();
            if w.generation == generation {
                let start = w.visible;
                let remaining = w
                    .source_count
                    .map_or(batch, |source_count| source_count.saturating_sub(start));
                let batch = batch.min(remaining);
                w.visible += batch;
                let exhausted = w
                    .source_count
                    .is_some_and(|source_count| w.visible >= source_count);
                Some((start, batch, exhausted))
            } else {
                None
            }
        };

        self.inner.core.set_loading(false);
        let Some((start, batch, exhausted)) = revealed else {
            ddebug!("IncrementalLoadingList: source reset during a load, nothing revealed");
            return Ok(LoadMoreItemsResult { count: 0 });
        };
        if exhausted {
            self.inner
                .core
                .emit(VectorEvent::PropertyChanged(Property::HasMoreItems));
        }
        if batch > 0 {
            self.inner.core.items_added(start, batch);
        }
        Ok(LoadMoreItemsResult { count: batch })
    }

    /// Fetches every visible item, in order.
    pub async fn to_vec(&self) -> Result<Vec<T>> {
        let visible = self.inner.window.lock().visible;
        try_join_all((0..visible).map(|index| self.source.item(index))).await
    }
}

impl<T, S: ?Sized> core::fmt::Debug for IncrementalLoadingList<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IncrementalLoadingList")
            .field("window", &*self.inner.window.lock())
            .field("core", &self.inner.core)
            .finish_non_exhaustive()
    }
}
