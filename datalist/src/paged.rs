use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::{
    DataItem, DataListPageResult, DataListSource, DataListUpdate, Error, PageFetcher,
    PageVirtualizingList, Result, Subscription, UpdateHub, UpdateListener,
};

/// A fetch shared by every caller waiting on the same resource.
///
/// The error is cloneable (it wraps the host failure in an `Arc`), which `Shared` requires.
type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<DataListPageResult<T>>>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resource {
    Count,
    PageSize,
    /// One-based page number.
    Page(usize),
}

/// Configuration for [`PagedDataListSource`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PagedSourceOptions {
    /// Maximum number of resident pages. `None` keeps every fetched page.
    pub page_cache_size: Option<NonZeroUsize>,
}

impl PagedSourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_cache_size(mut self, pages: Option<NonZeroUsize>) -> Self {
        self.page_cache_size = pages;
        self
    }
}

struct PagedState<T> {
    /// Bumped by `refresh`; fetches started in an older epoch do not touch the cache.
    epoch: u64,
    count: Option<usize>,
    page_size: Option<usize>,
    items: PageVirtualizingList<T>,
    fetching_count: Option<SharedFetch<T>>,
    fetching_page_size: Option<SharedFetch<T>>,
    fetching_pages: HashMap<usize, SharedFetch<T>>,
}

impl<T: Clone> PagedState<T> {
    fn apply(&mut self, result: &DataListPageResult<T>) {
        if let Some(count) = result.total_item_count {
            if self.count.is_some_and(|known| known != count) {
                ddebug!(
                    old = ?self.count,
                    new = count,
                    "PagedDataListSource: item count changed"
                );
            }
            self.count = Some(count);
        }

        match result.items_per_page {
            Some(0) => {
                dwarn!("PagedDataListSource: ignoring a reported page size of zero");
            }
            Some(page_size) => self.page_size = Some(page_size),
            None => {}
        }

        if let (Some(count), Some(page_size)) = (self.count, self.page_size) {
            if let Err(_err) = self.items.update_count(count, page_size) {
                dwarn!(error = %_err, "PagedDataListSource: failed to resize the page cache");
            }
        }

        let Some(page_number) = result.page_number else {
            return;
        };
        let start = self.page_size.and_then(|page_size| {
            page_size.checked_mul(page_number.checked_sub(1)?)
        });
        let Some(start) = start else {
            dwarn!(
                page_number,
                "PagedDataListSource: dropping a page that cannot be placed"
            );
            return;
        };
        for (i, item) in result.page.iter().enumerate() {
            let stored = start
                .checked_add(i)
                .is_some_and(|index| self.items.set(index, item.clone()).is_ok());
            if !stored {
                dwarn!(
                    page_number,
                    offset = i,
                    count = self.items.count(),
                    "PagedDataListSource: page extends past the item count"
                );
                break;
            }
        }
        dtrace!(page_number, len = result.page.len(), "PagedDataListSource: page cached");
    }

    fn reset(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.count = None;
        self.page_size = None;
        self.items.clear();
        self.fetching_count = None;
        self.fetching_page_size = None;
        self.fetching_pages.clear();
    }
}

/// A data list source that fetches items a page at a time and caches the pages.
///
/// Count, page size and each page are fetched lazily and at most once at a time: concurrent
/// callers asking for the same resource await one shared fetch and see the same result. A
/// completed page fetch frees its slot so the page can be fetched again after eviction. A failed
/// fetch stays in its slot and keeps failing until [`PagedDataListSource::refresh`].
pub struct PagedDataListSource<T, F> {
    fetcher: Arc<F>,
    state: Arc<Mutex<PagedState<T>>>,
    hub: UpdateHub,
}

impl<T: DataItem, F: PageFetcher<T>> PagedDataListSource<T, F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_options(fetcher, PagedSourceOptions::default())
    }

    pub fn with_options(fetcher: F, options: PagedSourceOptions) -> Self {
        let mut items = PageVirtualizingList::new();
        if let Some(pages) = options.page_cache_size {
            items.limit_pages(pages);
        }
        Self {
            fetcher: Arc::new(fetcher),
            state: Arc::new(Mutex::new(PagedState {
                epoch: 0,
                count: None,
                page_size: None,
                items,
                fetching_count: None,
                fetching_page_size: None,
                fetching_pages: HashMap::new(),
            })),
            hub: UpdateHub::new(),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn page_cache_size(&self) -> Option<usize> {
        self.state.lock().items.page_cache_size()
    }

    pub fn set_page_cache_size(&self, pages: usize) -> Result<()> {
        self.state.lock().items.set_page_cache_size(pages)
    }

    /// The item count if it has already been fetched.
    pub fn cached_count(&self) -> Option<usize> {
        self.state.lock().count
    }

    /// Whether the page holding `index` is currently in the cache.
    pub fn is_cached(&self, index: usize) -> bool {
        matches!(self.state.lock().items.peek(index), Ok(Some(_)))
    }

    /// Items per page, fetching the page size if it is not known yet.
    pub async fn page_size(&self) -> Result<usize> {
        let fetch = {
            let mut st = self.state.lock();
            if let Some(page_size) = st.page_size {
                return Ok(page_size);
            }
            self.fetch(&mut st, Resource::PageSize)
        };
        let result = fetch.await?;
        match result.items_per_page {
            Some(page_size) if page_size > 0 => Ok(page_size),
            _ => self.state.lock().page_size.ok_or(Error::Unresolved("page size")),
        }
    }

    /// Drops every cached value and pending fetch, then notifies subscribers with a reset.
    ///
    /// Fetches already in flight still complete for their callers, but their results are not
    /// written into the cache.
    pub fn refresh(&self) {
        self.state.lock().reset();
        ddebug!("PagedDataListSource::refresh");
        self.hub.post(DataListUpdate::reset());
    }

    fn fetch(&self, st: &mut PagedState<T>, resource: Resource) -> SharedFetch<T> {
        let pending = match resource {
            Resource::Count => st.fetching_count.clone(),
            Resource::PageSize => st.fetching_page_size.clone(),
            Resource::Page(page_number) => st.fetching_pages.get(&page_number).cloned(),
        };
        if let Some(pending) = pending {
            return pending;
        }

        dtrace!(?resource, epoch = st.epoch, "PagedDataListSource: starting fetch");
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let epoch = st.epoch;
        let fetch = async move {
            let result = match resource {
                Resource::Count => fetcher.fetch_count().await,
                Resource::PageSize => fetcher.fetch_page_size().await,
                Resource::Page(page_number) => fetcher.fetch_page(page_number).await,
            };
            let result = match result {
                Ok(result) => Arc::new(result),
                Err(err) => {
                    dwarn!(?resource, error = %err, "PagedDataListSource: fetch failed");
                    return Err(Error::fetch(err));
                }
            };

            let mut st = state.lock();
            if st.epoch != epoch {
                ddebug!(
                    ?resource,
                    epoch,
                    current = st.epoch,
                    "PagedDataListSource: discarding a result from before refresh"
                );
                return Ok(result);
            }
            st.apply(&result);
            if let Resource::Page(page_number) = resource {
                st.fetching_pages.remove(&page_number);
            }
            Ok(result)
        }
        .boxed()
        .shared();

        match resource {
            Resource::Count => st.fetching_count = Some(fetch.clone()),
            Resource::PageSize => st.fetching_page_size = Some(fetch.clone()),
            Resource::Page(page_number) => {
                st.fetching_pages.insert(page_number, fetch.clone());
            }
        }
        fetch
    }
}

#[async_trait]
impl<T: DataItem, F: PageFetcher<T>> DataListSource<T> for PagedDataListSource<T, F> {
    async fn count(&self) -> Result<usize> {
        let fetch = {
            let mut st = self.state.lock();
            if let Some(count) = st.count {
                return Ok(count);
            }
            self.fetch(&mut st, Resource::Count)
        };
        let result = fetch.await?;
        match result.total_item_count {
            Some(count) => Ok(count),
            None => self.state.lock().count.ok_or(Error::Unresolved("item count")),
        }
    }

    async fn item(&self, index: usize) -> Result<T> {
        let count = self.count().await?;
        if index >= count {
            return Err(Error::index(index, count));
        }
        let page_size = self.page_size().await?;

        let fetch = {
            let mut st = self.state.lock();
            if let Ok(Some(item)) = st.items.get(index) {
                return Ok(item.clone());
            }
            self.fetch(&mut st, Resource::Page(index / page_size + 1))
        };
        let result = fetch.await?;

        let page_size = result.items_per_page.unwrap_or(page_size);
        if let Some(item) = result.item_at(index, page_size) {
            return Ok(item.clone());
        }
        match self.state.lock().items.get(index) {
            Ok(Some(item)) => Ok(item.clone()),
            _ => Err(Error::Unresolved("requested item")),
        }
    }

    fn index_of(&self, item: &T) -> Option<usize> {
        self.state.lock().items.index_of(item)
    }

    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> Subscription {
        self.hub.subscribe(listener)
    }
}

impl<T, F> core::fmt::Debug for PagedDataListSource<T, F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("PagedDataListSource")
            .field("epoch", &st.epoch)
            .field("count", &st.count)
            .field("page_size", &st.page_size)
            .field("items", &st.items)
            .field("pending_pages", &st.fetching_pages.len())
            .finish_non_exhaustive()
    }
}
