use std::sync::Arc;

use async_trait::async_trait;

use crate::{DataListPageResult, FetchError};

/// Page size used by [`FnPageFetcher`] unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// The host side of a [`crate::PagedDataListSource`].
///
/// Each call may report any subset of count, page size and page contents; the paged source
/// merges whatever comes back. Page numbers are one-based.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync + 'static {
    async fn fetch_count(&self) -> Result<DataListPageResult<T>, FetchError>;

    async fn fetch_page_size(&self) -> Result<DataListPageResult<T>, FetchError>;

    async fn fetch_page(&self, page_number: usize) -> Result<DataListPageResult<T>, FetchError>;
}

/// The host side of a [`crate::SimpleDataListSource`]: fetches the whole list at once.
#[async_trait]
pub trait ItemsFetcher<T>: Send + Sync + 'static {
    async fn fetch_items(&self) -> Result<Vec<T>, FetchError>;
}

#[async_trait]
impl<T, F> ItemsFetcher<T> for F
where
    T: Send + 'static,
    F: Fn() -> Result<Vec<T>, FetchError> + Send + Sync + 'static,
{
    async fn fetch_items(&self) -> Result<Vec<T>, FetchError> {
        self()
    }
}

pub type RequestFn<T> = Arc<dyn Fn(usize, usize) -> Result<Vec<T>, FetchError> + Send + Sync>;
pub type CountFn = Arc<dyn Fn() -> Result<usize, FetchError> + Send + Sync>;

/// A [`PageFetcher`] assembled from plain closures.
///
/// `request(page_number, page_size)` returns the items of a one-based page; `count()` returns
/// the total number of items. The page size is fixed (default [`DEFAULT_PAGE_SIZE`]).
pub struct FnPageFetcher<T> {
    request: RequestFn<T>,
    count: CountFn,
    page_size: usize,
}

impl<T> Clone for FnPageFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            count: Arc::clone(&self.count),
            page_size: self.page_size,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> FnPageFetcher<T> {
    pub fn new(
        request: impl Fn(usize, usize) -> Result<Vec<T>, FetchError> + Send + Sync + 'static,
        count: impl Fn() -> Result<usize, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            request: Arc::new(request),
            count: Arc::new(count),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Serves pages out of an in-memory list.
    pub fn from_items(items: impl Into<Arc<[T]>>) -> Self {
        let items: Arc<[T]> = items.into();
        let len = items.len();
        Self::new(
            move |page_number, page_size| {
                let start = page_number.saturating_sub(1).saturating_mul(page_size);
                let end = start.saturating_add(page_size).min(items.len());
                Ok(items.get(start..end).map(<[T]>::to_vec).unwrap_or_default())
            },
            move || Ok(len),
        )
    }

    /// Sets the page size. Zero is ignored.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> PageFetcher<T> for FnPageFetcher<T> {
    async fn fetch_count(&self) -> Result<DataListPageResult<T>, FetchError> {
        Ok(DataListPageResult::count((self.count)()?))
    }

    async fn fetch_page_size(&self) -> Result<DataListPageResult<T>, FetchError> {
        Ok(DataListPageResult::page_size(self.page_size))
    }

    async fn fetch_page(&self, page_number: usize) -> Result<DataListPageResult<T>, FetchError> {
        let page = (self.request)(page_number, self.page_size)?;
        Ok(DataListPageResult::page_size(self.page_size).with_page(page_number, page))
    }
}

impl<T> core::fmt::Debug for FnPageFetcher<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnPageFetcher")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
