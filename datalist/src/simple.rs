use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::{
    DataItem, DataListSource, DataListUpdate, Error, ItemsFetcher, Result, Subscription,
    UpdateHub, UpdateListener,
};

type SharedItems<T> = Shared<BoxFuture<'static, Result<Arc<Vec<T>>>>>;

struct SimpleState<T> {
    epoch: u64,
    items: Option<Arc<Vec<T>>>,
    fetching: Option<SharedItems<T>>,
}

/// A data list source that fetches the whole list in one call and serves it from memory.
pub struct SimpleDataListSource<T, F> {
    fetcher: Arc<F>,
    state: Arc<Mutex<SimpleState<T>>>,
    hub: UpdateHub,
}

impl<T: DataItem, F: ItemsFetcher<T>> SimpleDataListSource<T, F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            state: Arc::new(Mutex::new(SimpleState {
                epoch: 0,
                items: None,
                fetching: None,
            })),
            hub: UpdateHub::new(),
        }
    }

    pub fn refresh(&self) {
        {
            let mut st = self.state.lock();
            st.epoch = st.epoch.wrapping_add(1);
            st.items = None;
            st.fetching = None;
        }
        ddebug!("SimpleDataListSource::refresh");
        self.hub.post(DataListUpdate::reset());
    }

    async fn items(&self) -> Result<Arc<Vec<T>>> {
        let fetch = {
            let mut st = self.state.lock();
            if let Some(items) = &st.items {
                return Ok(Arc::clone(items));
            }
            if let Some(fetch) = st.fetching.clone() {
                fetch
            } else {
                let fetch = self.start_fetch(st.epoch);
                st.fetching = Some(fetch.clone());
                fetch
            }
        };
        fetch.await
    }

    fn start_fetch(&self, epoch: u64) -> SharedItems<T> {
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        async move {
            let items = Arc::new(fetcher.fetch_items().await.map_err(Error::fetch)?);
            let mut st = state.lock();
            if st.epoch == epoch {
                st.items = Some(Arc::clone(&items));
                st.fetching = None;
            }
            Ok(items)
        }
        .boxed()
        .shared()
    }
}

#[async_trait]
impl<T: DataItem, F: ItemsFetcher<T>> DataListSource<T> for SimpleDataListSource<T, F> {
    async fn count(&self) -> Result<usize> {
        Ok(self.items().await?.len())
    }

    async fn item(&self, index: usize) -> Result<T> {
        let items = self.items().await?;
        items
            .get(index)
            .cloned()
            .ok_or(Error::index(index, items.len()))
    }

    fn index_of(&self, item: &T) -> Option<usize> {
        let st = self.state.lock();
        st.items.as_ref()?.iter().position(|x| x == item)
    }

    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> Subscription {
        self.hub.subscribe(listener)
    }
}

impl<T, F> core::fmt::Debug for SimpleDataListSource<T, F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("SimpleDataListSource")
            .field("epoch", &st.epoch)
            .field("loaded", &st.items.as_ref().map(|items| items.len()))
            .field("fetching", &st.fetching.is_some())
            .finish_non_exhaustive()
    }
}
