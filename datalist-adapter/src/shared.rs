use std::collections::HashMap;
use std::sync::Arc;

use datalist::{DataItem, DataListUpdate, Error, Result, UpdateAction};
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::task::SpawnExt;
use parking_lot::Mutex;

use crate::{Property, Spawner, VectorEvent, VectorOptions};

/// How source changes are treated while `is_loading` is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WhileLoading {
    /// Drop them. The pending count resolution resyncs with a reset.
    Ignore,
    /// Apply them as usual.
    Apply,
}

struct CoreState<T> {
    count: usize,
    count_requested: bool,
    is_loading: bool,
    /// Bumped on reset; background work from an older generation is dropped.
    generation: u64,
    next_ticket: u64,
    /// Background item fetches, mapped to the index their item currently sits at.
    fetching: HashMap<u64, usize>,
    /// The item being announced by an `ItemReplaced` event, readable from inside the callback.
    current: Option<(usize, T)>,
}

/// The placeholder-and-notify machinery shared by the vector types.
///
/// Reads complete synchronously when the underlying future is already resolved. Otherwise the
/// read returns a placeholder, the future moves to the spawner, and its completion is announced
/// with `ItemReplaced`. Event callbacks always run with no lock held.
pub(crate) struct VectorCore<T> {
    state: Mutex<CoreState<T>>,
    spawner: Spawner,
    options: VectorOptions,
    while_loading: WhileLoading,
}

impl<T: DataItem> VectorCore<T> {
    pub(crate) fn new(
        spawner: Spawner,
        options: VectorOptions,
        while_loading: WhileLoading,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(CoreState {
                count: 0,
                count_requested: false,
                is_loading: false,
                generation: 0,
                next_ticket: 0,
                fetching: HashMap::new(),
                current: None,
            }),
            spawner,
            options,
            while_loading,
        })
    }

    pub(crate) fn options(&self) -> &VectorOptions {
        &self.options
    }

    pub(crate) fn emit(&self, event: VectorEvent) {
        if let Some(on_event) = &self.options.on_event {
            on_event(&event);
        }
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.state.lock().is_loading
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        let changed = {
            let mut st = self.state.lock();
            let changed = st.is_loading != loading;
            st.is_loading = loading;
            changed
        };
        if changed {
            self.emit(VectorEvent::PropertyChanged(Property::IsLoading));
        }
    }

    pub(crate) fn is_fetching(&self, index: usize) -> bool {
        self.state.lock().fetching.values().any(|&i| i == index)
    }

    /// The cached count. The first call starts resolving it through `fetch`.
    pub(crate) fn count<F>(self: &Arc<Self>, fetch: F) -> usize
    where
        F: FnOnce() -> BoxFuture<'static, Result<usize>>,
    {
        let generation = {
            let mut st = self.state.lock();
            if st.count_requested {
                return st.count;
            }
            st.count_requested = true;
            st.generation
        };

        let mut fut = fetch();
        match (&mut fut).now_or_never() {
            Some(Ok(count)) => {
                self.state.lock().count = count;
                count
            }
            Some(Err(_err)) => {
                dwarn!(error = %_err, "count resolution failed");
                self.state.lock().count
            }
            None => {
                self.set_loading(true);
                let core = Arc::downgrade(self);
                let task = async move {
                    let result = fut.await;
                    if let Some(core) = core.upgrade() {
                        core.finish_count(generation, result);
                    }
                };
                if let Err(_err) = self.spawner.spawn(task) {
                    dwarn!(error = %_err, "failed to spawn count resolution");
                    self.state.lock().count_requested = false;
                    self.set_loading(false);
                }
                self.state.lock().count
            }
        }
    }

    fn finish_count(&self, generation: u64, result: Result<usize>) {
        let changed = match result {
            Ok(count) => {
                let mut st = self.state.lock();
                if st.generation == generation {
                    let changed = st.count != count;
                    st.count = count;
                    changed
                } else {
                    ddebug!("dropping a count resolved before a reset");
                    false
                }
            }
            Err(_err) => {
                dwarn!(error = %_err, "count resolution failed");
                false
            }
        };
        self.set_loading(false);
        if changed {
            ddebug!("count resolved to a new value");
            self.emit(VectorEvent::PropertyChanged(Property::Count));
            self.emit(VectorEvent::Reset);
        }
    }

    /// The item at `index` if it can be produced without waiting, else `Ok(None)`.
    pub(crate) fn item<F>(self: &Arc<Self>, index: usize, fetch: F) -> Result<Option<T>>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T>>,
    {
        {
            let st = self.state.lock();
            if let Some((current, item)) = &st.current {
                if *current == index {
                    return Ok(Some(item.clone()));
                }
            }
            if st.fetching.values().any(|&i| i == index) {
                return Ok(None);
            }
        }

        let mut fut = fetch();
        if let Some(result) = (&mut fut).now_or_never() {
            return result.map(Some);
        }

        let ticket = {
            let mut st = self.state.lock();
            if st.fetching.values().any(|&i| i == index) {
                return Ok(None);
            }
            let ticket = st.next_ticket;
            st.next_ticket = st.next_ticket.wrapping_add(1);
            st.fetching.insert(ticket, index);
            ticket
        };
        dtrace!(index, ticket, "fetching item in the background");
        let core = Arc::downgrade(self);
        let task = async move {
            let result = fut.await;
            if let Some(core) = core.upgrade() {
                core.finish_item(ticket, result);
            }
        };
        if self.spawner.spawn(task).is_err() {
            self.state.lock().fetching.remove(&ticket);
            return Err(Error::InvalidOperation("the spawner has shut down"));
        }
        Ok(None)
    }

    /// Announces a finished fetch at the index its item has moved to since it started.
    fn finish_item(&self, ticket: u64, result: Result<T>) {
        let index = {
            let mut st = self.state.lock();
            let Some(index) = st.fetching.remove(&ticket) else {
                dtrace!(ticket, "dropping a fetch whose item was removed or reset");
                return;
            };
            match result {
                Ok(item) => st.current = Some((index, item)),
                Err(_err) => {
                    dwarn!(index, error = %_err, "background item fetch failed");
                    return;
                }
            }
            index
        };
        self.emit(VectorEvent::PropertyChanged(Property::Items));
        self.emit(VectorEvent::ItemReplaced { index });
        self.state.lock().current = None;
    }

    fn ignoring(&self, st: &CoreState<T>) -> bool {
        st.is_loading && self.while_loading == WhileLoading::Ignore
    }

    pub(crate) fn apply_update(&self, update: DataListUpdate) {
        match update.action() {
            UpdateAction::Add => self.items_added(update.index(), update.count()),
            UpdateAction::Remove => self.items_removed(update.index(), update.count()),
            UpdateAction::Reset => self.reset(),
        }
    }

    pub(crate) fn items_added(&self, index: usize, count: usize) {
        let moved = {
            let mut st = self.state.lock();
            if self.ignoring(&st) {
                dtrace!(index, count, "ignoring an add while loading");
                return;
            }
            st.count += count;
            for i in st.fetching.values_mut() {
                if *i >= index {
                    *i += count;
                }
            }
            in_flight_from(&st.fetching, index + count)
        };

        self.emit(VectorEvent::PropertyChanged(Property::Count));
        self.emit(VectorEvent::PropertyChanged(Property::Items));
        self.emit(VectorEvent::ItemsAdded { index, count });
        // Placeholders handed out past the insertion point have moved; have them read again.
        for i in moved {
            self.emit(VectorEvent::ItemReplaced { index: i });
        }
    }

    pub(crate) fn items_removed(&self, index: usize, count: usize) {
        let moved = {
            let mut st = self.state.lock();
            if self.ignoring(&st) {
                dtrace!(index, count, "ignoring a remove while loading");
                return;
            }
            st.count = st.count.saturating_sub(count);
            let end = index + count;
            st.fetching.retain(|_, i| *i < index || *i >= end);
            for i in st.fetching.values_mut() {
                if *i >= end {
                    *i -= count;
                }
            }
            in_flight_from(&st.fetching, index)
        };

        self.emit(VectorEvent::PropertyChanged(Property::Count));
        self.emit(VectorEvent::PropertyChanged(Property::Items));
        self.emit(VectorEvent::ItemsRemoved { index, count });
        for i in moved {
            self.emit(VectorEvent::ItemReplaced { index: i });
        }
    }

    pub(crate) fn reset(&self) {
        {
            let mut st = self.state.lock();
            if self.ignoring(&st) {
                dtrace!("ignoring a reset while loading");
                return;
            }
            st.count = 0;
            st.count_requested = false;
            st.generation = st.generation.wrapping_add(1);
            st.fetching.clear();
        }
        self.emit(VectorEvent::PropertyChanged(Property::Count));
        self.emit(VectorEvent::PropertyChanged(Property::Items));
        self.emit(VectorEvent::Reset);
    }
}

fn in_flight_from(fetching: &HashMap<u64, usize>, start: usize) -> Vec<usize> {
    let mut indexes: Vec<usize> = fetching.values().copied().filter(|&i| i >= start).collect();
    indexes.sort_unstable();
    indexes
}

impl<T> core::fmt::Debug for VectorCore<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("VectorCore")
            .field("count", &st.count)
            .field("is_loading", &st.is_loading)
            .field("generation", &st.generation)
            .field("fetching", &st.fetching.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
