use crate::*;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use datalist::{DataListSource, DataListUpdate, Error, Subscription, UpdateHub, UpdateListener};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::Shared;
use futures::task::SpawnExt;
use parking_lot::Mutex;

type Gate = Mutex<Option<Shared<oneshot::Receiver<()>>>>;

async fn pass(gate: &Gate) {
    let gate = gate.lock().clone();
    if let Some(gate) = gate {
        let _ = gate.await;
    }
}

fn close(gate: &Gate) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    *gate.lock() = Some(rx.shared());
    tx
}

/// An in-memory source whose count and item reads can be held back.
struct GatedSource {
    items: Vec<u32>,
    hub: UpdateHub,
    count_gate: Gate,
    item_gate: Gate,
    fail_items: AtomicBool,
    item_calls: AtomicUsize,
}

impl GatedSource {
    fn new(len: u32) -> Self {
        Self {
            items: (0..len).collect(),
            hub: UpdateHub::new(),
            count_gate: Mutex::new(None),
            item_gate: Mutex::new(None),
            fail_items: AtomicBool::new(false),
            item_calls: AtomicUsize::new(0),
        }
    }

    fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataListSource<u32> for GatedSource {
    async fn count(&self) -> datalist::Result<usize> {
        pass(&self.count_gate).await;
        Ok(self.items.len())
    }

    async fn item(&self, index: usize) -> datalist::Result<u32> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        pass(&self.item_gate).await;
        if self.fail_items.load(Ordering::SeqCst) {
            return Err(Error::Fetch(Arc::new(std::io::Error::other("offline"))));
        }
        self.items.get(index).copied().ok_or(Error::IndexOutOfRange {
            index,
            count: self.items.len(),
        })
    }

    fn index_of(&self, item: &u32) -> Option<usize> {
        self.items.iter().position(|x| x == item)
    }

    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> Subscription {
        self.hub.subscribe(listener)
    }
}

fn logged(options: VectorOptions) -> (Arc<Mutex<Vec<VectorEvent>>>, VectorOptions) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, options.with_on_event(move |event| sink.lock().push(*event)))
}

fn add(index: usize, count: usize) -> DataListUpdate {
    DataListUpdate::add(index, count).unwrap()
}

fn remove(index: usize, count: usize) -> DataListUpdate {
    DataListUpdate::remove(index, count).unwrap()
}

fn changed(property: Property) -> VectorEvent {
    VectorEvent::PropertyChanged(property)
}

#[test]
fn task_queue_runs_spawned_work_when_drained() {
    let queue = TaskQueue::new();
    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    queue
        .spawner()
        .spawn(async move { flag.store(true, Ordering::SeqCst) })
        .unwrap();
    assert_eq!(queue.len(), 1);
    assert!(!done.load(Ordering::SeqCst));

    assert_eq!(queue.run_until_stalled(), 1);
    assert!(done.load(Ordering::SeqCst));
    assert!(queue.is_empty());
}

#[test]
fn task_queue_keeps_blocked_tasks_until_woken() {
    let queue = TaskQueue::new();
    let (tx, rx) = oneshot::channel::<()>();
    queue
        .spawn(async move {
            let _ = rx.await;
        })
        .unwrap();

    assert_eq!(queue.run_until_stalled(), 0);
    assert_eq!(queue.len(), 1);

    tx.send(()).unwrap();
    assert_eq!(queue.run_until_stalled(), 1);
    assert!(queue.is_empty());
}

#[test]
fn task_queue_len_is_readable_from_running_tasks() {
    let queue = TaskQueue::new();
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let (inner, sink) = (queue.clone(), Arc::clone(&seen));
    queue
        .spawn(async move { sink.store(inner.len(), Ordering::SeqCst) })
        .unwrap();

    assert_eq!(queue.run_until_stalled(), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(queue.is_empty());
}

#[test]
fn vector_reads_resolved_items_synchronously() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let (log, options) = logged(VectorOptions::new());
    let vector = VirtualizingVector::with_options(Arc::clone(&source), queue.spawner(), options);

    assert_eq!(vector.count(), 5);
    assert_eq!(vector.get(2).unwrap(), Some(2));
    assert!(vector.get(5).unwrap_err().is_index_out_of_range());
    assert!(vector.contains(&4));
    assert_eq!(vector.index_of(&9), None);

    assert!(log.lock().is_empty());
    assert!(queue.is_empty());
}

#[test]
fn vector_replaces_placeholders_when_fetches_complete() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let release = close(&source.item_gate);

    let this: Arc<OnceLock<Weak<VirtualizingVector<u32, GatedSource>>>> =
        Arc::new(OnceLock::new());
    let reread = Arc::new(Mutex::new(Vec::new()));
    let options = {
        let this = Arc::clone(&this);
        let reread = Arc::clone(&reread);
        VectorOptions::new().with_on_event(move |event| {
            if let VectorEvent::ItemReplaced { index } = *event {
                if let Some(vector) = this.get().and_then(Weak::upgrade) {
                    reread.lock().push((index, vector.get(index).unwrap()));
                }
            }
        })
    };
    let vector = Arc::new(VirtualizingVector::with_options(
        Arc::clone(&source),
        queue.spawner(),
        options,
    ));
    this.set(Arc::downgrade(&vector)).unwrap();

    assert_eq!(vector.get(2).unwrap(), None);
    assert_eq!(vector.get(2).unwrap(), None);
    assert!(vector.is_fetching(2));
    assert_eq!(source.item_calls(), 1);
    assert_eq!(queue.len(), 1);

    release.send(()).unwrap();
    assert_eq!(queue.run_until_stalled(), 1);

    // Re-reading from inside the event sees the fetched value without another fetch.
    assert_eq!(*reread.lock(), vec![(2, Some(2))]);
    assert_eq!(source.item_calls(), 1);
    assert!(!vector.is_fetching(2));
}

#[test]
fn vector_resolves_count_in_the_background() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let release = close(&source.count_gate);
    let (log, options) = logged(VectorOptions::new());
    let vector = VirtualizingVector::with_options(Arc::clone(&source), queue.spawner(), options);

    assert_eq!(vector.count(), 0);
    assert!(vector.is_loading());
    assert_eq!(*log.lock(), vec![changed(Property::IsLoading)]);

    // Changes are ignored until the count arrives.
    source.hub.post(add(0, 1));
    source.hub.post(DataListUpdate::reset());
    assert_eq!(log.lock().len(), 1);

    release.send(()).unwrap();
    queue.run_until_stalled();

    assert!(!vector.is_loading());
    assert_eq!(vector.count(), 5);
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::IsLoading),
            changed(Property::IsLoading),
            changed(Property::Count),
            VectorEvent::Reset,
        ]
    );
}

#[test]
fn vector_forwards_source_changes_and_moves_in_flight_reads() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let (log, options) = logged(VectorOptions::new());
    let vector = VirtualizingVector::with_options(Arc::clone(&source), queue.spawner(), options);
    assert_eq!(vector.count(), 5);

    let _release = close(&source.item_gate);
    assert_eq!(vector.get(3).unwrap(), None);

    source.hub.post(add(1, 2));
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsAdded { index: 1, count: 2 },
            VectorEvent::ItemReplaced { index: 5 },
        ]
    );
    assert_eq!(vector.count(), 7);
    log.lock().clear();

    source.hub.post(remove(0, 1));
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsRemoved { index: 0, count: 1 },
            VectorEvent::ItemReplaced { index: 4 },
        ]
    );
    assert_eq!(vector.count(), 6);
    assert!(vector.is_fetching(4));
    assert!(!vector.is_fetching(3));
    log.lock().clear();

    source.hub.post(DataListUpdate::reset());
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::Reset
        ]
    );
    assert!(!vector.is_fetching(4));
    // The count is requested again after a reset.
    assert_eq!(vector.count(), 5);
}

#[test]
fn vector_announces_a_finished_fetch_where_its_item_moved() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let release = close(&source.item_gate);

    let this: Arc<OnceLock<Weak<VirtualizingVector<u32, GatedSource>>>> =
        Arc::new(OnceLock::new());
    let reread = Arc::new(Mutex::new(Vec::new()));
    let options = {
        let this = Arc::clone(&this);
        let reread = Arc::clone(&reread);
        VectorOptions::new().with_on_event(move |event| {
            if let VectorEvent::ItemReplaced { index } = *event {
                if let Some(vector) = this.get().and_then(Weak::upgrade) {
                    reread.lock().push((index, vector.get(index).unwrap()));
                }
            }
        })
    };
    let vector = Arc::new(VirtualizingVector::with_options(
        Arc::clone(&source),
        queue.spawner(),
        options,
    ));
    this.set(Arc::downgrade(&vector)).unwrap();
    assert_eq!(vector.count(), 5);

    assert_eq!(vector.get(3).unwrap(), None);
    source.hub.post(add(1, 2));
    assert!(vector.is_fetching(5));
    assert!(!vector.is_fetching(3));

    release.send(()).unwrap();
    assert_eq!(queue.run_until_stalled(), 1);

    // The item fetched for old index 3 is only ever served at its new index.
    assert_eq!(*reread.lock(), vec![(5, None), (5, Some(3))]);
    assert_eq!(source.item_calls(), 1);
}

#[test]
fn vector_drops_fetches_for_removed_items_and_after_reset() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let release = close(&source.item_gate);
    let (log, options) = logged(VectorOptions::new());
    let vector = VirtualizingVector::with_options(Arc::clone(&source), queue.spawner(), options);
    assert_eq!(vector.count(), 5);

    assert_eq!(vector.get(1).unwrap(), None);
    assert_eq!(vector.get(3).unwrap(), None);
    source.hub.post(remove(1, 1));
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsRemoved { index: 1, count: 1 },
            VectorEvent::ItemReplaced { index: 2 },
        ]
    );
    assert!(!vector.is_fetching(1));
    assert!(vector.is_fetching(2));

    source.hub.post(DataListUpdate::reset());
    assert!(!vector.is_fetching(2));
    log.lock().clear();

    release.send(()).unwrap();
    assert_eq!(queue.run_until_stalled(), 2);
    assert!(log.lock().is_empty());
}

#[test]
fn vector_failed_fetch_can_be_retried() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let release = close(&source.item_gate);
    source.fail_items.store(true, Ordering::SeqCst);
    let (log, options) = logged(VectorOptions::new());
    let vector = VirtualizingVector::with_options(Arc::clone(&source), queue.spawner(), options);

    assert_eq!(vector.get(1).unwrap(), None);
    release.send(()).unwrap();
    queue.run_until_stalled();

    assert!(log.lock().is_empty());
    assert!(!vector.is_fetching(1));

    source.fail_items.store(false, Ordering::SeqCst);
    assert_eq!(vector.get(1).unwrap(), Some(1));
    assert_eq!(source.item_calls(), 2);
}

#[test]
fn vector_unsubscribes_when_dropped() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(3));
    let vector = VirtualizingVector::new(Arc::clone(&source), queue.spawner());
    assert_eq!(source.hub.len(), 1);

    assert_eq!(block_on(vector.to_vec()).unwrap(), vec![0, 1, 2]);

    drop(vector);
    assert!(source.hub.is_empty());
}

#[test]
fn incremental_list_loads_until_the_source_is_exhausted() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(8));
    let (log, options) = logged(VectorOptions::new());
    let list = IncrementalLoadingList::with_options(Arc::clone(&source), queue.spawner(), options);
    assert!(list.has_more_items());

    let first = block_on(list.load_more_items(5)).unwrap();
    assert_eq!(first.count, 5);
    assert!(list.has_more_items());
    assert_eq!(list.count(), 5);
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::IsLoading),
            changed(Property::IsLoading),
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsAdded { index: 0, count: 5 },
        ]
    );
    log.lock().clear();

    // Only three items remain.
    let second = block_on(list.load_more_items(5)).unwrap();
    assert_eq!(second, LoadMoreItemsResult { count: 3 });
    assert!(!list.has_more_items());
    assert_eq!(list.count(), 8);
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::IsLoading),
            changed(Property::IsLoading),
            changed(Property::HasMoreItems),
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsAdded { index: 5, count: 3 },
        ]
    );

    assert_eq!(block_on(list.load_more_items(5)).unwrap().count, 0);
    assert_eq!(source.item_calls(), 8);
}

#[test]
fn incremental_list_honours_the_minimum_paging_size() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(20));
    let (log, options) = logged(VectorOptions::new().with_minimum_paging_size(4));
    let list = IncrementalLoadingList::with_options(Arc::clone(&source), queue.spawner(), options);
    assert_eq!(list.minimum_paging_size(), 4);

    assert_eq!(block_on(list.load_more_items(1)).unwrap().count, 4);
    log.lock().clear();

    list.set_minimum_paging_size(6);
    list.set_minimum_paging_size(6);
    assert_eq!(*log.lock(), vec![changed(Property::MinimumPagingSize)]);
    assert_eq!(block_on(list.load_more_items(0)).unwrap().count, 6);
}

#[test]
fn incremental_list_only_exposes_loaded_items() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(8));
    let list = IncrementalLoadingList::new(Arc::clone(&source), queue.spawner());

    assert!(list.get(0).unwrap_err().is_index_out_of_range());
    block_on(list.load_more_items(3)).unwrap();

    assert_eq!(list.get(0).unwrap(), Some(0));
    assert!(list.get(3).unwrap_err().is_index_out_of_range());
    assert_eq!(list.index_of(&2), Some(2));
    assert!(!list.contains(&5));
    assert_eq!(block_on(list.to_vec()).unwrap(), vec![0, 1, 2]);
}

#[test]
fn incremental_list_reports_failed_loads() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(8));
    source.fail_items.store(true, Ordering::SeqCst);
    let list = IncrementalLoadingList::new(Arc::clone(&source), queue.spawner());

    assert!(matches!(
        block_on(list.load_more_items(2)),
        Err(Error::Fetch(_))
    ));
    assert!(!list.is_loading());
    assert_eq!(list.count(), 0);
    assert!(list.has_more_items());
}

#[test]
fn incremental_list_applies_source_changes_during_a_load() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let (log, options) = logged(VectorOptions::new());
    let list = IncrementalLoadingList::with_options(Arc::clone(&source), queue.spawner(), options);
    assert_eq!(list.count(), 0);

    let release = close(&source.item_gate);
    let mut load = Box::pin(list.load_more_items(3));
    assert!((&mut load).now_or_never().is_none());
    assert!(list.is_loading());

    source.hub.post(add(0, 1));
    assert_eq!(list.count(), 1);

    release.send(()).unwrap();
    assert_eq!(block_on(load).unwrap().count, 3);
    assert_eq!(list.count(), 4);
    assert_eq!(list.get(3).unwrap(), Some(3));
    assert!(list.has_more_items());
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::IsLoading),
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsAdded { index: 0, count: 1 },
            changed(Property::IsLoading),
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsAdded { index: 1, count: 3 },
        ]
    );
}

#[test]
fn incremental_list_reveals_nothing_when_reset_during_a_load() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(5));
    let list = IncrementalLoadingList::new(Arc::clone(&source), queue.spawner());

    let release = close(&source.item_gate);
    let mut load = Box::pin(list.load_more_items(3));
    assert!((&mut load).now_or_never().is_none());

    source.hub.post(DataListUpdate::reset());
    release.send(()).unwrap();
    assert_eq!(block_on(load).unwrap().count, 0);
    assert!(!list.is_loading());
    assert_eq!(list.count(), 0);
    assert!(list.has_more_items());
}

#[test]
fn incremental_list_tracks_source_changes() {
    let queue = TaskQueue::new();
    let source = Arc::new(GatedSource::new(8));
    let (log, options) = logged(VectorOptions::new());
    let list = IncrementalLoadingList::with_options(Arc::clone(&source), queue.spawner(), options);
    block_on(list.load_more_items(5)).unwrap();
    log.lock().clear();

    source.hub.post(add(2, 1));
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsAdded { index: 2, count: 1 },
        ]
    );
    assert_eq!(list.count(), 6);
    log.lock().clear();

    // Past the visible range: only the source count moves.
    source.hub.post(add(7, 1));
    assert!(log.lock().is_empty());

    // Overlaps the boundary: only the visible part is removed.
    source.hub.post(remove(4, 3));
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::ItemsRemoved { index: 4, count: 2 },
        ]
    );
    assert_eq!(list.count(), 4);
    assert!(list.has_more_items());
    log.lock().clear();

    source.hub.post(DataListUpdate::reset());
    assert_eq!(
        *log.lock(),
        vec![
            changed(Property::Count),
            changed(Property::Items),
            VectorEvent::Reset,
            changed(Property::HasMoreItems),
        ]
    );
    assert_eq!(list.count(), 0);
    assert!(list.has_more_items());
}
