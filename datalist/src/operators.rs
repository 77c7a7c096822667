//! Windowing operators over a [`DataListSource`].
//!
//! Both operators re-index reads and translate the source's change notifications into changes
//! of the window. They remember the source's last known item count to do so; that value is only
//! kept current while someone is subscribed, so a new subscriber should call `count()` first to
//! resync.

use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};

use crate::{
    DataItem, DataListSource, DataListUpdate, Error, Result, Subscription, UpdateAction,
    UpdateHub, UpdateListener,
};

/// Translates source updates into window updates.
///
/// Implementations call `emit` once per derived update, in the order subscribers must apply
/// them, and keep their last known source count current.
pub(crate) trait Window: Send + 'static {
    fn set_source_count(&mut self, count: usize);
    fn translate(&mut self, update: DataListUpdate, emit: &mut dyn FnMut(DataListUpdate));
}

struct OperatorInner<S: ?Sized, W> {
    window: Mutex<W>,
    hub: UpdateHub,
    upstream: Mutex<Option<Subscription>>,
    source: Arc<S>,
}

impl<S: ?Sized, W> OperatorInner<S, W> {
    fn release_upstream_if_idle(&self) {
        if !self.hub.is_empty() {
            return;
        }
        let upstream = self.upstream.lock().take();
        if upstream.is_some() {
            dtrace!("operator: last listener gone, unsubscribing from source");
        }
        drop(upstream);
    }
}

/// Subscription plumbing shared by the operators.
///
/// The operator subscribes to its source when it gains its first listener and drops that
/// subscription when its last listener unsubscribes. The upstream listener only holds a weak
/// reference back, so a dropped operator never stays alive through its source.
struct Operator<S: ?Sized, W> {
    inner: Arc<OperatorInner<S, W>>,
}

impl<S, W> Operator<S, W>
where
    S: ?Sized + Send + Sync + 'static,
    W: Window,
{
    fn new(source: Arc<S>, window: W) -> Self {
        Self {
            inner: Arc::new(OperatorInner {
                window: Mutex::new(window),
                hub: UpdateHub::new(),
                upstream: Mutex::new(None),
                source,
            }),
        }
    }

    fn source(&self) -> &Arc<S> {
        &self.inner.source
    }

    fn window(&self) -> MutexGuard<'_, W> {
        self.inner.window.lock()
    }

    fn subscribe<T>(&self, listener: Arc<dyn UpdateListener>) -> Subscription
    where
        S: DataListSource<T>,
    {
        let registration = self.inner.hub.subscribe(listener);
        {
            let mut upstream = self.inner.upstream.lock();
            if upstream.is_none() {
                let forwarder: Arc<dyn UpdateListener> = Arc::new(Forwarder {
                    inner: Arc::downgrade(&self.inner),
                });
                *upstream = Some(self.inner.source.subscribe(forwarder));
                dtrace!("operator: subscribed to source");
            }
        }

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            drop(registration);
            if let Some(inner) = inner.upgrade() {
                inner.release_upstream_if_idle();
            }
        })
    }

    fn listener_count(&self) -> usize {
        self.inner.hub.len()
    }

    fn is_subscribed_upstream(&self) -> bool {
        self.inner.upstream.lock().is_some()
    }
}

struct Forwarder<S: ?Sized, W> {
    inner: Weak<OperatorInner<S, W>>,
}

impl<S, W> UpdateListener for Forwarder<S, W>
where
    S: ?Sized + Send + Sync + 'static,
    W: Window,
{
    fn on_update(&self, update: DataListUpdate) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if inner.hub.is_empty() {
            inner.release_upstream_if_idle();
            return;
        }

        let mut derived = Vec::with_capacity(2);
        inner
            .window
            .lock()
            .translate(update, &mut |u| derived.push(u));
        for update in derived {
            inner.hub.post(update);
        }
    }
}

#[derive(Debug)]
struct SkipWindow {
    skip: usize,
    source_count: usize,
}

impl Window for SkipWindow {
    fn set_source_count(&mut self, count: usize) {
        self.source_count = count;
    }

    fn translate(&mut self, update: DataListUpdate, emit: &mut dyn FnMut(DataListUpdate)) {
        let n = self.skip;
        let before = self.source_count;
        match update.action() {
            UpdateAction::Add => {
                let after = before.saturating_add(update.count());
                let old = before.saturating_sub(n);
                let new = after.saturating_sub(n);
                if new != old {
                    emit(DataListUpdate::added(
                        update.index().saturating_sub(n),
                        new - old,
                    ));
                }
                self.source_count = after;
            }
            UpdateAction::Remove => {
                let after = before.saturating_sub(update.count());
                let old = before.saturating_sub(n);
                let new = after.saturating_sub(n);
                if new != old {
                    emit(DataListUpdate::removed(
                        update.index().saturating_sub(n),
                        old - new,
                    ));
                }
                self.source_count = after;
            }
            UpdateAction::Reset => emit(update),
        }
    }
}

#[derive(Debug)]
struct TakeWindow {
    take: usize,
    source_count: usize,
}

impl Window for TakeWindow {
    fn set_source_count(&mut self, count: usize) {
        self.source_count = count;
    }

    fn translate(&mut self, update: DataListUpdate, emit: &mut dyn FnMut(DataListUpdate)) {
        let n = self.take;
        let index = update.index();
        let count = update.count();
        match update.action() {
            UpdateAction::Add => {
                if index < n {
                    let added = count.min(n - index);
                    emit(DataListUpdate::added(index, added));

                    let visible = self.source_count.min(n);
                    let pushed_out = (visible + added).saturating_sub(n);
                    if pushed_out > 0 {
                        emit(DataListUpdate::removed(n, pushed_out));
                    }
                }
                self.source_count = self.source_count.saturating_add(count);
            }
            UpdateAction::Remove => {
                if index < n {
                    let removed = count.min(n - index);
                    emit(DataListUpdate::removed(index, removed));

                    let available = self
                        .source_count
                        .saturating_sub(index.saturating_add(count).max(n));
                    let pulled_in = removed.min(available);
                    if pulled_in > 0 {
                        emit(DataListUpdate::added(n - removed, pulled_in));
                    }
                }
                self.source_count = self.source_count.saturating_sub(count);
            }
            UpdateAction::Reset => emit(update),
        }
    }
}

/// Skips the first `n` items of a source.
pub struct Skip<T, S: ?Sized> {
    skip: usize,
    op: Operator<S, SkipWindow>,
    _item: PhantomData<fn() -> T>,
}

impl<T, S> Skip<T, S>
where
    T: DataItem,
    S: DataListSource<T> + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, count: usize) -> Self {
        Self {
            skip: count,
            op: Operator::new(
                source,
                SkipWindow {
                    skip: count,
                    source_count: 0,
                },
            ),
            _item: PhantomData,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skip
    }

    pub fn source(&self) -> &Arc<S> {
        self.op.source()
    }

    pub fn listener_count(&self) -> usize {
        self.op.listener_count()
    }

    pub fn is_subscribed_upstream(&self) -> bool {
        self.op.is_subscribed_upstream()
    }
}

#[async_trait]
impl<T, S> DataListSource<T> for Skip<T, S>
where
    T: DataItem,
    S: DataListSource<T> + ?Sized + 'static,
{
    async fn count(&self) -> Result<usize> {
        let source_count = self.op.source().count().await?;
        self.op.window().set_source_count(source_count);
        Ok(source_count.saturating_sub(self.skip))
    }

    async fn item(&self, index: usize) -> Result<T> {
        let source_index = index
            .checked_add(self.skip)
            .ok_or(Error::index(index, usize::MAX - self.skip))?;
        self.op.source().item(source_index).await
    }

    fn index_of(&self, item: &T) -> Option<usize> {
        self.op.source().index_of(item)?.checked_sub(self.skip)
    }

    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> Subscription {
        self.op.subscribe::<T>(listener)
    }
}

/// Keeps only the first `n` items of a source.
pub struct Take<T, S: ?Sized> {
    take: usize,
    op: Operator<S, TakeWindow>,
    _item: PhantomData<fn() -> T>,
}

impl<T, S> Take<T, S>
where
    T: DataItem,
    S: DataListSource<T> + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, count: usize) -> Self {
        Self {
            take: count,
            op: Operator::new(
                source,
                TakeWindow {
                    take: count,
                    source_count: 0,
                },
            ),
            _item: PhantomData,
        }
    }

    pub fn taken(&self) -> usize {
        self.take
    }

    pub fn source(&self) -> &Arc<S> {
        self.op.source()
    }

    pub fn listener_count(&self) -> usize {
        self.op.listener_count()
    }

    pub fn is_subscribed_upstream(&self) -> bool {
        self.op.is_subscribed_upstream()
    }
}

#[async_trait]
impl<T, S> DataListSource<T> for Take<T, S>
where
    T: DataItem,
    S: DataListSource<T> + ?Sized + 'static,
{
    async fn count(&self) -> Result<usize> {
        let source_count = self.op.source().count().await?;
        self.op.window().set_source_count(source_count);
        Ok(source_count.min(self.take))
    }

    async fn item(&self, index: usize) -> Result<T> {
        if index >= self.take {
            return Err(Error::index(index, self.take));
        }
        self.op.source().item(index).await
    }

    fn index_of(&self, item: &T) -> Option<usize> {
        self.op
            .source()
            .index_of(item)
            .filter(|&index| index < self.take)
    }

    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> Subscription {
        self.op.subscribe::<T>(listener)
    }
}

/// `skip` / `take` combinators for shared sources.
pub trait DataListSourceExt<T, S: ?Sized> {
    fn skip(self, count: usize) -> Arc<Skip<T, S>>;
    fn take(self, count: usize) -> Arc<Take<T, S>>;
}

impl<T, S> DataListSourceExt<T, S> for Arc<S>
where
    T: DataItem,
    S: DataListSource<T> + ?Sized + 'static,
{
    fn skip(self, count: usize) -> Arc<Skip<T, S>> {
        Arc::new(Skip::new(self, count))
    }

    fn take(self, count: usize) -> Arc<Take<T, S>> {
        Arc::new(Take::new(self, count))
    }
}

impl<T, S: ?Sized> core::fmt::Debug for Skip<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Skip")
            .field("skip", &self.skip)
            .field("listeners", &self.op.inner.hub.len())
            .finish_non_exhaustive()
    }
}

impl<T, S: ?Sized> core::fmt::Debug for Take<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Take")
            .field("take", &self.take)
            .field("listeners", &self.op.inner.hub.len())
            .finish_non_exhaustive()
    }
}
