use std::sync::Arc;

use futures::task::Spawn;

use crate::VectorEvent;

/// A callback fired for every change notification.
///
/// It runs synchronously on whichever thread caused the change and may read the collection back
/// (that is the point of `ItemReplaced`).
pub type EventCallback = Arc<dyn Fn(&VectorEvent) + Send + Sync>;

/// Where background fetches run.
///
/// Any `futures` executor works; [`crate::TaskQueue`] is a minimal one that the UI loop drains.
pub type Spawner = Arc<dyn Spawn + Send + Sync>;

/// Configuration for [`crate::VirtualizingVector`] and [`crate::IncrementalLoadingList`].
#[derive(Clone, Default)]
pub struct VectorOptions {
    pub on_event: Option<EventCallback>,
    /// Lower bound on how many items one `load_more_items` call fetches. Only used by
    /// [`crate::IncrementalLoadingList`].
    pub minimum_paging_size: usize,
}

impl VectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_event(mut self, f: impl Fn(&VectorEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }

    pub fn with_minimum_paging_size(mut self, minimum_paging_size: usize) -> Self {
        self.minimum_paging_size = minimum_paging_size;
        self
    }
}

impl core::fmt::Debug for VectorOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VectorOptions")
            .field("on_event", &self.on_event.is_some())
            .field("minimum_paging_size", &self.minimum_paging_size)
            .finish()
    }
}
