/// A property whose value may have changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Property {
    Count,
    /// The indexer: any item may read differently now.
    Items,
    IsLoading,
    HasMoreItems,
    MinimumPagingSize,
}

/// A change notification raised by a [`crate::VirtualizingVector`] or
/// [`crate::IncrementalLoadingList`].
///
/// `ItemReplaced` means the value at `index` should be read again: either a placeholder has been
/// resolved, or an index that was being fetched now refers to a different position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VectorEvent {
    ItemsAdded { index: usize, count: usize },
    ItemsRemoved { index: usize, count: usize },
    ItemReplaced { index: usize },
    Reset,
    PropertyChanged(Property),
}

/// Outcome of [`crate::IncrementalLoadingList::load_more_items`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadMoreItemsResult {
    /// Number of items that became visible.
    pub count: usize,
}
