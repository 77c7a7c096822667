use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpdateAction {
    Add,
    Remove,
    Reset,
}

/// A change to the logical item sequence of a data list source.
///
/// `Add` and `Remove` always carry a non-zero `count`; `Reset` carries neither index nor count
/// (both read as zero).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataListUpdate {
    action: UpdateAction,
    index: usize,
    count: usize,
}

impl DataListUpdate {
    pub fn reset() -> Self {
        Self {
            action: UpdateAction::Reset,
            index: 0,
            count: 0,
        }
    }

    pub fn add(index: usize, count: usize) -> Result<Self> {
        Self::ranged(UpdateAction::Add, index, count)
    }

    pub fn remove(index: usize, count: usize) -> Result<Self> {
        Self::ranged(UpdateAction::Remove, index, count)
    }

    fn ranged(action: UpdateAction, index: usize, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::ArgumentOutOfRange {
                name: "count",
                reason: "must be greater than zero",
            });
        }
        Ok(Self {
            action,
            index,
            count,
        })
    }

    /// Internal constructor for updates whose `count` was already checked by the caller.
    pub(crate) fn added(index: usize, count: usize) -> Self {
        debug_assert!(count > 0, "DataListUpdate::added with zero count");
        Self {
            action: UpdateAction::Add,
            index,
            count,
        }
    }

    pub(crate) fn removed(index: usize, count: usize) -> Self {
        debug_assert!(count > 0, "DataListUpdate::removed with zero count");
        Self {
            action: UpdateAction::Remove,
            index,
            count,
        }
    }

    pub fn action(&self) -> UpdateAction {
        self.action
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_reset(&self) -> bool {
        self.action == UpdateAction::Reset
    }
}
