use std::sync::Arc;

/// An opaque failure reported by a host fetch callback.
pub type FetchError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised by data lists and sources.
///
/// Validation errors (`IndexOutOfRange`, `ArgumentOutOfRange`, `InvalidOperation`) are returned
/// synchronously. `Fetch` carries the host's failure; it is reference-counted so a single failed
/// fetch can be handed to every caller that was waiting on it.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    #[error("index {index} is outside the bounds of the list (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("argument `{name}` is out of range: {reason}")]
    ArgumentOutOfRange {
        name: &'static str,
        reason: &'static str,
    },

    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// A fetch completed but did not report the requested piece of information.
    #[error("the data source did not report the {0}")]
    Unresolved(&'static str),

    #[error("fetch failed: {0}")]
    Fetch(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    pub(crate) fn index(index: usize, count: usize) -> Self {
        Self::IndexOutOfRange { index, count }
    }

    pub(crate) fn fetch(err: FetchError) -> Self {
        Self::Fetch(Arc::from(err))
    }

    pub fn is_index_out_of_range(&self) -> bool {
        matches!(self, Self::IndexOutOfRange { .. })
    }
}
