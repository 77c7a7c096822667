/// One response from a host page fetch.
///
/// Every field is independently optional: a response may report only the total item count, only
/// the page size, a page of items, or any combination. Consumers merge partial results across
/// fetches.
///
/// `page_number` is one-based: page `p` holds the items starting at `items_per_page * (p - 1)`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataListPageResult<T> {
    pub total_item_count: Option<usize>,
    pub items_per_page: Option<usize>,
    pub page_number: Option<usize>,
    pub page: Vec<T>,
}

impl<T> Default for DataListPageResult<T> {
    fn default() -> Self {
        Self {
            total_item_count: None,
            items_per_page: None,
            page_number: None,
            page: Vec::new(),
        }
    }
}

impl<T> DataListPageResult<T> {
    pub fn new(
        total_item_count: Option<usize>,
        items_per_page: Option<usize>,
        page_number: Option<usize>,
        page: Vec<T>,
    ) -> Self {
        Self {
            total_item_count,
            items_per_page,
            page_number,
            page,
        }
    }

    /// A result reporting only the total item count.
    pub fn count(total_item_count: usize) -> Self {
        Self::default().with_count(total_item_count)
    }

    /// A result reporting only the page size.
    pub fn page_size(items_per_page: usize) -> Self {
        Self::default().with_page_size(items_per_page)
    }

    pub fn with_count(mut self, total_item_count: usize) -> Self {
        self.total_item_count = Some(total_item_count);
        self
    }

    pub fn with_page_size(mut self, items_per_page: usize) -> Self {
        self.items_per_page = Some(items_per_page);
        self
    }

    pub fn with_page(mut self, page_number: usize, page: Vec<T>) -> Self {
        self.page_number = Some(page_number);
        self.page = page;
        self
    }

    /// Returns the item at absolute `index` if this result carries the page containing it.
    pub(crate) fn item_at(&self, index: usize, page_size: usize) -> Option<&T> {
        let page_number = self.page_number?;
        let start = page_size.checked_mul(page_number.checked_sub(1)?)?;
        let offset = index.checked_sub(start)?;
        self.page.get(offset)
    }
}
