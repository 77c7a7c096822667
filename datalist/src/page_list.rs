use std::num::NonZeroUsize;

use lru::LruCache;

use crate::{Error, Result};

type Page<T> = Box<[Option<T>]>;

/// A paged, lazily allocated list of item slots.
///
/// The logical list has `count` slots split into pages of `page_size`. Pages are allocated on
/// first write; slots of an unallocated page read as `None` (the placeholder). When a page cache
/// budget is set, touching a page (a read of a resident page, or any write) marks it as recently
/// used and the least recently used page is dropped once the budget is exceeded. Eviction only
/// turns values back into placeholders; it never changes `count`.
///
/// Invariant: the page table always has exactly `ceil(count / page_size)` entries.
pub struct PageVirtualizingList<T> {
    pages: Vec<Option<Page<T>>>,
    count: usize,
    page_size: usize,
    page_cache_size: Option<NonZeroUsize>,
    recent: LruCache<usize, ()>,
}

impl<T> Default for PageVirtualizingList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PageVirtualizingList<T> {
    /// Creates an empty list with no page size. Call [`Self::update_count`] before writing.
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            count: 0,
            page_size: 0,
            page_cache_size: None,
            recent: LruCache::unbounded(),
        }
    }

    pub fn with_page_size(page_size: usize) -> Result<Self> {
        let mut list = Self::new();
        list.update_count(0, page_size)?;
        Ok(list)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Items per page, or `0` before a page size has been set.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of entries in the page table (resident or not).
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_cache_size(&self) -> Option<usize> {
        self.page_cache_size.map(NonZeroUsize::get)
    }

    /// Limits the number of resident pages. Pages over budget are evicted immediately.
    pub fn set_page_cache_size(&mut self, pages: usize) -> Result<()> {
        let pages = NonZeroUsize::new(pages).ok_or(Error::ArgumentOutOfRange {
            name: "page_cache_size",
            reason: "must be greater than zero",
        })?;
        self.limit_pages(pages);
        Ok(())
    }

    pub(crate) fn limit_pages(&mut self, pages: NonZeroUsize) {
        self.page_cache_size = Some(pages);
        self.enforce_budget();
    }

    pub fn set_unbounded_page_cache(&mut self) {
        self.page_cache_size = None;
    }

    pub fn is_page_resident(&self, page_index: usize) -> bool {
        matches!(self.pages.get(page_index), Some(Some(_)))
    }

    pub fn resident_page_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_some()).count()
    }

    /// Resizes the logical list. A changed `page_size` discards every page.
    pub fn update_count(&mut self, count: usize, page_size: usize) -> Result<()> {
        if page_size == 0 {
            return Err(Error::ArgumentOutOfRange {
                name: "page_size",
                reason: "must be greater than zero",
            });
        }
        if self.page_size != page_size {
            discard_pages(&mut self.pages, &mut self.recent);
            self.page_size = page_size;
        }
        self.resize(count);
        Ok(())
    }

    /// Reads a slot and marks its page as recently used.
    ///
    /// Returns `Ok(None)` for a slot that has not been written or whose page was evicted.
    pub fn get(&mut self, index: usize) -> Result<Option<&T>> {
        self.check_index(index)?;
        let page_index = index / self.page_size;
        if self.pages[page_index].is_none() {
            return Ok(None);
        }
        self.touch(page_index);
        let offset = index % self.page_size;
        Ok(self.pages[page_index]
            .as_ref()
            .and_then(|page| page[offset].as_ref()))
    }

    /// Reads a slot without affecting page recency.
    pub fn peek(&self, index: usize) -> Result<Option<&T>> {
        self.check_index(index)?;
        Ok(self.peek_unchecked(index))
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.check_index(index)?;
        *self.slot_mut(index) = Some(value);
        self.enforce_budget();
        Ok(())
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        self.require_page_size()?;
        let index = self.count;
        self.resize(index + 1);
        self.set(index, value)
    }

    /// Inserts at `index`, shifting every later slot (placeholders included) one to the right.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        self.require_page_size()?;
        if index > self.count {
            return Err(Error::index(index, self.count));
        }
        self.resize(self.count + 1);
        self.shift_right(index);
        *self.slot_mut(index) = Some(value);
        self.enforce_budget();
        Ok(())
    }

    /// Removes the slot at `index`, shifting every later slot one to the left.
    ///
    /// Returns the removed value, or `None` if the slot was a placeholder.
    pub fn remove_at(&mut self, index: usize) -> Result<Option<T>> {
        self.check_index(index)?;
        let ps = self.page_size;
        let first_page = index / ps;
        let last_page = self.pages.len() - 1;
        let mut removed = None;

        for p in first_page..=last_page {
            let start = if p == first_page { index % ps } else { 0 };
            let next_first = if p < last_page {
                self.pages[p + 1].as_mut().and_then(|next| next[0].take())
            } else {
                None
            };

            if let Some(page) = self.pages[p].as_mut() {
                let out = page[start].take();
                if p == first_page {
                    removed = out;
                }
                page[start..].rotate_left(1);
                page[ps - 1] = next_first;
            } else if let Some(value) = next_first {
                self.page_mut(p)[ps - 1] = Some(value);
            }
        }

        self.resize(self.count - 1);
        self.enforce_budget();
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.count = 0;
        discard_pages(&mut self.pages, &mut self.recent);
    }

    /// Copies every slot without touching page recency.
    pub fn snapshot(&self) -> Vec<Option<T>>
    where
        T: Clone,
    {
        (0..self.count)
            .map(|i| self.peek_unchecked(i).cloned())
            .collect()
    }

    /// Finds the first resident slot equal to `item`. Placeholders never match.
    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        for (page_index, page) in self.pages.iter().enumerate() {
            let Some(page) = page else {
                continue;
            };
            for (offset, slot) in page.iter().enumerate() {
                let index = page_index * self.page_size + offset;
                if index >= self.count {
                    break;
                }
                if slot.as_ref() == Some(item) {
                    return Some(index);
                }
            }
        }
        None
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.index_of(item).is_some()
    }

    pub fn remove(&mut self, item: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        match self.index_of(item) {
            Some(index) => {
                self.remove_at(index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.count {
            return Err(Error::index(index, self.count));
        }
        Ok(())
    }

    fn require_page_size(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidOperation(
                "the page size must be set before items are added",
            ));
        }
        Ok(())
    }

    fn peek_unchecked(&self, index: usize) -> Option<&T> {
        let page = self.pages[index / self.page_size].as_ref()?;
        page[index % self.page_size].as_ref()
    }

    fn resize(&mut self, count: usize) {
        let ps = self.page_size;
        debug_assert!(ps > 0, "resize before a page size was set");
        if count < self.count && count % ps != 0 {
            if let Some(Some(page)) = self.pages.get_mut(count / ps) {
                for slot in &mut page[count % ps..] {
                    *slot = None;
                }
            }
        }

        let page_count = count.div_ceil(ps);
        while self.pages.len() > page_count {
            let page_index = self.pages.len() - 1;
            self.pages.pop();
            self.recent.pop(&page_index);
        }
        self.pages.resize_with(page_count, || None);
        self.count = count;
    }

    fn shift_right(&mut self, index: usize) {
        let ps = self.page_size;
        let first_page = index / ps;
        let last_page = self.pages.len() - 1;

        for p in (first_page..=last_page).rev() {
            let start = if p == first_page { index % ps } else { 0 };
            let carry = match self.pages[p].as_mut() {
                Some(page) => {
                    let carry = page[ps - 1].take();
                    page[start..].rotate_right(1);
                    carry
                }
                None => None,
            };
            if p < last_page {
                if let Some(value) = carry {
                    self.page_mut(p + 1)[0] = Some(value);
                }
            }
        }
    }

    fn touch(&mut self, page_index: usize) {
        self.recent.put(page_index, ());
    }

    fn page_mut(&mut self, page_index: usize) -> &mut [Option<T>] {
        self.touch(page_index);
        let ps = self.page_size;
        self.pages[page_index].get_or_insert_with(|| (0..ps).map(|_| None).collect())
    }

    fn slot_mut(&mut self, index: usize) -> &mut Option<T> {
        let offset = index % self.page_size;
        &mut self.page_mut(index / self.page_size)[offset]
    }

    fn enforce_budget(&mut self) {
        let Some(budget) = self.page_cache_size else {
            return;
        };
        while self.recent.len() > budget.get() {
            let Some((page_index, ())) = self.recent.pop_lru() else {
                break;
            };
            if let Some(page) = self.pages.get_mut(page_index) {
                *page = None;
            }
            dtrace!(page_index, "PageVirtualizingList: evicted page");
        }
    }
}

fn discard_pages<T>(pages: &mut Vec<Option<Page<T>>>, recent: &mut LruCache<usize, ()>) {
    pages.clear();
    recent.clear();
}

impl<T> core::fmt::Debug for PageVirtualizingList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageVirtualizingList")
            .field("count", &self.count)
            .field("page_size", &self.page_size)
            .field("page_count", &self.pages.len())
            .field("resident_pages", &self.resident_page_count())
            .field("page_cache_size", &self.page_cache_size)
            .finish_non_exhaustive()
    }
}
