use crate::{Error, Result};

/// A growable list whose logical length may run past its allocated backing.
///
/// Slots in the virtual tail (beyond the backing, but below `count`) read as `None`. Writing
/// into the tail grows the backing to twice the required size.
#[derive(Clone, Debug)]
pub struct VirtualizingList<T> {
    slots: Vec<Option<T>>,
    count: usize,
}

impl<T> Default for VirtualizingList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> VirtualizingList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of allocated slots (may be smaller or larger than `count`).
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    /// Sets the logical length. Slots that fall outside the new length are cleared.
    pub fn update_count(&mut self, count: usize) {
        if count < self.count {
            let end = self.count.min(self.slots.len());
            for slot in self.slots.iter_mut().take(end).skip(count) {
                *slot = None;
            }
        }
        self.count = count;
    }

    pub fn get(&self, index: usize) -> Result<Option<&T>> {
        self.check_index(index)?;
        Ok(self.slots.get(index).and_then(Option::as_ref))
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.check_index(index)?;
        self.ensure_capacity(index + 1);
        self.slots[index] = Some(value);
        Ok(())
    }

    pub fn push(&mut self, value: T) {
        let index = self.count;
        self.count += 1;
        self.ensure_capacity(index + 1);
        self.slots[index] = Some(value);
    }

    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.count {
            return Err(Error::index(index, self.count));
        }
        self.count += 1;
        self.ensure_capacity(index);
        self.slots.insert(index, Some(value));
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Option<T>> {
        self.check_index(index)?;
        self.count -= 1;
        if index >= self.slots.len() {
            return Ok(None);
        }
        Ok(self.slots.remove(index))
    }

    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        match self.index_of(item) {
            Some(index) => self.remove_at(index).is_ok(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.slots.clear();
    }

    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.slots
            .iter()
            .take(self.count)
            .position(|slot| slot.as_ref() == Some(item))
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.index_of(item).is_some()
    }

    /// Iterates every logical slot, yielding `None` for placeholders.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        (0..self.count).map(move |i| self.slots.get(i).and_then(Option::as_ref))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.count {
            return Err(Error::index(index, self.count));
        }
        Ok(())
    }

    fn ensure_capacity(&mut self, required: usize) {
        if self.slots.len() < required {
            let desired = required * 2;
            self.slots.resize_with(desired, || None);
        }
    }
}
