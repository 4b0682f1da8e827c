use crate::domain::errors::HistoryError;
use std::fmt;

/// Fixed-capacity ring buffer (append-only, overwrite-oldest when full).
///
/// Logical index 0 is the oldest retained item, `len() - 1` the newest.
/// Reads that leave the buffer (`snapshot`) copy out, so callers never alias
/// storage that a later `push` overwrites.
#[derive(Clone)]
pub struct CircularHistory<T> {
    capacity: usize,
    len: usize,
    head: usize, // next write index
    slots: Vec<Option<T>>,
}

impl<T> fmt::Debug for CircularHistory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularHistory")
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> CircularHistory<T> {
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::InvalidCapacity { capacity });
        }
        Ok(Self {
            capacity,
            len: 0,
            head: 0,
            slots: vec![None; capacity],
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Slot index of the oldest element
    #[inline]
    fn start(&self) -> usize {
        (self.head + self.capacity - self.len) % self.capacity
    }

    /// Pushes a new element, overwriting the oldest when full
    #[inline]
    pub fn push(&mut self, item: T) {
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    /// Most recently pushed element
    pub fn latest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.capacity - 1) % self.capacity;
        self.slots[idx].as_ref()
    }

    /// Element by logical position (0 = oldest)
    pub fn get(&self, index: usize) -> Result<&T, HistoryError> {
        if index >= self.len {
            return Err(HistoryError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let idx = (self.start() + index) % self.capacity;
        self.slots[idx].as_ref().ok_or(HistoryError::IndexOutOfRange {
            index,
            len: self.len,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let start = self.start();
        (0..self.len).filter_map(move |i| self.slots[(start + i) % self.capacity].as_ref())
    }

    /// Ordered copy, oldest → newest
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Ordered copy of what the history would hold after pushing `pending`,
    /// without mutating it.
    pub fn snapshot_with(&self, pending: &[T]) -> Vec<T> {
        let total = self.len + pending.len();
        let skip = total.saturating_sub(self.capacity);
        self.iter()
            .chain(pending.iter())
            .skip(skip)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.len = 0;
        self.head = 0;
    }
}
