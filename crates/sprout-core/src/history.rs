//! Fixed-capacity circular buffer
//!
//! All modular index arithmetic for the battery history lives here. The
//! buffer keeps the next write position and a flag that is set once the
//! write position has wrapped, which is exactly the shape persisted across
//! deep sleep.

/// Circular buffer of `N` values, overwriting the oldest when full
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingBuffer<T, const N: usize> {
    slots: [T; N],
    write_index: usize,
    full: bool,
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    pub fn new() -> Self {
        Self {
            slots: [T::default(); N],
            write_index: 0,
            full: false,
        }
    }

    /// Rebuild a buffer from persisted parts.
    ///
    /// Returns `None` if the write index is out of range.
    pub fn from_raw_parts(slots: [T; N], write_index: usize, full: bool) -> Option<Self> {
        (write_index < N).then_some(Self {
            slots,
            write_index,
            full,
        })
    }

    /// Slots in storage order, plus the write index and wrap flag.
    pub fn raw_parts(&self) -> (&[T; N], usize, bool) {
        (&self.slots, self.write_index, self.full)
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    pub const CAPACITY: usize = N;

    /// Write a value at the write position and advance it.
    pub fn push(&mut self, value: T) {
        self.slots[self.write_index] = value;
        self.write_index = (self.write_index + 1) % N;
        if self.write_index == 0 {
            self.full = true;
        }
    }

    /// Number of values currently held
    pub fn len(&self) -> usize {
        if self.full { N } else { self.write_index }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Slot the next push will write
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Value `age` pushes ago; `newest(0)` is the most recent push.
    pub fn newest(&self, age: usize) -> Option<T> {
        if age >= self.len() {
            return None;
        }
        // Offset by N so the subtraction cannot underflow
        let index = (self.write_index + N - 1 - age) % N;
        Some(self.slots[index])
    }

    /// Most recently pushed value
    pub fn latest(&self) -> Option<T> {
        self.newest(0)
    }

    /// Held values from newest to oldest
    pub fn iter_newest_first(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len()).filter_map(move |age| self.newest(age))
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
        self.full = false;
    }
}
