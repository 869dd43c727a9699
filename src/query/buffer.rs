use xias::Xias;

/// The word written over every row that is not in use.
pub const SENTINEL: u32 = u32::MAX;

/// A growable buffer of fixed-width `u32` rows.
///
/// The buffer only grows, in steps of `grow_rows` rows,
/// and only through `&mut self`,
/// so a slice handed out by [`memory`](Self::memory) never observes a reallocation.
#[derive(Debug, Clone)]
pub struct LinearBuffer {
    memory:     Vec<u32>,
    width:      usize,
    grow_rows:  usize,
    generation: u64,
}

impl LinearBuffer {
    /// Constructs an empty buffer with `width` words per row.
    pub fn new(width: usize, grow_rows: usize) -> Self {
        debug_assert!(width > 0, "rows hold at least the entity slot");
        Self { memory: Vec::new(), width, grow_rows: grow_rows.max(1), generation: 0 }
    }

    /// The number of words per row.
    pub fn width(&self) -> usize { self.width }

    /// The number of rows allocated.
    pub fn capacity(&self) -> usize { self.memory.len() / self.width }

    /// The number of times the buffer has grown.
    pub fn generation(&self) -> u64 { self.generation }

    /// The raw rows.
    pub fn memory(&self) -> &[u32] { &self.memory }

    /// Grows the buffer until `row` is allocated.
    pub(crate) fn reserve(&mut self, row: u32) {
        let row = row.small_int::<usize>();
        while row >= self.capacity() {
            let len = self.memory.len() + self.grow_rows * self.width;
            self.memory.resize(len, SENTINEL);
            self.generation += 1;
            log::trace!("Query buffer grew to {} rows", self.capacity());
        }
    }

    /// The words of `row`.
    pub fn row(&self, row: u32) -> &[u32] {
        let start = row.small_int::<usize>() * self.width;
        &self.memory[start..start + self.width]
    }

    pub(crate) fn write(&mut self, row: u32, words: impl IntoIterator<Item = u32>) {
        let start = row.small_int::<usize>() * self.width;
        for (dest, word) in self.memory[start..start + self.width].iter_mut().zip(words) {
            *dest = word;
        }
    }

    pub(crate) fn clear(&mut self, row: u32) {
        let start = row.small_int::<usize>() * self.width;
        self.memory[start..start + self.width].fill(SENTINEL);
    }
}
