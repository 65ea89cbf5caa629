use crate::common::verbose;

/// Batch allocated slots lent to decoded rows.
///
/// A claim is valid until the next claim, which the engine enforces by lending
/// rows tied to its own mutable borrow.
#[derive(Debug)]
pub struct Slab<T> {
    slots: Vec<T>,
    cursor: usize,
    batch: usize,
    allocations: usize,
}

impl<T: Default> Slab<T> {
    /// Create empty slab, nothing is allocated until the first claim.
    pub fn new(batch: usize) -> Self {
        Self { slots: Vec::new(), cursor: 0, batch, allocations: 0 }
    }

    /// Claim the next `n` slots.
    ///
    /// Slots may contain values from previous claims.
    pub fn claim(&mut self, n: usize) -> &mut [T] {
        if self.slots.len() - self.cursor < n {
            self.cursor = 0;

            if self.slots.len() < n {
                let len = self.batch.max(n);
                verbose!(len, "slab allocation");
                self.slots = std::iter::repeat_with(T::default).take(len).collect();
                self.allocations += 1;
            }
        }

        let start = self.cursor;
        self.cursor += n;
        &mut self.slots[start..self.cursor]
    }

    /// Returns how many times backing storage is allocated.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}
