//! Fair batch-id allocation
//!
//! Workers claim combo batches from one shared counter. The counter sits
//! behind a fair mutex so contending workers are served in arrival order and
//! none of them starves.

use parking_lot::FairMutex;
use txstream_common::BatchId;

#[derive(Debug)]
pub struct BatchAllocator {
    next: FairMutex<BatchId>,
    combo_size: u64,
}

impl BatchAllocator {
    pub fn new(combo_size: u64) -> Self {
        Self::starting_at(0, combo_size)
    }

    /// Allocate from `first` onwards; a zero `combo_size` is treated as one
    pub fn starting_at(first: BatchId, combo_size: u64) -> Self {
        Self {
            next: FairMutex::new(first),
            combo_size: combo_size.max(1),
        }
    }

    /// Claim the next batch `[bid, bid + combo_size)` and return its bid
    pub fn allocate(&self) -> BatchId {
        let mut next = self.next.lock();
        let bid = *next;
        *next = next.saturating_add(self.combo_size);
        tracing::debug!("allocated batch {}", bid);
        bid
    }

    /// The bid the next `allocate` would return
    pub fn peek(&self) -> BatchId {
        *self.next.lock()
    }

    pub fn combo_size(&self) -> u64 {
        self.combo_size
    }
}
