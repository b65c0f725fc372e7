// src/compute/mod.rs
// Bounded-batch GPU work scheduling shared by the lookup generators and the
// volume grid upload. One configurable cap decides how much uninterrupted work
// a single submit-and-wait cycle may carry.
// RELEVANT FILES: src/compute/backend.rs, src/compute/wgpu_backend.rs

use std::ops::Range;

pub mod backend;
pub mod wgpu_backend;

pub use backend::{BufferId, ComputeBackend, KernelDesc, KernelId};
pub use wgpu_backend::WgpuBackend;

/// Default number of compute dispatches recorded between two submit-and-wait
/// cycles. Every submission stays short enough that the driver never considers
/// it hung; device loss is unrecoverable, so the cap is an invariant of the
/// GPU path rather than a tunable optimization.
pub const DISPATCHES_PER_SUBMIT: u32 = 50;

/// Iterator over sub-batches covering `total` work units with at most `cap`
/// units per batch. `cap == 0` is treated as 1.
pub fn bounded_batches(total: u32, cap: u32) -> BoundedBatches {
    BoundedBatches {
        next: 0,
        total,
        cap: cap.max(1),
    }
}

pub struct BoundedBatches {
    next: u32,
    total: u32,
    cap: u32,
}

impl BoundedBatches {
    pub fn batch_count(&self) -> u32 {
        (self.total + self.cap - 1) / self.cap
    }
}

impl Iterator for BoundedBatches {
    type Item = Range<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let start = self.next;
        let end = (start + self.cap).min(self.total);
        self.next = end;
        Some(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_total_without_overlap() {
        let batches: Vec<_> = bounded_batches(123, 50).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], 0..50);
        assert_eq!(batches[1], 50..100);
        assert_eq!(batches[2], 100..123);
    }

    #[test]
    fn cap_one_degenerates_to_single_steps() {
        let batches: Vec<_> = bounded_batches(3, 1).collect();
        assert_eq!(batches, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn zero_total_is_empty() {
        assert_eq!(bounded_batches(0, 50).count(), 0);
    }

    #[test]
    fn batch_count_matches_iteration() {
        let b = bounded_batches(101, 50);
        assert_eq!(b.batch_count() as usize, bounded_batches(101, 50).count());
    }
}
