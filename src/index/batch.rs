//! Bulk request accumulation.
//!
//! Groups of operations (one group per element) are collected until the
//! group count reaches the configured limit. The full batch is handed back
//! *before* the next group is accepted, so a batch never holds more than
//! `limit` elements.

use super::BulkOp;

#[derive(Debug)]
pub struct BulkAccumulator {
    limit: usize,
    groups: usize,
    ops: Vec<BulkOp>,
}

impl BulkAccumulator {
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            groups: 0,
            ops: Vec::new(),
        }
    }

    /// Add one element's operations. Returns the batch that must be sent
    /// first if the accumulator was already full.
    pub fn push(&mut self, group: Vec<BulkOp>) -> Option<Vec<BulkOp>> {
        let full = if self.groups >= self.limit { self.take() } else { None };
        self.ops.extend(group);
        self.groups += 1;
        full
    }

    /// Trailing partial batch, if any operations are pending.
    pub fn finish(&mut self) -> Option<Vec<BulkOp>> {
        self.take()
    }

    pub fn pending_groups(&self) -> usize {
        self.groups
    }

    fn take(&mut self) -> Option<Vec<BulkOp>> {
        self.groups = 0;
        if self.ops.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.ops))
    }
}
