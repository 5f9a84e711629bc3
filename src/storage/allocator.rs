use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use super::budget::{MemoryBudget, MemoryPermit};
use super::error::StorageError;
use super::quantum::Quantum;
use crate::constants::{MAX_ORDER, PAGE_SIZE};

/// Hands out zero-filled quanta and takes them back.
///
/// Every quantum is charged against the allocator's [`MemoryBudget`] for as
/// long as it lives, and so is the chain bookkeeping (nodes and slot tables)
/// through [`QuantumAllocator::charge`]. Released quanta are parked in a
/// bounded recycle queue and handed out again, zero-filled, to the next
/// request of the same order.
pub struct QuantumAllocator {
    budget: Arc<MemoryBudget>,
    recycled: Option<ArrayQueue<Quantum>>,
}

impl QuantumAllocator {
    pub fn new(budget: Arc<MemoryBudget>, recycle_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            budget,
            recycled: (recycle_capacity > 0).then(|| ArrayQueue::new(recycle_capacity)),
        })
    }

    pub fn unlimited() -> Arc<Self> {
        Self::new(MemoryBudget::unlimited(), 0)
    }

    pub fn budget(&self) -> &Arc<MemoryBudget> {
        &self.budget
    }

    /// Allocates one zero-filled quantum of `PAGE_SIZE << order` bytes.
    pub fn allocate(&self, order: u32) -> Result<Quantum, StorageError> {
        if order > MAX_ORDER {
            return Err(StorageError::OutOfMemory {
                requested: usize::MAX,
            });
        }
        let bytes = PAGE_SIZE << order;

        if let Some(queue) = &self.recycled {
            while let Some(quantum) = queue.pop() {
                if quantum.order() == order {
                    quantum.zero();
                    return Ok(quantum);
                }
                // Parked under an older geometry; dropping it returns its charge.
            }
        }

        let permit = self.charge(bytes)?;
        Quantum::allocate(order, permit)
    }

    /// Charges `bytes` of chain bookkeeping or quantum memory to the budget.
    pub fn charge(&self, bytes: usize) -> Result<MemoryPermit, StorageError> {
        self.budget.try_allocate(bytes).ok_or_else(|| {
            tracing::debug!(
                "Allocation of {} bytes refused, {} of {} in use",
                bytes,
                self.budget.current_usage(),
                self.budget.total_limit()
            );
            StorageError::OutOfMemory { requested: bytes }
        })
    }

    /// Returns a quantum to the allocator.
    ///
    /// The quantum is parked for reuse when the recycle queue has room and
    /// the budget is not under pressure, and freed otherwise.
    pub fn release(&self, quantum: Quantum) {
        if self.budget.is_under_pressure() {
            tracing::trace!("Budget under pressure, freeing quantum");
            return;
        }
        if let Some(queue) = &self.recycled {
            let _ = queue.push(quantum);
        }
    }

    /// Number of quanta currently parked for reuse.
    pub fn recycled(&self) -> usize {
        self.recycled.as_ref().map_or(0, ArrayQueue::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exhaustion() {
        let allocator = QuantumAllocator::new(MemoryBudget::new(PAGE_SIZE), 0);

        let first = allocator.allocate(0).unwrap();
        assert_eq!(first.len(), PAGE_SIZE);
        assert_eq!(
            allocator.allocate(0).unwrap_err(),
            StorageError::OutOfMemory {
                requested: PAGE_SIZE
            }
        );

        drop(first);
        assert!(allocator.allocate(0).is_ok());
    }

    #[test]
    fn test_recycled_quantum_is_zeroed() {
        let allocator = QuantumAllocator::new(MemoryBudget::new(4 * PAGE_SIZE), 4);

        let q = allocator.allocate(0).unwrap();
        q.write_at(0, b"stale");
        allocator.release(q);
        assert_eq!(allocator.recycled(), 1);
        assert_eq!(allocator.budget().current_usage(), PAGE_SIZE);

        // No new charge: this is the parked quantum.
        let q = allocator.allocate(0).unwrap();
        let mut out = [0xffu8; 5];
        q.read_at(0, &mut out);
        assert_eq!(out, [0u8; 5]);
        assert_eq!(allocator.recycled(), 0);
        assert_eq!(allocator.budget().current_usage(), PAGE_SIZE);
    }

    #[test]
    fn test_release_under_pressure_frees() {
        let allocator = QuantumAllocator::new(MemoryBudget::new(PAGE_SIZE), 4);

        let q = allocator.allocate(0).unwrap();
        assert!(allocator.budget().is_under_pressure());
        allocator.release(q);

        assert_eq!(allocator.recycled(), 0);
        assert_eq!(allocator.budget().current_usage(), 0);
    }

    #[test]
    fn test_charge_refused_past_limit() {
        let allocator = QuantumAllocator::new(MemoryBudget::new(100), 0);

        let permit = allocator.charge(60).unwrap();
        assert_eq!(
            allocator.charge(60).unwrap_err(),
            StorageError::OutOfMemory { requested: 60 }
        );
        drop(permit);
        assert!(allocator.charge(60).is_ok());
    }

    #[test]
    fn test_recycled_order_mismatch_is_freed() {
        let allocator = QuantumAllocator::new(MemoryBudget::new(8 * PAGE_SIZE), 4);

        allocator.release(allocator.allocate(1).unwrap());
        let q = allocator.allocate(0).unwrap();

        assert_eq!(q.order(), 0);
        assert_eq!(allocator.recycled(), 0);
        assert_eq!(allocator.budget().current_usage(), PAGE_SIZE);
    }

    #[test]
    fn test_order_above_limit_refused() {
        let allocator = QuantumAllocator::unlimited();
        assert!(allocator.allocate(MAX_ORDER + 1).is_err());
    }
}
