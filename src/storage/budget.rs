use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Byte limit shared by every quantum and chain node an allocator pays for.
///
/// Charges are taken with [`MemoryBudget::try_allocate`] and returned when
/// the resulting [`MemoryPermit`] is dropped, so memory stays accounted for
/// exactly as long as its owner lives.
#[derive(Debug)]
pub struct MemoryBudget {
    total_limit: usize,
    current_usage: AtomicUsize,
}

impl MemoryBudget {
    pub fn new(total_limit: usize) -> Arc<Self> {
        Arc::new(Self {
            total_limit,
            current_usage: AtomicUsize::new(0),
        })
    }

    pub fn unlimited() -> Arc<Self> {
        Self::new(usize::MAX)
    }

    pub fn try_allocate(self: &Arc<Self>, bytes: usize) -> Option<MemoryPermit> {
        let mut current = self.current_usage.load(Ordering::Relaxed);
        loop {
            let next = current.checked_add(bytes)?;
            if next > self.total_limit {
                return None;
            }
            match self.current_usage.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(MemoryPermit {
                        budget: Arc::clone(self),
                        bytes,
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.current_usage.fetch_sub(bytes, Ordering::SeqCst);
    }

    pub fn current_usage(&self) -> usize {
        self.current_usage.load(Ordering::Relaxed)
    }

    pub fn total_limit(&self) -> usize {
        self.total_limit
    }

    pub fn is_under_pressure(&self) -> bool {
        let usage = self.current_usage.load(Ordering::Relaxed);
        usage > (self.total_limit as f64 * 0.9) as usize
    }
}

#[derive(Debug)]
pub struct MemoryPermit {
    budget: Arc<MemoryBudget>,
    bytes: usize,
}

impl MemoryPermit {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for MemoryPermit {
    fn drop(&mut self) {
        self.budget.release(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_released_on_drop() {
        let budget = MemoryBudget::new(8192);

        let first = budget.try_allocate(4096).unwrap();
        let second = budget.try_allocate(4096).unwrap();
        assert_eq!(budget.current_usage(), 8192);
        assert!(budget.try_allocate(1).is_none());

        drop(first);
        assert_eq!(budget.current_usage(), 4096);
        assert_eq!(second.bytes(), 4096);
        assert!(budget.try_allocate(4096).is_some());
    }

    #[test]
    fn test_unlimited_does_not_overflow() {
        let budget = MemoryBudget::unlimited();
        let _held = budget.try_allocate(usize::MAX - 1).unwrap();
        assert!(budget.try_allocate(2).is_none());
        assert!(budget.is_under_pressure());
    }
}
