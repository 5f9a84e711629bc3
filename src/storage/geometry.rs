use crate::constants::{DEFAULT_ORDER, DEFAULT_QSET, PAGE_SIZE};

/// Block order and quantum-set capacity of a device's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub order: u32,
    pub qset: usize,
}

/// Position of a linear byte offset inside the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Chain node index (hops from the head).
    pub item: u64,
    /// Slot within the node's quantum-set.
    pub slot: usize,
    /// Byte offset within the quantum.
    pub offset: usize,
}

impl Geometry {
    pub fn new(order: u32, qset: usize) -> Self {
        Self { order, qset }
    }

    /// Bytes per quantum.
    pub fn block_size(&self) -> usize {
        PAGE_SIZE << self.order
    }

    /// Bytes spanned by one full chain node.
    pub fn item_size(&self) -> u64 {
        self.block_size() as u64 * self.qset as u64
    }

    pub fn locate(&self, offset: u64) -> Location {
        let item_size = self.item_size();
        let block_size = self.block_size() as u64;
        let rest = offset % item_size;
        Location {
            item: offset / item_size,
            slot: (rest / block_size) as usize,
            offset: (rest % block_size) as usize,
        }
    }

    /// Inverse of [`Geometry::locate`].
    pub fn linear(&self, location: &Location) -> u64 {
        location.item * self.item_size()
            + location.slot as u64 * self.block_size() as u64
            + location.offset as u64
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER, DEFAULT_QSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_locate_small_geometry() {
        let geometry = Geometry::new(0, 2);
        assert_eq!(geometry.item_size(), 2 * PAGE_SIZE as u64);

        let loc = geometry.locate(2 * PAGE_SIZE as u64 + PAGE_SIZE as u64 + 5);
        assert_eq!(
            loc,
            Location {
                item: 1,
                slot: 1,
                offset: 5
            }
        );
    }

    #[test]
    fn test_locate_reconstructs_offset() {
        let mut rng = rand::rng();
        for geometry in [
            Geometry::default(),
            Geometry::new(0, 1),
            Geometry::new(0, 2),
            Geometry::new(3, 7),
        ] {
            for _ in 0..1000 {
                let offset: u64 = rng.random_range(0..1u64 << 40);
                let loc = geometry.locate(offset);
                assert!(loc.slot < geometry.qset);
                assert!(loc.offset < geometry.block_size());
                assert_eq!(geometry.linear(&loc), offset);
            }
        }
    }
}
