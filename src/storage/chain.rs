use std::sync::Arc;

use super::allocator::QuantumAllocator;
use super::budget::MemoryPermit;
use super::error::StorageError;
use super::geometry::{Geometry, Location};
use super::quantum::Quantum;

type Slot = Option<Arc<Quantum>>;

/// Bytes charged to the budget for every node past the head.
const NODE_BYTES: usize = std::mem::size_of::<QuantumSet>();

/// A slot table together with the budget charge that pays for it.
struct SlotTable {
    slots: Box<[Slot]>,
    _permit: MemoryPermit,
}

/// One link of the chain: a lazily allocated table of `qset` quantum slots
/// and the owning link to the following node.
///
/// Every node but the head, and every slot table, is charged to the
/// allocator's budget for as long as it exists.
#[derive(Default)]
pub struct QuantumSet {
    slots: Option<SlotTable>,
    next: Option<Box<QuantumSet>>,
    _permit: Option<MemoryPermit>,
}

impl QuantumSet {
    fn charged(permit: Option<MemoryPermit>) -> Self {
        Self {
            slots: None,
            next: None,
            _permit: permit,
        }
    }

    pub fn has_slots(&self) -> bool {
        self.slots.is_some()
    }

    pub fn slot(&self, index: usize) -> Option<&Arc<Quantum>> {
        self.slots.as_ref()?.slots.get(index)?.as_ref()
    }

    pub fn next(&self) -> Option<&QuantumSet> {
        self.next.as_deref()
    }

    /// The node `hops` links forward, if the chain reaches that far.
    pub fn nth(&self, hops: u64) -> Option<&QuantumSet> {
        let mut node = self;
        for _ in 0..hops {
            node = node.next()?;
        }
        Some(node)
    }

    /// Number of links that exist within the first `hops`.
    fn reachable(&self, hops: u64) -> u64 {
        std::iter::successors(self.next(), |node| node.next())
            .take(usize::try_from(hops).unwrap_or(usize::MAX))
            .count() as u64
    }

    /// Walks `hops` links forward, appending empty nodes past the chain end.
    ///
    /// Every missing node is charged before any is linked in, so on
    /// `OutOfMemory` the chain is left as it was.
    pub fn follow(
        &mut self,
        hops: u64,
        allocator: &QuantumAllocator,
    ) -> Result<&mut QuantumSet, StorageError> {
        let mut permits = (self.reachable(hops)..hops)
            .map(|_| allocator.charge(NODE_BYTES))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter();

        let mut node = self;
        for _ in 0..hops {
            node = &mut **node
                .next
                .get_or_insert_with(|| Box::new(QuantumSet::charged(permits.next())));
        }
        Ok(node)
    }

    /// Drops every node more than `hops` links forward.
    fn truncate(&mut self, hops: u64) {
        let mut node = self;
        for _ in 0..hops {
            match node.next.as_deref_mut() {
                Some(next) => node = next,
                None => return,
            }
        }
        node.next = None;
    }

    /// Returns the slot table, allocating it with every slot empty if absent.
    pub fn ensure_slots(
        &mut self,
        qset: usize,
        allocator: &QuantumAllocator,
    ) -> Result<&mut [Slot], StorageError> {
        let table = match self.slots.take() {
            Some(table) => table,
            None => {
                let bytes = qset.saturating_mul(std::mem::size_of::<Slot>());
                let permit = allocator.charge(bytes)?;
                let mut slots = Vec::new();
                slots
                    .try_reserve_exact(qset)
                    .map_err(|_| StorageError::OutOfMemory { requested: bytes })?;
                slots.resize(qset, None);
                SlotTable {
                    slots: slots.into_boxed_slice(),
                    _permit: permit,
                }
            }
        };
        Ok(&mut self.slots.insert(table).slots[..])
    }

    /// Returns the quantum in `slot`, allocating the slot table and a
    /// zero-filled quantum as needed.
    ///
    /// A slot table created by this call is released again if the quantum
    /// cannot be allocated, leaving the node as it was.
    pub fn ensure_block(
        &mut self,
        slot: usize,
        geometry: Geometry,
        allocator: &QuantumAllocator,
    ) -> Result<Arc<Quantum>, StorageError> {
        let fresh_table = !self.has_slots();
        let slots = self.ensure_slots(geometry.qset, allocator)?;
        if let Some(quantum) = &slots[slot] {
            return Ok(Arc::clone(quantum));
        }

        match allocator.allocate(geometry.order) {
            Ok(quantum) => {
                let quantum = Arc::new(quantum);
                slots[slot] = Some(Arc::clone(&quantum));
                Ok(quantum)
            }
            Err(err) => {
                if fresh_table {
                    self.slots = None;
                }
                Err(err)
            }
        }
    }

    /// Frees every quantum and the slot table. Quanta still referenced by a
    /// bound page are freed when the last reference goes away.
    fn release(&mut self, allocator: &QuantumAllocator) {
        let Some(table) = self.slots.take() else {
            return;
        };
        for quantum in table.slots.into_vec().into_iter().flatten() {
            if let Ok(quantum) = Arc::try_unwrap(quantum) {
                allocator.release(quantum);
            }
        }
    }
}

impl Drop for QuantumSet {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

/// The storage of one device: the quantum-set chain and the logical size.
///
/// `Store` is not synchronized; the owning device keeps it behind its lock.
pub struct Store {
    geometry: Geometry,
    size: u64,
    head: QuantumSet,
    allocator: Arc<QuantumAllocator>,
}

impl Store {
    pub fn new(geometry: Geometry, allocator: Arc<QuantumAllocator>) -> Self {
        Self {
            geometry,
            size: 0,
            head: QuantumSet::default(),
            allocator,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Logical end of data.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Advances the logical end of data to `end` if it lies beyond it.
    pub fn extend_to(&mut self, end: u64) {
        self.size = self.size.max(end);
    }

    pub fn head(&self) -> &QuantumSet {
        &self.head
    }

    /// Maps `offset` to its location and walks the chain to the node holding
    /// it, growing the chain if needed.
    pub fn resolve(&mut self, offset: u64) -> Result<(Location, &mut QuantumSet), StorageError> {
        let location = self.geometry.locate(offset);
        let node = self.head.follow(location.item, &self.allocator)?;
        Ok((location, node))
    }

    /// Resolves `offset` and makes sure a quantum backs it.
    ///
    /// On failure, nodes appended along the way are dropped again.
    pub fn block_for_write(
        &mut self,
        offset: u64,
    ) -> Result<(Location, Arc<Quantum>), StorageError> {
        let geometry = self.geometry;
        let location = geometry.locate(offset);
        let kept = self.head.reachable(location.item);

        let result = self
            .head
            .follow(location.item, &self.allocator)
            .and_then(|node| node.ensure_block(location.slot, geometry, &self.allocator));

        match result {
            Ok(quantum) => Ok((location, quantum)),
            Err(err) => {
                if kept < location.item {
                    self.head.truncate(kept);
                }
                Err(err)
            }
        }
    }

    /// Maps `offset` to its location and the quantum backing it, without
    /// allocating anything.
    pub fn quantum_at(&self, offset: u64) -> (Location, Option<Arc<Quantum>>) {
        let location = self.geometry.locate(offset);
        let quantum = self
            .head
            .nth(location.item)
            .and_then(|node| node.slot(location.slot))
            .cloned();
        (location, quantum)
    }

    /// Finds the quantum with linear index `block` without allocating
    /// anything, hopping `qset` blocks per chain node.
    pub fn lookup(&self, block: u64) -> Option<Arc<Quantum>> {
        let qset = self.geometry.qset as u64;
        let slot = usize::try_from(block % qset).ok()?;
        self.head.nth(block / qset)?.slot(slot).cloned()
    }

    /// Frees the whole chain, resets the size and adopts `geometry`.
    pub fn trim(&mut self, geometry: Geometry) {
        let mut next = self.head.next.take();
        self.head.release(&self.allocator);
        while let Some(mut node) = next {
            next = node.next.take();
            node.release(&self.allocator);
        }
        self.size = 0;
        self.geometry = geometry;
    }

    /// Number of chain nodes, the head included.
    pub fn node_count(&self) -> usize {
        std::iter::successors(Some(&self.head), |node| node.next()).count()
    }

    /// Number of allocated quanta.
    pub fn block_count(&self) -> usize {
        std::iter::successors(Some(&self.head), |node| node.next())
            .filter_map(|node| node.slots.as_ref())
            .map(|table| table.slots.iter().flatten().count())
            .sum()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("geometry", &self.geometry)
            .field("size", &self.size)
            .field("nodes", &self.node_count())
            .field("blocks", &self.block_count())
            .finish()
    }
}
