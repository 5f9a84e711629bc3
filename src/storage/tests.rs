use super::*;
use crate::constants::PAGE_SIZE;
use std::sync::Arc;

fn create_test_store(order: u32, qset: usize) -> Store {
    Store::new(Geometry::new(order, qset), QuantumAllocator::unlimited())
}

fn fill(store: &mut Store, offset: u64, data: &[u8]) {
    let (location, quantum) = store.block_for_write(offset).unwrap();
    assert_eq!(quantum.write_at(location.offset, data), data.len());
    store.extend_to(offset + data.len() as u64);
}

#[test]
fn test_resolve_grows_chain() {
    let mut store = create_test_store(0, 2);
    assert_eq!(store.node_count(), 1);

    let (location, node) = store.resolve(5 * PAGE_SIZE as u64).unwrap();
    assert_eq!(location.item, 2);
    assert_eq!(location.slot, 1);
    assert!(!node.has_slots());

    assert_eq!(store.node_count(), 3);
    assert_eq!(store.block_count(), 0);
}

#[test]
fn test_three_blocks_span_two_nodes() {
    let mut store = create_test_store(0, 2);

    for block in 0..3u64 {
        let data = vec![block as u8 + 1; PAGE_SIZE];
        fill(&mut store, block * PAGE_SIZE as u64, &data);
    }

    assert_eq!(store.node_count(), 2);
    assert_eq!(store.block_count(), 3);
    assert_eq!(store.size(), 3 * PAGE_SIZE as u64);

    let second = store.head().next().unwrap();
    assert!(second.slot(0).is_some());
    assert!(second.slot(1).is_none());
}

#[test]
fn test_ensure_block_reuses_existing_quantum() {
    let mut store = create_test_store(0, 4);

    let (_, first) = store.block_for_write(10).unwrap();
    let (_, second) = store.block_for_write(20).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.block_count(), 1);
}

#[test]
fn test_failed_block_rolls_back_fresh_table() {
    let allocator = QuantumAllocator::new(MemoryBudget::new(256), 0);
    let mut store = Store::new(Geometry::new(0, 4), Arc::clone(&allocator));

    let err = store.block_for_write(0).unwrap_err();
    assert_eq!(
        err,
        StorageError::OutOfMemory {
            requested: PAGE_SIZE
        }
    );
    assert!(!store.head().has_slots());
    assert_eq!(store.size(), 0);
    assert_eq!(allocator.budget().current_usage(), 0);
}

#[test]
fn test_failed_block_keeps_existing_table() {
    let allocator = QuantumAllocator::new(MemoryBudget::new(PAGE_SIZE + 256), 0);
    let mut store = Store::new(Geometry::new(0, 4), allocator);

    fill(&mut store, 0, b"first");
    assert!(store.block_for_write(PAGE_SIZE as u64).is_err());

    assert!(store.head().has_slots());
    assert!(store.head().slot(0).is_some());
    assert!(store.head().slot(1).is_none());
}

#[test]
fn test_slot_table_is_charged() {
    let allocator = QuantumAllocator::new(MemoryBudget::new(16), 0);
    let mut store = Store::new(Geometry::new(0, 4), allocator);

    let err = store.block_for_write(0).unwrap_err();
    assert_eq!(
        err,
        StorageError::OutOfMemory {
            requested: 4 * std::mem::size_of::<Option<Arc<Quantum>>>()
        }
    );
    assert!(!store.head().has_slots());
}

#[test]
fn test_chain_nodes_are_charged() {
    let allocator = QuantumAllocator::new(MemoryBudget::unlimited(), 0);
    let mut store = Store::new(Geometry::new(0, 2), Arc::clone(&allocator));

    store.resolve(6 * PAGE_SIZE as u64).unwrap();
    assert_eq!(store.node_count(), 4);
    let node_bytes = allocator.budget().current_usage();
    assert_eq!(node_bytes % 3, 0);
    assert!(node_bytes > 0);

    store.trim(Geometry::new(0, 2));
    assert_eq!(allocator.budget().current_usage(), 0);
}

#[test]
fn test_far_write_rolls_back_nodes() {
    let allocator = QuantumAllocator::new(MemoryBudget::new(2 * PAGE_SIZE), 0);
    let mut store = Store::new(Geometry::new(0, 1), Arc::clone(&allocator));

    fill(&mut store, 0, b"near");
    let usage = allocator.budget().current_usage();

    let err = store.block_for_write((1 << 22) * PAGE_SIZE as u64).unwrap_err();
    assert!(matches!(err, StorageError::OutOfMemory { .. }));
    assert_eq!(store.node_count(), 1);
    assert_eq!(allocator.budget().current_usage(), usage);

    // Nodes fit, the quantum at the end does not: the new nodes go again.
    let err = store.block_for_write(3 * PAGE_SIZE as u64).unwrap_err();
    assert_eq!(
        err,
        StorageError::OutOfMemory {
            requested: PAGE_SIZE
        }
    );
    assert_eq!(store.node_count(), 1);
    assert_eq!(allocator.budget().current_usage(), usage);
}

#[test]
fn test_quantum_at_does_not_allocate() {
    let mut store = create_test_store(0, 2);
    fill(&mut store, 3 * PAGE_SIZE as u64 + 7, b"x");

    let (location, quantum) = store.quantum_at(3 * PAGE_SIZE as u64 + 7);
    assert_eq!(location.offset, 7);
    assert!(quantum.is_some());

    let (_, quantum) = store.quantum_at(10 * PAGE_SIZE as u64);
    assert!(quantum.is_none());
    assert_eq!(store.node_count(), 2);
}

#[test]
fn test_lookup_does_not_allocate() {
    let mut store = create_test_store(0, 2);
    fill(&mut store, 2 * PAGE_SIZE as u64, b"node one");

    assert!(store.lookup(0).is_none());
    assert!(store.lookup(2).is_some());
    assert!(store.lookup(3).is_none());
    assert!(store.lookup(40).is_none());
    assert_eq!(store.node_count(), 2);
}

#[test]
fn test_trim_frees_chain_and_adopts_geometry() {
    let allocator = QuantumAllocator::new(MemoryBudget::unlimited(), 8);
    let mut store = Store::new(Geometry::new(0, 2), Arc::clone(&allocator));

    for block in 0..5u64 {
        fill(&mut store, block * PAGE_SIZE as u64, b"x");
    }
    assert_eq!(store.node_count(), 3);

    store.trim(Geometry::new(1, 8));

    assert_eq!(store.size(), 0);
    assert_eq!(store.node_count(), 1);
    assert_eq!(store.block_count(), 0);
    assert!(!store.head().has_slots());
    assert_eq!(store.geometry(), Geometry::new(1, 8));
    assert_eq!(allocator.recycled(), 5);
}

#[test]
fn test_trim_leaves_referenced_quantum_alive() {
    let allocator = QuantumAllocator::new(MemoryBudget::unlimited(), 8);
    let mut store = Store::new(Geometry::new(0, 2), Arc::clone(&allocator));
    fill(&mut store, 0, b"still here");

    let held = store.lookup(0).unwrap();
    store.trim(Geometry::new(0, 2));

    assert_eq!(allocator.recycled(), 0);
    let mut out = [0u8; 10];
    held.read_at(0, &mut out);
    assert_eq!(&out, b"still here");
}

#[test]
fn test_long_chain_drops_iteratively() {
    let mut store = create_test_store(0, 1);
    store.resolve(200_000 * PAGE_SIZE as u64).unwrap();
    assert_eq!(store.node_count(), 200_001);
    drop(store);
}
