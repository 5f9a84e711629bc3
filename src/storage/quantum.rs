use parking_lot::RwLock;

use super::budget::MemoryPermit;
use super::error::StorageError;
use crate::constants::PAGE_SIZE;

/// One page-aligned page of quantum memory.
#[derive(Clone)]
#[repr(C, align(4096))]
pub(crate) struct Page([u8; PAGE_SIZE]);

impl Page {
    const ZERO: Page = Page([0u8; PAGE_SIZE]);
}

/// A single quantum: `PAGE_SIZE << order` bytes of zero-initialized,
/// page-aligned memory.
///
/// Quanta are shared through `Arc` between the chain slot that owns them and
/// any mapped page bound to them, so the contents sit behind a lock. The
/// device lock serializes structural changes; this lock only orders byte
/// access between positioned I/O and mapped loads and stores.
pub struct Quantum {
    order: u32,
    pages: RwLock<Box<[Page]>>,
    _permit: MemoryPermit,
}

impl Quantum {
    pub(crate) fn allocate(order: u32, permit: MemoryPermit) -> Result<Self, StorageError> {
        let count = 1usize << order;
        let mut pages = Vec::new();
        pages
            .try_reserve_exact(count)
            .map_err(|_| StorageError::OutOfMemory {
                requested: permit.bytes(),
            })?;
        pages.resize(count, Page::ZERO);

        Ok(Self {
            order,
            pages: RwLock::new(pages.into_boxed_slice()),
            _permit: permit,
        })
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// Size of the quantum in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        PAGE_SIZE << self.order
    }

    pub(crate) fn zero(&self) {
        for page in self.pages.write().iter_mut() {
            page.0.fill(0);
        }
    }

    /// Hands `len` bytes starting at `offset` to `f` one page-sized chunk at a
    /// time, together with the chunk's position relative to `offset`.
    ///
    /// The range is clamped to the end of the quantum. Returns the number of
    /// bytes visited, or the first error `f` reports.
    pub fn copy_out<E>(
        &self,
        offset: usize,
        len: usize,
        mut f: impl FnMut(usize, &[u8]) -> Result<(), E>,
    ) -> Result<usize, E> {
        let len = len.min(self.len().saturating_sub(offset));
        let pages = self.pages.read();
        for (at, page, range) in chunks(offset, len) {
            f(at, &pages[page].0[range])?;
        }
        Ok(len)
    }

    /// Mutable counterpart of [`Quantum::copy_out`].
    pub fn copy_in<E>(
        &self,
        offset: usize,
        len: usize,
        mut f: impl FnMut(usize, &mut [u8]) -> Result<(), E>,
    ) -> Result<usize, E> {
        let len = len.min(self.len().saturating_sub(offset));
        let mut pages = self.pages.write();
        for (at, page, range) in chunks(offset, len) {
            f(at, &mut pages[page].0[range])?;
        }
        Ok(len)
    }

    /// Copies bytes out of the quantum into `dst`, clamped to the quantum end.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> usize {
        let result: Result<usize, std::convert::Infallible> =
            self.copy_out(offset, dst.len(), |at, chunk| {
                dst[at..at + chunk.len()].copy_from_slice(chunk);
                Ok(())
            });
        result.unwrap_or_else(|never| match never {})
    }

    /// Copies `src` into the quantum, clamped to the quantum end.
    pub fn write_at(&self, offset: usize, src: &[u8]) -> usize {
        let result: Result<usize, std::convert::Infallible> =
            self.copy_in(offset, src.len(), |at, chunk| {
                chunk.copy_from_slice(&src[at..at + chunk.len()]);
                Ok(())
            });
        result.unwrap_or_else(|never| match never {})
    }
}

impl std::fmt::Debug for Quantum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quantum")
            .field("order", &self.order)
            .field("len", &self.len())
            .finish()
    }
}

/// Splits `offset..offset + len` at page boundaries into
/// `(position relative to offset, page index, range within page)`.
fn chunks(
    offset: usize,
    len: usize,
) -> impl Iterator<Item = (usize, usize, std::ops::Range<usize>)> {
    let mut at = 0;
    std::iter::from_fn(move || {
        if at >= len {
            return None;
        }
        let pos = offset + at;
        let page = pos / PAGE_SIZE;
        let start = pos % PAGE_SIZE;
        let take = (PAGE_SIZE - start).min(len - at);
        let item = (at, page, start..start + take);
        at += take;
        Some(item)
    })
}
