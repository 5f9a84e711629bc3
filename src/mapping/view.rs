use std::collections::HashMap;
use std::sync::Arc;

use super::error::AccessError;
use super::{FaultHandler, Mapping, PageRef};
use crate::constants::PAGE_SIZE;
use crate::device::Device;

/// The address-space side of a mapping.
///
/// Keeps a page table of bound pages and faults unbound ones in through its
/// [`FaultHandler`] on first touch. Loads and stores then go straight to the
/// quantum memory. A fault that resolves to nothing is not remembered, so a
/// later access retries it.
pub struct MappedView<H: FaultHandler> {
    handler: H,
    pages: HashMap<usize, PageRef>,
}

impl MappedView<Mapping> {
    /// Maps the first `len` bytes of `device` into a fresh view.
    pub fn map(device: &Arc<Device>, len: usize) -> Self {
        Self::new(device.map(len))
    }
}

impl<H: FaultHandler> MappedView<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            pages: HashMap::new(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Number of pages currently bound.
    pub fn bound_pages(&self) -> usize {
        self.pages.len()
    }

    /// Drops every bound page.
    pub fn unbind(&mut self) {
        self.pages.clear();
    }

    /// Consumes the view, unbinding its pages and handing back the handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    async fn page(&mut self, offset: usize) -> Result<&PageRef, AccessError> {
        let page_no = offset / PAGE_SIZE;
        if !self.pages.contains_key(&page_no) {
            let page = self
                .handler
                .fault(page_no * PAGE_SIZE)
                .await
                .ok_or(AccessError::Unbacked { offset })?;
            self.pages.insert(page_no, page);
        }
        self.pages
            .get(&page_no)
            .ok_or(AccessError::Unbacked { offset })
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), AccessError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.handler.window_len() => Ok(()),
            _ => Err(AccessError::OutOfRange { offset }),
        }
    }

    /// Loads `dst.len()` bytes starting at `offset`.
    pub async fn load(&mut self, offset: usize, dst: &mut [u8]) -> Result<(), AccessError> {
        self.check_range(offset, dst.len())?;
        let mut done = 0;
        while done < dst.len() {
            let at = offset + done;
            let page = self.page(at).await?;
            done += page.read(at % PAGE_SIZE, &mut dst[done..]);
        }
        Ok(())
    }

    /// Stores `src` starting at `offset`.
    pub async fn store(&mut self, offset: usize, src: &[u8]) -> Result<(), AccessError> {
        self.check_range(offset, src.len())?;
        let mut done = 0;
        while done < src.len() {
            let at = offset + done;
            let page = self.page(at).await?;
            done += page.write(at % PAGE_SIZE, &src[done..]);
        }
        Ok(())
    }
}

impl<H: FaultHandler> std::fmt::Debug for MappedView<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedView")
            .field("window_len", &self.handler.window_len())
            .field("bound_pages", &self.pages.len())
            .finish()
    }
}
