// SPDX-License-Identifier: MPL-2.0

//! Per-process virtual maps.

use crate::vm::{Vaddr, NR_PAGES};

/// The residency of one extended page.
///
/// The variants are mutually exclusive by construction: a page is backed by
/// exactly one frame slot, exactly one block slot, or nothing at all.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum PageState {
    /// Extended but never touched. Holds a block reservation, no content.
    Reserved,
    /// Currently backed by the frame slot.
    Resident { frame: usize },
    /// Swapped out to the block slot. `dirty` is sticky: it records whether
    /// the page was ever written, deciding write-back on later evictions.
    Swapped { block: usize, dirty: bool },
}

/// The virtual map of one process.
///
/// Page `index` backs the address `Vaddr::from_page_index(index)`; extension
/// only appends, so the reserved indices always form the dense prefix
/// `[0, n)` and the address space grows contiguously from `VADDR_BASE`.
pub(crate) struct ProcessVm {
    pages: Vec<PageState>,
}

impl ProcessVm {
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// The number of extended pages.
    pub fn nr_pages(&self) -> usize {
        self.pages.len()
    }

    /// Reserves the next page, returning its address, or `None` when the
    /// paged range is exhausted.
    pub fn extend(&mut self) -> Option<Vaddr> {
        if self.pages.len() == NR_PAGES {
            return None;
        }
        self.pages.push(PageState::Reserved);
        Some(Vaddr::from_page_index(self.pages.len() - 1))
    }

    /// The state of page `index`, or `None` beyond the reserved prefix.
    pub fn page(&self, index: usize) -> Option<PageState> {
        self.pages.get(index).copied()
    }

    pub fn set_page(&mut self, index: usize, state: PageState) {
        self.pages[index] = state;
    }

    /// Iterates over the `(index, state)` pairs of the reserved prefix.
    #[cfg(test)]
    pub fn pages(&self) -> impl Iterator<Item = (usize, PageState)> + '_ {
        self.pages.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vm::VADDR_BASE;

    #[test]
    fn extend_appends_a_dense_prefix() {
        let mut vm = ProcessVm::new();
        let first = vm.extend().unwrap();
        let second = vm.extend().unwrap();
        assert_eq!(first, Vaddr::new(VADDR_BASE));
        assert_eq!(second, Vaddr::from_page_index(1));
        assert_eq!(vm.nr_pages(), 2);
        assert_eq!(vm.page(0), Some(PageState::Reserved));
        assert_eq!(vm.page(1), Some(PageState::Reserved));
    }

    #[test]
    fn pages_beyond_the_prefix_do_not_exist() {
        let mut vm = ProcessVm::new();
        vm.extend().unwrap();
        assert_eq!(vm.page(1), None);
    }
}
