// SPDX-License-Identifier: MPL-2.0

//! The pager core: the state machine behind the six public operations.
//!
//! All mutable pager state (the frame table, the block table, the process
//! registry and the clock hand) lives in a single [`Pager`] aggregate. The
//! process-wide instance sits behind one lock; every entry point acquires it
//! on entry and releases it on every exit path.

mod clock;
mod process;
mod table;

use core::fmt::Write as _;

use spin::{Mutex, Once};

use self::{
    clock::ClockHand,
    process::{PageState, ProcessVm},
    table::{BlockDesc, BlockTable, FrameDesc, FrameTable},
};
use crate::{
    mmu::Mmu,
    prelude::*,
    vm::{perms::PagePerm, Pid, Vaddr, PAGE_SIZE},
};

/// A demand pager over a bounded pool of frames and blocks.
///
/// The process-wide instance is installed by [`init`] and driven through the
/// module-level entry points; isolated instances can be constructed directly
/// for embedding and testing.
pub struct Pager<M: Mmu> {
    frames: FrameTable,
    blocks: BlockTable,
    procs: BTreeMap<Pid, ProcessVm>,
    clock: ClockHand,
    mmu: M,
}

/// A snapshot of pool occupancy.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PagerStats {
    pub nr_frames: usize,
    pub nr_free_frames: usize,
    pub nr_blocks: usize,
    /// Unpromised block reservations: what `extend` can still hand out.
    pub nr_free_blocks: usize,
    pub nr_processes: usize,
}

impl<M: Mmu> Pager<M> {
    /// Creates a pager over `nframes` frame slots and `nblocks` block
    /// slots, driving the given MMU façade.
    pub fn new(nframes: usize, nblocks: usize, mmu: M) -> Self {
        Self {
            frames: FrameTable::new(nframes),
            blocks: BlockTable::new(nblocks),
            procs: BTreeMap::new(),
            clock: ClockHand::new(),
            mmu,
        }
    }

    /// Registers a new process with an empty virtual map.
    ///
    /// # Panics
    ///
    /// Panics if `pid` is already registered.
    pub fn create(&mut self, pid: Pid) {
        let old = self.procs.insert(pid, ProcessVm::new());
        assert!(old.is_none(), "process {} created twice", pid);
    }

    /// Grows the process's address space by one page, returning the new
    /// page's address.
    ///
    /// The page only takes a backing-store reservation here; it becomes
    /// resident on first access. Returns `None` when the block pool has no
    /// slot left to promise (or the paged range is exhausted).
    pub fn extend(&mut self, pid: Pid) -> Option<Vaddr> {
        let vm = self.procs.get_mut(&pid)?;
        if !self.blocks.reserve() {
            return None;
        }
        let Some(vaddr) = vm.extend() else {
            self.blocks.release(1);
            return None;
        };
        trace!("extend: pid {} -> {:?}", pid, vaddr);
        Some(vaddr)
    }

    /// Handles a page fault of `pid` at `addr`.
    ///
    /// The address may be unaligned; it is aligned down to its page. Faults
    /// for memory never promised to `pid` are ignored: the MMU may deliver
    /// spurious or stale traps while a process is torn down.
    pub fn fault(&mut self, pid: Pid, addr: Vaddr) {
        if !addr.is_in_range() {
            trace!("fault: pid {} at {:?} out of range, ignored", pid, addr);
            return;
        }
        let addr = addr.align_down();
        let index = addr.page_index();
        let Some(vm) = self.procs.get(&pid) else {
            trace!("fault: unknown pid {}, ignored", pid);
            return;
        };
        let Some(state) = vm.page(index) else {
            trace!("fault: pid {} at {:?} never extended, ignored", pid, addr);
            return;
        };
        // A page simultaneously in a frame and a block is unrecoverable.
        debug_assert!(
            self.frames.lookup(pid, addr).is_none() || self.blocks.lookup(pid, addr).is_none(),
            "page {:?} of pid {} is both resident and swapped",
            addr,
            pid
        );
        match state {
            PageState::Reserved => self.first_touch(pid, addr, index),
            PageState::Resident { frame } => self.escalate(pid, addr, frame),
            PageState::Swapped { block, dirty } => self.swap_in(pid, addr, index, block, dirty),
        }
    }

    /// First touch of a reserved page: bind it to a zero-filled frame with
    /// read access.
    fn first_touch(&mut self, pid: Pid, addr: Vaddr, index: usize) {
        debug_assert!(self.frames.lookup(pid, addr).is_none());
        debug_assert!(self.blocks.lookup(pid, addr).is_none());
        let frame = self.bind_frame(FrameDesc::new(pid, addr, PagePerm::R));
        self.mmu.zero_fill(frame);
        self.mmu.resident(pid, addr, frame, PagePerm::R);
        self.procs
            .get_mut(&pid)
            .unwrap()
            .set_page(index, PageState::Resident { frame });
        debug!("page in: pid {} at {:?} -> frame {} (zero fill)", pid, addr, frame);
    }

    /// A fault on a resident page: either the clock demoted it to no-access
    /// (give read back) or a write hit a read-only mapping (escalate to
    /// read-write and mark the page dirty).
    fn escalate(&mut self, pid: Pid, addr: Vaddr, frame: usize) {
        let desc = self.frames.get_mut(frame).unwrap();
        debug_assert!(desc.pid == pid && desc.vaddr == addr);
        desc.referenced = true;
        if desc.perm.is_empty() {
            desc.perm = PagePerm::R;
            self.mmu.chprot(pid, addr, PagePerm::R);
        } else if desc.perm == PagePerm::R {
            desc.perm = PagePerm::RW;
            desc.dirty = true;
            self.mmu.chprot(pid, addr, PagePerm::RW);
        }
        // Already read-write: a spurious fault leaves everything unchanged.
    }

    /// A fault on a swapped page: free a frame, read the block back in, and
    /// make the page resident with read access.
    fn swap_in(&mut self, pid: Pid, addr: Vaddr, index: usize, block: usize, dirty: bool) {
        debug_assert!(self.frames.lookup(pid, addr).is_none());
        let mut desc = FrameDesc::new(pid, addr, PagePerm::R);
        desc.referenced = true;
        // The sticky dirty bit rides back in, so a later eviction without
        // further writes still writes the content back.
        desc.dirty = dirty;
        let frame = self.bind_frame(desc);
        debug_assert!(
            matches!(self.blocks.get(block), Some(desc) if desc.pid == pid && desc.vaddr == addr)
        );
        self.blocks.take(block);
        self.mmu.disk_read(block, frame);
        self.mmu.resident(pid, addr, frame, PagePerm::R);
        self.procs
            .get_mut(&pid)
            .unwrap()
            .set_page(index, PageState::Resident { frame });
        debug!("page in: pid {} at {:?} -> frame {} (block {})", pid, addr, frame, block);
    }

    /// Takes a free frame slot for `desc`, evicting a victim when none is
    /// free.
    fn bind_frame(&mut self, desc: FrameDesc) -> usize {
        if let Some(frame) = self.frames.insert(desc) {
            return frame;
        }
        let victim = self.clock.find_victim(&mut self.frames, &mut self.mmu);
        self.evict(victim);
        // The victim's slot is the only free one.
        self.frames.insert(desc).unwrap()
    }

    /// Evicts the occupant of `slot` to the backing store.
    fn evict(&mut self, slot: usize) {
        let Some(desc) = self.frames.take(slot) else {
            return;
        };
        let block = self.blocks.place(
            slot,
            BlockDesc {
                pid: desc.pid,
                vaddr: desc.vaddr,
                dirty: desc.dirty,
            },
        );
        if desc.dirty {
            self.mmu.disk_write(slot, block);
        }
        self.mmu.nonresident(desc.pid, desc.vaddr);
        self.procs
            .get_mut(&desc.pid)
            .unwrap()
            .set_page(
                desc.vaddr.page_index(),
                PageState::Swapped {
                    block,
                    dirty: desc.dirty,
                },
            );
        debug!(
            "page out: pid {} at {:?} -> block {} (dirty: {})",
            desc.pid, desc.vaddr, block, desc.dirty
        );
    }

    /// Renders `len` bytes starting at `addr` as lowercase hex.
    ///
    /// Bytes of resident pages are read through the façade's physical
    /// window; a page that is not resident reads as zeros (a never-touched
    /// page has no content yet). Permissions and reference bits are left
    /// untouched.
    pub fn syslog(&self, pid: Pid, addr: Vaddr, len: usize) -> Result<String> {
        if !addr.is_in_range() {
            return Err(Error::InvalidAddress);
        }
        let vm = self.procs.get(&pid).ok_or(Error::NoSuchProcess)?;
        let pmem = self.mmu.pmem();
        let mut line = String::with_capacity(len * 2);
        for offset in 0..len {
            let byte_addr = Vaddr::new(addr.as_usize() + offset);
            if !byte_addr.is_in_range() {
                return Err(Error::InvalidAddress);
            }
            let state = vm.page(byte_addr.page_index()).ok_or(Error::NotAllocated)?;
            let byte = match state {
                PageState::Resident { frame } => {
                    debug_assert!(matches!(self.frames.get(frame), Some(desc) if desc.pid == pid));
                    pmem[frame * PAGE_SIZE + byte_addr.page_offset()]
                }
                PageState::Reserved | PageState::Swapped { .. } => 0,
            };
            write!(line, "{:02x}", byte).unwrap();
        }
        Ok(line)
    }

    /// Tears down every resource owned by `pid`: its frame slots, block
    /// slots, reservations and virtual map. Unknown pids are ignored.
    ///
    /// No MMU calls are issued; the harness tears the process itself down.
    pub fn destroy(&mut self, pid: Pid) {
        let Some(vm) = self.procs.remove(&pid) else {
            return;
        };
        self.frames.evict_all(pid);
        self.blocks.evict_all(pid);
        self.blocks.release(vm.nr_pages());
        debug!("destroy: pid {} released {} pages", pid, vm.nr_pages());
    }

    /// A snapshot of pool occupancy.
    pub fn stats(&self) -> PagerStats {
        PagerStats {
            nr_frames: self.frames.len(),
            nr_free_frames: self.frames.nr_free(),
            nr_blocks: self.blocks.len(),
            nr_free_blocks: self.blocks.nr_free(),
            nr_processes: self.procs.len(),
        }
    }
}

static PAGER: Once<Mutex<Pager<Box<dyn Mmu>>>> = Once::new();

fn pager() -> &'static Mutex<Pager<Box<dyn Mmu>>> {
    PAGER.get().expect("the pager is not initialized")
}

/// Installs the process-wide pager over `nframes` frame slots and `nblocks`
/// block slots, driving the given MMU façade. Later calls are ignored.
pub fn init(nframes: usize, nblocks: usize, mmu: Box<dyn Mmu>) {
    PAGER.call_once(|| Mutex::new(Pager::new(nframes, nblocks, mmu)));
}

/// Registers a new process. See [`Pager::create`].
pub fn create(pid: Pid) {
    pager().lock().create(pid)
}

/// Grows a process's address space by one page. See [`Pager::extend`].
pub fn extend(pid: Pid) -> Option<Vaddr> {
    pager().lock().extend(pid)
}

/// Handles a page fault. See [`Pager::fault`].
pub fn fault(pid: Pid, addr: usize) {
    pager().lock().fault(pid, Vaddr::new(addr))
}

/// Prints `len` bytes starting at `addr` in lowercase hex on one
/// newline-terminated line. See [`Pager::syslog`].
pub fn syslog(pid: Pid, addr: usize, len: usize) -> Result<()> {
    let line = pager().lock().syslog(pid, Vaddr::new(addr), len)?;
    println!("{}", line);
    Ok(())
}

/// Tears down a process. See [`Pager::destroy`].
pub fn destroy(pid: Pid) {
    pager().lock().destroy(pid)
}
