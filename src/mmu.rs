// SPDX-License-Identifier: MPL-2.0

//! The MMU façade the pager drives.
//!
//! The façade turns host page faults into [`crate::fault`] calls and applies
//! the residency and permission changes the pager requests. It owns the
//! physical memory window and the backing-store pool; the pager touches
//! neither except through these calls and the read-only [`Mmu::pmem`] window.

use crate::vm::{perms::PagePerm, Pid, Vaddr};

/// The interface of the external MMU façade.
///
/// All calls are synchronous and non-blocking from the pager's view, and the
/// pager only issues them while holding its own lock.
pub trait Mmu: Send {
    /// Zeroes the physical frame at slot `frame`.
    fn zero_fill(&mut self, frame: usize);

    /// Maps `vaddr` of `pid` to the frame slot with the given permission.
    fn resident(&mut self, pid: Pid, vaddr: Vaddr, frame: usize, perm: PagePerm);

    /// Invalidates any mapping for `(pid, vaddr)`.
    fn nonresident(&mut self, pid: Pid, vaddr: Vaddr);

    /// Changes the permission of an existing mapping.
    fn chprot(&mut self, pid: Pid, vaddr: Vaddr, perm: PagePerm);

    /// Copies the contents of the block slot into the frame slot.
    fn disk_read(&mut self, block: usize, frame: usize);

    /// Copies the contents of the frame slot into the block slot.
    fn disk_write(&mut self, frame: usize, block: usize);

    /// The read-only physical-memory window, indexed by frame slot.
    fn pmem(&self) -> &[u8];
}

impl<M: Mmu + ?Sized> Mmu for Box<M> {
    fn zero_fill(&mut self, frame: usize) {
        (**self).zero_fill(frame)
    }

    fn resident(&mut self, pid: Pid, vaddr: Vaddr, frame: usize, perm: PagePerm) {
        (**self).resident(pid, vaddr, frame, perm)
    }

    fn nonresident(&mut self, pid: Pid, vaddr: Vaddr) {
        (**self).nonresident(pid, vaddr)
    }

    fn chprot(&mut self, pid: Pid, vaddr: Vaddr, perm: PagePerm) {
        (**self).chprot(pid, vaddr, perm)
    }

    fn disk_read(&mut self, block: usize, frame: usize) {
        (**self).disk_read(block, frame)
    }

    fn disk_write(&mut self, frame: usize, block: usize) {
        (**self).disk_write(frame, block)
    }

    fn pmem(&self) -> &[u8] {
        (**self).pmem()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::Mmu;
    use crate::vm::{perms::PagePerm, Pid, Vaddr, PAGE_SIZE};

    /// One recorded façade call.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub(crate) enum MmuOp {
        ZeroFill { frame: usize },
        Resident { pid: Pid, vaddr: Vaddr, frame: usize, perm: PagePerm },
        Nonresident { pid: Pid, vaddr: Vaddr },
        Chprot { pid: Pid, vaddr: Vaddr, perm: PagePerm },
        DiskRead { block: usize, frame: usize },
        DiskWrite { frame: usize, block: usize },
    }

    /// A façade that records every call and models the physical window and
    /// the block pool with real buffers, so write-back round trips are
    /// observable byte for byte.
    pub(crate) struct MockMmu {
        pmem: Vec<u8>,
        disk: Vec<u8>,
        ops: Vec<MmuOp>,
    }

    impl MockMmu {
        pub fn new(nframes: usize, nblocks: usize) -> Self {
            Self {
                pmem: vec![0; nframes * PAGE_SIZE],
                disk: vec![0; nblocks * PAGE_SIZE],
                ops: Vec::new(),
            }
        }

        /// The calls recorded so far, in issue order.
        pub fn ops(&self) -> &[MmuOp] {
            &self.ops
        }

        /// Drains the recorded calls.
        pub fn take_ops(&mut self) -> Vec<MmuOp> {
            core::mem::take(&mut self.ops)
        }

        /// The bytes of the frame slot, for simulating process stores.
        pub fn frame_mut(&mut self, frame: usize) -> &mut [u8] {
            &mut self.pmem[frame * PAGE_SIZE..][..PAGE_SIZE]
        }
    }

    impl Mmu for MockMmu {
        fn zero_fill(&mut self, frame: usize) {
            self.frame_mut(frame).fill(0);
            self.ops.push(MmuOp::ZeroFill { frame });
        }

        fn resident(&mut self, pid: Pid, vaddr: Vaddr, frame: usize, perm: PagePerm) {
            self.ops.push(MmuOp::Resident { pid, vaddr, frame, perm });
        }

        fn nonresident(&mut self, pid: Pid, vaddr: Vaddr) {
            self.ops.push(MmuOp::Nonresident { pid, vaddr });
        }

        fn chprot(&mut self, pid: Pid, vaddr: Vaddr, perm: PagePerm) {
            self.ops.push(MmuOp::Chprot { pid, vaddr, perm });
        }

        fn disk_read(&mut self, block: usize, frame: usize) {
            self.pmem[frame * PAGE_SIZE..][..PAGE_SIZE]
                .copy_from_slice(&self.disk[block * PAGE_SIZE..][..PAGE_SIZE]);
            self.ops.push(MmuOp::DiskRead { block, frame });
        }

        fn disk_write(&mut self, frame: usize, block: usize) {
            self.disk[block * PAGE_SIZE..][..PAGE_SIZE]
                .copy_from_slice(&self.pmem[frame * PAGE_SIZE..][..PAGE_SIZE]);
            self.ops.push(MmuOp::DiskWrite { frame, block });
        }

        fn pmem(&self) -> &[u8] {
            &self.pmem
        }
    }
}
