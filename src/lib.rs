// SPDX-License-Identifier: MPL-2.0

//! A user-space demand-paging virtual-memory manager.
//!
//! The pager allocates virtual pages to client processes, binds them lazily
//! to a bounded pool of physical frames upon first access, and evicts frames
//! to a bounded backing-store pool with second-chance replacement. It drives
//! an external MMU façade ([`Mmu`]) so that the host delivers exactly the
//! page faults needed to advance the state machine: a first touch installs a
//! zero-filled read-only frame, a write attempt escalates the permission and
//! marks the page dirty, and a fault on an evicted page reads it back from
//! its block.
//!
//! The six operations are available both as methods on an owned [`Pager`]
//! and as process-wide entry points ([`init`], [`create`], [`extend`],
//! [`fault`], [`syslog`], [`destroy`]) serialized by a single lock.

mod error;
mod mmu;
mod pager;
mod prelude;
mod vm;

pub use self::{
    error::Error,
    mmu::Mmu,
    pager::{create, destroy, extend, fault, init, syslog, Pager, PagerStats},
    vm::{perms::PagePerm, Pid, Vaddr, NR_PAGES, PAGE_SIZE, VADDR_BASE, VADDR_MAX},
};

/// The result type which is returned from the APIs of this crate.
pub type Result<T> = core::result::Result<T, Error>;
