//! Kernel heap, backing the `alloc::boxed::Box` each process's kernel stack is allocated in.
//!
//! The teacher's own `memory/mod.rs` calls out to a `crate::allocator::init_heap` that was never
//! actually written anywhere in that repo — there is no heap module to adapt. Grounded instead on
//! `linked_list_allocator`, the crate the rest of the example pack reaches for in exactly this
//! situation (a bump/free-list allocator backing a static `no_std` heap region with no virtual
//! memory manager underneath it).
//!
//! There is no paging here, so the heap is simply a static array living in `.bss` rather than a
//! range mapped in by a bootloader-provided memory map.

use linked_list_allocator::LockedHeap;

use crate::config::{PROC_MAX, PROC_STACK_SIZE};

/// Must cover `PROC_MAX` boxed kernel stacks (the dominant consumer by far) plus headroom for
/// allocator bookkeeping, so that `ProcessTable::create` can actually reach `PROC_MAX` live
/// processes before `KernelError::Full` — not quietly abort in the alloc-error handler first.
const HEAP_SIZE: usize = PROC_MAX * PROC_STACK_SIZE + 64 * 1024;

#[repr(align(16))]
struct HeapRegion([u8; HEAP_SIZE]);

static mut HEAP: HeapRegion = HeapRegion([0; HEAP_SIZE]);

#[cfg(not(test))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initializes the global allocator over the static heap region. Must run once, before the first
/// `Box`/`alloc` call (in practice, before `process::init` seeds the idle process).
///
/// # Safety
/// Must be called exactly once, before any allocation is attempted.
#[cfg(not(test))]
pub fn init() {
    unsafe {
        let start = core::ptr::addr_of_mut!(HEAP) as *mut u8;
        ALLOCATOR.lock().init(start, HEAP_SIZE);
    }
    crate::log_info!("heap initialized, {} bytes", HEAP_SIZE);
}
