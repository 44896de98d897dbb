//! Blocking synchronization primitives (SPEC_FULL.md §4.4/§4.5): recursive mutexes and counting
//! semaphores, each backed by a small fixed-capacity table and its own wait queue.

pub mod mutex;
pub mod semaphore;

pub fn init() {
    crate::log_info!("synchronization primitives initialized");
}
