//! Counting semaphores with hand-off `post` semantics (SPEC_FULL.md §4.5).
//!
//! Same table-plus-free-list shape as [`crate::sync::mutex`], grounded on the same
//! `original_source/src/ksem.c` allocator pattern.

use lazy_static::lazy_static;
use spin::Mutex;

use crate::config::{QUEUE_SIZE, SEM_MAX};
use crate::error::{KernelError, KernelResult};
use crate::process::{Pid, QueueTag};
use crate::queue::BoundedQueue;

struct Entry {
    allocated: bool,
    count: i32,
    wait_queue: BoundedQueue<Pid, QUEUE_SIZE>,
}

impl Entry {
    fn empty() -> Entry {
        Entry {
            allocated: false,
            count: 0,
            wait_queue: BoundedQueue::new(),
        }
    }
}

pub struct SemaphoreTable {
    entries: [Entry; SEM_MAX],
    free_ids: BoundedQueue<u32, SEM_MAX>,
}

impl SemaphoreTable {
    fn new() -> SemaphoreTable {
        let mut free_ids = BoundedQueue::new();
        for i in 0..SEM_MAX as u32 {
            free_ids.enqueue(i).expect("SEM_MAX ids always fit their own free list");
        }
        SemaphoreTable {
            entries: core::array::from_fn(|_| Entry::empty()),
            free_ids,
        }
    }

    /// `sem_init` (SPEC_FULL.md §4.5): allocates an entry seeded with `initial`.
    pub fn init(&mut self, initial: i32) -> KernelResult<usize> {
        let id = self.free_ids.dequeue().map_err(|_| KernelError::Full)?;
        let entry = &mut self.entries[id as usize];
        entry.allocated = true;
        entry.count = initial;
        entry.wait_queue = BoundedQueue::new();
        Ok(id as usize)
    }

    fn entry(&mut self, id: usize) -> KernelResult<&mut Entry> {
        let entry = self.entries.get_mut(id).ok_or(KernelError::InvalidId)?;
        if !entry.allocated {
            return Err(KernelError::InvalidId);
        }
        Ok(entry)
    }

    /// `sem_destroy` (SPEC_FULL.md §4.5): only legal when idle.
    pub fn destroy(&mut self, id: usize) -> KernelResult<()> {
        let entry = self.entry(id)?;
        if entry.count != 0 || !entry.wait_queue.is_empty() {
            return Err(KernelError::Busy);
        }
        *entry = Entry::empty();
        self.free_ids
            .enqueue(id as u32)
            .expect("an id just vacated always fits back into the free list");
        Ok(())
    }

    /// `sem_wait` (SPEC_FULL.md §4.5).
    pub fn wait(&mut self, id: usize, active: Pid) -> KernelResult<i32> {
        let entry = self.entry(id)?;
        if entry.count == 0 {
            let _ = entry.wait_queue.enqueue(active);
            crate::scheduler::with(|sched| sched.block_active_on(QueueTag::Sem(id)));
            return Ok(0);
        }
        entry.count -= 1;
        Ok(entry.count)
    }

    /// `sem_post` (SPEC_FULL.md §4.5): increments, then immediately hands the token to one
    /// waiter if any are parked, decrementing the count right back down.
    pub fn post(&mut self, id: usize) -> KernelResult<i32> {
        let entry = self.entry(id)?;
        entry.count += 1;
        if let Ok(pid) = entry.wait_queue.dequeue() {
            entry.count -= 1;
            let count = entry.count;
            crate::scheduler::with(|sched| sched.readmit(pid));
            return Ok(count);
        }
        Ok(entry.count)
    }

    /// See `mutex::MutexTable::remove_waiter`'s doc comment — same contract.
    pub fn remove_waiter(&mut self, id: usize, pid: Pid) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.wait_queue.remove_first(|p| *p == pid);
        }
    }
}

lazy_static! {
    static ref SEMAPHORES: Mutex<SemaphoreTable> = Mutex::new(SemaphoreTable::new());
}

pub fn with<R>(f: impl FnOnce(&mut SemaphoreTable) -> R) -> R {
    f(&mut SEMAPHORES.lock())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_on_positive_count_decrements_without_blocking() {
        let mut table = SemaphoreTable::new();
        let id = table.init(1).unwrap();
        assert_eq!(table.wait(id, Pid(1)).unwrap(), 0);
    }

    #[test]
    fn post_increments_when_no_waiters() {
        let mut table = SemaphoreTable::new();
        let id = table.init(0).unwrap();
        assert_eq!(table.post(id).unwrap(), 1);
    }

    #[test]
    fn destroy_requires_idle_state() {
        let mut table = SemaphoreTable::new();
        let id = table.init(1).unwrap();
        assert!(table.destroy(id).is_err());
        table.wait(id, Pid(1)).unwrap();
        assert!(table.destroy(id).is_ok());
    }

    #[test]
    fn invalid_id_is_rejected() {
        let mut table = SemaphoreTable::new();
        assert_eq!(table.post(7), Err(KernelError::InvalidId));
    }

    #[test]
    fn destroyed_id_is_recycled() {
        let mut table = SemaphoreTable::new();
        let id = table.init(0).unwrap();
        table.destroy(id).unwrap();
        let reused = table.init(0).unwrap();
        assert_eq!(reused, id);
    }
}
