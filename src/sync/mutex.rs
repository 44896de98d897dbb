//! Recursive counting mutexes (SPEC_FULL.md §4.4).
//!
//! Grounded on `original_source/src/kmutex.c`'s table-of-entries-plus-free-list shape, the same
//! pattern the PCB allocator uses (`process::ProcessTable`) and the teacher's
//! `lazy_static!`-behind-`spin::Mutex` global idiom. `lock_count` deliberately conflates
//! recursion depth with waiter count, matching the source exactly rather than separating the two
//! — see DESIGN.md's Open Question decision for why.

use lazy_static::lazy_static;
use spin::Mutex;

use crate::config::{MUTEX_MAX, QUEUE_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::process::{Pid, QueueTag};
use crate::queue::BoundedQueue;

struct Entry {
    allocated: bool,
    lock_count: i32,
    owner: Option<Pid>,
    wait_queue: BoundedQueue<Pid, QUEUE_SIZE>,
}

impl Entry {
    fn empty() -> Entry {
        Entry {
            allocated: false,
            lock_count: 0,
            owner: None,
            wait_queue: BoundedQueue::new(),
        }
    }
}

pub struct MutexTable {
    entries: [Entry; MUTEX_MAX],
    free_ids: BoundedQueue<u32, MUTEX_MAX>,
}

impl MutexTable {
    fn new() -> MutexTable {
        let mut free_ids = BoundedQueue::new();
        for i in 0..MUTEX_MAX as u32 {
            free_ids.enqueue(i).expect("MUTEX_MAX ids always fit their own free list");
        }
        MutexTable {
            entries: core::array::from_fn(|_| Entry::empty()),
            free_ids,
        }
    }

    /// `mutex_init` (SPEC_FULL.md §4.4).
    pub fn init(&mut self) -> KernelResult<usize> {
        let id = self.free_ids.dequeue().map_err(|_| KernelError::Full)?;
        let entry = &mut self.entries[id as usize];
        entry.allocated = true;
        entry.lock_count = 0;
        entry.owner = None;
        entry.wait_queue = BoundedQueue::new();
        Ok(id as usize)
    }

    /// `mutex_destroy` (SPEC_FULL.md §4.4): fails while held.
    pub fn destroy(&mut self, id: usize) -> KernelResult<()> {
        let entry = self.entries.get_mut(id).ok_or(KernelError::InvalidId)?;
        if !entry.allocated {
            return Err(KernelError::InvalidId);
        }
        if entry.lock_count > 0 {
            return Err(KernelError::Busy);
        }
        *entry = Entry::empty();
        self.free_ids
            .enqueue(id as u32)
            .expect("an id just vacated always fits back into the free list");
        Ok(())
    }

    fn entry(&mut self, id: usize) -> KernelResult<&mut Entry> {
        let entry = self.entries.get_mut(id).ok_or(KernelError::InvalidId)?;
        if !entry.allocated {
            return Err(KernelError::InvalidId);
        }
        Ok(entry)
    }

    /// `mutex_lock` (SPEC_FULL.md §4.4). Returns the new `lock_count` on success; if the active
    /// process blocks, it has already been parked on this mutex's wait queue and removed from the
    /// scheduler by the time this returns.
    pub fn lock(&mut self, id: usize, active: Pid) -> KernelResult<i32> {
        let entry = self.entry(id)?;
        if entry.lock_count == 0 {
            entry.owner = Some(active);
            entry.lock_count = 1;
            return Ok(1);
        }
        if entry.owner == Some(active) {
            entry.lock_count += 1;
            return Ok(entry.lock_count);
        }
        entry.lock_count += 1;
        let _ = entry.wait_queue.enqueue(active);
        crate::scheduler::with(|sched| sched.block_active_on(QueueTag::Mutex(id)));
        Ok(self.entries[id].lock_count)
    }

    /// `mutex_unlock` (SPEC_FULL.md §4.4): decrements and returns the new count regardless of
    /// which process calls it, matching `kmutex_unlock`'s lack of an owner check exactly.
    pub fn unlock(&mut self, id: usize, _active: Pid) -> KernelResult<i32> {
        let entry = self.entry(id)?;
        if entry.lock_count == 0 {
            return Ok(0);
        }
        entry.lock_count -= 1;
        if entry.lock_count == 0 {
            entry.owner = None;
            return Ok(0);
        }
        let next_owner = entry.wait_queue.dequeue().ok();
        let count = entry.lock_count;
        if let Some(pid) = next_owner {
            entry.owner = Some(pid);
            crate::scheduler::with(|sched| sched.readmit(pid));
        }
        Ok(count)
    }

    /// Called by `scheduler::remove` when a blocked process is destroyed out from under this
    /// mutex's wait queue (SPEC_FULL.md §5's "`proc_destroy` on a blocked process ... extricates
    /// it cleanly"). Must never touch the scheduler itself — the caller already holds its lock.
    pub fn remove_waiter(&mut self, id: usize, pid: Pid) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.wait_queue.remove_first(|p| *p == pid);
        }
    }
}

lazy_static! {
    static ref MUTEXES: Mutex<MutexTable> = Mutex::new(MutexTable::new());
}

pub fn with<R>(f: impl FnOnce(&mut MutexTable) -> R) -> R {
    f(&mut MUTEXES.lock())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_lock_succeeds_immediately() {
        let mut table = MutexTable::new();
        let id = table.init().unwrap();
        assert_eq!(table.lock(id, Pid(1)).unwrap(), 1);
    }

    #[test]
    fn recursive_lock_by_owner_increments_count() {
        let mut table = MutexTable::new();
        let id = table.init().unwrap();
        table.lock(id, Pid(1)).unwrap();
        assert_eq!(table.lock(id, Pid(1)).unwrap(), 2);
        assert_eq!(table.unlock(id, Pid(1)).unwrap(), 1);
        assert_eq!(table.unlock(id, Pid(1)).unwrap(), 0);
    }

    #[test]
    fn unlock_on_unheld_mutex_is_a_no_op() {
        let mut table = MutexTable::new();
        let id = table.init().unwrap();
        assert_eq!(table.unlock(id, Pid(1)).unwrap(), 0);
    }

    #[test]
    fn destroy_fails_while_held() {
        let mut table = MutexTable::new();
        let id = table.init().unwrap();
        table.lock(id, Pid(1)).unwrap();
        assert_eq!(table.destroy(id), Err(KernelError::Busy));
        table.unlock(id, Pid(1)).unwrap();
        assert!(table.destroy(id).is_ok());
    }

    #[test]
    fn unlock_by_a_non_owner_still_decrements() {
        let mut table = MutexTable::new();
        let id = table.init().unwrap();
        table.lock(id, Pid(1)).unwrap();
        assert_eq!(table.unlock(id, Pid(2)).unwrap(), 0);
    }

    #[test]
    fn invalid_id_is_rejected() {
        let mut table = MutexTable::new();
        assert_eq!(table.lock(3, Pid(1)), Err(KernelError::InvalidId));
    }

    #[test]
    fn destroyed_id_is_recycled() {
        let mut table = MutexTable::new();
        let id = table.init().unwrap();
        table.destroy(id).unwrap();
        let reused = table.init().unwrap();
        assert_eq!(reused, id);
    }
}
