//! Timer callback table (SPEC_FULL.md §3): periodic callbacks independent of process scheduling,
//! distinct from the scheduler's own per-tick sleep-queue walk.
//!
//! Grounded directly on `original_source/src/timer.c`'s `timer_callback_register`/
//! `_unregister`/`timer_irq_handler`: a fixed table of `{callback, interval, repeat}` entries with
//! a free-list allocator identical in shape to the process table's, driven by a tick counter
//! rather than `Scheduler::tick`'s wall-clock-ish `run_time`/`cpu_time` bookkeeping.

use lazy_static::lazy_static;
use spin::Mutex;

use crate::config::TIMERS_MAX;
use crate::error::{KernelError, KernelResult};
use crate::queue::BoundedQueue;

struct Entry {
    callback: Option<fn()>,
    interval: u32,
    repeat: i32,
}

impl Entry {
    fn empty() -> Entry {
        Entry {
            callback: None,
            interval: 0,
            repeat: 0,
        }
    }
}

pub struct TimerTable {
    entries: [Entry; TIMERS_MAX],
    free_ids: BoundedQueue<u32, TIMERS_MAX>,
    ticks: u64,
}

impl TimerTable {
    fn new() -> TimerTable {
        let mut free_ids = BoundedQueue::new();
        for i in 0..TIMERS_MAX as u32 {
            free_ids.enqueue(i).expect("TIMERS_MAX ids always fit their own free list");
        }
        TimerTable {
            entries: core::array::from_fn(|_| Entry::empty()),
            free_ids,
            ticks: 0,
        }
    }

    /// `timer_callback_register` (SPEC_FULL.md §3): `repeat = -1` fires forever, `0` fires once
    /// and unregisters itself, positive values decrement once per firing.
    pub fn register(&mut self, callback: fn(), interval: u32, repeat: i32) -> KernelResult<usize> {
        if interval == 0 {
            return Err(KernelError::InvalidId);
        }
        let id = self.free_ids.dequeue().map_err(|_| KernelError::Full)?;
        self.entries[id as usize] = Entry {
            callback: Some(callback),
            interval,
            repeat,
        };
        Ok(id as usize)
    }

    /// `timer_callback_unregister`.
    pub fn unregister(&mut self, id: usize) -> KernelResult<()> {
        let entry = self.entries.get_mut(id).ok_or(KernelError::InvalidId)?;
        if entry.callback.is_none() {
            return Err(KernelError::InvalidId);
        }
        *entry = Entry::empty();
        self.free_ids
            .enqueue(id as u32)
            .expect("an id just vacated always fits back into the free list");
        Ok(())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// `timer_irq_handler`: bumps the tick count, then fires every due callback, unregistering
    /// the ones whose `repeat` has just reached zero.
    pub fn fire(&mut self) {
        self.ticks += 1;
        let due: [bool; TIMERS_MAX] = core::array::from_fn(|i| {
            self.entries[i]
                .callback
                .map(|_| self.ticks % self.entries[i].interval as u64 == 0)
                .unwrap_or(false)
        });

        for (id, &is_due) in due.iter().enumerate() {
            if !is_due {
                continue;
            }
            if let Some(callback) = self.entries[id].callback {
                callback();
            }
            match self.entries[id].repeat {
                r if r > 0 => self.entries[id].repeat -= 1,
                0 => {
                    let _ = self.unregister(id);
                }
                _ => {}
            }
        }
    }
}

lazy_static! {
    static ref TIMERS: Mutex<TimerTable> = Mutex::new(TimerTable::new());
}

pub fn with<R>(f: impl FnOnce(&mut TimerTable) -> R) -> R {
    f(&mut TIMERS.lock())
}

pub fn init() {
    crate::log_info!("timer callback table initialized, {} slots", TIMERS_MAX);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    static CALL_COUNT: AtomicU32 = AtomicU32::new(0);

    fn bump() {
        CALL_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn fires_exactly_on_its_interval() {
        let mut table = TimerTable::new();
        CALL_COUNT.store(0, Ordering::Relaxed);
        table.register(bump, 3, -1).unwrap();
        table.fire();
        table.fire();
        assert_eq!(CALL_COUNT.load(Ordering::Relaxed), 0);
        table.fire();
        assert_eq!(CALL_COUNT.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn zero_repeat_unregisters_itself_after_firing() {
        let mut table = TimerTable::new();
        CALL_COUNT.store(0, Ordering::Relaxed);
        let id = table.register(bump, 1, 0).unwrap();
        table.fire();
        assert_eq!(CALL_COUNT.load(Ordering::Relaxed), 1);
        assert_eq!(table.unregister(id), Err(KernelError::InvalidId));
    }

    #[test]
    fn positive_repeat_counts_down_then_stops() {
        let mut table = TimerTable::new();
        CALL_COUNT.store(0, Ordering::Relaxed);
        table.register(bump, 1, 1).unwrap();
        table.fire();
        table.fire();
        table.fire();
        assert_eq!(CALL_COUNT.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn negative_repeat_fires_forever() {
        let mut table = TimerTable::new();
        CALL_COUNT.store(0, Ordering::Relaxed);
        table.register(bump, 1, -1).unwrap();
        for _ in 0..5 {
            table.fire();
        }
        assert_eq!(CALL_COUNT.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn unregister_of_unknown_id_fails() {
        let mut table = TimerTable::new();
        assert_eq!(table.unregister(0), Err(KernelError::InvalidId));
    }

    #[test]
    fn exhausting_the_table_fails_the_next_register() {
        let mut table = TimerTable::new();
        for _ in 0..TIMERS_MAX {
            table.register(bump, 1, -1).unwrap();
        }
        assert_eq!(table.register(bump, 1, -1), Err(KernelError::Full));
    }
}
