//! Process control block and the fixed-size process table/allocator (SPEC_FULL.md §3/§4.2).
//!
//! Grounded on `original_source/src/kproc.c`'s allocator shape and synthetic-trap-frame
//! construction; the general shape of a Rust process struct (owned boxed stack, enum state) is
//! grounded on the teacher's `scheduler/task.rs`, stripped of every Unix-process-model field
//! (`parent_pid`, `children`, `exit_status`, `page_table`, `fd_table`, ...) this spec's PCB does
//! not have.
//!
//! Each stack is heap-allocated (`Box<[u8; PROC_STACK_SIZE]>`, see [`crate::allocator`]) rather
//! than stored inline in the `Pcb`: `trap_frame` is a raw pointer into it, and a `Pcb` moving
//! around (the whole `ProcessTable` is itself a value the scheduler owns and can move) must never
//! invalidate that pointer. A `Box`'s heap allocation doesn't move when the `Box` does.

extern crate alloc;

use alloc::boxed::Box;

use crate::config::{PROC_MAX, PROC_NAME_LEN, PROC_STACK_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::queue::BoundedQueue;
use crate::trap::TrapFrame;

/// A process identifier, unique over the kernel's lifetime (monotonically assigned, never
/// reused even though table indices are).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pid(pub u32);

/// pid 0 is always the idle process; it is seeded at boot and can never be destroyed.
pub const IDLE_PID: Pid = Pid(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    None,
    Idle,
    Active,
    Sleeping,
    Waiting,
}

/// Advisory only: this kernel never changes privilege level, so `Kernel` vs `User` informs
/// nothing but bookkeeping/debug output (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcKind {
    Kernel,
    User,
}

/// Identifies which queue a PCB is currently parked on — the table-indexed "tagged variant"
/// design note calls for instead of a raw back-pointer (SPEC_FULL.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTag {
    Run,
    Sleep,
    Mutex(usize),
    Sem(usize),
}

/// A weak reference to one of a TTY's two ring buffers (SPEC_FULL.md §3 `io[2]`). The TTY table
/// itself lives in `drivers::tty`; this type only names which one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoHandle {
    pub tty: usize,
    pub is_input: bool,
}

/// A bounded display name, stored inline rather than heap-allocated (mirrors the original's
/// `char name[PROC_NAME_LEN]`).
#[derive(Clone, Copy)]
pub struct ProcName {
    bytes: [u8; PROC_NAME_LEN],
    len: usize,
}

impl ProcName {
    pub fn new(name: &str) -> ProcName {
        let mut bytes = [0u8; PROC_NAME_LEN];
        let len = core::cmp::min(name.len(), PROC_NAME_LEN);
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        ProcName { bytes, len }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }
}

impl core::fmt::Debug for ProcName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// The per-process kernel record (SPEC_FULL.md §3).
pub struct Pcb {
    pub pid: Pid,
    pub state: ProcState,
    pub kind: ProcKind,
    pub name: ProcName,
    pub trap_frame: *mut TrapFrame,
    pub stack: Option<Box<[u8; PROC_STACK_SIZE]>>,
    pub scheduler_queue: Option<QueueTag>,
    pub sleep_time: i32,
    pub run_time: u64,
    pub cpu_time: i32,
    pub start_time: u64,
    pub io: [Option<IoHandle>; 2],
}

// SAFETY: `trap_frame` is a raw pointer into this Pcb's own heap-allocated stack, never aliased
// by another thread; this is a single-CPU kernel and every `Pcb` is only ever touched while
// holding the global `Mutex<Scheduler>` lock (see `scheduler::SCHEDULER`).
unsafe impl Send for Pcb {}

impl Pcb {
    const fn empty() -> Pcb {
        Pcb {
            pid: Pid(0),
            state: ProcState::None,
            kind: ProcKind::Kernel,
            name: ProcName {
                bytes: [0; PROC_NAME_LEN],
                len: 0,
            },
            trap_frame: core::ptr::null_mut(),
            stack: None,
            scheduler_queue: None,
            sleep_time: 0,
            run_time: 0,
            cpu_time: 0,
            start_time: 0,
            io: [None, None],
        }
    }

    /// Resets every field to its zero/None state, as `proc_destroy` does before returning the
    /// index to the free list.
    fn clear(&mut self) {
        *self = Pcb::empty();
    }
}

/// `PROC_IO_IN`/`PROC_IO_OUT` indices into `Pcb::io`, per `original_source/include/syscall_common.h`.
pub const PROC_IO_IN: usize = 0;
pub const PROC_IO_OUT: usize = 1;

/// Static array of PCBs plus an id-recycling free list (SPEC_FULL.md §4.2). Table indices and
/// pids are deliberately distinct newtypes in this crate, but since pids are never reused an
/// index and the pid it currently holds usually coincide after boot; `pid_to_proc` never assumes
/// they do.
pub struct ProcessTable {
    procs: [Pcb; PROC_MAX],
    free_indices: BoundedQueue<u32, PROC_MAX>,
    next_pid: u32,
    current_tick: u64,
}

impl ProcessTable {
    pub fn new() -> ProcessTable {
        const EMPTY: Pcb = Pcb::empty();
        let mut free_indices = BoundedQueue::new();
        for i in 0..PROC_MAX as u32 {
            free_indices.enqueue(i).expect("PROC_MAX indices always fit their own free list");
        }
        ProcessTable {
            procs: [EMPTY; PROC_MAX],
            free_indices,
            next_pid: 0,
            current_tick: 0,
        }
    }

    pub fn advance_tick(&mut self) {
        self.current_tick += 1;
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Pops a free index, fills in the PCB, and writes the synthetic trap frame at the top of a
    /// freshly boxed stack. Does **not** enqueue it on the scheduler's run queue — the caller
    /// (`scheduler::add`) does that, matching the source's `kproc_create` → `scheduler_add`
    /// split of responsibilities.
    pub fn create(
        &mut self,
        entry: extern "C" fn() -> !,
        name: &str,
        kind: ProcKind,
    ) -> KernelResult<Pid> {
        let index = self.free_indices.dequeue().map_err(|_| KernelError::Full)?;
        let pid = Pid(self.next_pid);
        self.next_pid += 1;

        let mut stack = Box::new([0u8; PROC_STACK_SIZE]);
        let frame = TrapFrame::synthetic(entry);
        let frame_offset = PROC_STACK_SIZE - core::mem::size_of::<TrapFrame>();
        let frame_ptr = unsafe { stack.as_mut_ptr().add(frame_offset) as *mut TrapFrame };
        unsafe { frame_ptr.write(frame) };

        let pcb = &mut self.procs[index as usize];
        pcb.pid = pid;
        pcb.state = ProcState::None; // scheduler::add transitions this to Idle.
        pcb.kind = kind;
        pcb.name = ProcName::new(name);
        pcb.trap_frame = frame_ptr;
        pcb.stack = Some(stack);
        pcb.scheduler_queue = None;
        pcb.sleep_time = 0;
        pcb.run_time = 0;
        pcb.cpu_time = 0;
        pcb.start_time = self.current_tick;
        pcb.io = [None, None];

        Ok(pid)
    }

    /// Zeroes the PCB and its stack and returns the index to the free list. Callers must have
    /// already removed the PCB from whichever scheduler queue held it.
    pub fn destroy_by_index(&mut self, index: usize) {
        if let Some(stack) = self.procs[index].stack.as_mut() {
            stack.fill(0);
        }
        self.procs[index].clear();
        self.free_indices
            .enqueue(index as u32)
            .expect("an index just vacated always fits back into the free list");
    }

    /// O(PROC_MAX) linear scan, per SPEC_FULL.md §4.2.
    pub fn pid_to_proc(&self, pid: Pid) -> Option<&Pcb> {
        self.procs
            .iter()
            .find(|p| p.state != ProcState::None && p.pid == pid)
    }

    pub fn pid_to_proc_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.procs
            .iter_mut()
            .find(|p| p.state != ProcState::None && p.pid == pid)
    }

    pub fn index_of(&self, pid: Pid) -> Option<usize> {
        self.procs
            .iter()
            .position(|p| p.state != ProcState::None && p.pid == pid)
    }

    /// O(1) direct index lookup, per SPEC_FULL.md §4.2.
    pub fn entry_to_proc(&self, index: usize) -> Option<&Pcb> {
        self.procs.get(index).filter(|p| p.state != ProcState::None)
    }

    pub fn entry_to_proc_mut(&mut self, index: usize) -> Option<&mut Pcb> {
        self.procs
            .get_mut(index)
            .filter(|p| p.state != ProcState::None)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.procs.iter().filter(|p| p.state != ProcState::None)
    }

    pub fn free_count(&self) -> usize {
        self.free_indices.len()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy_entry() -> ! {
        loop {}
    }

    #[test]
    fn create_seeds_pcb_and_synthetic_frame() {
        let mut table = ProcessTable::new();
        let pid = table.create(dummy_entry, "alpha", ProcKind::User).unwrap();
        let pcb = table.pid_to_proc(pid).unwrap();
        assert_eq!(pcb.name.as_str(), "alpha");
        assert!(!pcb.trap_frame.is_null());
        unsafe {
            assert_eq!((*pcb.trap_frame).rip, dummy_entry as usize as u64);
        }
    }

    #[test]
    fn pids_are_never_reused_even_after_destroy() {
        let mut table = ProcessTable::new();
        let first = table.create(dummy_entry, "a", ProcKind::User).unwrap();
        let index = table.index_of(first).unwrap();
        table.destroy_by_index(index);
        let second = table.create(dummy_entry, "b", ProcKind::User).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn exhausting_the_table_fails_the_next_create() {
        let mut table = ProcessTable::new();
        for i in 0..PROC_MAX {
            table
                .create(dummy_entry, "p", ProcKind::User)
                .unwrap_or_else(|_| panic!("create {i} should succeed"));
        }
        assert_eq!(table.create(dummy_entry, "overflow", ProcKind::User), Err(KernelError::Full));
    }

    #[test]
    fn destroyed_index_returns_to_free_list_tail() {
        let mut table = ProcessTable::new();
        for _ in 0..PROC_MAX {
            table.create(dummy_entry, "p", ProcKind::User).unwrap();
        }
        let victim_pid = table.pid_to_proc(Pid(3)).map(|p| p.pid).unwrap();
        let victim_index = table.index_of(victim_pid).unwrap();
        table.destroy_by_index(victim_index);
        let recreated = table.create(dummy_entry, "reused", ProcKind::User).unwrap();
        assert_eq!(table.index_of(recreated), Some(victim_index));
    }

    #[test]
    fn entry_to_proc_is_direct_index_lookup() {
        let mut table = ProcessTable::new();
        let pid = table.create(dummy_entry, "indexed", ProcKind::User).unwrap();
        let index = table.index_of(pid).unwrap();
        assert_eq!(table.entry_to_proc(index).unwrap().pid, pid);
    }
}
