//! Compile-time configuration constants.
//!
//! Mirrors the `#define`s scattered across the original kernel's headers, collected into one
//! place and given real types so they participate in type checking instead of textual
//! substitution.

/// Maximum number of simultaneously allocated processes, idle process included.
pub const PROC_MAX: usize = 32;

/// Size in bytes of each process's kernel stack (the original's `KSTACK_SIZE`).
pub const PROC_STACK_SIZE: usize = 16384;

/// Maximum bytes in a process's display name, including any NUL padding.
pub const PROC_NAME_LEN: usize = 32;

/// Maximum simultaneously allocated mutexes.
pub const MUTEX_MAX: usize = 16;

/// Maximum simultaneously allocated semaphores.
pub const SEM_MAX: usize = 16;

/// Capacity of a bounded (pid/id) queue. Sized to the largest table that parks entries on one:
/// the process table itself.
pub const QUEUE_SIZE: usize = PROC_MAX;

/// Capacity, in bytes, of one TTY-facing ring buffer.
pub const RINGBUF_SIZE: usize = 4096;

/// Maximum simultaneously registered timer callbacks.
pub const TIMERS_MAX: usize = 16;

/// Number of ticks a process may hold the CPU before being preempted.
pub const SCHEDULER_TIMESLICE: i32 = 10;

/// Timer interrupt frequency; also the divisor used by `SYS_GET_TIME`.
pub const TICKS_PER_SECOND: u64 = 100;

/// Name reported by `SYS_GET_NAME`.
pub const OS_NAME: &str = "eduOS";

/// Number of TTYs the kernel owns. Each process's `io[2]` points into one of these.
pub const TTY_MAX: usize = 4;
