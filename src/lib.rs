#![cfg_attr(not(test), no_std)]
#![feature(abi_x86_interrupt)]

//! eduOS: a preemptive, single-CPU, round-robin kernel (SPEC_FULL.md).
//!
//! Boot order mirrors `original_source/src/main.c`'s `kernel_main`: bring up the serial sink first
//! so every later `init()` can log through it, then the heap (process stacks need `Box`), then
//! interrupts, then the timer callback table, then the scheduler (which registers its own
//! per-tick bookkeeping as a timer callback, just as `scheduler_init` does in the source), then
//! the remaining sync/syscall/driver subsystems.

extern crate alloc;

pub mod allocator;
pub mod config;
pub mod drivers;
pub mod error;
#[macro_use]
pub mod kernel;
pub mod interrupts;
pub mod process;
pub mod queue;
pub mod ringbuf;
pub mod scheduler;
pub mod serial;
pub mod sync;
pub mod syscalls;
pub mod timer;
pub mod trap;

#[cfg(not(test))]
use core::panic::PanicInfo;

#[cfg(not(test))]
#[no_mangle]
pub extern "C" fn _start() -> ! {
    serial::init();
    log_info!("eduOS booting.");

    allocator::init();
    interrupts::init();
    timer::init();
    scheduler::init();
    sync::init();
    syscalls::init();
    drivers::init();

    x86_64::instructions::interrupts::enable();
    log_info!("eduOS is running.");

    loop {
        x86_64::instructions::hlt();
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log_error!("{}", info);
    loop {
        x86_64::instructions::interrupts::disable();
        x86_64::instructions::hlt();
    }
}
