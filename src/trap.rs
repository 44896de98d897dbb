//! The single kernel entry point (SPEC_FULL.md §4.6/§9) and the trap frame it operates on.
//!
//! This is one of the two `unsafe` boundaries the design notes call for — the other is the PIC
//! port I/O wrapped by `pic8259` inside `interrupts::idt`. Every interrupt vector this kernel
//! installs (timer, keyboard, syscall) shares the same entry stub and the same
//! [`kernel_context_enter`], generalizing the teacher's syscall-only naked-asm trampoline
//! (`interrupts/usermode.rs`, now removed) into the uniform discipline
//! `original_source/src/kernel.c`'s `kernel_context_enter` describes.

use core::arch::naked_asm;

use crate::interrupts::idt;
use crate::scheduler;

/// IRQ vector numbers this kernel installs handlers for (SPEC_FULL.md §6).
pub const IRQ_TIMER: u8 = 0x20;
pub const IRQ_KEYBOARD: u8 = 0x21;
pub const IRQ_SYSCALL: u8 = 0x80;

/// Vectors in this range originate at the PIC and require an end-of-interrupt.
pub const PIC_RANGE: core::ops::RangeInclusive<u8> = 0x20..=0x2F;

/// The saved register frame, bit-exact in field role and push order with SPEC_FULL.md §6,
/// widened from the spec's literal 32-bit register names to this crate's 64-bit long-mode
/// target. Field order mirrors exactly what the entry stub below pushes, low address to high, so
/// a raw pointer cast onto the stack at kernel-entry time is sound.
///
/// `user_rsp`/`user_ss` are carried for structural fidelity with the spec's description of a
/// frame "on privilege change" but are never populated: this kernel has no ring transitions.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    pub gs: u64,
    pub fs: u64,
    pub es: u64,
    pub ds: u64,
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub interrupt_number: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub user_rsp: u64,
    pub user_ss: u64,
}

/// `eflags`/`rflags` value written into a freshly created process: interrupt flag set so the
/// first dispatch into it runs with interrupts enabled, matching `EF_DEFAULT | EF_INTR` in the
/// original `kernel.h`.
pub const RFLAGS_DEFAULT: u64 = 0x202;

impl TrapFrame {
    /// Builds the synthetic frame `proc_create` writes at the top of a fresh process's stack
    /// (SPEC_FULL.md §4.2): `rip` at the entry point, interrupts enabled, current kernel
    /// selectors in every segment register, everything else zeroed.
    pub fn synthetic(entry: extern "C" fn() -> !) -> TrapFrame {
        let cs = crate::interrupts::gdt::kernel_code_selector() as u64;
        let ds = crate::interrupts::gdt::kernel_data_selector() as u64;
        TrapFrame {
            gs: ds,
            fs: ds,
            es: ds,
            ds,
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rsi: 0,
            rdi: 0,
            rbp: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            interrupt_number: 0,
            error_code: 0,
            rip: entry as usize as u64,
            cs,
            rflags: RFLAGS_DEFAULT,
            user_rsp: 0,
            user_ss: 0,
        }
    }

    /// Syscall number, per the ABI in SPEC_FULL.md §6 ("number in the accumulator register").
    pub fn syscall_number(&self) -> u64 {
        self.rax
    }

    /// Syscall args 1-3, per the same ABI ("args 1-3 in the next three").
    pub fn syscall_args(&self) -> (u64, u64, u64) {
        (self.rbx, self.rcx, self.rdx)
    }

    /// Writes the syscall return value back into the register the caller reads it from.
    pub fn set_syscall_return(&mut self, value: i64) {
        self.rax = value as u64;
    }
}

/// The five-step kernel entry point, invoked by the asm trampoline below with `rdi` holding a
/// pointer to the just-saved trap frame. Returns a pointer to the frame that should now be
/// restored (`active_proc`'s, guaranteed non-null on return — step 4 of SPEC_FULL.md §4.6).
///
/// # Safety
/// `frame` must point at a valid, fully-populated `TrapFrame` written by the entry stub, and must
/// remain valid until this function returns (it lives on the interrupted process's own stack,
/// which this function never deallocates).
#[no_mangle]
unsafe extern "C" fn kernel_context_enter(frame: *mut TrapFrame) -> *mut TrapFrame {
    let number = (*frame).interrupt_number as u8;

    scheduler::with(|sched| {
        if let Some(pid) = sched.active_pid() {
            if let Some(pcb) = sched.table_mut().pid_to_proc_mut(pid) {
                pcb.trap_frame = frame;
            }
        }
    });

    match idt::handler_for(number) {
        Some(handler) => handler(&mut *frame),
        None => crate::kernel_panic!("no IRQ handler registered for vector {:#x}", number),
    }

    if PIC_RANGE.contains(&number) {
        idt::pic_dismiss(number);
    }

    scheduler::with(|sched| sched.run());

    let restored = scheduler::with(|sched| {
        let pid = sched
            .active_pid()
            .unwrap_or_else(|| crate::kernel_panic!("scheduler_run left no active process"));
        sched
            .table()
            .pid_to_proc(pid)
            .unwrap_or_else(|| crate::kernel_panic!("active pid {} has no PCB", pid.0))
            .trap_frame
    });

    restored
}

/// Entry stub shared by all three IRQ vectors: the CPU has already pushed `rflags`, `cs`, `rip`
/// (no privilege change, so no `ss`/`rsp`); each per-vector gate below pushes the interrupt
/// number and a zero error code before falling into this common body, which saves the remaining
/// registers, calls [`kernel_context_enter`], and restores whatever frame it returns — possibly a
/// different process's.
#[unsafe(naked)]
unsafe extern "C" fn kernel_entry_common() {
    naked_asm!(
        "push r15",
        "push r14",
        "push r13",
        "push r12",
        "push r11",
        "push r10",
        "push r9",
        "push r8",
        "push rbp",
        "push rdi",
        "push rsi",
        "push rdx",
        "push rcx",
        "push rbx",
        "push rax",
        "mov ax, ds",
        "push rax",
        "mov ax, es",
        "push rax",
        "mov ax, fs",
        "push rax",
        "mov ax, gs",
        "push rax",
        "mov rdi, rsp",
        "call {enter}",
        "mov rsp, rax",
        "pop rax",
        "mov gs, ax",
        "pop rax",
        "mov fs, ax",
        "pop rax",
        "mov es, ax",
        "pop rax",
        "mov ds, ax",
        "pop rax",
        "pop rbx",
        "pop rcx",
        "pop rdx",
        "pop rsi",
        "pop rdi",
        "pop rbp",
        "pop r8",
        "pop r9",
        "pop r10",
        "pop r11",
        "pop r12",
        "pop r13",
        "pop r14",
        "pop r15",
        "add rsp, 16",
        "iretq",
        enter = sym kernel_context_enter,
    );
}

/// Per-vector gates: push a zero error code and the IRQ number, then fall into the shared body.
/// Installed at IDT vectors 0x20/0x21/0x80 in `interrupts::idt`.
#[unsafe(naked)]
pub unsafe extern "C" fn isr_entry_timer() {
    naked_asm!(
        "push 0",
        "push {irq}",
        "jmp {common}",
        irq = const IRQ_TIMER as u64,
        common = sym kernel_entry_common,
    );
}

#[unsafe(naked)]
pub unsafe extern "C" fn isr_entry_keyboard() {
    naked_asm!(
        "push 0",
        "push {irq}",
        "jmp {common}",
        irq = const IRQ_KEYBOARD as u64,
        common = sym kernel_entry_common,
    );
}

#[unsafe(naked)]
pub unsafe extern "C" fn isr_entry_syscall() {
    naked_asm!(
        "push 0",
        "push {irq}",
        "jmp {common}",
        irq = const IRQ_SYSCALL as u64,
        common = sym kernel_entry_common,
    );
}
