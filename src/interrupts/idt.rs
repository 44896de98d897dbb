//! IDT setup and the IRQ handler table (SPEC_FULL.md §4.6's `irq_register` contract).
//!
//! CPU exception vectors (breakpoint, double fault, page fault, GP fault) are installed the
//! teacher's way, as ordinary `x86-interrupt` handlers — they're diagnostics, not part of the
//! scheduler's trap-frame discipline. The three IRQ vectors this kernel actually schedules work
//! through (timer, keyboard, syscall) are installed via raw handler addresses instead, because
//! they point at [`crate::trap`]'s naked-asm stubs rather than a compiler-generated
//! `x86-interrupt` prologue.

use lazy_static::lazy_static;
use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};
use x86_64::VirtAddr;

use super::gdt;
use crate::process::Pid;
use crate::trap::{self, TrapFrame, IRQ_KEYBOARD, IRQ_SYSCALL, IRQ_TIMER};

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        unsafe {
            idt.double_fault
                .set_handler_fn(double_fault_handler)
                .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
        }
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.general_protection_fault
            .set_handler_fn(general_protection_fault_handler);
        unsafe {
            idt[IRQ_TIMER as usize]
                .set_handler_addr(VirtAddr::new(trap::isr_entry_timer as u64));
            idt[IRQ_KEYBOARD as usize]
                .set_handler_addr(VirtAddr::new(trap::isr_entry_keyboard as u64));
            idt[IRQ_SYSCALL as usize]
                .set_handler_addr(VirtAddr::new(trap::isr_entry_syscall as u64));
        }
        idt
    };
}

pub fn init() {
    IDT.load();
}

/// `handler_table[trap_frame.interrupt]` (SPEC_FULL.md §4.6 step 2). The three vectors this
/// kernel installs all route into the scheduler-aware handlers below; any other vector reaching
/// [`crate::trap::kernel_context_enter`] is a registration bug, not a runtime condition, so there
/// is deliberately no general `irq_register` table here — the mapping is the match arms below.
pub fn handler_for(vector: u8) -> Option<fn(&mut TrapFrame)> {
    match vector {
        IRQ_TIMER => Some(timer_irq),
        IRQ_KEYBOARD => Some(keyboard_irq),
        IRQ_SYSCALL => Some(syscall_irq),
        _ => None,
    }
}

/// Dismisses the given IRQ at the PIC (SPEC_FULL.md §4.6 step 3).
pub fn pic_dismiss(vector: u8) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(vector);
    }
}

fn timer_irq(_frame: &mut TrapFrame) {
    crate::timer::with(|timers| timers.fire());
}

fn keyboard_irq(_frame: &mut TrapFrame) {
    use x86_64::instructions::port::Port;
    let mut port: Port<u8> = Port::new(0x60);
    let scancode = unsafe { port.read() };
    crate::drivers::keyboard::push_scancode(scancode);
}

fn syscall_irq(frame: &mut TrapFrame) {
    let active = crate::scheduler::with(|sched| sched.active_pid()).unwrap_or(Pid(0));
    crate::syscalls::dispatch(active, frame);
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    crate::log_warn!("breakpoint\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    crate::kernel_panic!("double fault\n{:#?}", stack_frame)
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;
    crate::kernel_panic!(
        "page fault at {:?}, code {:?}\n{:#?}",
        Cr2::read(),
        error_code,
        stack_frame
    )
}

extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    crate::kernel_panic!(
        "general protection fault, code {}\n{:#?}",
        error_code,
        stack_frame
    )
}
