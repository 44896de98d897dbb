pub mod keyboard;
pub mod tty;

pub fn init() {
    keyboard::init();
    tty::init();

    crate::scheduler::with(|sched| {
        tty::attach_process_io(sched.table_mut(), crate::process::IDLE_PID, tty::DEFAULT_TTY)
    })
    .expect("the idle process always exists and TTY 0 is always in range");

    crate::log_info!("Drivers subsystem initialized.");
}
