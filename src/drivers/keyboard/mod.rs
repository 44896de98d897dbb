//! PS/2 keyboard scan-code decoding (SPEC_FULL.md §1: "out of scope beyond the narrow contract
//! that an ISR may push a decoded byte into the active TTY's input ring buffer").
//!
//! The scan-code state machine in [`scancodes`] is kept from the teacher almost unchanged — that
//! decoding logic has nothing kernel-specific about it — but the sink it feeds is adapted from the
//! teacher's own lock-free kernel-wide `KeyboardBuffer` into the TTY input ring buffer this spec's
//! core actually consumes.

pub mod scancodes;

use scancodes::{KeyCode, KeyboardState};
use spin::Mutex;
use x86_64::instructions::port::Port;

use crate::drivers::tty;

static KEYBOARD_STATE: Mutex<KeyboardState> = Mutex::new(KeyboardState::new());

pub fn init() {
    let mut port: Port<u8> = Port::new(0x60);
    let _residual = unsafe { port.read() };
    crate::log_info!("PS/2 keyboard driver initialized.");
}

/// Called from the keyboard IRQ handler with the raw byte read off port 0x60. Decodes it and, if
/// it resolves to a printable byte, pushes it into the default TTY's input buffer.
pub fn push_scancode(scancode: u8) {
    let keycode = KEYBOARD_STATE.lock().process_scancode(scancode);
    if let Some(byte) = keycode_to_byte(keycode) {
        tty::with(|table| table.push_input_byte(tty::DEFAULT_TTY, byte));
    }
}

fn keycode_to_byte(key: KeyCode) -> Option<u8> {
    match key {
        KeyCode::Char(c) => Some(c as u8),
        KeyCode::Space => Some(b' '),
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Backspace => Some(0x08),
        KeyCode::ArrowUp | KeyCode::ArrowDown | KeyCode::ArrowLeft | KeyCode::ArrowRight
        | KeyCode::F(_) | KeyCode::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_scancode_decodes_to_ascii_byte() {
        let mut state = KeyboardState::new();
        assert_eq!(keycode_to_byte(state.process_scancode(0x1E)), Some(b'a'));
    }

    #[test]
    fn modifier_scancode_decodes_to_nothing() {
        let mut state = KeyboardState::new();
        assert_eq!(keycode_to_byte(state.process_scancode(0x2A)), None);
    }

    #[test]
    fn enter_decodes_to_newline() {
        let mut state = KeyboardState::new();
        assert_eq!(keycode_to_byte(state.process_scancode(0x1C)), Some(b'\n'));
    }
}
