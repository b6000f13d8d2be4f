//! CHIP-8 virtual machine.
//!
//! The VM only interprets instructions. Opening a window, mapping host
//! keys onto the keypad, drawing the display buffer and pacing frames are
//! left to the embedding application, which calls [`prelude::Chip8Vm::run_frame`]
//! sixty times a second.
mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod error;
mod keypad;
mod vm;

pub use self::{
    bytecode::{MathOp, Op},
    clock::{Clock, Hz},
    error::{Chip8Error, Chip8Result, RuntimeError},
    keypad::{InvalidKeyCode, KeyCode, Keypad},
};

/// Borrowed view of the display, one `bool` per pixel in row-major order.
pub type Chip8DisplayBuffer<'a> = &'a [bool; constants::DISPLAY_BUFFER_SIZE];

pub mod prelude {
    pub use super::{
        cpu::Chip8Cpu,
        error::{Chip8Error, Chip8Result},
        keypad::{KeyCode, Keypad},
        vm::{Chip8Conf, Chip8Vm, Flow, ShiftQuirk},
    };
}
