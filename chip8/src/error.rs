//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::{Address, MAX_PROGRAM_SIZE};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// VM fault during interpreter loop.
    Runtime(RuntimeError),
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram,
    /// Attempt to load a program without any bytes.
    EmptyProgram,
    Io(std::io::Error),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(err) => write!(f, "runtime error: {}", err),
            Self::LargeProgram => write!(
                f,
                "program too large for VM memory, limit is {MAX_PROGRAM_SIZE} bytes"
            ),
            Self::EmptyProgram => write!(f, "program is empty"),
            Self::Io(err) => write!(f, "{}", err),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RuntimeError> for Chip8Error {
    fn from(err: RuntimeError) -> Self {
        Chip8Error::Runtime(err)
    }
}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

/// Fault raised by the program running inside the VM.
///
/// Every fault halts the machine. The faulting instruction is
/// not executed and the program counter is left pointing at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// Instruction word that doesn't decode to any known operation.
    UnknownOpcode { address: Address, opcode: u16 },
    /// `CALL` with a full call stack.
    StackOverflow { address: Address },
    /// `RET` with an empty call stack.
    StackUnderflow { address: Address },
}

impl RuntimeError {
    /// Memory location of the faulting instruction.
    pub fn address(&self) -> Address {
        match self {
            Self::UnknownOpcode { address, .. }
            | Self::StackOverflow { address }
            | Self::StackUnderflow { address } => *address,
        }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { address, opcode } => {
                write!(f, "unsupported opcode {opcode:04X} at 0x{address:03X}")
            }
            Self::StackOverflow { address } => {
                write!(f, "call stack overflow at 0x{address:03X}")
            }
            Self::StackUnderflow { address } => {
                write!(f, "call stack underflow at 0x{address:03X}")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}
