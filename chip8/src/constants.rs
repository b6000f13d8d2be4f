//! Constant values of the Chip-8 architecture.

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 0x10; // 16

/// Index of register VF, which doubles as the carry, borrow and collision flag.
pub const FLAG_REGISTER: usize = 0xF;

/// The lower memory space was historically used for the interpreter itself,
/// but is now used for fonts.
pub const MEM_START: usize = 0x200; // 512
pub const MEM_SIZE: usize = 0x1000; // 4096

/// Mask that keeps an address inside the 12-bit memory space.
pub const MEM_MASK: usize = MEM_SIZE - 1;

/// Largest program that fits in memory after the reserved area.
pub const MAX_PROGRAM_SIZE: usize = MEM_SIZE - MEM_START;

/// Levels of nesting allowed in the call stack.
///
/// The original RCA 1802 implementation allocated 48 bytes
/// for up to 12 levels of nesting. Most later interpreters settled on 16.
pub const STACK_SIZE: usize = 0x10;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const DISPLAY_BUFFER_SIZE: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;
pub const DISPLAY_WIDTH_MASK: usize = DISPLAY_WIDTH - 1;
pub const DISPLAY_HEIGHT_MASK: usize = DISPLAY_HEIGHT - 1;

/// Number of clock cycles in a second that delay timers count down.
pub const DELAY_FREQUENCY: u64 = 60;

/// Number of nanoseconds in a second
#[doc(hidden)]
pub const NANOS_IN_SECOND: u64 = 1_000_000_000;

/// Instructions executed per 60Hz frame when not configured.
pub const DEFAULT_CYCLES_PER_FRAME: usize = 10;

/// Number of keys ob the keyboard (0x0-0xF)
pub const KEY_COUNT: u8 = 16;

/// Address where the built-in font glyphs are stored.
pub const FONTSET_START: Address = 0x000;

/// Each glyph is 8 pixels wide and 5 rows high.
pub const FONTSET_HEIGHT: usize = 5;
pub const FONTSET_DATA_LENGTH: usize = FONTSET_HEIGHT * KEY_COUNT as usize;

/// Hexadecimal digit sprites 0-F.
#[rustfmt::skip]
pub const FONTSET: [u8; FONTSET_DATA_LENGTH] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Type for storing the 12-bit memory addresses.
pub type Address = u16;
