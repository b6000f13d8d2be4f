//! CPU and memory state.
use crate::{constants::*, error::RuntimeError, keypad::Keypad};

/// Core state for a chip8 interpreter.
#[derive(Clone)]
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: Address,
    /// Stack pointer, counting the return addresses currently on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address. Only the
    /// lowest 12 bits are used when addressing memory.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Indicates that the machine is waiting for a keypress.
    pub(crate) key_wait: bool,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that is drawn too.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,

    // ------------------------------------------------------------------------
    // Control
    /// Fault that halted the machine, if any.
    pub(crate) fault: Option<RuntimeError>,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        let mut cpu = Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_wait: false,
            key_state: 0,

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),

            fault: None,
        };
        cpu.load_font();
        cpu
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Zero every register, buffer and timer, and reload the font glyphs.
    pub(crate) fn reset(&mut self) {
        self.pc = MEM_START as Address;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_wait = false;
        self.key_state = 0;
        self.ram.fill(0);
        self.stack.fill(0);
        self.display.fill(false);
        self.fault = None;

        self.load_font();
    }

    fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    /// Halt the machine with a fault.
    pub(crate) fn set_fault(&mut self, fault: RuntimeError) {
        self.fault = Some(fault);
    }

    pub fn fault(&self) -> Option<RuntimeError> {
        self.fault
    }

    #[inline(always)]
    pub fn is_halted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
    }

    pub fn set_key_state(&mut self, key_id: u8, state: bool) {
        if key_id < KEY_COUNT {
            if state {
                self.key_state |= 1 << key_id;
            } else {
                self.key_state &= !(1 << key_id);
            }
        }
    }

    /// Replace the whole keyboard state.
    pub fn set_keypad(&mut self, keys: &Keypad) {
        self.key_state = keys
            .iter()
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .fold(0, |state, (k, _)| state | (1u16 << k));
    }

    pub fn key_state(&self, key_id: u8) -> bool {
        if key_id < KEY_COUNT {
            self.key_state & (1 << key_id) > 0
        } else {
            false
        }
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Retrieve the value of the first key that is pressed down.
    #[inline]
    pub fn first_key(&self) -> Option<u8> {
        if self.any_key() {
            // Lowest set bit is the lowest key index.
            Some(self.key_state.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Clear the keyboard input state, setting all keys to up.
    #[inline(always)]
    pub fn clear_keys(&mut self) {
        self.key_state = 0;
    }

    /// Count down the delay timer.
    #[inline]
    pub fn tick_delay(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
    }

    /// Count down the sound timer.
    #[inline]
    pub fn tick_sound(&mut self) {
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Read a byte from memory, wrapping the address into the 12-bit space.
    #[inline(always)]
    pub fn read(&self, addr: usize) -> u8 {
        self.ram[addr & MEM_MASK]
    }

    /// Write a byte to memory, wrapping the address into the 12-bit space.
    #[inline(always)]
    pub fn write(&mut self, addr: usize, value: u8) {
        self.ram[addr & MEM_MASK] = value;
    }

    /// Extract the instruction at the current program counter.
    #[inline(always)]
    pub fn instr(&self) -> [u8; 2] {
        let pc = self.pc as usize;
        [self.read(pc), self.read(pc + 1)]
    }

    /// Instruction at the current program counter as a big-endian word.
    #[inline(always)]
    pub fn instr_word(&self) -> u16 {
        u16::from_be_bytes(self.instr())
    }

    /// Move the program counter forward by the given number of instructions.
    #[inline(always)]
    pub(crate) fn advance(&mut self, count: u16) {
        self.pc = self.pc.wrapping_add(2 * count) & MEM_MASK as Address;
    }

    /// Set the program counter to an absolute address.
    #[inline(always)]
    pub(crate) fn jump(&mut self, addr: Address) {
        self.pc = addr & MEM_MASK as Address;
    }

    /// Push a return address onto the call stack.
    ///
    /// Returns `false` when the stack is full and nothing was pushed.
    #[inline]
    pub(crate) fn push(&mut self, addr: Address) -> bool {
        if self.sp >= STACK_SIZE {
            return false;
        }
        self.stack[self.sp] = addr;
        self.sp += 1;
        true
    }

    /// Pop the most recent return address from the call stack.
    #[inline]
    pub(crate) fn pop(&mut self) -> Option<Address> {
        self.sp = self.sp.checked_sub(1)?;
        Some(self.stack[self.sp])
    }
}
