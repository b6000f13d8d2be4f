//! Virtual machine.
use std::{
    fmt::{self, Write},
    fs,
    path::Path,
};

use log::{debug, error, info};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    bytecode::{MathOp, Op},
    constants::*,
    cpu::Chip8Cpu,
    error::{Chip8Error, Chip8Result, RuntimeError},
    keypad::{KeyCode, Keypad},
    Chip8DisplayBuffer,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    rng: StdRng,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        Chip8Vm {
            cpu: Chip8Cpu::new(),
            rng: seed_rng(conf.seed),
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Clear all machine state in preparation for a fresh startup.
    ///
    /// Memory, registers, stack, timers, display and keys are zeroed,
    /// the font is reloaded and the random number generator is reseeded.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.rng = seed_rng(self.conf.seed);
    }

    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.is_empty() {
            return Err(Chip8Error::EmptyProgram);
        }

        if !check_program_size(bytecode) {
            return Err(Chip8Error::LargeProgram);
        }

        // Start with clean memory to avoid leaking previous program.
        self.reset();

        // Load program into virtual RAM
        self.cpu.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);

        debug!("loaded program of {} bytes", bytecode.len());

        Ok(())
    }

    /// Read a ROM file and load it into memory.
    pub fn load_rom(&mut self, filepath: impl AsRef<Path>) -> Chip8Result<()> {
        let filepath = filepath.as_ref();
        info!("load rom: {}", filepath.display());

        let bytecode = fs::read(filepath)?;
        self.load_bytecode(&bytecode)
    }
}

/// Machine state accessors for rendering and debugging.
impl Chip8Vm {
    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer {
        &self.cpu.display
    }

    /// State of the pixel at the given coordinate, wrapping around the display edges.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.cpu.display[(x & DISPLAY_WIDTH_MASK) + (y & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH]
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    pub fn register(&self, index: usize) -> u8 {
        self.cpu.registers[index & 0xF]
    }

    pub fn pc(&self) -> Address {
        self.cpu.pc
    }

    /// Value of the `I` register.
    pub fn address(&self) -> Address {
        self.cpu.address
    }

    /// Number of return addresses on the call stack.
    pub fn stack_depth(&self) -> usize {
        self.cpu.sp
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    /// The buzzer should sound while the sound timer is counting down.
    pub fn is_sound_active(&self) -> bool {
        self.cpu.sound_timer > 0
    }

    /// Machine is stalled on `Fx0A` until a key is pressed.
    pub fn is_key_waiting(&self) -> bool {
        self.cpu.key_wait
    }

    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.cpu.ram
    }

    /// Fault that halted the machine, if any.
    pub fn fault(&self) -> Option<RuntimeError> {
        self.cpu.fault()
    }
}

/// Result of a single interpreter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// Machine is halted because of an earlier fault. Nothing was executed.
    Interrupt,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// Display buffer was modified.
    Draw,
    /// Sound timer was set.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
}

/// VM Configuration Parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Chip8Conf {
    /// Instructions executed by [`Chip8Vm::run_frame`].
    pub cycles_per_frame: usize,
    /// Seed for the `Cxnn` random number generator.
    ///
    /// When `None` the generator is seeded from the operating system.
    pub seed: Option<u64>,
    pub shift_quirk: ShiftQuirk,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            cycles_per_frame: DEFAULT_CYCLES_PER_FRAME,
            seed: None,
            shift_quirk: ShiftQuirk::default(),
        }
    }
}

/// Behaviour of `8xy6` (`SHR`) and `8xyE` (`SHL`).
///
/// Interpreters disagree on which register is shifted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ShiftQuirk {
    /// Shift `Vx` in place and ignore `Vy`. Used by CHIP-48 and most modern ROMs.
    #[default]
    InPlace,
    /// Shift `Vy` and store the result in `Vx`, as on the COSMAC VIP.
    CopyVy,
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    ///
    /// If the VM is waiting for keyboard input, the `key_wait` flag will
    /// be cleared so it can be resumed.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.as_u8(), pressed);
        self.cpu.key_wait = false;
    }

    /// Replace the whole keyboard input state.
    pub fn set_keys(&mut self, keys: &Keypad) {
        self.cpu.set_keypad(keys);
        self.cpu.key_wait = false;
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.clear_keys()
    }

    /// Count down the delay and sound timers.
    ///
    /// Must be called once per frame, at 60Hz.
    pub fn tick_timers(&mut self) {
        self.cpu.tick_delay();
        self.cpu.tick_sound();
    }

    /// Run one display frame.
    ///
    /// Replaces the keyboard state, executes the configured number of cycles
    /// and then counts down the timers once. Execution stops early when
    /// the machine waits for a keypress, because the keyboard state can't
    /// change until the next frame.
    pub fn run_frame(&mut self, keys: &Keypad) -> Chip8Result<Flow> {
        self.set_keys(keys);
        let result = self.run_steps(self.conf.cycles_per_frame);
        self.tick_timers();
        result
    }

    /// Execute up to the given number of instructions.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
            if matches!(flow, Flow::KeyWait | Flow::Interrupt) {
                break;
            }
        }

        Ok(flow)
    }

    /// Fetch, decode and execute exactly one instruction.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if self.cpu.is_halted() {
            return Ok(Flow::Interrupt);
        }

        let address = self.cpu.pc;
        let word = self.cpu.instr_word();

        let op = match Op::decode(word) {
            Some(op) => op,
            None => {
                return Err(self.halt(RuntimeError::UnknownOpcode {
                    address,
                    opcode: word,
                }))
            }
        };

        op_trace(address, word, &op);

        self.exec(op).map_err(|fault| self.halt(fault))
    }

    fn halt(&mut self, fault: RuntimeError) -> Chip8Error {
        error!("machine halted: {fault}");
        self.cpu.set_fault(fault);
        Chip8Error::Runtime(fault)
    }

    fn exec(&mut self, op: Op) -> Result<Flow, RuntimeError> {
        let cpu = &mut self.cpu;

        match op {
            // 00E0 (CLS)
            //
            // Clear display
            Op::ClearScreen => {
                cpu.clear_display();
                cpu.advance(1);
                return Ok(Flow::Draw);
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Set the program counter to the value at the top of the stack.
            Op::Return => {
                let addr = cpu
                    .pop()
                    .ok_or(RuntimeError::StackUnderflow { address: cpu.pc })?;
                cpu.jump(addr);
                return Ok(Flow::Jump);
            }
            // 1NNN (JP addr)
            //
            // Jump to address.
            Op::JumpAddress { address } => {
                cpu.jump(address);
                return Ok(Flow::Jump);
            }
            // 2NNN (CALL addr)
            //
            // Call subroutine at NNN. The return address is the instruction after the call.
            Op::Call { address } => {
                let ret = cpu.pc.wrapping_add(2) & MEM_MASK as Address;
                if !cpu.push(ret) {
                    return Err(RuntimeError::StackOverflow { address: cpu.pc });
                }
                cpu.jump(address);
                return Ok(Flow::Jump);
            }
            // 3XNN (SE Vx, byte)
            Op::Skip_Eq_Byte { vx, nn } => {
                let skip = cpu.registers[vx as usize] == nn;
                self.skip_if(skip);
            }
            // 4XNN (SNE Vx, byte)
            Op::Skip_NotEq_Byte { vx, nn } => {
                let skip = cpu.registers[vx as usize] != nn;
                self.skip_if(skip);
            }
            // 5XY0 (SE Vx, Vy)
            Op::Skip_Eq { vx, vy } => {
                let skip = cpu.registers[vx as usize] == cpu.registers[vy as usize];
                self.skip_if(skip);
            }
            // 9XY0 (SNE Vx, Vy)
            Op::Skip_NotEq { vx, vy } => {
                let skip = cpu.registers[vx as usize] != cpu.registers[vy as usize];
                self.skip_if(skip);
            }
            // 6XNN (LD Vx, byte)
            //
            // Set register VX to value NN.
            Op::Load_Byte { vx, nn } => {
                cpu.registers[vx as usize] = nn;
                cpu.advance(1);
            }
            // 7XNN (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            Op::Add_Byte { vx, nn } => {
                let x = cpu.registers[vx as usize];
                cpu.registers[vx as usize] = x.wrapping_add(nn);
                cpu.advance(1);
            }
            Op::Math { vx, vy, op } => self.exec_math(vx, vy, op),
            // ANNN (LD I, addr)
            //
            // Set address register I to value NNN.
            Op::Load_Address { address } => {
                cpu.address = address;
                cpu.advance(1);
            }
            // BNNN (JP V0, addr)
            //
            // Jump to location NNN + V0.
            Op::Jump_V0 { address } => {
                let offset = cpu.registers[0] as Address;
                cpu.jump(address.wrapping_add(offset));
                return Ok(Flow::Jump);
            }
            // CXNN (RND Vx, byte)
            //
            // Set register VX to the result of bitwise AND between a random number and NN.
            Op::Random { vx, nn } => {
                cpu.registers[vx as usize] = nn & self.rng.gen::<u8>();
                cpu.advance(1);
            }
            Op::Draw { vx, vy, n } => {
                self.draw(vx, vy, n);
                return Ok(Flow::Draw);
            }
            _ => return Ok(self.exec_misc(op)),
        }

        Ok(Flow::Ok)
    }

    /// Skip the next instruction when the condition holds.
    #[inline(always)]
    fn skip_if(&mut self, condition: bool) {
        self.cpu.advance(if condition { 2 } else { 1 });
    }

    /// Execute an arithmetic instruction
    ///
    /// Both operands are read before anything is written, and VF is
    /// written last, so the flag survives when `Vx` is VF itself.
    #[inline]
    fn exec_math(&mut self, vx: u8, vy: u8, op: MathOp) {
        let (x, y) = (
            self.cpu.registers[vx as usize],
            self.cpu.registers[vy as usize],
        );

        let (result, flag) = match op {
            MathOp::Load => (y, None),
            MathOp::Or => (x | y, None),
            MathOp::And => (x & y, None),
            MathOp::Xor => (x ^ y, None),
            MathOp::Add => {
                let (result, carry) = x.overflowing_add(y);
                (result, Some(carry as u8))
            }
            MathOp::Sub => {
                let (result, borrow) = x.overflowing_sub(y);
                (result, Some(!borrow as u8))
            }
            MathOp::ShiftRight => {
                let src = self.shift_source(x, y);
                (src >> 1, Some(src & 1))
            }
            MathOp::SubReverse => {
                let (result, borrow) = y.overflowing_sub(x);
                (result, Some(!borrow as u8))
            }
            MathOp::ShiftLeft => {
                let src = self.shift_source(x, y);
                (src << 1, Some(src >> 7))
            }
        };

        self.cpu.registers[vx as usize] = result;
        if let Some(flag) = flag {
            self.cpu.registers[FLAG_REGISTER] = flag;
        }
        self.cpu.advance(1);
    }

    #[inline(always)]
    fn shift_source(&self, x: u8, y: u8) -> u8 {
        match self.conf.shift_quirk {
            ShiftQuirk::InPlace => x,
            ShiftQuirk::CopyVy => y,
        }
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// If the sprite is drawn outside of the display area, it is wrapped around to the other side.
    ///
    /// If the drawing operation erases existing pixels in the display buffer, register VF is set to
    /// 1, and set to 0 if no display bits are unset. This is used for collision detection.
    fn draw(&mut self, vx: u8, vy: u8, n: u8) {
        let cpu = &mut self.cpu;
        let x = cpu.registers[vx as usize] as usize & DISPLAY_WIDTH_MASK;
        let y = cpu.registers[vy as usize] as usize & DISPLAY_HEIGHT_MASK;
        let base = cpu.address as usize;
        let mut is_erased = false;

        for r in 0..n as usize {
            // Each row is 8 bits representing the 8 pixels of the sprite.
            let row = cpu.read(base + r);

            for c in (0..8).filter(|c| (row >> (7 - c)) & 1 == 1) {
                let d = ((x + c) & DISPLAY_WIDTH_MASK)
                    + ((y + r) & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH;

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= cpu.display[d];
                cpu.display[d] ^= true;
            }
        }

        // If a pixel was erased, then a collision occurred.
        cpu.registers[FLAG_REGISTER] = is_erased as u8;
        cpu.advance(1);
    }

    /// Execute a keyboard, timer or memory instruction
    #[inline]
    #[must_use]
    fn exec_misc(&mut self, op: Op) -> Flow {
        let cpu = &mut self.cpu;
        let mut control_flow = Flow::Ok;

        match op {
            // ----------------------------------------------------------------
            // Ex9E (SKP Vx)
            Op::Skip_Key { vx } => {
                let skip = cpu.key_state(cpu.registers[vx as usize] & 0xF);
                self.skip_if(skip);
                return control_flow;
            }
            // ExA1 (SKNP Vx)
            Op::Skip_NotKey { vx } => {
                let skip = !cpu.key_state(cpu.registers[vx as usize] & 0xF);
                self.skip_if(skip);
                return control_flow;
            }
            // ----------------------------------------------------------------
            // Fx07 (LD Vx, DT)
            //
            // Set Vx = delay timer value.
            Op::Load_Vx_Delay { vx } => {
                cpu.registers[vx as usize] = cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // All execution stops until a key is pressed, then the value of that key is stored in Vx.
            Op::Wait_Key { vx } => {
                if let Some(k) = cpu.first_key() {
                    cpu.registers[vx as usize] = k;
                    cpu.key_wait = false;
                } else {
                    // leave the program counter in place to stall the machine
                    cpu.key_wait = true;
                    return Flow::KeyWait;
                }
            }
            // Fx15 (LD DT, Vx)
            //
            // Set delay timer = Vx.
            Op::Load_Delay_Vx { vx } => {
                cpu.delay_timer = cpu.registers[vx as usize];
            }
            // Fx18 (LD ST, Vx)
            //
            // Set sound timer = Vx.
            Op::Load_Sound_Vx { vx } => {
                cpu.sound_timer = cpu.registers[vx as usize];
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I. VF is not affected.
            Op::Add_Address { vx } => {
                let x = cpu.registers[vx as usize] as Address;
                cpu.address = cpu.address.wrapping_add(x);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Op::Load_Font { vx } => {
                let x = cpu.registers[vx as usize] as Address;
                cpu.address = FONTSET_START + x * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            Op::Store_Bcd { vx } => {
                let addr = cpu.address as usize;
                let x = cpu.registers[vx as usize];
                cpu.write(addr,     x / 100);
                cpu.write(addr + 1, x / 10 % 10);
                cpu.write(addr + 2, x % 10);
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            Op::Store_Registers { vx } => {
                let addr = cpu.address as usize;
                for v in 0..=vx as usize {
                    cpu.write(addr + v, cpu.registers[v]);
                }
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            Op::Load_Registers { vx } => {
                let addr = cpu.address as usize;
                for v in 0..=vx as usize {
                    cpu.registers[v] = cpu.read(addr + v);
                }
            }
            _ => unreachable!("{op} is not a miscellaneous instruction"),
        }

        cpu.advance(1);
        control_flow
    }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the contents of the program memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let iter = self
            .cpu
            .ram
            .iter()
            .enumerate()
            .skip(MEM_START)
            .take(count)
            .step_by(2);
        let mut buf = String::new();

        for (i, op) in iter {
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, op, self.cpu.read(i + 1))?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.display[x + y * DISPLAY_WIDTH] {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys: ")?;
            for i in 0..KEY_COUNT {
                if self.cpu.key_state(i) {
                    write!(buf, "k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }

    pub fn dump_registers(&self) -> Result<String, fmt::Error> {
        let cpu = &self.cpu;
        let mut buf = String::new();

        writeln!(
            buf,
            "PC: {:04X}  I: {:04X}  SP: {:X}  DT: {:02X}  ST: {:02X}",
            cpu.pc, cpu.address, cpu.sp, cpu.delay_timer, cpu.sound_timer
        )?;
        for (i, v) in cpu.registers.iter().enumerate() {
            write!(buf, "V{i:X}: {v:02X} ")?;
            if i % 8 == 7 {
                writeln!(buf)?;
            }
        }

        Ok(buf)
    }
}

fn seed_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[inline(always)]
fn check_program_size(bytecode: &[u8]) -> bool {
    bytecode.len() <= MAX_PROGRAM_SIZE
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(address: Address, word: u16, op: &Op) {
    log::trace!("{address:04X}: {word:04X} {op}");
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: Address, _: u16, _: &Op) {}
