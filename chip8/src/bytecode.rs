//! Instruction decoding.
//!
//! Each instruction is two bytes, big-endian, with the opcode family
//! identified by the first 4-bit nibble.
use std::fmt;

use crate::constants::Address;

/// Decoded instruction, with its operands extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Op {
    /// 00E0 (CLS)
    ///
    /// Clear the screen.
    ClearScreen,
    /// 00EE (RET)
    ///
    /// Return from the sub-routine.
    Return,
    /// 1nnn (JP addr)
    ///
    /// Jump to the address in `nnn`.
    JumpAddress { address: Address },
    /// 2nnn (CALL addr)
    ///
    /// Call the sub-routine at address `nnn`.
    Call { address: Address },
    /// 3xnn (SE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` equals value `nn`
    Skip_Eq_Byte { vx: u8, nn: u8 },
    /// 4xnn (SNE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` does not equal value `nn`.
    Skip_NotEq_Byte { vx: u8, nn: u8 },
    /// 5xy0 (SE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` equals register `Vy`.
    Skip_Eq { vx: u8, vy: u8 },
    /// 6xnn (LD Vx, byte)
    Load_Byte { vx: u8, nn: u8 },
    /// 7xnn (ADD Vx, byte)
    ///
    /// Add byte to the value in register `Vx`, store the result in `Vx`.
    /// Carry flag is not set.
    Add_Byte { vx: u8, nn: u8 },

    // ------------------------------------------------------------------------
    // Math
    /// 8xy0..8xyE
    ///
    /// Arithmetic and logic between `Vx` and `Vy`, result stored in `Vx`.
    Math { vx: u8, vy: u8, op: MathOp },

    /// 9xy0 (SNE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` does not equal register `Vy`.
    Skip_NotEq { vx: u8, vy: u8 },
    /// Annn (LD I, addr)
    ///
    /// Load address into register `I`.
    Load_Address { address: Address },
    /// Bnnn (JP V0, addr)
    ///
    /// Jump to location nnn + V0.
    Jump_V0 { address: Address },
    /// Cxnn (RND Vx, byte)
    ///
    /// Generate random number.
    Random { vx: u8, nn: u8 },
    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer.
    Draw { vx: u8, vy: u8, n: u8 },

    // ------------------------------------------------------------------------
    // Input
    /// Ex9E (SKP Vx)
    Skip_Key { vx: u8 },
    /// ExA1 (SKNP Vx)
    Skip_NotKey { vx: u8 },

    // ------------------------------------------------------------------------
    // Timers and memory
    /// Fx07 (LD Vx, DT)
    Load_Vx_Delay { vx: u8 },
    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a key press, store the value of the key in `Vx`.
    Wait_Key { vx: u8 },
    /// Fx15 (LD DT, Vx)
    Load_Delay_Vx { vx: u8 },
    /// Fx18 (LD ST, Vx)
    Load_Sound_Vx { vx: u8 },
    /// Fx1E (ADD I, Vx)
    Add_Address { vx: u8 },
    /// Fx29 (LD F, Vx)
    ///
    /// Point `I` at the font glyph for digit `Vx`.
    Load_Font { vx: u8 },
    /// Fx33 (LD B, Vx)
    ///
    /// Store the binary-coded decimal digits of `Vx` at `I`, `I+1` and `I+2`.
    Store_Bcd { vx: u8 },
    /// Fx55 (LD [I], Vx)
    Store_Registers { vx: u8 },
    /// Fx65 (LD Vx, [I])
    Load_Registers { vx: u8 },
}

/// Operation selected by the last nibble of an `8xyN` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    /// 8xy0 (LD Vx, Vy)
    Load,
    /// 8xy1 (OR Vx, Vy)
    Or,
    /// 8xy2 (AND Vx, Vy)
    And,
    /// 8xy3 (XOR Vx, Vy)
    Xor,
    /// 8xy4 (ADD Vx, Vy)
    ///
    /// VF is set to 1 on carry, 0 otherwise.
    Add,
    /// 8xy5 (SUB Vx, Vy)
    ///
    /// VF is set to 0 when there is a borrow, set to 1 when there isn't.
    Sub,
    /// 8xy6 (SHR Vx)
    ///
    /// VF receives the bit shifted out.
    ShiftRight,
    /// 8xy7 (SUBN Vx, Vy)
    ///
    /// Subtracts `Vx` from `Vy`. VF is set to 0 when there is a borrow.
    SubReverse,
    /// 8xyE (SHL Vx)
    ///
    /// VF receives the bit shifted out.
    ShiftLeft,
}

impl MathOp {
    fn from_nibble(n: u8) -> Option<Self> {
        match n {
            0x0 => Some(Self::Load),
            0x1 => Some(Self::Or),
            0x2 => Some(Self::And),
            0x3 => Some(Self::Xor),
            0x4 => Some(Self::Add),
            0x5 => Some(Self::Sub),
            0x6 => Some(Self::ShiftRight),
            0x7 => Some(Self::SubReverse),
            0xE => Some(Self::ShiftLeft),
            _ => None,
        }
    }

    fn mnemonic(&self) -> &'static str {
        match self {
            Self::Load => "LD",
            Self::Or => "OR",
            Self::And => "AND",
            Self::Xor => "XOR",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::ShiftRight => "SHR",
            Self::SubReverse => "SUBN",
            Self::ShiftLeft => "SHL",
        }
    }
}

impl Op {
    /// Decode an instruction word.
    ///
    /// Returns `None` when the word does not encode a known operation.
    pub fn decode(word: u16) -> Option<Op> {
        let [a, b] = word.to_be_bytes();
        let op = a >> 4; // 0xF000
        let vx = a & 0xF; // 0x0F00
        let vy = b >> 4; // 0x00F0
        let n = b & 0xF; // 0x000F
        let nn = b; // 0x00FF
        let nnn = word & 0x0FFF; // 0x0FFF

        let decoded = match op {
            // Machine code routines (0nnn SYS) are not supported.
            0x0 => match word {
                0x00E0 => Op::ClearScreen,
                0x00EE => Op::Return,
                _ => return None,
            },
            0x1 => Op::JumpAddress { address: nnn },
            0x2 => Op::Call { address: nnn },
            0x3 => Op::Skip_Eq_Byte { vx, nn },
            0x4 => Op::Skip_NotEq_Byte { vx, nn },
            0x5 if n == 0 => Op::Skip_Eq { vx, vy },
            0x6 => Op::Load_Byte { vx, nn },
            0x7 => Op::Add_Byte { vx, nn },
            0x8 => Op::Math {
                vx,
                vy,
                op: MathOp::from_nibble(n)?,
            },
            0x9 if n == 0 => Op::Skip_NotEq { vx, vy },
            0xA => Op::Load_Address { address: nnn },
            0xB => Op::Jump_V0 { address: nnn },
            0xC => Op::Random { vx, nn },
            0xD => Op::Draw { vx, vy, n },
            0xE => match nn {
                0x9E => Op::Skip_Key { vx },
                0xA1 => Op::Skip_NotKey { vx },
                _ => return None,
            },
            0xF => match nn {
                0x07 => Op::Load_Vx_Delay { vx },
                0x0A => Op::Wait_Key { vx },
                0x15 => Op::Load_Delay_Vx { vx },
                0x18 => Op::Load_Sound_Vx { vx },
                0x1E => Op::Add_Address { vx },
                0x29 => Op::Load_Font { vx },
                0x33 => Op::Store_Bcd { vx },
                0x55 => Op::Store_Registers { vx },
                0x65 => Op::Load_Registers { vx },
                _ => return None,
            },
            _ => return None,
        };

        Some(decoded)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Op::ClearScreen => write!(f, "CLS"),
            Op::Return => write!(f, "RET"),
            Op::JumpAddress { address } => write!(f, "JP 0x{address:03X}"),
            Op::Call { address } => write!(f, "CALL 0x{address:03X}"),
            Op::Skip_Eq_Byte { vx, nn } => write!(f, "SE V{vx:X}, 0x{nn:02X}"),
            Op::Skip_NotEq_Byte { vx, nn } => write!(f, "SNE V{vx:X}, 0x{nn:02X}"),
            Op::Skip_Eq { vx, vy } => write!(f, "SE V{vx:X}, V{vy:X}"),
            Op::Load_Byte { vx, nn } => write!(f, "LD V{vx:X}, 0x{nn:02X}"),
            Op::Add_Byte { vx, nn } => write!(f, "ADD V{vx:X}, 0x{nn:02X}"),
            Op::Math { vx, vy, op } => match op {
                MathOp::ShiftRight | MathOp::ShiftLeft => write!(f, "{} V{vx:X}", op.mnemonic()),
                _ => write!(f, "{} V{vx:X}, V{vy:X}", op.mnemonic()),
            },
            Op::Skip_NotEq { vx, vy } => write!(f, "SNE V{vx:X}, V{vy:X}"),
            Op::Load_Address { address } => write!(f, "LD I, 0x{address:03X}"),
            Op::Jump_V0 { address } => write!(f, "JP V0, 0x{address:03X}"),
            Op::Random { vx, nn } => write!(f, "RND V{vx:X}, 0x{nn:02X}"),
            Op::Draw { vx, vy, n } => write!(f, "DRW V{vx:X}, V{vy:X}, {n}"),
            Op::Skip_Key { vx } => write!(f, "SKP V{vx:X}"),
            Op::Skip_NotKey { vx } => write!(f, "SKNP V{vx:X}"),
            Op::Load_Vx_Delay { vx } => write!(f, "LD V{vx:X}, DT"),
            Op::Wait_Key { vx } => write!(f, "LD V{vx:X}, K"),
            Op::Load_Delay_Vx { vx } => write!(f, "LD DT, V{vx:X}"),
            Op::Load_Sound_Vx { vx } => write!(f, "LD ST, V{vx:X}"),
            Op::Add_Address { vx } => write!(f, "ADD I, V{vx:X}"),
            Op::Load_Font { vx } => write!(f, "LD F, V{vx:X}"),
            Op::Store_Bcd { vx } => write!(f, "LD B, V{vx:X}"),
            Op::Store_Registers { vx } => write!(f, "LD [I], V{vx:X}"),
            Op::Load_Registers { vx } => write!(f, "LD V{vx:X}, [I]"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_fields() {
        assert_eq!(
            Op::decode(0xD12F),
            Some(Op::Draw {
                vx: 0x1,
                vy: 0x2,
                n: 0xF
            })
        );
        assert_eq!(
            Op::decode(0x2ABC),
            Some(Op::Call { address: 0xABC })
        );
        assert_eq!(
            Op::decode(0x6A02),
            Some(Op::Load_Byte { vx: 0xA, nn: 0x02 })
        );
        assert_eq!(
            Op::decode(0x8CDE),
            Some(Op::Math {
                vx: 0xC,
                vy: 0xD,
                op: MathOp::ShiftLeft
            })
        );
        assert_eq!(Op::decode(0xF933), Some(Op::Store_Bcd { vx: 0x9 }));
    }

    #[test]
    fn test_decode_unknown() {
        // SYS addr
        assert_eq!(Op::decode(0x0000), None);
        assert_eq!(Op::decode(0x0123), None);
        // Register compare with a non-zero trailing nibble.
        assert_eq!(Op::decode(0x5121), None);
        assert_eq!(Op::decode(0x9121), None);
        // Math gaps
        for n in [0x8, 0x9, 0xA, 0xB, 0xC, 0xD, 0xF] {
            assert_eq!(Op::decode(0x8120 | n), None, "8xy{n:X}");
        }
        assert_eq!(Op::decode(0xE19F), None);
        assert_eq!(Op::decode(0xF1FF), None);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Op::decode(0x00E0).unwrap().to_string(), "CLS");
        assert_eq!(Op::decode(0x1200).unwrap().to_string(), "JP 0x200");
        assert_eq!(Op::decode(0x8124).unwrap().to_string(), "ADD V1, V2");
        assert_eq!(Op::decode(0x8126).unwrap().to_string(), "SHR V1");
        assert_eq!(Op::decode(0xF10A).unwrap().to_string(), "LD V1, K");
    }
}
