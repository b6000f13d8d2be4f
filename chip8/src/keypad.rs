//! Hexadecimal keypad input.
use crate::constants::*;

/// Pressed state of the 16 keys, indexed by key value.
///
/// Replaced wholesale by the embedding application once per frame.
pub type Keypad = [bool; KEY_COUNT as usize];

/// Keys of the COSMAC VIP hex keypad.
///
/// ```text
/// 1 2 3 C
/// 4 5 6 D
/// 7 8 9 E
/// A 0 B F
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    /// All keys in ascending order.
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0,
        Self::Key1,
        Self::Key2,
        Self::Key3,
        Self::Key4,
        Self::Key5,
        Self::Key6,
        Self::Key7,
        Self::Key8,
        Self::Key9,
        Self::KeyA,
        Self::KeyB,
        Self::KeyC,
        Self::KeyD,
        Self::KeyE,
        Self::KeyF,
    ];

    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(key_id as usize)
            .copied()
            .ok_or(InvalidKeyCode)
    }
}

#[derive(Debug)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(feature = "serde")]
mod de {
    use std::fmt::Display;

    use num_traits::AsPrimitive;
    use serde::de::{Deserialize, Error, Expected, Unexpected, Visitor};

    use super::*;

    impl Expected for InvalidKeyCode {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            <Self as Display>::fmt(self, f)
        }
    }

    impl<'de> Deserialize<'de> for KeyCode {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            // YAML integer type
            deserializer.deserialize_i64(KeyCodeVisitor)
        }
    }

    struct KeyCodeVisitor;

    impl KeyCodeVisitor {
        #[inline]
        fn check_int<N, E>(val: N) -> Result<u8, E>
        where
            N: AsPrimitive<i64>,
            E: Error,
        {
            let n = val.as_();
            if !(0..KEY_COUNT as i64).contains(&n) {
                Err(E::invalid_value(Unexpected::Signed(n), &InvalidKeyCode))
            } else {
                Ok(n as u8)
            }
        }

        #[inline]
        fn visit_int<N, E>(val: N) -> Result<KeyCode, E>
        where
            N: AsPrimitive<i64>,
            E: Error,
        {
            let key_id = Self::check_int(val)?;
            KeyCode::try_from(key_id)
                .map_err(|err| E::invalid_value(Unexpected::Unsigned(key_id as u64), &err))
        }
    }

    impl<'de> Visitor<'de> for KeyCodeVisitor {
        type Value = KeyCode;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "an integer between 0 and 15")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Self::visit_int(v)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            if v > i64::MAX as u64 {
                return Err(E::invalid_value(Unexpected::Unsigned(v), &InvalidKeyCode));
            }
            Self::visit_int(v as i64)
        }
    }
}
