//! Runner configuration, read from a YAML file.
use std::{error::Error, fs};

use chip8::{constants::KEY_COUNT, prelude::*};
use serde::Deserialize;

/// Number of frames to run when not configured, ten seconds at 60Hz.
const DEFAULT_FRAMES: u64 = 600;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConf {
    /// Frames to run before the display is printed.
    pub frames: u64,
    /// Pace frames at 60Hz instead of running as fast as possible.
    pub throttle: bool,
    pub vm: Chip8Conf,
    /// Scripted keypad input.
    pub keys: Vec<KeyPress>,
}

impl Default for RunConf {
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            throttle: false,
            vm: Chip8Conf::default(),
            keys: Vec::new(),
        }
    }
}

/// Key held down from frame `from` up to, but excluding, frame `until`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyPress {
    pub key: KeyCode,
    pub from: u64,
    pub until: u64,
}

impl RunConf {
    pub fn from_file(filepath: &str) -> Result<Self, Box<dyn Error>> {
        let source = fs::read_to_string(filepath)?;
        let conf = Self::from_yaml(&source)?;
        log::debug!("loaded run configuration: {:#?}", conf);
        Ok(conf)
    }

    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        let conf: Self = serde_yaml::from_str(source)?;

        for press in conf.keys.iter().filter(|press| press.from >= press.until) {
            log::warn!(
                "key {} is never pressed, frame range {}..{} is empty",
                press.key,
                press.from,
                press.until
            );
        }

        Ok(conf)
    }

    /// Keypad state for the given frame.
    pub fn keys_at(&self, frame: u64) -> Keypad {
        let mut keys = [false; KEY_COUNT as usize];

        for press in &self.keys {
            if (press.from..press.until).contains(&frame) {
                keys[press.key.as_u8() as usize] = true;
            }
        }

        keys
    }
}
