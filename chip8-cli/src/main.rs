//! Entrypoint for CLI
mod config;

use std::{env, error::Error, time::Instant};

use chip8::{prelude::*, Clock};
use log::{debug, error, info, trace};

use self::config::RunConf;

static IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

static USAGE: &str = r#"
usage: chip8 run ROM [CONFIG]

commands:
    run     Run the target ROM file headless, and print the display

config:
    Optional YAML file.

    frames: 600             # frames to run
    throttle: false         # pace frames at 60Hz
    vm:
      cycles_per_frame: 10
      seed: 7               # random generator seed
      shift_quirk: in_place # or copy_vy
    keys:
      - { key: 5, from: 30, until: 40 }

examples:
    chip8 run maze.rom
    chip8 run breakout.rom breakout.yaml

Set RUST_LOG=debug to dump registers after the run.
"#;

fn run_bytecode(filepath: &str, conf: RunConf) -> Result<(), Box<dyn Error>> {
    info!("running {filepath} for {} frames", conf.frames);

    let mut vm = Chip8Vm::new(conf.vm.clone());
    vm.load_rom(filepath)?;

    let mut clock = Clock::frame_rate();
    let mut buzzer = false;
    let mut result = Ok(());

    let start = Instant::now();
    for frame in 0..conf.frames {
        if conf.throttle {
            clock.wait();
        }

        let keys = conf.keys_at(frame);
        if let Err(err) = vm.run_frame(&keys) {
            error!("frame {frame}: {err}");
            result = Err(err);
            break;
        }

        let s = vm.dump_keys()?;
        if !s.is_empty() {
            trace!("frame {frame} {s}");
        }

        // Buzzer should be on while sound timer counts down,
        // then turned off when the timer reaches zero.
        if vm.is_sound_active() != buzzer {
            buzzer = vm.is_sound_active();
            debug!("frame {frame}: buzzer {}", if buzzer { "on" } else { "off" });
        }
    }
    let end = Instant::now();

    println!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display()?);
    debug!("registers\n{}", vm.dump_registers()?);

    result?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    match parse_args() {
        Some(Cmd::Run { filepath, config }) => {
            let conf = match config {
                Some(config) => RunConf::from_file(&config)?,
                None => RunConf::default(),
            };

            if let Err(err) = run_bytecode(&filepath, conf) {
                error!("{err}");
                std::process::exit(1);
            }
        }
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => {
            // don't format me T.T
            match cmd.as_str() {
                "run" => Some(Cmd::Run {
                    filepath: args.next()?,
                    config: args.next(),
                }),
                _ => None,
            }
        }
        None => None,
    }
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run {
        filepath: String,
        config: Option<String>,
    },
}
