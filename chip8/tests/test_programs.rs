//! Small hand assembled programs exercising several instructions together.
use chip8::{constants::*, prelude::*, Chip8Error, RuntimeError};

fn load(bytecode: &[u8]) -> Chip8Vm {
    let mut vm = Chip8Vm::new(Chip8Conf {
        seed: Some(0),
        ..Chip8Conf::default()
    });
    vm.load_bytecode(bytecode).unwrap();
    vm
}

/// Print the decimal digits of a register using the built-in font.
#[test]
#[rustfmt::skip]
fn test_print_decimal() {
    let mut vm = load(&[
        0x6A, 0xEA, // 0x200  LD vA, 234
        0xA3, 0x00, // 0x202  LD I, 0x300
        0xFA, 0x33, // 0x204  LD B, vA
        0xF2, 0x65, // 0x206  LD v2, [I]
        0x63, 0x00, // 0x208  LD v3, 0      ; x
        0x64, 0x00, // 0x20A  LD v4, 0      ; y
        0xF0, 0x29, // 0x20C  LD F, v0
        0xD3, 0x45, // 0x20E  DRW v3, v4, 5
        0x73, 0x05, // 0x210  ADD v3, 5
        0xF1, 0x29, // 0x212  LD F, v1
        0xD3, 0x45, // 0x214  DRW v3, v4, 5
        0x73, 0x05, // 0x216  ADD v3, 5
        0xF2, 0x29, // 0x218  LD F, v2
        0xD3, 0x45, // 0x21A  DRW v3, v4, 5
        0x12, 0x1C, // 0x21C  JP 0x21C
    ]);

    vm.run_steps(32).unwrap();
    assert_eq!(vm.pc(), 0x21C);
    assert_eq!(&vm.registers()[0..3], &[2, 3, 4]);
    assert_eq!(vm.register(0xF), 0);

    // Top row of "2", "3" and "4" glyphs.
    let row: String = (0..15)
        .map(|x| if vm.pixel(x, 0) { '#' } else { '.' })
        .collect();
    assert_eq!(row, "####.####.#..#.");
}

/// Nested subroutines return to the instruction after each call.
#[test]
#[rustfmt::skip]
fn test_nested_calls() {
    let mut vm = load(&[
        0x22, 0x08, // 0x200  CALL 0x208
        0x70, 0x01, // 0x202  ADD v0, 1
        0x12, 0x04, // 0x204  JP 0x204
        0x00, 0x00,
        0x22, 0x0E, // 0x208  CALL 0x20E
        0x71, 0x01, // 0x20A  ADD v1, 1
        0x00, 0xEE, // 0x20C  RET
        0x72, 0x01, // 0x20E  ADD v2, 1
        0x00, 0xEE, // 0x210  RET
    ]);

    vm.run_steps(3).unwrap();
    assert_eq!(vm.stack_depth(), 2);

    vm.run_steps(5).unwrap();
    assert_eq!(vm.stack_depth(), 0);
    assert_eq!(vm.pc(), 0x204);
    assert_eq!(&vm.registers()[0..3], &[1, 1, 1]);
}

/// Countdown loop driven by the delay timer.
#[test]
#[rustfmt::skip]
fn test_delay_loop() {
    let mut vm = load(&[
        0x60, 0x03, // 0x200  LD v0, 3
        0xF0, 0x15, // 0x202  LD DT, v0
        0xF1, 0x07, // 0x204  LD v1, DT
        0x31, 0x00, // 0x206  SE v1, 0
        0x12, 0x04, // 0x208  JP 0x204
        0x62, 0xFF, // 0x20A  LD v2, 0xFF
        0x12, 0x0C, // 0x20C  JP 0x20C
    ]);

    let keys = [false; KEY_COUNT as usize];
    for frame in 0..3 {
        vm.run_frame(&keys).unwrap();
        assert_eq!(vm.register(2), 0, "frame {frame}");
    }

    vm.run_frame(&keys).unwrap();
    assert_eq!(vm.register(2), 0xFF);
    assert_eq!(vm.pc(), 0x20C);
}

#[test]
fn test_fault_reports_address() {
    let mut vm = load(&[0x60, 0x01, 0xE0, 0x00]);

    match vm.run_steps(4) {
        Err(Chip8Error::Runtime(fault)) => {
            assert_eq!(
                fault,
                RuntimeError::UnknownOpcode {
                    address: 0x202,
                    opcode: 0xE000
                }
            );
            assert_eq!(fault.address(), 0x202);
            assert_eq!(
                fault.to_string(),
                "unsupported opcode E000 at 0x202"
            );
        }
        other => panic!("expected runtime fault, got {other:?}"),
    }

    assert_eq!(vm.fault().map(|f| f.address()), Some(0x202));
}
