use chip8::{constants::*, prelude::*};

const MAZE: &[u8] = include_bytes!("../programs/maze");

fn run_maze(seed: u64, frames: usize) -> Chip8Vm {
    let mut vm = Chip8Vm::new(Chip8Conf {
        seed: Some(seed),
        ..Chip8Conf::default()
    });
    vm.load_bytecode(MAZE).unwrap();

    let keys = [false; KEY_COUNT as usize];
    for _ in 0..frames {
        vm.run_frame(&keys).unwrap();
    }

    vm
}

#[test]
fn test_maze_completes() {
    let vm = run_maze(1, 200);

    // Program ends in a `JP 0x218` loop once the last row is drawn.
    assert_eq!(vm.pc(), 0x218);
    assert_eq!(vm.register(0), 0x00);
    assert_eq!(vm.register(1), 0x20);
    assert_eq!(vm.register(0xF), 0);
    assert_eq!(vm.stack_depth(), 0);

    // Every 4x4 cell holds a diagonal of exactly 4 pixels.
    let lit = vm.display_buffer().iter().filter(|px| **px).count();
    assert_eq!(lit, (DISPLAY_WIDTH / 4) * (DISPLAY_HEIGHT / 4) * 4);
}

#[test]
fn test_maze_is_reproducible() {
    let a = run_maze(0xDEAD_BEEF, 200);
    let b = run_maze(0xDEAD_BEEF, 200);

    assert_eq!(a.display_buffer(), b.display_buffer());
    assert_eq!(
        a.dump_display().unwrap(),
        b.dump_display().unwrap(),
    );
}

#[test]
fn test_maze_partial_frame() {
    // First frame only draws the first few cells of the top row.
    let vm = run_maze(7, 1);

    assert!(vm.fault().is_none());
    let lit = vm.display_buffer().iter().filter(|px| **px).count();
    assert!(lit > 0 && lit < DISPLAY_BUFFER_SIZE);
    assert!((0..DISPLAY_WIDTH).all(|x| (4..DISPLAY_HEIGHT).all(|y| !vm.pixel(x, y))));
}
