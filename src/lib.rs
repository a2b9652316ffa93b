//! # chip8-vm
//!
//! A CHIP-8 virtual machine: the fetch/decode/execute engine plus the bits a
//! host needs to put it on a terminal.
//!
//! ## Design
//!
//! * the engine (`interpreter`) owns the machine state and nothing else; it
//!   is driven one `step()` at a time and never looks at a clock
//! * timers tick from a separate `tick_timers()` call, so CPU speed and timer
//!   cadence can be set independently by whoever drives it
//! * faults are values: a faulting instruction changes nothing, and the
//!   driver decides whether to halt or skip
//! * display, keypad and sound are traits, so a variety of front ends work;
//!   the terminal one is TUI + crossterm
//!
//! Model
//!
//! ```text
//! main (cli)
//!  |-- display, keypad, sound, RunConfig
//!  |-- interpreter(display, keypad)
//!  |    |-- machine state(memory map, registers, timers)
//!  |    |-- opcode decode
//!  |    `-- sprite compositor
//!  `-- driver loop
//!       |-- steps_per_frame x interpreter.step()
//!       |-- interpreter.tick_timers()
//!       |-- sound.set_tone(st > 0)
//!       `-- sleep until next frame
//! ```
//!
//! ## Memory map
//!
//! ```text
//! 0x000-0x1ff  interpreter (font at 0x050)
//! 0x200-0xe9f  program
//! 0xea0-0xf9f  display, 64x32 at 1bpp
//! 0xfa0-0xfff  stack, 48 return addresses
//! ```
pub mod display;
pub mod driver;
pub mod error;
pub mod input;
pub mod interpreter;
pub mod memory;
pub mod opcode;
pub mod sound;
pub mod sprite;
pub mod state;

pub use error::{Error, Fault, MemoryOp};
pub use interpreter::{Chip8Interpreter, StepStatus};
pub use state::MachineState;
