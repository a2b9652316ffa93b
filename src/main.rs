use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chip8_vm::display::{render_text, HeadlessDisplay, MonoTermDisplay};
use chip8_vm::driver::{self, FaultPolicy, RunConfig};
use chip8_vm::input::{KeyState, TermKeypad};
use chip8_vm::interpreter::Chip8Interpreter;
use chip8_vm::memory::PROGRAM_ADDR;
use chip8_vm::opcode::disassemble;
use chip8_vm::sound::{Mute, SimpleBeep, Sound};

/// Run a CHIP-8 program in the terminal
#[derive(Parser, Debug)]
#[command(name = "chip8", version, about)]
struct Cli {
    /// program image, loaded at 0x200
    rom: PathBuf,

    /// instructions per second
    #[arg(long, default_value_t = 700)]
    hz: u32,

    /// seed for the random number generator
    #[arg(long)]
    seed: Option<u64>,

    /// what to do when the program faults
    #[arg(long, value_enum, default_value_t = FaultPolicy::Halt)]
    on_fault: FaultPolicy,

    /// no terminal UI; run --frames frames then print the screen and registers
    #[arg(long)]
    headless: bool,

    /// frames to run; unlimited unless headless
    #[arg(long)]
    frames: Option<u64>,

    /// print a listing of the program and exit
    #[arg(long)]
    disassemble: bool,

    /// no beeping
    #[arg(long)]
    mute: bool,
}

const HEADLESS_FRAMES: u64 = 600;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.disassemble {
        let program = std::fs::read(&cli.rom)?;
        for line in disassemble(&program, PROGRAM_ADDR) {
            println!("{}", line);
        }
        return Ok(());
    }

    let config = RunConfig {
        cpu_hz: cli.hz,
        fault_policy: cli.on_fault,
        max_frames: cli.frames.or(cli.headless.then_some(HEADLESS_FRAMES)),
        ..RunConfig::default()
    };
    let mut sound: Box<dyn Sound> = if cli.mute || cli.headless {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::new())
    };
    let quit = Arc::new(AtomicBool::new(false));

    if cli.headless {
        let mut interpreter = Chip8Interpreter::new(HeadlessDisplay::new(), KeyState::new());
        if let Some(seed) = cli.seed {
            interpreter = interpreter.with_seed(seed);
        }
        interpreter.load_from(&mut File::open(&cli.rom)?)?;
        let halted = driver::run(&mut interpreter, &config, sound.as_mut(), &quit)?;
        println!("{}", render_text(interpreter.framebuffer()));
        println!("{}", interpreter.dump());
        if let Some(fault) = halted {
            return Err(fault.into());
        }
        return Ok(());
    }

    // initialise
    let halted = {
        let display = MonoTermDisplay::new()?;
        let keypad = TermKeypad::new(Arc::clone(&quit))?;
        let mut interpreter = Chip8Interpreter::new(display, keypad);
        if let Some(seed) = cli.seed {
            interpreter = interpreter.with_seed(seed);
        }
        interpreter.load_from(&mut File::open(&cli.rom)?)?;
        driver::run(&mut interpreter, &config, sound.as_mut(), &quit)?
    };

    // shove some junk on stdout to stop the cli messing up the last frame
    for _ in 0..4 {
        println!();
    }
    match halted {
        Some(fault) => Err(fault.into()),
        None => Ok(()),
    }
}
