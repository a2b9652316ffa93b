//! Runs an interpreter against the wall clock: a burst of steps per frame,
//! one timer tick per frame, then sleep until the next frame is due.
use crate::display::Display;
use crate::error::Fault;
use crate::input::Keypad;
use crate::interpreter::{Chip8Interpreter, StepStatus};
use crate::sound::Sound;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// what to do when a step faults
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FaultPolicy {
    /// stop running and report the fault
    Halt,
    /// log it, step over the instruction and carry on
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// instructions per second
    pub cpu_hz: u32,
    /// timer ticks (and frames) per second
    pub timer_hz: u32,
    pub fault_policy: FaultPolicy,
    /// stop after this many frames; `None` runs until quit
    pub max_frames: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            cpu_hz: 700,
            timer_hz: 60,
            fault_policy: FaultPolicy::Halt,
            max_frames: None,
        }
    }
}

impl RunConfig {
    /// at least one, whatever the clock rates
    pub fn steps_per_frame(&self) -> u32 {
        (self.cpu_hz / self.timer_hz.max(1)).max(1)
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.timer_hz.max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// every step of the frame ran (faults skipped under `Skip` count too)
    Ran { steps: u32 },
    /// stopped early on `fx0a`
    AwaitingKey { steps: u32 },
    /// stopped on a fault under `Halt`, or one that couldn't be skipped;
    /// timers were not ticked
    Halted(Fault),
}

/// One frame's worth of steps followed by a timer tick.
pub fn run_frame<D: Display, K: Keypad>(
    c8: &mut Chip8Interpreter<D, K>,
    config: &RunConfig,
) -> FrameOutcome {
    let mut steps = 0;
    let mut waiting = false;
    for _ in 0..config.steps_per_frame() {
        match c8.step() {
            Ok(StepStatus::Continue) => steps += 1,
            Ok(StepStatus::AwaitingKey) => {
                waiting = true;
                break;
            }
            Err(fault) => match config.fault_policy {
                FaultPolicy::Halt => return FrameOutcome::Halted(fault),
                FaultPolicy::Skip => {
                    log::warn!("{}; skipping", fault);
                    if let Err(fault) = c8.skip_instruction() {
                        return FrameOutcome::Halted(fault);
                    }
                    steps += 1;
                }
            },
        }
    }
    c8.tick_timers();
    if waiting {
        FrameOutcome::AwaitingKey { steps }
    } else {
        FrameOutcome::Ran { steps }
    }
}

/// Run frames until `quit` is set, `max_frames` is reached, or a fault halts
/// the machine. The tone follows the sound timer. Returns the halting fault.
pub fn run<D: Display, K: Keypad>(
    c8: &mut Chip8Interpreter<D, K>,
    config: &RunConfig,
    sound: &mut dyn Sound,
    quit: &AtomicBool,
) -> Result<Option<Fault>, Box<dyn Error>> {
    let frame = config.frame_duration();
    let mut deadline = Instant::now();
    let mut frames = 0u64;
    log::info!(
        "running at {}Hz, {} steps per frame",
        config.cpu_hz,
        config.steps_per_frame()
    );

    while !quit.load(Ordering::SeqCst) {
        if config.max_frames.map_or(false, |max| frames >= max) {
            break;
        }
        let outcome = run_frame(c8, config);
        sound.set_tone(c8.st() > 0)?;
        frames += 1;

        if let FrameOutcome::Halted(fault) = outcome {
            log::error!("halted: {}\n{}", fault, c8.dump());
            sound.set_tone(false)?;
            return Ok(Some(fault));
        }

        deadline += frame;
        let now = Instant::now();
        if deadline > now {
            spin_sleep::sleep(deadline - now);
        } else {
            // running behind; don't try to catch up in a burst
            deadline = now;
        }
    }
    sound.set_tone(false)?;
    log::info!("stopped after {} frames", frames);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::input::KeyState;
    use crate::opcode::Instruction::{self, *};
    use crate::sound::Mute;

    fn machine(program: &[Instruction]) -> Chip8Interpreter<HeadlessDisplay, KeyState> {
        let bytes = program
            .iter()
            .flat_map(|ins| ins.encode().to_be_bytes())
            .collect::<Vec<_>>();
        let mut c8 = Chip8Interpreter::new(HeadlessDisplay::new(), KeyState::new()).with_seed(1);
        c8.load(&bytes).unwrap();
        c8
    }

    fn fast(fault_policy: FaultPolicy) -> RunConfig {
        RunConfig {
            cpu_hz: 600,
            timer_hz: 60,
            fault_policy,
            max_frames: Some(3),
        }
    }

    #[test]
    fn test_steps_per_frame() {
        assert_eq!(RunConfig::default().steps_per_frame(), 11);
        let slow = RunConfig {
            cpu_hz: 10,
            ..RunConfig::default()
        };
        assert_eq!(slow.steps_per_frame(), 1);
        assert_eq!(RunConfig::default().frame_duration(), Duration::from_secs(1) / 60);
    }

    #[test]
    fn test_frame_runs_steps_then_ticks() {
        let mut c8 = machine(&[LdImm(0, 5), LdDtVx(0), Jp(0x204)]);
        let outcome = run_frame(&mut c8, &fast(FaultPolicy::Halt));
        assert_eq!(outcome, FrameOutcome::Ran { steps: 10 });
        assert_eq!(c8.dt(), 4);
    }

    #[test]
    fn test_frame_stops_on_key_wait() {
        let mut c8 = machine(&[LdImm(0, 3), LdDtVx(0), LdVxKey(1), Jp(0x206)]);
        let config = fast(FaultPolicy::Halt);
        assert_eq!(run_frame(&mut c8, &config), FrameOutcome::AwaitingKey { steps: 2 });
        // timers keep running while waiting
        assert_eq!(c8.dt(), 2);
        assert_eq!(c8.pc(), 0x204);

        c8.keypad_mut().key_down(9);
        assert_eq!(run_frame(&mut c8, &config), FrameOutcome::Ran { steps: 10 });
        assert_eq!(c8.v(1), Some(9));
    }

    #[test]
    fn test_halt_policy() {
        let mut c8 = machine(&[LdImm(0, 1), Ret]);
        let outcome = run_frame(&mut c8, &fast(FaultPolicy::Halt));
        assert_eq!(outcome, FrameOutcome::Halted(Fault::StackUnderflow { address: 0x202 }));
        assert_eq!(c8.pc(), 0x202);
    }

    #[test]
    fn test_skip_policy() {
        let mut c8 = machine(&[Ret, LdImm(0, 1), Jp(0x204)]);
        let outcome = run_frame(&mut c8, &fast(FaultPolicy::Skip));
        assert_eq!(outcome, FrameOutcome::Ran { steps: 10 });
        assert_eq!(c8.v(0), Some(1));
    }

    #[test]
    fn test_skip_policy_halts_at_memory_end() {
        // 0xffe holds an ignored SYS with nowhere to go after it
        let mut c8 = machine(&[Jp(0xffe)]);
        let outcome = run_frame(&mut c8, &fast(FaultPolicy::Skip));
        assert_eq!(
            outcome,
            FrameOutcome::Halted(Fault::MemoryRangeFault {
                op: crate::error::MemoryOp::Fetch,
                base: 0x1000,
                length: 2
            })
        );
        assert_eq!(c8.pc(), 0xffe);
    }

    #[test]
    fn test_run_until_max_frames() -> Result<(), Box<dyn Error>> {
        let mut c8 = machine(&[LdImm(0, 2), LdStVx(0), Jp(0x204)]);
        let mut sound = Mute::new();
        let quit = AtomicBool::new(false);
        let halted = run(&mut c8, &fast(FaultPolicy::Halt), &mut sound, &quit)?;
        assert_eq!(halted, None);
        // 2 ticks of tone, then silence
        assert_eq!(c8.st(), 0);
        assert_eq!(sound.starts(), 1);
        assert!(!sound.is_beeping());
        Ok(())
    }

    #[test]
    fn test_run_reports_halt() -> Result<(), Box<dyn Error>> {
        let mut c8 = machine(&[Jp(0x100)]);
        let mut sound = Mute::new();
        let quit = AtomicBool::new(false);
        let halted = run(&mut c8, &fast(FaultPolicy::Halt), &mut sound, &quit)?;
        assert!(matches!(halted, Some(Fault::MemoryRangeFault { base: 0x100, .. })));
        Ok(())
    }

    #[test]
    fn test_run_stops_on_quit() -> Result<(), Box<dyn Error>> {
        let mut c8 = machine(&[Jp(0x200)]);
        let mut sound = Mute::new();
        let quit = AtomicBool::new(true);
        let config = RunConfig {
            max_frames: None,
            ..fast(FaultPolicy::Halt)
        };
        assert_eq!(run(&mut c8, &config, &mut sound, &quit)?, None);
        assert_eq!(c8.pc(), 0x200);
        Ok(())
    }
}
