//! # interpreter
//!
//! Fetch, decode and execute for one CHIP-8 machine. The interpreter owns the
//! machine state outright; the display and keypad are whatever the host hands
//! in (owned, or borrowed through `&mut`).
//!
//! Step contract:
//!  * a step executes exactly one instruction and returns `Continue`, or
//!  * returns `AwaitingKey` for `fx0a` with no key available; `pc` is left on
//!    the `fx0a` so the next step decodes it again, or
//!  * returns a `Fault`, in which case nothing changed and `pc` still points at
//!    the offending instruction. The host picks between halting and
//!    `skip_instruction`.
//!
//! Timers only move in `tick_timers`, never inside a step.
use crate::display::Display;
use crate::error::{Error, Fault, MemoryOp};
use crate::input::Keypad;
use crate::memory::{
    Chip8MemoryMap, MemoryMap, DISPLAY_HEIGHT, DISPLAY_WIDTH, MEMORY_SIZE, PROGRAM_ADDR,
    STACK_SLOTS,
};
use crate::opcode::{decode, Instruction};
use crate::sprite;
use crate::state::MachineState;
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io;

const VF: usize = 0xf;
const ADDR_MASK: u16 = 0x0fff;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Continue,
    /// `fx0a` is waiting on the keypad; step again once a key might be down
    AwaitingKey,
}

pub struct Chip8Interpreter<D, K> {
    state: MachineState,
    display: D,
    keypad: K,
    rng: Box<dyn RngCore>,
}

impl<D: Display, K: Keypad> Chip8Interpreter<D, K> {
    /// fresh machine, `pc` at 0x200, empty stack, random numbers from OS entropy
    pub fn new(display: D, keypad: K) -> Self {
        Chip8Interpreter {
            state: MachineState::new(),
            display,
            keypad,
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    /// repeatable `cxkk` results
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(Box::new(StdRng::seed_from_u64(seed)))
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore>) -> Self {
        self.rng = rng;
        self
    }

    /// copy a program image into the program region at 0x200. Registers and
    /// `pc` are untouched; an empty or oversized program changes nothing.
    pub fn load(&mut self, program: &[u8]) -> Result<(), Fault> {
        self.state.memory.load_program(program)?;
        debug!("loaded {} byte program", program.len());
        Ok(())
    }

    /// load a chip8 program from a reader
    pub fn load_from(&mut self, reader: &mut impl io::Read) -> Result<(), Error> {
        let mut program = Vec::new();
        reader.read_to_end(&mut program)?;
        self.load(&program)?;
        Ok(())
    }

    /// execute exactly one instruction
    pub fn step(&mut self) -> Result<StepStatus, Fault> {
        let address = self.state.pc;
        let result = self.fetch().and_then(|opcode| match decode(opcode) {
            Some(instruction) => {
                trace!("{:#05x}: {:04x}  {}", address, opcode, instruction);
                if !instruction.always_branches() {
                    check_next_pc(self.state.pc)?;
                }
                self.execute(instruction, address)
            }
            None => Err(Fault::IllegalOpcode { opcode, address }),
        });

        match result {
            Ok(StepStatus::Continue) => {}
            Ok(StepStatus::AwaitingKey) => self.state.pc = address,
            Err(ref fault) => {
                debug!("{}", fault);
                self.state.pc = address;
            }
        }
        let status = result?;
        self.present();
        Ok(status)
    }

    /// count both timers down by one, stopping at zero; call at 60Hz
    pub fn tick_timers(&mut self) {
        self.state.dt = self.state.dt.saturating_sub(1);
        self.state.st = self.state.st.saturating_sub(1);
    }

    /// step over the instruction at `pc` without running it; refuses to
    /// step off the end of memory
    pub fn skip_instruction(&mut self) -> Result<(), Fault> {
        let next = self.state.pc.saturating_add(2);
        check_next_pc(next)?;
        self.state.pc = next;
        Ok(())
    }

    fn fetch(&mut self) -> Result<u16, Fault> {
        let pc = self.state.pc;
        let opcode = self
            .state
            .memory
            .get_word(pc)
            .ok_or(Fault::MemoryRangeFault {
                op: MemoryOp::Fetch,
                base: pc,
                length: 2,
            })?;
        self.state.pc = pc + 2;
        Ok(opcode)
    }

    /// Nothing in here may touch state before every check that can fail has
    /// passed; `step` only has `pc` to put back.
    fn execute(&mut self, instruction: Instruction, address: u16) -> Result<StepStatus, Fault> {
        use Instruction::*;

        let s = &mut self.state;
        match instruction {
            Sys(nnn) => debug!("ignoring SYS {:#05x} at {:#05x}", nnn, address),
            Cls => {
                s.memory.framebuffer_mut().fill(0);
                s.dirty = true;
            }
            Ret => {
                if s.sp >= STACK_SLOTS {
                    return Err(Fault::StackUnderflow { address });
                }
                let slot = Chip8MemoryMap::stack_slot_addr(s.sp);
                let target = s.memory.get_word(slot).ok_or(Fault::MemoryRangeFault {
                    op: MemoryOp::Stack,
                    base: slot,
                    length: 2,
                })?;
                check_jump(target)?;
                s.sp += 1;
                s.pc = target;
            }
            Jp(nnn) => {
                check_jump(nnn)?;
                s.pc = nnn;
            }
            Call(nnn) => {
                check_jump(nnn)?;
                if s.sp == 0 {
                    return Err(Fault::StackOverflow { address });
                }
                let slot = Chip8MemoryMap::stack_slot_addr(s.sp - 1);
                // pc already points past the call
                s.memory.set_word(slot, s.pc).ok_or(Fault::MemoryRangeFault {
                    op: MemoryOp::Stack,
                    base: slot,
                    length: 2,
                })?;
                s.sp -= 1;
                s.pc = nnn;
            }
            SeImm(x, kk) => {
                let hit = s.v[x as usize] == kk;
                skip_if(s, hit)?;
            }
            SneImm(x, kk) => {
                let hit = s.v[x as usize] != kk;
                skip_if(s, hit)?;
            }
            SeReg(x, y) => {
                let hit = s.v[x as usize] == s.v[y as usize];
                skip_if(s, hit)?;
            }
            SneReg(x, y) => {
                let hit = s.v[x as usize] != s.v[y as usize];
                skip_if(s, hit)?;
            }
            LdImm(x, kk) => s.v[x as usize] = kk,
            AddImm(x, kk) => s.v[x as usize] = s.v[x as usize].wrapping_add(kk),
            LdReg(x, y) => s.v[x as usize] = s.v[y as usize],
            Or(x, y) => s.v[x as usize] |= s.v[y as usize],
            And(x, y) => s.v[x as usize] &= s.v[y as usize],
            Xor(x, y) => s.v[x as usize] ^= s.v[y as usize],
            // the flag always goes in last, from the operands as they were, so
            // VF as an operand still gets its flag
            AddReg(x, y) => {
                let (vx, vy) = (s.v[x as usize], s.v[y as usize]);
                let (sum, carry) = vx.overflowing_add(vy);
                s.v[x as usize] = sum;
                s.v[VF] = carry as u8;
            }
            Sub(x, y) => {
                let (vx, vy) = (s.v[x as usize], s.v[y as usize]);
                s.v[x as usize] = vx.wrapping_sub(vy);
                s.v[VF] = (vx > vy) as u8;
            }
            Shr(x, _) => {
                let vx = s.v[x as usize];
                s.v[x as usize] = vx >> 1;
                s.v[VF] = vx & 0x01;
            }
            Subn(x, y) => {
                let (vx, vy) = (s.v[x as usize], s.v[y as usize]);
                s.v[x as usize] = vy.wrapping_sub(vx);
                s.v[VF] = (vy > vx) as u8;
            }
            Shl(x, _) => {
                let vx = s.v[x as usize];
                s.v[x as usize] = vx << 1;
                s.v[VF] = vx >> 7;
            }
            LdI(nnn) => s.i = nnn,
            JpV0(nnn) => {
                let target = (nnn + s.v[0] as u16) & ADDR_MASK;
                check_jump(target)?;
                s.pc = target;
            }
            Rnd(x, kk) => s.v[x as usize] = (self.rng.next_u32() as u8) & kk,
            Drw(x, y, n) => {
                let base = s.i & ADDR_MASK;
                let len = n as usize;
                let mut rows = [0u8; 16];
                let sprite_rows = s.memory.get_ro_slice(base, len).ok_or(Fault::MemoryRangeFault {
                    op: MemoryOp::Sprite,
                    base,
                    length: n as u16,
                })?;
                rows[..len].copy_from_slice(sprite_rows);

                let (px, py) = (s.v[x as usize], s.v[y as usize]);
                let collision = sprite::draw(s.memory.framebuffer_mut(), px, py, &rows[..len]);
                s.v[VF] = collision as u8;
                s.dirty = true;
            }
            Skp(x) => {
                let held = self.keypad.is_held(s.v[x as usize] & 0xf);
                skip_if(s, held)?;
            }
            Sknp(x) => {
                let held = self.keypad.is_held(s.v[x as usize] & 0xf);
                skip_if(s, !held)?;
            }
            LdVxDt(x) => s.v[x as usize] = s.dt,
            LdVxKey(x) => match self.keypad.wait_for_key() {
                Some(key) => s.v[x as usize] = key & 0xf,
                None => return Ok(StepStatus::AwaitingKey),
            },
            LdDtVx(x) => s.dt = s.v[x as usize],
            LdStVx(x) => s.st = s.v[x as usize],
            AddI(x) => s.i = (s.i + s.v[x as usize] as u16) & ADDR_MASK,
            LdFont(x) => s.i = Chip8MemoryMap::glyph_addr(s.v[x as usize]),
            Bcd(x) => {
                let base = s.i & ADDR_MASK;
                let vx = s.v[x as usize];
                let digits = s.memory.get_rw_slice(base, 3).ok_or(Fault::MemoryRangeFault {
                    op: MemoryOp::Bcd,
                    base,
                    length: 3,
                })?;
                digits.copy_from_slice(&bcd(vx));
                if Chip8MemoryMap::overlaps_display(base, 3) {
                    s.dirty = true;
                }
            }
            StoreRegs(x) => {
                let base = s.i & ADDR_MASK;
                let len = x as usize + 1;
                let target = s.memory.get_rw_slice(base, len).ok_or(Fault::MemoryRangeFault {
                    op: MemoryOp::Store,
                    base,
                    length: len as u16,
                })?;
                target.copy_from_slice(&s.v[..len]);
                if Chip8MemoryMap::overlaps_display(base, len) {
                    s.dirty = true;
                }
                s.i = (base + len as u16) & ADDR_MASK;
            }
            LoadRegs(x) => {
                let base = s.i & ADDR_MASK;
                let len = x as usize + 1;
                let source = s.memory.get_ro_slice(base, len).ok_or(Fault::MemoryRangeFault {
                    op: MemoryOp::Load,
                    base,
                    length: len as u16,
                })?;
                s.v[..len].copy_from_slice(source);
                s.i = (base + len as u16) & ADDR_MASK;
            }
        }
        Ok(StepStatus::Continue)
    }

    /// hand the framebuffer to the display if it changed; a failing display
    /// keeps the dirty flag so the next step tries again
    fn present(&mut self) {
        if !self.state.dirty {
            return;
        }
        match self.display.present(
            DISPLAY_WIDTH,
            DISPLAY_HEIGHT,
            self.state.memory.framebuffer(),
        ) {
            Ok(()) => self.state.dirty = false,
            Err(e) => warn!("display: {}", e),
        }
    }

    pub fn pc(&self) -> u16 {
        self.state.pc
    }

    pub fn sp(&self) -> u16 {
        self.state.sp
    }

    pub fn i(&self) -> u16 {
        self.state.i
    }

    pub fn dt(&self) -> u8 {
        self.state.dt
    }

    pub fn st(&self) -> u8 {
        self.state.st
    }

    /// V0-VF; `None` past VF
    pub fn v(&self, register: u8) -> Option<u8> {
        self.state.v.get(register as usize).copied()
    }

    /// VF
    pub fn flag(&self) -> u8 {
        self.state.v[VF]
    }

    pub fn read_byte(&self, addr: u16) -> Option<u8> {
        self.state.memory.get_byte(addr)
    }

    pub fn read_word(&self, addr: u16) -> Option<u16> {
        self.state.memory.get_word(addr)
    }

    pub fn stack_empty(&self) -> bool {
        self.state.sp >= STACK_SLOTS
    }

    /// the return address on top of the stack
    pub fn stack_peek(&self) -> Option<u16> {
        if self.stack_empty() {
            return None;
        }
        self.read_word(Chip8MemoryMap::stack_slot_addr(self.state.sp))
    }

    pub fn framebuffer(&self) -> &[u8] {
        self.state.memory.framebuffer()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// registers as text, for logging
    pub fn dump(&self) -> String {
        self.state.to_string()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn keypad_mut(&mut self) -> &mut K {
        &mut self.keypad
    }
}

fn skip_if(s: &mut MachineState, condition: bool) -> Result<(), Fault> {
    if condition {
        let next = s.pc + 2;
        check_next_pc(next)?;
        s.pc = next;
    }
    Ok(())
}

/// the next instruction has to be somewhere in memory
fn check_next_pc(pc: u16) -> Result<(), Fault> {
    if (pc as usize) < MEMORY_SIZE {
        Ok(())
    } else {
        Err(Fault::MemoryRangeFault {
            op: MemoryOp::Fetch,
            base: pc,
            length: 2,
        })
    }
}

/// control may only land on an even address inside the program area
fn check_jump(target: u16) -> Result<(), Fault> {
    let in_range = target >= PROGRAM_ADDR && (target as usize) < MEMORY_SIZE - 1;
    if in_range && target % 2 == 0 {
        Ok(())
    } else {
        Err(Fault::MemoryRangeFault {
            op: MemoryOp::Jump,
            base: target,
            length: 2,
        })
    }
}

/// hundreds, tens, ones
fn bcd(value: u8) -> [u8; 3] {
    [value / 100, (value / 10) % 10, value % 10]
}
