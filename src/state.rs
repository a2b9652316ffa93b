use crate::memory::{Chip8MemoryMap, PROGRAM_ADDR, STACK_SLOTS};
use std::fmt;

/// Everything a CHIP-8 program can observe, plus the bookkeeping the
/// interpreter needs between steps. Plain data; the interpreter is the only
/// thing that mutates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineState {
    pub memory: Chip8MemoryMap,
    /// always even, and inside the program region between steps
    pub pc: u16,
    /// stack slot index; `STACK_SLOTS` when empty, 0 when full
    pub sp: u16,
    /// only the low 12 bits are ever used as an address
    pub i: u16,
    /// V0-VF; VF doubles as the carry/borrow/shift/collision flag
    pub v: [u8; 16],
    pub dt: u8,
    pub st: u8,
    /// framebuffer changed and the display hasn't been told yet
    pub dirty: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineState {
    pub fn new() -> Self {
        MachineState {
            memory: Chip8MemoryMap::new(),
            pc: PROGRAM_ADDR,
            sp: STACK_SLOTS,
            i: 0,
            v: [0; 16],
            dt: 0,
            st: 0,
            dirty: false,
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "pc: {:#05x}, sp: {:02}, i: {:#05x}, dt: {:03}, st: {:03}",
            self.pc, self.sp, self.i, self.dt, self.st
        )?;
        for (row, regs) in self.v.chunks(4).enumerate() {
            let line = regs
                .iter()
                .enumerate()
                .map(|(col, val)| format!("v{:x}: {:#04x}", row * 4 + col, val))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let s = MachineState::new();
        assert_eq!(s.pc, 0x200);
        assert_eq!(s.sp, 48);
        assert_eq!(s.v, [0; 16]);
        assert!(!s.dirty);
    }

    #[test]
    fn test_dump_lists_every_register() {
        let mut s = MachineState::new();
        s.v[0xf] = 0x01;
        s.v[0xa] = 0xfe;
        let dump = s.to_string();
        assert!(dump.starts_with("pc: 0x200, sp: 48, i: 0x000"));
        assert!(dump.contains("va: 0xfe"));
        assert!(dump.contains("vf: 0x01"));
        assert_eq!(dump.lines().count(), 5);
    }
}
