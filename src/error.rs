use std::fmt;
use std::io;

/// which kind of memory access a range fault came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOp {
    /// `fx55`, registers into memory
    Store,
    /// `fx65`, memory into registers
    Load,
    /// `fx33`
    Bcd,
    /// `dxyn` reading its sprite rows
    Sprite,
    /// `1nnn`, `2nnn`, `bnnn` or `00ee` leaving the program region
    Jump,
    /// instruction fetch past the end of memory
    Fetch,
    /// `2nnn` or `00ee` reaching a stack slot
    Stack,
}

impl fmt::Display for MemoryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemoryOp::Store => "store",
            MemoryOp::Load => "load",
            MemoryOp::Bcd => "bcd",
            MemoryOp::Sprite => "sprite",
            MemoryOp::Jump => "jump",
            MemoryOp::Fetch => "fetch",
            MemoryOp::Stack => "stack",
        };
        f.write_str(name)
    }
}

/// Everything the engine can refuse to do. A faulting instruction leaves the
/// machine exactly as it was before the step, with `pc` still pointing at it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("illegal opcode {opcode:#06x} at {address:#05x}")]
    IllegalOpcode { opcode: u16, address: u16 },

    #[error("stack overflow calling from {address:#05x}")]
    StackOverflow { address: u16 },

    #[error("stack underflow returning from {address:#05x}")]
    StackUnderflow { address: u16 },

    #[error("program is {size} bytes, the program region holds {capacity}")]
    ProgramTooLarge { size: usize, capacity: usize },

    #[error("program is empty")]
    EmptyProgram,

    #[error("{op} of {length} bytes at {base:#05x} is outside memory")]
    MemoryRangeFault { op: MemoryOp, base: u16, length: u16 },
}

/// errors from loading a program out of a reader
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Fault(#[from] Fault),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_opcode_message() {
        let f = Fault::IllegalOpcode {
            opcode: 0x5121,
            address: 0x204,
        };
        assert_eq!(f.to_string(), "illegal opcode 0x5121 at 0x204");
    }

    #[test]
    fn test_range_fault_message() {
        let f = Fault::MemoryRangeFault {
            op: MemoryOp::Store,
            base: 0xffe,
            length: 4,
        };
        assert_eq!(f.to_string(), "store of 4 bytes at 0xffe is outside memory");
    }
}
