use crate::error::Fault;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents a byte-addressable memory map. Every access is bounds-checked
/// and comes back as `None` rather than panicking, so the interpreter can turn
/// a bad address into a fault before anything is touched.
pub trait MemoryMap {
    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Option<&[u8]>;

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Option<&mut [u8]>;

    fn get_byte(&self, addr: u16) -> Option<u8> {
        self.get_ro_slice(addr, 1).map(|b| b[0])
    }

    /// get a big-endian two-byte word (opcodes, stack slots)
    fn get_word(&self, addr: u16) -> Option<u16> {
        self.get_ro_slice(addr, 2)
            .map(|w| u16::from_be_bytes([w[0], w[1]]))
    }

    fn set_word(&mut self, addr: u16, word: u16) -> Option<()> {
        self.get_rw_slice(addr, 2)
            .map(|w| w.copy_from_slice(&word.to_be_bytes()))
    }

    /// write a chunk of bytes into "RAM"; nothing is written if it doesn't fit
    fn write(&mut self, data: &[u8], addr: u16) -> Option<()> {
        self.get_rw_slice(addr, data.len())
            .map(|bytes| bytes.copy_from_slice(data))
    }
}

/// how much RAM we have
pub const MEMORY_SIZE: usize = 0x1000;

/// interpreter area; programs never run here but the font lives in it
pub const RESERVED_SIZE: usize = 0x200;
/// 64x32 pixels at one bit each
pub const DISPLAY_SIZE: usize = 0x100;
/// 48 two-byte return addresses
pub const STACK_SIZE: usize = 0x60;
/// whatever is left over is for the program
pub const USER_SIZE: usize = MEMORY_SIZE - RESERVED_SIZE - DISPLAY_SIZE - STACK_SIZE;

/// where the program is loaded
pub const PROGRAM_ADDR: u16 = RESERVED_SIZE as u16;
pub const DISPLAY_ADDR: u16 = (RESERVED_SIZE + USER_SIZE) as u16;
pub const STACK_ADDR: u16 = (RESERVED_SIZE + USER_SIZE + DISPLAY_SIZE) as u16;
pub const STACK_SLOTS: u16 = (STACK_SIZE / 2) as u16;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
/// bytes per framebuffer row
pub const DISPLAY_STRIDE: usize = DISPLAY_WIDTH / 8;

pub const FONT_ADDR: u16 = 0x050;
pub const FONT_GLYPH_SIZE: u16 = 5;

const _: () = assert!(RESERVED_SIZE + USER_SIZE + DISPLAY_SIZE + STACK_SIZE == MEMORY_SIZE);
const _: () = assert!(DISPLAY_STRIDE * DISPLAY_HEIGHT == DISPLAY_SIZE);
const _: () = assert!(FONT_ADDR as usize + CHIP8_FONT.len() <= RESERVED_SIZE);

/// Defines the CHIP-8 memory map used by this machine:
///   0x0000-0x01ff  interpreter (font at 0x050)
///   0x0200-0x0e9f  program
///   0x0ea0-0x0f9f  display
///   0x0fa0-0x0fff  stack
///
/// chip-8 programs *should* not access the last two directly, but nothing
/// stops `fx55`/`fx65` from doing so
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
}

impl MemoryMap for Chip8MemoryMap {
    fn get_ro_slice(&self, addr: u16, len: usize) -> Option<&[u8]> {
        let a = addr as usize;
        self.bytes.get(a..a.checked_add(len)?)
    }

    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Option<&mut [u8]> {
        let a = addr as usize;
        self.bytes.get_mut(a..a.checked_add(len)?)
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip8MemoryMap {
    /// zeroed memory with the font baked into the interpreter area
    pub fn new() -> Self {
        let mut bytes = vec![0u8; MEMORY_SIZE].into_boxed_slice();
        let font = FONT_ADDR as usize;
        bytes[font..font + CHIP8_FONT.len()].copy_from_slice(&CHIP8_FONT);
        Chip8MemoryMap { bytes }
    }

    /// load a CHIP-8 program at 0x200; on error memory is left alone
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Fault> {
        if program.is_empty() {
            return Err(Fault::EmptyProgram);
        }
        if program.len() > USER_SIZE {
            return Err(Fault::ProgramTooLarge {
                size: program.len(),
                capacity: USER_SIZE,
            });
        }
        let start = PROGRAM_ADDR as usize;
        self.bytes[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }

    pub fn framebuffer(&self) -> &[u8] {
        let a = DISPLAY_ADDR as usize;
        &self.bytes[a..a + DISPLAY_SIZE]
    }

    pub fn framebuffer_mut(&mut self) -> &mut [u8] {
        let a = DISPLAY_ADDR as usize;
        &mut self.bytes[a..a + DISPLAY_SIZE]
    }

    /// address of a stack slot; slot 0 is the deepest
    pub fn stack_slot_addr(slot: u16) -> u16 {
        STACK_ADDR + 2 * slot
    }

    /// whether `[addr, addr + len)` touches the display region
    pub fn overlaps_display(addr: u16, len: usize) -> bool {
        let start = addr as usize;
        let display = DISPLAY_ADDR as usize;
        start < display + DISPLAY_SIZE && start + len > display
    }

    /// address of the built-in glyph for the low nibble of `digit`
    pub fn glyph_addr(digit: u8) -> u16 {
        FONT_ADDR + FONT_GLYPH_SIZE * (digit & 0x0f) as u16
    }
}

pub const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
