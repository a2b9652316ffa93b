//! # opcode
//!
//! Typed decode of the 35 standard CHIP-8 instructions. Field names follow
//! the usual notation, for an opcode `0xcxyd`:
//!
//!  * `nnn`  low 12 bits, an address
//!  * `x`    bits 8-11, a register
//!  * `y`    bits 4-7, a register
//!  * `kk`   low byte, an immediate
//!  * `n`    low nibble, a sprite height
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// 0nnn: machine code routine on the COSMAC; ignored here
    Sys(u16),
    /// 00e0
    Cls,
    /// 00ee
    Ret,
    /// 1nnn
    Jp(u16),
    /// 2nnn
    Call(u16),
    /// 3xkk
    SeImm(u8, u8),
    /// 4xkk
    SneImm(u8, u8),
    /// 5xy0
    SeReg(u8, u8),
    /// 6xkk
    LdImm(u8, u8),
    /// 7xkk
    AddImm(u8, u8),
    /// 8xy0
    LdReg(u8, u8),
    /// 8xy1
    Or(u8, u8),
    /// 8xy2
    And(u8, u8),
    /// 8xy3
    Xor(u8, u8),
    /// 8xy4
    AddReg(u8, u8),
    /// 8xy5
    Sub(u8, u8),
    /// 8xy6
    Shr(u8, u8),
    /// 8xy7
    Subn(u8, u8),
    /// 8xye
    Shl(u8, u8),
    /// 9xy0
    SneReg(u8, u8),
    /// annn
    LdI(u16),
    /// bnnn
    JpV0(u16),
    /// cxkk
    Rnd(u8, u8),
    /// dxyn
    Drw(u8, u8, u8),
    /// ex9e
    Skp(u8),
    /// exa1
    Sknp(u8),
    /// fx07
    LdVxDt(u8),
    /// fx0a
    LdVxKey(u8),
    /// fx15
    LdDtVx(u8),
    /// fx18
    LdStVx(u8),
    /// fx1e
    AddI(u8),
    /// fx29
    LdFont(u8),
    /// fx33
    Bcd(u8),
    /// fx55
    StoreRegs(u8),
    /// fx65
    LoadRegs(u8),
}

/// `None` for anything outside the instruction set
pub fn decode(opcode: u16) -> Option<Instruction> {
    use Instruction::*;

    let nnn = opcode & 0x0fff;
    let x = ((opcode >> 8) & 0xf) as u8;
    let y = ((opcode >> 4) & 0xf) as u8;
    let n = (opcode & 0xf) as u8;
    let kk = (opcode & 0xff) as u8;

    let instruction = match opcode >> 12 {
        0x0 => match nnn {
            0x0e0 => Cls,
            0x0ee => Ret,
            _ => Sys(nnn),
        },
        0x1 => Jp(nnn),
        0x2 => Call(nnn),
        0x3 => SeImm(x, kk),
        0x4 => SneImm(x, kk),
        0x5 if n == 0 => SeReg(x, y),
        0x6 => LdImm(x, kk),
        0x7 => AddImm(x, kk),
        0x8 => match n {
            0x0 => LdReg(x, y),
            0x1 => Or(x, y),
            0x2 => And(x, y),
            0x3 => Xor(x, y),
            0x4 => AddReg(x, y),
            0x5 => Sub(x, y),
            0x6 => Shr(x, y),
            0x7 => Subn(x, y),
            0xe => Shl(x, y),
            _ => return None,
        },
        0x9 if n == 0 => SneReg(x, y),
        0xa => LdI(nnn),
        0xb => JpV0(nnn),
        0xc => Rnd(x, kk),
        0xd => Drw(x, y, n),
        0xe => match kk {
            0x9e => Skp(x),
            0xa1 => Sknp(x),
            _ => return None,
        },
        0xf => match kk {
            0x07 => LdVxDt(x),
            0x0a => LdVxKey(x),
            0x15 => LdDtVx(x),
            0x18 => LdStVx(x),
            0x1e => AddI(x),
            0x29 => LdFont(x),
            0x33 => Bcd(x),
            0x55 => StoreRegs(x),
            0x65 => LoadRegs(x),
            _ => return None,
        },
        _ => return None,
    };
    Some(instruction)
}

impl Instruction {
    /// never falls through to the next instruction
    pub fn always_branches(&self) -> bool {
        matches!(self, Instruction::Jp(_) | Instruction::JpV0(_) | Instruction::Ret)
    }

    /// the opcode word this instruction decodes from; register and address
    /// fields are masked to their width
    pub fn encode(&self) -> u16 {
        use Instruction::*;

        fn xkk(group: u16, x: u8, kk: u8) -> u16 {
            group << 12 | ((x as u16 & 0xf) << 8) | kk as u16
        }
        fn xyn(group: u16, x: u8, y: u8, n: u8) -> u16 {
            group << 12 | ((x as u16 & 0xf) << 8) | ((y as u16 & 0xf) << 4) | (n as u16 & 0xf)
        }
        fn addr(group: u16, nnn: u16) -> u16 {
            group << 12 | (nnn & 0x0fff)
        }

        match *self {
            Sys(nnn) => addr(0x0, nnn),
            Cls => 0x00e0,
            Ret => 0x00ee,
            Jp(nnn) => addr(0x1, nnn),
            Call(nnn) => addr(0x2, nnn),
            SeImm(x, kk) => xkk(0x3, x, kk),
            SneImm(x, kk) => xkk(0x4, x, kk),
            SeReg(x, y) => xyn(0x5, x, y, 0),
            LdImm(x, kk) => xkk(0x6, x, kk),
            AddImm(x, kk) => xkk(0x7, x, kk),
            LdReg(x, y) => xyn(0x8, x, y, 0x0),
            Or(x, y) => xyn(0x8, x, y, 0x1),
            And(x, y) => xyn(0x8, x, y, 0x2),
            Xor(x, y) => xyn(0x8, x, y, 0x3),
            AddReg(x, y) => xyn(0x8, x, y, 0x4),
            Sub(x, y) => xyn(0x8, x, y, 0x5),
            Shr(x, y) => xyn(0x8, x, y, 0x6),
            Subn(x, y) => xyn(0x8, x, y, 0x7),
            Shl(x, y) => xyn(0x8, x, y, 0xe),
            SneReg(x, y) => xyn(0x9, x, y, 0),
            LdI(nnn) => addr(0xa, nnn),
            JpV0(nnn) => addr(0xb, nnn),
            Rnd(x, kk) => xkk(0xc, x, kk),
            Drw(x, y, n) => xyn(0xd, x, y, n),
            Skp(x) => xkk(0xe, x, 0x9e),
            Sknp(x) => xkk(0xe, x, 0xa1),
            LdVxDt(x) => xkk(0xf, x, 0x07),
            LdVxKey(x) => xkk(0xf, x, 0x0a),
            LdDtVx(x) => xkk(0xf, x, 0x15),
            LdStVx(x) => xkk(0xf, x, 0x18),
            AddI(x) => xkk(0xf, x, 0x1e),
            LdFont(x) => xkk(0xf, x, 0x29),
            Bcd(x) => xkk(0xf, x, 0x33),
            StoreRegs(x) => xkk(0xf, x, 0x55),
            LoadRegs(x) => xkk(0xf, x, 0x65),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            Sys(nnn) => write!(f, "SYS {:#05x}", nnn),
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jp(nnn) => write!(f, "JP {:#05x}", nnn),
            Call(nnn) => write!(f, "CALL {:#05x}", nnn),
            SeImm(x, kk) => write!(f, "SE V{:X}, {:#04x}", x, kk),
            SneImm(x, kk) => write!(f, "SNE V{:X}, {:#04x}", x, kk),
            SeReg(x, y) => write!(f, "SE V{:X}, V{:X}", x, y),
            LdImm(x, kk) => write!(f, "LD V{:X}, {:#04x}", x, kk),
            AddImm(x, kk) => write!(f, "ADD V{:X}, {:#04x}", x, kk),
            LdReg(x, y) => write!(f, "LD V{:X}, V{:X}", x, y),
            Or(x, y) => write!(f, "OR V{:X}, V{:X}", x, y),
            And(x, y) => write!(f, "AND V{:X}, V{:X}", x, y),
            Xor(x, y) => write!(f, "XOR V{:X}, V{:X}", x, y),
            AddReg(x, y) => write!(f, "ADD V{:X}, V{:X}", x, y),
            Sub(x, y) => write!(f, "SUB V{:X}, V{:X}", x, y),
            Shr(x, _) => write!(f, "SHR V{:X}", x),
            Subn(x, y) => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Shl(x, _) => write!(f, "SHL V{:X}", x),
            SneReg(x, y) => write!(f, "SNE V{:X}, V{:X}", x, y),
            LdI(nnn) => write!(f, "LD I, {:#05x}", nnn),
            JpV0(nnn) => write!(f, "JP V0, {:#05x}", nnn),
            Rnd(x, kk) => write!(f, "RND V{:X}, {:#04x}", x, kk),
            Drw(x, y, n) => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            Skp(x) => write!(f, "SKP V{:X}", x),
            Sknp(x) => write!(f, "SKNP V{:X}", x),
            LdVxDt(x) => write!(f, "LD V{:X}, DT", x),
            LdVxKey(x) => write!(f, "LD V{:X}, K", x),
            LdDtVx(x) => write!(f, "LD DT, V{:X}", x),
            LdStVx(x) => write!(f, "LD ST, V{:X}", x),
            AddI(x) => write!(f, "ADD I, V{:X}", x),
            LdFont(x) => write!(f, "LD F, V{:X}", x),
            Bcd(x) => write!(f, "LD B, V{:X}", x),
            StoreRegs(x) => write!(f, "LD [I], V{:X}", x),
            LoadRegs(x) => write!(f, "LD V{:X}, [I]", x),
        }
    }
}

/// Listing of a program image, one line per word, starting at `base`. Data
/// words that don't decode are shown as `DW`.
pub fn disassemble(program: &[u8], base: u16) -> Vec<String> {
    program
        .chunks(2)
        .enumerate()
        .map(|(n, word)| {
            let addr = base.wrapping_add(2 * n as u16);
            let opcode = match word {
                [hi, lo] => u16::from_be_bytes([*hi, *lo]),
                [hi] => (*hi as u16) << 8,
                _ => 0,
            };
            match decode(opcode) {
                Some(ins) => format!("{:#05x}: {:04x}  {}", addr, opcode, ins),
                None => format!("{:#05x}: {:04x}  DW {:#06x}", addr, opcode, opcode),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use Instruction::*;

    #[test]
    fn test_decode_groups() {
        assert_eq!(decode(0x00e0), Some(Cls));
        assert_eq!(decode(0x00ee), Some(Ret));
        assert_eq!(decode(0x0123), Some(Sys(0x123)));
        assert_eq!(decode(0x1234), Some(Jp(0x234)));
        assert_eq!(decode(0x8ab4), Some(AddReg(0xa, 0xb)));
        assert_eq!(decode(0x8abe), Some(Shl(0xa, 0xb)));
        assert_eq!(decode(0xd125), Some(Drw(1, 2, 5)));
        assert_eq!(decode(0xe39e), Some(Skp(3)));
        assert_eq!(decode(0xf265), Some(LoadRegs(2)));
    }

    #[test]
    fn test_decode_rejects_undefined() {
        for op in [0x5121, 0x9ab1, 0x8008, 0x800f, 0xe09f, 0xf000, 0xf0ff] {
            assert_eq!(decode(op), None, "{:04x} should not decode", op);
        }
    }

    #[test]
    fn test_encode_masks_fields() {
        assert_eq!(Jp(0x1234).encode(), 0x1234);
        assert_eq!(LdImm(0x1f, 0x42).encode(), 0x6f42);
        assert_eq!(Drw(0, 1, 0x1f).encode(), 0xd01f);
        assert_eq!(decode(Subn(4, 5).encode()), Some(Subn(4, 5)));
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Call(0x300).to_string(), "CALL 0x300");
        assert_eq!(SeImm(0xa, 0x7).to_string(), "SE VA, 0x07");
        assert_eq!(Drw(0, 1, 15).to_string(), "DRW V0, V1, 15");
        assert_eq!(StoreRegs(0xf).to_string(), "LD [I], VF");
    }

    #[test]
    fn test_disassemble() {
        let listing = disassemble(&[0x00, 0xe0, 0x51, 0x21, 0xa2], 0x200);
        assert_eq!(
            listing,
            vec![
                "0x200: 00e0  CLS".to_string(),
                "0x202: 5121  DW 0x5121".to_string(),
                "0x204: a200  LD I, 0x200".to_string(),
            ]
        );
    }
}
