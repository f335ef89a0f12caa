//! Read-only metadata for machine instructions and pseudo-ops.

use std::{fmt, str::FromStr};

/// Represents the CPU registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl TryFrom<i32> for Register {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Register::R0),
            1 => Ok(Register::R1),
            2 => Ok(Register::R2),
            3 => Ok(Register::R3),
            4 => Ok(Register::R4),
            5 => Ok(Register::R5),
            6 => Ok(Register::R6),
            7 => Ok(Register::R7),
            _ => Err(()),
        }
    }
}

/// Condition bits tested by a branch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flag {
    /// No bits set, plain `BR`
    Never,
    /// -
    N,
    /// 0
    Z,
    /// +
    P,
    /// <= 0
    Nz,
    /// != 0
    Np,
    /// >= 0
    Zp,
    /// Unconditional
    Nzp,
}

impl Flag {
    /// The `nzp` field of the branch word.
    pub fn bits(self) -> u16 {
        match self {
            Flag::Never => 0b000,
            Flag::N => 0b100,
            Flag::Z => 0b010,
            Flag::P => 0b001,
            Flag::Nz => 0b110,
            Flag::Np => 0b101,
            Flag::Zp => 0b011,
            Flag::Nzp => 0b111,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InstrKind {
    Add,
    And,
    Br(Flag),
    Dbug,
    Jsr,
    Jmp,
    Jsrr,
    Jmpr,
    Ld,
    Ldi,
    Ldr,
    Lea,
    Not,
    Ret,
    St,
    Sti,
    Str,
    Trap,
}

impl InstrKind {
    pub fn opcode(self) -> u16 {
        match self {
            InstrKind::Br(_) => 0x0,
            InstrKind::Add => 0x1,
            InstrKind::Ld => 0x2,
            InstrKind::St => 0x3,
            InstrKind::Jsr | InstrKind::Jmp => 0x4,
            InstrKind::And => 0x5,
            InstrKind::Ldr => 0x6,
            InstrKind::Str => 0x7,
            InstrKind::Dbug => 0x8,
            InstrKind::Not => 0x9,
            InstrKind::Ldi => 0xA,
            InstrKind::Sti => 0xB,
            InstrKind::Jsrr | InstrKind::Jmpr => 0xC,
            InstrKind::Ret => 0xD,
            InstrKind::Lea => 0xE,
            InstrKind::Trap => 0xF,
        }
    }

    /// Word size. Every machine instruction occupies one word.
    pub fn size(self) -> u16 {
        1
    }
}

/// How the length of a pseudo-op is determined.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Format {
    /// Length is fixed by the table
    Definite,
    /// Length depends on the operand
    Variable,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DirKind {
    Orig,
    Equ,
    End,
    Ent,
    Ext,
    Fill,
    Blkw,
    Strz,
}

impl DirKind {
    /// Fixed length in words. Zero for variable-length directives.
    pub fn length(self) -> u16 {
        match self {
            DirKind::Fill => 1,
            _ => 0,
        }
    }

    pub fn format(self) -> Format {
        match self {
            DirKind::Blkw | DirKind::Strz => Format::Variable,
            _ => Format::Definite,
        }
    }

    /// Directives that never occupy memory.
    pub fn is_zero_length(self) -> bool {
        self.format() == Format::Definite && self.length() == 0
    }
}

/// Anything that can appear in the operation column.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mnemonic {
    Instr(InstrKind),
    Dir(DirKind),
}

impl FromStr for Mnemonic {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Mnemonic::{Dir, Instr};
        let op = match s {
            "ADD" => Instr(InstrKind::Add),
            "AND" => Instr(InstrKind::And),
            "NOT" => Instr(InstrKind::Not),
            "LD" => Instr(InstrKind::Ld),
            "LDI" => Instr(InstrKind::Ldi),
            "LDR" => Instr(InstrKind::Ldr),
            "LEA" => Instr(InstrKind::Lea),
            "ST" => Instr(InstrKind::St),
            "STI" => Instr(InstrKind::Sti),
            "STR" => Instr(InstrKind::Str),
            "BR" => Instr(InstrKind::Br(Flag::Never)),
            "BRN" => Instr(InstrKind::Br(Flag::N)),
            "BRZ" => Instr(InstrKind::Br(Flag::Z)),
            "BRP" => Instr(InstrKind::Br(Flag::P)),
            "BRNZ" => Instr(InstrKind::Br(Flag::Nz)),
            "BRNP" => Instr(InstrKind::Br(Flag::Np)),
            "BRZP" => Instr(InstrKind::Br(Flag::Zp)),
            "BRNZP" => Instr(InstrKind::Br(Flag::Nzp)),
            "JSR" => Instr(InstrKind::Jsr),
            "JMP" => Instr(InstrKind::Jmp),
            "JSRR" => Instr(InstrKind::Jsrr),
            "JMPR" => Instr(InstrKind::Jmpr),
            "RET" => Instr(InstrKind::Ret),
            "TRAP" => Instr(InstrKind::Trap),
            "DBUG" => Instr(InstrKind::Dbug),
            ".ORIG" => Dir(DirKind::Orig),
            ".EQU" => Dir(DirKind::Equ),
            ".END" => Dir(DirKind::End),
            ".ENT" => Dir(DirKind::Ent),
            ".EXT" => Dir(DirKind::Ext),
            ".FILL" => Dir(DirKind::Fill),
            ".BLKW" => Dir(DirKind::Blkw),
            ".STRZ" => Dir(DirKind::Strz),
            _ => return Err(()),
        };
        Ok(op)
    }
}

impl fmt::Display for DirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirKind::Orig => ".ORIG",
            DirKind::Equ => ".EQU",
            DirKind::End => ".END",
            DirKind::Ent => ".ENT",
            DirKind::Ext => ".EXT",
            DirKind::Fill => ".FILL",
            DirKind::Blkw => ".BLKW",
            DirKind::Strz => ".STRZ",
        };
        f.write_str(name)
    }
}
