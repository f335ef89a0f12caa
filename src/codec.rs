//! Operand numerals, range families and bit-level rendering.
//!
//! Numerals are written `#<signed decimal>` or `x<hex digits>`, optionally prefixed by `=` when
//! used as a literal. Hex is always non-negative. Every operand field has a range family which
//! decides both the accepted values and the encoded width.

use std::{error::Error, fmt, ops::RangeInclusive};

use crate::ops::Register;

/// Words per page.
pub const PAGE_SIZE: u16 = 512;

/// Failure to turn a token into an in-range value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NumError {
    /// Wrong prefix or non-digit characters
    Malformed,
    /// Parsed, but outside the range of the field
    OutOfRange,
}

impl Error for NumError {}

impl fmt::Display for NumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "not a decimal (#) or hex (x) value"),
            Self::OutOfRange => write!(f, "value out of range"),
        }
    }
}

/// PC-relative target on a different page than the following instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PageError {
    pub pc_page: u16,
    pub target_page: u16,
}

impl Error for PageError {}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "address is not on the same page as PC (PC at page #{}, address at page #{})",
            self.pc_page, self.target_page
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Radix {
    Hex,
    Dec,
}

impl Radix {
    fn base(self) -> u32 {
        match self {
            Radix::Hex => 16,
            Radix::Dec => 10,
        }
    }
}

/// A numeric operand as written in source, before range checking for a particular field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Numeral {
    value: i32,
    radix: Radix,
}

/// Token is a plain numeral (`#..` or `x..`).
pub fn is_numeric(token: &str) -> bool {
    token.starts_with(['#', 'x'])
}

/// Token is a literal (`=#..` or `=x..`).
pub fn is_literal(token: &str) -> bool {
    token.starts_with('=')
}

impl Numeral {
    pub fn hex(value: u16) -> Self {
        Numeral {
            value: value as i32,
            radix: Radix::Hex,
        }
    }

    pub fn dec(value: i16) -> Self {
        Numeral {
            value: value as i32,
            radix: Radix::Dec,
        }
    }

    /// Parse a plain or literal numeral. Accepts hex `0..=xFFFF` and decimal `-32768..=65535`;
    /// narrower families are checked with [`Numeral::fit`].
    pub fn parse(token: &str) -> Result<Numeral, NumError> {
        let body = token.strip_prefix('=').unwrap_or(token);
        let mut chars = body.chars();
        let radix = match chars.next() {
            Some('x') => Radix::Hex,
            Some('#') => Radix::Dec,
            _ => return Err(NumError::Malformed),
        };
        let digits = chars.as_str();
        if digits.is_empty() {
            return Err(NumError::Malformed);
        }
        let value = i32::from_str_radix(digits, radix.base()).map_err(|_| NumError::Malformed)?;
        let bounds = match radix {
            Radix::Hex => 0..=0xFFFF,
            Radix::Dec => -32768..=65535,
        };
        if !bounds.contains(&value) {
            return Err(NumError::OutOfRange);
        }
        Ok(Numeral { value, radix })
    }

    pub fn value(self) -> i32 {
        self.value
    }

    /// Range check against a family, returning the low-order bits of the field.
    pub fn fit(self, family: Family) -> Result<u16, NumError> {
        if family.accepts(self) {
            Ok((self.value as u32 & low_mask(family.width()) as u32) as u16)
        } else {
            Err(NumError::OutOfRange)
        }
    }

    /// Inverse of [`Numeral::fit`]. Decimal fields of signed families are sign-extended.
    pub fn decode(field: u16, family: Family, radix: Radix) -> Numeral {
        let width = family.width();
        let field = field & low_mask(width);
        let value = match radix {
            Radix::Dec if family.is_signed() => sign_extend(field, width),
            _ => field as i32,
        };
        Numeral { value, radix }
    }
}

impl fmt::Display for Numeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.radix {
            Radix::Hex => write!(f, "x{:04X}", self.value),
            Radix::Dec => write!(f, "#{}", self.value),
        }
    }
}

/// Range families for operand fields.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Family {
    Imm5,
    Index6,
    Trap8,
    Address,
    /// `.FILL` values and literals
    Union,
}

impl Family {
    pub fn width(self) -> u8 {
        match self {
            Family::Imm5 => 5,
            Family::Index6 => 6,
            Family::Trap8 => 8,
            Family::Address | Family::Union => 16,
        }
    }

    fn hex_range(self) -> RangeInclusive<i32> {
        match self {
            Family::Imm5 => 0..=0x1F,
            Family::Index6 => 0..=0x3F,
            Family::Trap8 => 0..=0xFF,
            Family::Address | Family::Union => 0..=0xFFFF,
        }
    }

    fn dec_range(self) -> RangeInclusive<i32> {
        match self {
            Family::Imm5 => -16..=15,
            Family::Index6 => 0..=63,
            Family::Trap8 => 0..=255,
            Family::Address => 0..=65535,
            Family::Union => -32768..=32767,
        }
    }

    fn is_signed(self) -> bool {
        self.dec_range().start() < &0
    }

    pub fn accepts(self, numeral: Numeral) -> bool {
        match numeral.radix {
            Radix::Hex => self.hex_range().contains(&numeral.value),
            Radix::Dec => self.dec_range().contains(&numeral.value),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Imm5 => "imm5",
            Family::Index6 => "index6",
            Family::Trap8 => "trapvect8",
            Family::Address => "address",
            Family::Union => "word",
        };
        let dec = self.dec_range();
        let hex = self.hex_range();
        write!(
            f,
            "{name} [#{} - #{}] or [x{:X} - x{:X}]",
            dec.start(),
            dec.end(),
            hex.start(),
            hex.end()
        )
    }
}

/// Parse a register token `R0`..`R7`.
pub fn register(token: &str) -> Result<Register, NumError> {
    let digits = token.strip_prefix('R').ok_or(NumError::Malformed)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(NumError::Malformed);
    }
    let value: i32 = digits.parse().map_err(|_| NumError::OutOfRange)?;
    Register::try_from(value).map_err(|_| NumError::OutOfRange)
}

/// Register held by an absolute symbol's value.
pub fn register_value(numeral: Numeral) -> Result<Register, NumError> {
    numeral.fit(Family::Index6)?;
    Register::try_from(numeral.value).map_err(|_| NumError::OutOfRange)
}

/// Builds a 16-bit instruction word field by field, most significant first.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Word {
    bits: u32,
    len: u8,
}

impl Word {
    pub fn opcode(opcode: u16) -> Self {
        Word { bits: 0, len: 0 }.field(opcode, 4)
    }

    /// Append `width` bits, keeping only the low-order bits of `value`.
    pub fn field(self, value: u16, width: u8) -> Self {
        debug_assert!(self.len + width <= 16, "instruction word overflow");
        Word {
            bits: (self.bits << width) | (value & low_mask(width)) as u32,
            len: self.len + width,
        }
    }

    pub fn reg(self, reg: Register) -> Self {
        self.field(reg as u16, 3)
    }

    pub fn bit(self, set: bool) -> Self {
        self.field(set as u16, 1)
    }

    /// Don't-care bits, always zero.
    pub fn pad(self, width: u8) -> Self {
        self.field(0, width)
    }

    pub fn finish(self) -> u16 {
        debug_assert_eq!(self.len, 16, "instruction word is not 16 bits");
        self.bits as u16
    }
}

fn low_mask(width: u8) -> u16 {
    if width >= 16 {
        u16::MAX
    } else {
        (1u16 << width) - 1
    }
}

fn sign_extend(field: u16, width: u8) -> i32 {
    let shift = 32 - width as u32;
    ((field as i32) << shift) >> shift
}

/// Zero-padded binary of the low `width` bits.
pub fn to_binary(value: u16, width: u8) -> String {
    format!("{:0w$b}", value & low_mask(width), w = width as usize)
}

/// Four upper-case hex digits.
pub fn to_hex(value: u16) -> String {
    format!("{value:04X}")
}

/// Inverse of `to_binary`, used to check that rendered fields read back unchanged.
pub fn from_binary(bits: &str) -> Option<u16> {
    if bits.is_empty() || bits.len() > 16 {
        return None;
    }
    u16::from_str_radix(bits, 2).ok()
}

pub fn page_of(addr: u16) -> u16 {
    (addr / PAGE_SIZE) % 128
}

/// Low 9 bits of `target`, provided it lies on the same page as the word after `lc`.
pub fn page_offset(lc: u16, target: u16) -> Result<u16, PageError> {
    let pc = lc.wrapping_add(1);
    let (pc_page, target_page) = (page_of(pc), page_of(target));
    if pc_page != target_page {
        return Err(PageError {
            pc_page,
            target_page,
        });
    }
    Ok(target & 0x1FF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_forms() {
        assert_eq!(Numeral::parse("#10"), Ok(Numeral::dec(10)));
        assert_eq!(Numeral::parse("#-16"), Ok(Numeral::dec(-16)));
        assert_eq!(Numeral::parse("x1F"), Ok(Numeral::hex(0x1F)));
        assert_eq!(Numeral::parse("=#-1"), Ok(Numeral::dec(-1)));
        assert_eq!(Numeral::parse("=xFFFF"), Ok(Numeral::hex(0xFFFF)));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in ["", "#", "x", "=", "=x", "=#", "10", "R1", "#1a", "xG", "LABEL", "==x1"] {
            assert_eq!(Numeral::parse(token), Err(NumError::Malformed), "{token:?}");
        }
    }

    #[test]
    fn rejects_out_of_bounds_tokens() {
        assert_eq!(Numeral::parse("x10000"), Err(NumError::OutOfRange));
        assert_eq!(Numeral::parse("x-1"), Err(NumError::OutOfRange));
        assert_eq!(Numeral::parse("#65536"), Err(NumError::OutOfRange));
        assert_eq!(Numeral::parse("#-32769"), Err(NumError::OutOfRange));
    }

    #[test]
    fn family_ranges() {
        let fit = |tok: &str, family| Numeral::parse(tok).unwrap().fit(family);

        assert_eq!(fit("#-16", Family::Imm5), Ok(0b10000));
        assert_eq!(fit("#15", Family::Imm5), Ok(0b01111));
        assert_eq!(fit("x1F", Family::Imm5), Ok(0b11111));
        assert_eq!(fit("#16", Family::Imm5), Err(NumError::OutOfRange));
        assert_eq!(fit("x20", Family::Imm5), Err(NumError::OutOfRange));

        assert_eq!(fit("#63", Family::Index6), Ok(63));
        assert_eq!(fit("#-1", Family::Index6), Err(NumError::OutOfRange));
        assert_eq!(fit("x40", Family::Index6), Err(NumError::OutOfRange));

        assert_eq!(fit("xFF", Family::Trap8), Ok(0xFF));
        assert_eq!(fit("#256", Family::Trap8), Err(NumError::OutOfRange));

        assert_eq!(fit("#65535", Family::Address), Ok(0xFFFF));
        assert_eq!(fit("#-1", Family::Address), Err(NumError::OutOfRange));

        assert_eq!(fit("#-1", Family::Union), Ok(0xFFFF));
        assert_eq!(fit("#-32768", Family::Union), Ok(0x8000));
        assert_eq!(fit("#32768", Family::Union), Err(NumError::OutOfRange));
        assert_eq!(fit("xFFFF", Family::Union), Ok(0xFFFF));
    }

    #[test]
    fn decode_inverts_fit() {
        let cases = [
            (Family::Imm5, -16..=15),
            (Family::Index6, 0..=63),
            (Family::Trap8, 0..=255),
            (Family::Address, 0..=65535),
        ];
        for (family, range) in cases {
            for value in range {
                let numeral = Numeral::parse(&format!("#{value}")).unwrap();
                let field = numeral.fit(family).unwrap();
                assert_eq!(Numeral::decode(field, family, Radix::Dec), numeral);
            }
        }
        let numeral = Numeral::hex(0x1F);
        let field = numeral.fit(Family::Imm5).unwrap();
        assert_eq!(Numeral::decode(field, Family::Imm5, Radix::Hex), numeral);
    }

    #[test]
    fn registers() {
        assert_eq!(register("R0"), Ok(Register::R0));
        assert_eq!(register("R7"), Ok(Register::R7));
        assert_eq!(register("R8"), Err(NumError::OutOfRange));
        assert_eq!(register("R"), Err(NumError::Malformed));
        assert_eq!(register("r1"), Err(NumError::Malformed));
        assert_eq!(register_value(Numeral::dec(5)), Ok(Register::R5));
        assert_eq!(register_value(Numeral::hex(8)), Err(NumError::OutOfRange));
    }

    #[test]
    fn builds_words() {
        let add = Word::opcode(1)
            .reg(Register::R1)
            .reg(Register::R2)
            .pad(3)
            .reg(Register::R3)
            .finish();
        assert_eq!(to_hex(add), "1283");

        let imm = Numeral::dec(-1).fit(Family::Imm5).unwrap();
        let add = Word::opcode(1)
            .reg(Register::R1)
            .reg(Register::R2)
            .bit(true)
            .field(imm, 5)
            .finish();
        assert_eq!(to_hex(add), "12BF");
        assert_eq!(to_binary(add, 16), "0001001010111111");
    }

    #[test]
    fn renders_fixed_width() {
        assert_eq!(to_binary(5, 3), "101");
        assert_eq!(to_binary(0xFFFF, 5), "11111");
        assert_eq!(to_hex(0xA), "000A");
        assert_eq!(from_binary("0001001010000011"), Some(0x1283));
        assert_eq!(from_binary("2"), None);
        assert_eq!(from_binary(""), None);
    }

    #[test]
    fn page_offsets() {
        // PC is the word after the instruction
        assert_eq!(page_offset(0x3000, 0x3005), Ok(0x005));
        assert_eq!(page_offset(0x31FE, 0x31FF), Ok(0x1FF));
        assert_eq!(
            page_offset(0x31FF, 0x31FE),
            Err(PageError {
                pc_page: 25,
                target_page: 24
            })
        );
        assert_eq!(page_offset(0xFFFF, 0x0000), Ok(0));
        assert!(page_offset(0x3000, 0x3200).is_err());
    }
}
