//! Second pass: encode every line into object records and listing lines.

use std::{fmt::Display, io::Write};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::Result;

use crate::{
    codec::{self, Family, NumError, Numeral, Word},
    error,
    listing::{ListingLine, SourceCols},
    object::{ModWidth, Modification, Record},
    ops::{DirKind, InstrKind, Mnemonic, Register},
    pass1::{self, Tables},
    source::Line,
    symbol::RelocClass,
};

/// Most names a single `.ENT` or `.EXT` may list.
const MAX_NAMES: usize = 5;
/// Largest relocatable segment, one page.
const MAX_RELOCATABLE: u32 = codec::PAGE_SIZE as u32;

/// Output of a single line.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Emitted {
    pub records: Vec<Record>,
    pub listing: Vec<ListingLine>,
}

impl Emitted {
    fn bare(line: &Line, records: Vec<Record>) -> Self {
        Emitted {
            records,
            listing: vec![ListingLine::Bare(SourceCols::of(line))],
        }
    }

    fn word(line: &Line, addr: u16, word: u16, modification: Option<Modification>) -> Self {
        Emitted {
            records: vec![Record::Text {
                addr,
                word,
                modification,
            }],
            listing: vec![ListingLine::Word {
                addr,
                word,
                source: SourceCols::of(line),
                continued: false,
            }],
        }
    }
}

/// Where an address operand points.
#[derive(Clone, PartialEq, Eq, Debug)]
enum Target {
    Absolute(Numeral),
    /// Address within this segment
    Relative(u16),
    /// Placeholder address of a name resolved at link time
    External { name: String, addr: u16 },
}

impl Target {
    fn address(&self, line: &Line, token: &str) -> Result<u16> {
        match self {
            Target::Absolute(n) => n
                .fit(Family::Address)
                .map_err(|e| error::bad_value(line, token, Family::Address, e)),
            Target::Relative(addr) => Ok(*addr),
            Target::External { addr, .. } => Ok(*addr),
        }
    }

    /// Full 16-bit value for `.FILL`.
    fn word(&self, line: &Line, token: &str) -> Result<u16> {
        match self {
            Target::Absolute(n) => n
                .fit(Family::Union)
                .map_err(|e| error::bad_value(line, token, Family::Union, e)),
            _ => self.address(line, token),
        }
    }
}

pub struct SecondPass<'t> {
    tables: &'t Tables,
    lc: u16,
    origin: u16,
    /// `.ORIG` label padded to six characters
    segment: String,
    relocatable: bool,
    /// Names declared by `.EXT` so far, with their placeholder addresses
    externals: IndexMap<String, u16, FxBuildHasher>,
}

impl<'t> SecondPass<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        SecondPass {
            tables,
            lc: tables.origin,
            origin: tables.origin,
            segment: String::new(),
            relocatable: false,
            externals: IndexMap::default(),
        }
    }

    /// Current location counter.
    pub fn lc(&self) -> u16 {
        self.lc
    }

    pub fn line(&mut self, line: &Line) -> Result<Emitted> {
        match line.op()? {
            Mnemonic::Instr(kind) => self.instr(line, kind),
            // Directives occupying no memory are listed without an address
            Mnemonic::Dir(dir) if dir.is_zero_length() => {
                Ok(Emitted::bare(line, self.control(line, dir)?))
            }
            Mnemonic::Dir(dir) => self.storage(line, dir),
        }
    }

    /// Text records for every literal in the pool, in allocation order.
    pub fn literal_pool(&self, line: &Line) -> Result<Emitted> {
        let mut out = Emitted::default();
        for (token, addr) in self.tables.literals.iter() {
            let word = literal_word(line, token)?;
            out.records.push(Record::text(addr, word));
            out.listing.push(ListingLine::Literal { addr, word });
        }
        Ok(out)
    }

    fn advance(&mut self, words: u16) {
        self.lc = self.lc.wrapping_add(words);
    }

    fn instr(&mut self, line: &Line, kind: InstrKind) -> Result<Emitted> {
        let ops = line.operand_list();
        let addr = self.lc;
        let op = Word::opcode(kind.opcode());

        let (word, target) = match kind {
            InstrKind::Add | InstrKind::And => {
                expect(line, &ops, 3)?;
                let word = op
                    .reg(self.register(line, ops[0])?)
                    .reg(self.register(line, ops[1])?);
                let word = if is_register(ops[2]) {
                    word.pad(3).reg(self.register(line, ops[2])?)
                } else {
                    word.bit(true).field(self.value(line, ops[2], Family::Imm5)?, 5)
                };
                (word, None)
            }
            InstrKind::Br(flag) => {
                expect(line, &ops, 1)?;
                let target = self.resolve(line, ops[0])?;
                let offset = self.page_offset(line, &target, ops[0])?;
                (op.field(flag.bits(), 3).field(offset, 9), Some(target))
            }
            InstrKind::Jsr | InstrKind::Jmp => {
                expect(line, &ops, 1)?;
                let target = self.resolve(line, ops[0])?;
                let offset = self.page_offset(line, &target, ops[0])?;
                let word = op.bit(kind == InstrKind::Jsr).pad(2).field(offset, 9);
                (word, Some(target))
            }
            InstrKind::Jsrr | InstrKind::Jmpr => {
                expect(line, &ops, 2)?;
                let word = op
                    .bit(kind == InstrKind::Jsrr)
                    .pad(2)
                    .reg(self.register(line, ops[0])?)
                    .field(self.value(line, ops[1], Family::Index6)?, 6);
                (word, None)
            }
            InstrKind::Ld | InstrKind::Ldi | InstrKind::St | InstrKind::Sti | InstrKind::Lea => {
                expect(line, &ops, 2)?;
                let reg = self.register(line, ops[0])?;
                let target = if codec::is_literal(ops[1]) {
                    self.literal(line, ops[1])?
                } else {
                    self.resolve(line, ops[1])?
                };
                let offset = self.page_offset(line, &target, ops[1])?;
                (op.reg(reg).field(offset, 9), Some(target))
            }
            InstrKind::Ldr | InstrKind::Str => {
                expect(line, &ops, 3)?;
                let word = op
                    .reg(self.register(line, ops[0])?)
                    .reg(self.register(line, ops[1])?)
                    .field(self.value(line, ops[2], Family::Index6)?, 6);
                (word, None)
            }
            InstrKind::Not => {
                expect(line, &ops, 2)?;
                let word = op
                    .reg(self.register(line, ops[0])?)
                    .reg(self.register(line, ops[1])?)
                    .pad(6);
                (word, None)
            }
            InstrKind::Ret | InstrKind::Dbug => {
                expect(line, &ops, 0)?;
                (op.pad(12), None)
            }
            InstrKind::Trap => {
                expect(line, &ops, 1)?;
                let vector = self.value(line, ops[0], Family::Trap8)?;
                (op.pad(4).field(vector, 8), None)
            }
        };

        let modification = target.and_then(|t| self.modification(&t, ModWidth::Nine));
        self.advance(kind.size());
        Ok(Emitted::word(line, addr, word.finish(), modification))
    }

    /// Records of a directive that occupies no memory.
    fn control(&mut self, line: &Line, dir: DirKind) -> Result<Vec<Record>> {
        let operand = line.operands.as_str();
        match dir {
            DirKind::Orig => {
                self.origin = pass1::origin_of(line)?;
                self.lc = self.origin;
                self.relocatable = self.origin == 0;
                self.segment = format!("{:<6}", line.label);

                let length = self.tables.length;
                if length > 0xFFFF {
                    return Err(error::segment_size(line, length, false));
                }
                if self.relocatable && length > MAX_RELOCATABLE {
                    return Err(error::segment_size(line, length, true));
                }
                Ok(vec![Record::Header {
                    name: self.segment.clone(),
                    origin: self.origin,
                    length: length as u16,
                }])
            }
            DirKind::End => {
                let addr = if operand.is_empty() {
                    self.origin
                } else {
                    self.resolve(line, operand)?.address(line, operand)?
                };
                Ok(vec![Record::End { addr }])
            }
            DirKind::Ent => {
                let names = line.operand_list();
                if names.len() > MAX_NAMES {
                    return Err(error::too_many_names(line, dir, names.len()));
                }
                names
                    .into_iter()
                    .map(|name| -> Result<Record> {
                        Ok(Record::Entry {
                            name: name.to_owned(),
                            offset: self.entry_point(line, name)?,
                        })
                    })
                    .collect()
            }
            DirKind::Ext => {
                let names = line.operand_list();
                if names.len() > MAX_NAMES {
                    return Err(error::too_many_names(line, dir, names.len()));
                }
                for name in names {
                    if self.tables.symbols.contains(name) {
                        return Err(error::name_collision(line, name));
                    }
                    self.externals.insert(name.to_owned(), 0);
                }
                Ok(Vec::new())
            }
            DirKind::Equ => {
                if codec::is_numeric(operand) {
                    Numeral::parse(operand)
                        .map_err(|e| error::bad_value(line, operand, Family::Union, e))?;
                } else {
                    self.resolve(line, operand)?;
                }
                Ok(Vec::new())
            }
            DirKind::Fill | DirKind::Blkw | DirKind::Strz => Ok(Vec::new()),
        }
    }

    /// Words and listing of a directive that occupies memory.
    fn storage(&mut self, line: &Line, dir: DirKind) -> Result<Emitted> {
        let operand = line.operands.as_str();
        match dir {
            DirKind::Fill => {
                let addr = self.lc;
                let (word, modification) = if codec::is_numeric(operand) {
                    let word = Numeral::parse(operand)
                        .and_then(|n| n.fit(Family::Union))
                        .map_err(|e| error::bad_value(line, operand, Family::Union, e))?;
                    (word, None)
                } else {
                    let target = self.resolve(line, operand)?;
                    (
                        target.word(line, operand)?,
                        self.modification(&target, ModWidth::Sixteen),
                    )
                };
                self.advance(1);
                Ok(Emitted::word(line, addr, word, modification))
            }
            DirKind::Blkw => {
                let value = if codec::is_numeric(operand) {
                    Numeral::parse(operand).map_err(|_| error::block_length(line, operand))?
                } else {
                    self.absolute(line, operand)?
                };
                let count = pass1::block_count(line, operand, value)?;
                let addr = self.lc;
                self.advance(count);
                Ok(Emitted {
                    records: Vec::new(),
                    listing: vec![ListingLine::Block {
                        addr,
                        source: SourceCols::of(line),
                    }],
                })
            }
            DirKind::Strz => {
                let source = SourceCols::of(line).with_operands(format!("\"{operand}\""));
                let words = operand
                    .chars()
                    .map(|c| (c as u32 & 0xFFFF) as u16)
                    .chain(std::iter::once(0));

                let mut out = Emitted::default();
                for (i, word) in words.enumerate() {
                    let addr = self.lc;
                    out.records.push(Record::text(addr, word));
                    out.listing.push(ListingLine::Word {
                        addr,
                        word,
                        source: source.clone(),
                        continued: i > 0,
                    });
                    self.advance(1);
                }
                Ok(out)
            }
            _ => Ok(Emitted::bare(line, self.control(line, dir)?)),
        }
    }

    /// Register operand: `R0`..`R7`, or an absolute symbol holding 0 to 7.
    fn register(&self, line: &Line, token: &str) -> Result<Register> {
        if is_register(token) {
            return codec::register(token).map_err(|e| error::bad_register(line, token, e));
        }
        if codec::is_numeric(token) {
            return Err(error::bad_register(line, token, NumError::Malformed));
        }
        let value = self.absolute(line, token)?;
        codec::register_value(value).map_err(|e| error::bad_register(line, token, e))
    }

    /// Numeric operand, written directly or held by an absolute symbol.
    fn value(&self, line: &Line, token: &str, family: Family) -> Result<u16> {
        let value = if codec::is_numeric(token) {
            Numeral::parse(token).map_err(|e| error::bad_value(line, token, family, e))?
        } else {
            self.absolute(line, token)?
        };
        value
            .fit(family)
            .map_err(|e| error::bad_value(line, token, family, e))
    }

    /// Value of a symbol that must be absolute.
    fn absolute(&self, line: &Line, name: &str) -> Result<Numeral> {
        if self.externals.contains_key(name) {
            return Err(error::external_misuse(line, name));
        }
        match self.tables.symbols.get(name) {
            None => Err(error::undefined_symbol(line, name)),
            Some(entry) if entry.class == RelocClass::Absolute && entry.via_external.is_none() => {
                Ok(entry.value)
            }
            Some(_) => Err(error::not_absolute(line, name)),
        }
    }

    /// Address operand: a numeral, a symbol, or an external name. Symbols that alias an
    /// external name resolve to that name.
    fn resolve(&self, line: &Line, token: &str) -> Result<Target> {
        if codec::is_numeric(token) {
            return Numeral::parse(token)
                .map(Target::Absolute)
                .map_err(|e| error::bad_value(line, token, Family::Address, e));
        }
        if let Some(&addr) = self.externals.get(token) {
            return Ok(Target::External {
                name: token.to_owned(),
                addr,
            });
        }
        let entry = self
            .tables
            .symbols
            .get(token)
            .ok_or_else(|| error::undefined_symbol(line, token))?;
        if let Some(ext) = &entry.via_external {
            let addr = *self
                .externals
                .get(ext)
                .ok_or_else(|| error::dangling_alias(line, token, ext))?;
            return Ok(Target::External {
                name: ext.clone(),
                addr,
            });
        }
        Ok(match entry.class {
            RelocClass::Absolute => Target::Absolute(entry.value),
            RelocClass::Relative => Target::Relative(entry.value.value() as u16),
        })
    }

    /// Pool address of a literal. Pool words always belong to this segment.
    fn literal(&self, line: &Line, token: &str) -> Result<Target> {
        literal_word(line, token)?;
        self.tables
            .literals
            .address(token)
            .map(Target::Relative)
            .ok_or_else(|| error::unknown_literal(line, token))
    }

    fn entry_point(&self, line: &Line, name: &str) -> Result<u16> {
        if self.externals.contains_key(name) {
            return Err(error::not_relative(line, name));
        }
        match self.tables.symbols.get(name) {
            None => Err(error::undefined_symbol(line, name)),
            Some(entry) if entry.class == RelocClass::Relative && entry.via_external.is_none() => {
                Ok(entry.value.value() as u16)
            }
            Some(_) => Err(error::not_relative(line, name)),
        }
    }

    fn page_offset(&self, line: &Line, target: &Target, token: &str) -> Result<u16> {
        let addr = target.address(line, token)?;
        codec::page_offset(self.lc, addr).map_err(|e| error::page_range(line, e))
    }

    /// Patch request for a word referring to `target`. Absolute segments are never patched.
    fn modification(&self, target: &Target, width: ModWidth) -> Option<Modification> {
        if !self.relocatable {
            return None;
        }
        match target {
            Target::Absolute(_) => None,
            Target::Relative(_) => Some(Modification::new(width, self.segment.as_str())),
            Target::External { name, .. } => Some(Modification::new(width, name.as_str())),
        }
    }
}

fn literal_word(line: &Line, token: &str) -> Result<u16> {
    Numeral::parse(token)
        .and_then(|n| n.fit(Family::Union))
        .map_err(|e| error::bad_value(line, token, Family::Union, e))
}

fn expect(line: &Line, ops: &[&str], count: usize) -> Result<()> {
    if ops.len() != count {
        return Err(error::operand_count(line, count, ops.len()));
    }
    Ok(())
}

/// `R` followed by digits. Anything else in a register position is a symbol.
fn is_register(token: &str) -> bool {
    token
        .strip_prefix('R')
        .is_some_and(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
}

/// Run the second pass over `lines`, writing object records and listing lines as they are
/// produced. Literal pool records are written just before the records of the last line and
/// listed after it.
///
/// Returns the location counter at the end of the code, before the literal pool.
pub fn generate<O: Write, L: Write>(
    lines: &[Line],
    tables: &Tables,
    object: &mut O,
    listing: &mut L,
) -> Result<u16> {
    let mut pass = SecondPass::new(tables);
    let mut code_end = pass.lc();

    for (i, line) in lines.iter().enumerate() {
        let pool = if i + 1 == lines.len() {
            code_end = pass.lc();
            let pool = pass.literal_pool(line)?;
            write_all(object, line, "object file", &pool.records)?;
            Some(pool)
        } else {
            None
        };

        let emitted = pass.line(line)?;
        write_all(object, line, "object file", &emitted.records)?;
        write_all(listing, line, "listing file", &emitted.listing)?;

        if let Some(pool) = pool {
            write_all(listing, line, "listing file", &pool.listing)?;
        }
    }
    Ok(code_end)
}

fn write_all<W: Write, T: Display>(out: &mut W, line: &Line, target: &str, items: &[T]) -> Result<()> {
    for item in items {
        writeln!(out, "{item}").map_err(|e| error::io_write(line, target, e))?;
    }
    Ok(())
}
