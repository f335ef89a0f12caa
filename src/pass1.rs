//! First pass: assign every label an address and relocation class, and give every distinct
//! literal a slot in the pool after the code.

use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexSet;
use miette::Result;

use crate::{
    codec::{self, Family, Numeral},
    error,
    ops::{DirKind, Mnemonic},
    source::Line,
    symbol::{
        ExternalList, LiteralTable, RelocClass, SymbolEntry, SymbolTable, MAX_LITERALS,
        MAX_SYMBOLS,
    },
};

/// Everything the second pass needs from the first.
#[derive(Clone, Debug)]
pub struct Tables {
    pub symbols: SymbolTable,
    pub externals: ExternalList,
    pub literals: LiteralTable,
    /// Load address given to `.ORIG`, 0 when blank
    pub origin: u16,
    /// Location counter after the last word of code, where the literal pool starts
    pub code_end: u16,
    /// Location counter after the literal pool
    pub end: u16,
    /// Words in the segment including the literal pool, counted without wrapping
    pub length: u32,
}

/// Scan `lines` once, skipping the leading `.ORIG` and trailing `.END`.
pub fn run(lines: &[Line]) -> Result<Tables> {
    let origin = match lines.first() {
        Some(first) => origin_of(first)?,
        None => 0,
    };
    let inner = match lines.len() {
        0..=2 => &[][..],
        n => &lines[1..n - 1],
    };

    let mut pass = FirstPass {
        lc: origin,
        length: 0,
        symbols: SymbolTable::new(),
        externals: ExternalList::new(),
        literals: IndexSet::default(),
    };
    for line in inner {
        pass.line(line)?;
    }

    let FirstPass {
        lc,
        length,
        symbols,
        externals,
        literals: tokens,
    } = pass;
    let mut literals = LiteralTable::new();
    let end = literals.allocate(lc, tokens);

    Ok(Tables {
        symbols,
        externals,
        origin,
        code_end: lc,
        end,
        length: length + literals.len() as u32,
        literals,
    })
}

struct FirstPass<'a> {
    lc: u16,
    length: u32,
    symbols: SymbolTable,
    externals: ExternalList,
    /// Literal tokens in first-encounter order
    literals: IndexSet<&'a str, FxBuildHasher>,
}

impl<'a> FirstPass<'a> {
    fn line(&mut self, line: &'a Line) -> Result<()> {
        let op = line.op()?;

        if op == Mnemonic::Dir(DirKind::Ext) {
            for name in line.operand_list() {
                self.externals.declare(name);
            }
        }

        if !line.label.is_empty() && !self.symbols.contains(&line.label) {
            let entry = match op {
                Mnemonic::Dir(DirKind::Equ | DirKind::Ext) => self.equ_value(line)?,
                _ => SymbolEntry::relative(self.lc),
            };
            self.symbols.define(&line.label, entry);
            if self.symbols.len() > MAX_SYMBOLS {
                return Err(error::symbol_capacity(line));
            }
        }

        if op != Mnemonic::Dir(DirKind::Strz) {
            if let Some(idx) = line.operands.find('=') {
                let token = &line.operands[idx..];
                if self.literals.insert(token) && self.literals.len() > MAX_LITERALS {
                    return Err(error::literal_capacity(line));
                }
            }
        }

        let words = self.words(line, op)?;
        self.length += words;
        self.lc = ((self.lc as u32 + words) % 0x10000) as u16;
        Ok(())
    }

    /// Value of a symbol defined by `.EQU`. The operand is a numeral, a symbol defined above, or
    /// an external name.
    fn equ_value(&self, line: &Line) -> Result<SymbolEntry> {
        let operand = line.operands.as_str();
        if codec::is_numeric(operand) {
            let value = Numeral::parse(operand)
                .map_err(|e| error::bad_value(line, operand, Family::Union, e))?;
            return Ok(SymbolEntry::absolute(value));
        }
        if let Some(entry) = self.symbols.get(operand) {
            return Ok(entry.clone());
        }
        if self.externals.contains(operand) {
            return Ok(SymbolEntry::external(operand));
        }
        if line.operand_list().len() > 1 {
            return Err(error::ambiguous_alias(line));
        }
        Err(error::forward_reference(line, operand))
    }

    fn words(&self, line: &Line, op: Mnemonic) -> Result<u32> {
        let words = match op {
            Mnemonic::Instr(kind) => kind.size() as u32,
            Mnemonic::Dir(DirKind::Strz) => line.operands.chars().count() as u32 + 1,
            Mnemonic::Dir(DirKind::Blkw) => {
                let operand = line.operands.as_str();
                let value = if codec::is_numeric(operand) {
                    Numeral::parse(operand).map_err(|_| error::block_length(line, operand))?
                } else {
                    if self.externals.contains(operand) {
                        return Err(error::external_misuse(line, operand));
                    }
                    match self.symbols.get(operand) {
                        Some(entry) if entry.class == RelocClass::Absolute => entry.value,
                        Some(_) => return Err(error::not_absolute(line, operand)),
                        None => return Err(error::undefined_symbol(line, operand)),
                    }
                };
                block_count(line, operand, value)? as u32
            }
            Mnemonic::Dir(dir) => dir.length() as u32,
        };
        Ok(words)
    }
}

/// Load address on a `.ORIG` line. Blank means 0.
pub(crate) fn origin_of(line: &Line) -> Result<u16> {
    let operand = line.operands.as_str();
    if operand.is_empty() {
        return Ok(0);
    }
    Numeral::parse(operand)
        .and_then(|n| n.fit(Family::Address))
        .map_err(|e| error::bad_value(line, operand, Family::Address, e))
}

/// Number of words reserved by `.BLKW`.
pub(crate) fn block_count(line: &Line, token: &str, value: Numeral) -> Result<u16> {
    match value.fit(Family::Address) {
        Ok(count) if count >= 1 => Ok(count),
        _ => Err(error::block_length(line, token)),
    }
}

impl fmt::Display for Tables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Symbols ({})", self.symbols.len())?;
        write!(f, "{}", self.symbols)?;
        writeln!(f, "Externals ({})", self.externals.len())?;
        for name in self.externals.iter() {
            writeln!(f, "{name}")?;
        }
        writeln!(f, "Literals ({})", self.literals.len())?;
        write!(f, "{}", self.literals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(body: &[(&str, &str, &str)]) -> Vec<Line> {
        let mut lines = vec![Line::new("PROG", ".ORIG", "x3000", 1)];
        for (i, (label, op, operands)) in body.iter().enumerate() {
            lines.push(Line::new(*label, *op, *operands, i + 2));
        }
        lines.push(Line::new("", ".END", "", body.len() + 2));
        lines
    }

    fn code(err: miette::Report) -> String {
        err.code().unwrap().to_string()
    }

    #[test]
    fn labels_get_location_counter() {
        let lines = program(&[
            ("START", "ADD", "R1,R2,R3"),
            ("", "ADD", "R1,R2,#1"),
            ("NEXT", "NOT", "R1,R1"),
        ]);
        let tables = run(&lines).unwrap();
        assert_eq!(tables.symbols.get("START"), Some(&SymbolEntry::relative(0x3000)));
        assert_eq!(tables.symbols.get("NEXT"), Some(&SymbolEntry::relative(0x3002)));
        assert_eq!(tables.code_end, 0x3003);
        assert_eq!(tables.length, 3);
        // .ORIG label is not a symbol
        assert!(!tables.symbols.contains("PROG"));
    }

    #[test]
    fn blkw_reserves_words() {
        let lines = program(&[("BUF", ".BLKW", "x3"), ("AFTER", "RET", "")]);
        let tables = run(&lines).unwrap();
        assert_eq!(tables.symbols.get("BUF"), Some(&SymbolEntry::relative(0x3000)));
        assert_eq!(tables.symbols.get("AFTER"), Some(&SymbolEntry::relative(0x3003)));
    }

    #[test]
    fn blkw_through_absolute_symbol() {
        let lines = program(&[
            ("SIZE", ".EQU", "#4"),
            ("BUF", ".BLKW", "SIZE"),
            ("AFTER", "RET", ""),
        ]);
        let tables = run(&lines).unwrap();
        assert_eq!(tables.symbols.get("AFTER"), Some(&SymbolEntry::relative(0x3004)));
    }

    #[test]
    fn blkw_rejects_zero() {
        let lines = program(&[("BUF", ".BLKW", "#0")]);
        assert_eq!(code(run(&lines).unwrap_err()), "operand::block_length");
    }

    #[test]
    fn blkw_rejects_external() {
        let lines = program(&[("", ".EXT", "PUTS"), ("BUF", ".BLKW", "PUTS")]);
        assert_eq!(code(run(&lines).unwrap_err()), "pass2::external_misuse");
    }

    #[test]
    fn labelled_ext_takes_one_name() {
        let lines = program(&[("OUT", ".EXT", "PUTS")]);
        let tables = run(&lines).unwrap();
        assert_eq!(tables.symbols.get("OUT"), Some(&SymbolEntry::external("PUTS")));

        let lines = program(&[("LBL", ".EXT", "PUTS,GETC")]);
        let err = run(&lines).unwrap_err();
        assert!(err.to_string().starts_with("Line 2:"), "{err}");
        assert_eq!(code(err), "pass1::ambiguous_alias");
    }

    #[test]
    fn strz_counts_terminator() {
        let lines = program(&[("MSG", ".STRZ", "Hi=x"), ("AFTER", "RET", "")]);
        let tables = run(&lines).unwrap();
        assert_eq!(tables.symbols.get("AFTER"), Some(&SymbolEntry::relative(0x3005)));
        // `=` inside a string is not a literal
        assert!(tables.literals.is_empty());
    }

    #[test]
    fn equ_values() {
        let lines = program(&[
            ("", ".EXT", "EXTA,EXTB"),
            ("SIX", ".EQU", "#6"),
            ("MASK", ".EQU", "x1F"),
            ("TOP", "RET", ""),
            ("ALIAS", ".EQU", "TOP"),
            ("SIXTOO", ".EQU", "SIX"),
            ("OUTER", ".EQU", "EXTB"),
        ]);
        let tables = run(&lines).unwrap();
        let get = |name| tables.symbols.get(name).unwrap().clone();
        assert_eq!(get("SIX"), SymbolEntry::absolute(Numeral::dec(6)));
        assert_eq!(get("MASK"), SymbolEntry::absolute(Numeral::hex(0x1F)));
        assert_eq!(get("ALIAS"), SymbolEntry::relative(0x3000));
        assert_eq!(get("SIXTOO"), SymbolEntry::absolute(Numeral::dec(6)));
        assert_eq!(get("OUTER"), SymbolEntry::external("EXTB"));
        assert_eq!(tables.externals.iter().collect::<Vec<_>>(), vec!["EXTA", "EXTB"]);
        assert!(!tables.symbols.contains("EXTA"));
        // Zero-length directives do not move the counter
        assert_eq!(tables.code_end, 0x3001);
    }

    #[test]
    fn equ_cannot_forward_reference() {
        let lines = program(&[("EARLY", ".EQU", "LATER"), ("LATER", "RET", "")]);
        let err = run(&lines).unwrap_err();
        assert_eq!(code(err), "pass1::forward_reference");
    }

    #[test]
    fn forward_reference_reports_line() {
        let lines = program(&[("", "RET", ""), ("EARLY", ".EQU", "NOWHERE")]);
        let err = run(&lines).unwrap_err();
        assert!(err.to_string().starts_with("Line 3:"), "{err}");
    }

    #[test]
    fn literals_follow_code_in_encounter_order() {
        let lines = program(&[
            ("", "LD", "R1,=#10"),
            ("", "LD", "R2,=x1F"),
            ("", "LD", "R3,=#10"),
            ("", "LEA", "R4,=#-1"),
        ]);
        let tables = run(&lines).unwrap();
        let lits: Vec<_> = tables.literals.iter().collect();
        assert_eq!(lits, vec![("=#10", 0x3004), ("=x1F", 0x3005), ("=#-1", 0x3006)]);
        assert_eq!(tables.code_end, 0x3004);
        assert_eq!(tables.end, 0x3007);
        assert_eq!(tables.length, 7);
    }

    #[test]
    fn first_definition_wins() {
        let lines = program(&[("DUP", "RET", ""), ("DUP", "RET", "")]);
        let tables = run(&lines).unwrap();
        assert_eq!(tables.symbols.get("DUP"), Some(&SymbolEntry::relative(0x3000)));
    }

    #[test]
    fn location_counter_wraps() {
        let mut lines = program(&[("A", "RET", ""), ("B", "RET", "")]);
        lines[0].operands = "xFFFF".into();
        let tables = run(&lines).unwrap();
        assert_eq!(tables.symbols.get("B"), Some(&SymbolEntry::relative(0x0000)));
        assert_eq!(tables.code_end, 0x0001);
        assert_eq!(tables.length, 2);
    }

    #[test]
    fn symbol_capacity() {
        let labels: Vec<String> = (0..=MAX_SYMBOLS).map(|i| format!("L{i}")).collect();
        let body: Vec<_> = labels.iter().map(|l| (l.as_str(), "RET", "")).collect();
        let err = run(&program(&body)).unwrap_err();
        assert_eq!(code(err), "pass1::symbol_capacity");

        let err_free = run(&program(&body[..MAX_SYMBOLS]));
        assert!(err_free.is_ok());
    }

    #[test]
    fn literal_capacity() {
        let operands: Vec<String> = (0..=MAX_LITERALS).map(|i| format!("R1,=#{i}")).collect();
        let body: Vec<_> = operands.iter().map(|o| ("", "LD", o.as_str())).collect();
        let err = run(&program(&body)).unwrap_err();
        assert_eq!(code(err), "pass1::literal_capacity");

        // Repeats do not count against the limit
        let repeated: Vec<_> = (0..=MAX_LITERALS).map(|_| ("", "LD", "R1,=#1")).collect();
        assert!(run(&program(&repeated)).is_ok());
    }

    #[test]
    fn relocatable_origin() {
        let mut lines = program(&[("A", "RET", "")]);
        lines[0].operands.clear();
        let tables = run(&lines).unwrap();
        assert_eq!(tables.origin, 0);
        assert_eq!(tables.symbols.get("A"), Some(&SymbolEntry::relative(0)));
    }
}
