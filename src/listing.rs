//! Listing file lines.
//!
//! Every line that occupies memory starts with `(addr) hex binary `; lines that don't get
//! a blank prefix of the same width so the source columns stay aligned:
//!
//! ```text
//! (3000) 1283 0001001010000011 (   3) START           ADD   R1,R2,R3
//!                              (   2) PROG            .ORIG x3000
//! (3001)                       (   4) BUF             .BLKW x3
//! (3004) 000A 0000000000001010 ( lit)
//! ```

use std::fmt;

use crate::{codec::to_binary, source::Line};

/// Width of the address, hex and binary columns including separators.
const PREFIX_WIDTH: usize = 29;

/// Source columns of a listing line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SourceCols {
    pub number: usize,
    pub label: String,
    pub mnemonic: String,
    pub operands: String,
}

impl SourceCols {
    pub fn of(line: &Line) -> Self {
        SourceCols {
            number: line.number,
            label: line.label.clone(),
            mnemonic: line.mnemonic.clone(),
            operands: line.operands.clone(),
        }
    }

    /// Same columns with the operand field replaced, e.g. to restore `.STRZ` quotes.
    pub fn with_operands(mut self, operands: String) -> Self {
        self.operands = operands;
        self
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ListingLine {
    /// A line that occupies no memory
    Bare(SourceCols),
    /// One word of memory. Continuation words of `.STRZ` show only the line number.
    Word {
        addr: u16,
        word: u16,
        source: SourceCols,
        continued: bool,
    },
    /// The first of a `.BLKW` block
    Block { addr: u16, source: SourceCols },
    /// A literal pool word
    Literal { addr: u16, word: u16 },
}

fn write_source(f: &mut fmt::Formatter<'_>, cols: &SourceCols) -> fmt::Result {
    let line = format!(
        "({:>4}) {:<16}{:<6}{}",
        cols.number, cols.label, cols.mnemonic, cols.operands
    );
    f.write_str(line.trim_end())
}

fn write_word(f: &mut fmt::Formatter<'_>, addr: u16, word: u16) -> fmt::Result {
    write!(f, "({addr:04X}) {word:04X} {} ", to_binary(word, 16))
}

impl fmt::Display for ListingLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingLine::Bare(cols) => {
                write!(f, "{:w$}", "", w = PREFIX_WIDTH)?;
                write_source(f, cols)
            }
            ListingLine::Word {
                addr,
                word,
                source,
                continued,
            } => {
                write_word(f, *addr, *word)?;
                if *continued {
                    write!(f, "({:>4})", source.number)
                } else {
                    write_source(f, source)
                }
            }
            ListingLine::Block { addr, source } => {
                write!(f, "{:<w$}", format!("({addr:04X})"), w = PREFIX_WIDTH)?;
                write_source(f, source)
            }
            ListingLine::Literal { addr, word } => {
                write_word(f, *addr, *word)?;
                f.write_str("( lit)")
            }
        }
    }
}
