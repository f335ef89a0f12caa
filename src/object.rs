//! Object file records and their exact textual form.
//!
//! ```text
//! HPROG  30000012        header: name, origin, length
//! T30001283              text: address, word
//! T30012005X9PROG        text with a 9-bit patch against the segment
//! T3002FFFFX16PUTS       text with a 16-bit patch against an external
//! NMAIN=000              entry point: name, offset
//! E3000                  end: execution address
//! ```

use std::fmt;

/// Bits of a text word the linker must patch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ModWidth {
    /// Low 9 bits, a page offset
    Nine,
    /// The whole word
    Sixteen,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Modification {
    pub width: ModWidth,
    /// Padded segment name, or the external symbol the word refers to
    pub name: String,
}

impl Modification {
    pub fn new(width: ModWidth, name: impl Into<String>) -> Self {
        Modification {
            width,
            name: name.into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Record {
    Header {
        name: String,
        origin: u16,
        length: u16,
    },
    Text {
        addr: u16,
        word: u16,
        modification: Option<Modification>,
    },
    Entry {
        name: String,
        offset: u16,
    },
    End {
        addr: u16,
    },
}

impl Record {
    pub fn text(addr: u16, word: u16) -> Self {
        Record::Text {
            addr,
            word,
            modification: None,
        }
    }
}

impl fmt::Display for ModWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModWidth::Nine => f.write_str("X9"),
            ModWidth::Sixteen => f.write_str("X16"),
        }
    }
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.width, self.name)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Header {
                name,
                origin,
                length,
            } => write!(f, "H{name:<6}{origin:04X}{length:04X}"),
            Record::Text {
                addr,
                word,
                modification,
            } => {
                write!(f, "T{addr:04X}{word:04X}")?;
                if let Some(m) = modification {
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Record::Entry { name, offset } => write!(f, "N{name}={offset:03X}"),
            Record::End { addr } => write!(f, "E{addr:04X}"),
        }
    }
}
