use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::{map::Entry, IndexMap, IndexSet};

use crate::codec::{to_hex, Numeral};

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;
type FxSet<T> = IndexSet<T, FxBuildHasher>;

/// Most symbols a single segment may define.
pub const MAX_SYMBOLS: usize = 100;
/// Most distinct literals a single segment may use.
pub const MAX_LITERALS: usize = 50;

/// Relocation class of a symbol.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RelocClass {
    /// Value is a plain number, never patched
    Absolute,
    /// Address within the segment, patched by the linker
    Relative,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SymbolEntry {
    pub value: Numeral,
    pub class: RelocClass,
    /// Set when the symbol is an `.EQU` alias of an external name. The value is then a
    /// placeholder until link time.
    pub via_external: Option<String>,
}

impl SymbolEntry {
    pub fn absolute(value: Numeral) -> Self {
        SymbolEntry {
            value,
            class: RelocClass::Absolute,
            via_external: None,
        }
    }

    /// Symbol defined at location counter `lc`.
    pub fn relative(lc: u16) -> Self {
        SymbolEntry {
            value: Numeral::hex(lc),
            class: RelocClass::Relative,
            via_external: None,
        }
    }

    pub fn external(name: impl Into<String>) -> Self {
        SymbolEntry {
            value: Numeral::hex(0),
            class: RelocClass::Relative,
            via_external: Some(name.into()),
        }
    }
}

/// Symbol name -> entry, in definition order.
#[derive(Clone, Default, Debug)]
pub struct SymbolTable {
    map: FxMap<String, SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless already defined. The first definition wins; returns whether the entry was
    /// inserted.
    pub fn define(&mut self, name: &str, entry: SymbolEntry) -> bool {
        match self.map.entry(name.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolEntry)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Names declared with `.EXT`, in declaration order.
#[derive(Clone, Default, Debug)]
pub struct ExternalList {
    names: FxSet<String>,
}

impl ExternalList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str) {
        self.names.insert(name.to_owned());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Literal token (as written, e.g. `=#10`) -> allocated address.
///
/// Iteration order is allocation order, which is also the order literals are flushed in.
#[derive(Clone, Default, Debug)]
pub struct LiteralTable {
    map: FxMap<String, u16>,
}

impl LiteralTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give each distinct token the next address starting at `base`, wrapping around memory.
    /// Returns the location counter after the pool.
    pub fn allocate<'a>(&mut self, base: u16, tokens: impl IntoIterator<Item = &'a str>) -> u16 {
        let mut lc = base;
        for token in tokens {
            if let Entry::Vacant(slot) = self.map.entry(token.to_owned()) {
                slot.insert(lc);
                lc = lc.wrapping_add(1);
            }
        }
        lc
    }

    pub fn address(&self, token: &str) -> Option<u16> {
        self.map.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.map.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for RelocClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocClass::Absolute => f.write_str("A"),
            RelocClass::Relative => f.write_str("R"),
        }
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, entry) in self.iter() {
            match &entry.via_external {
                Some(ext) => writeln!(f, "{name:<6}  ----  {}  -> {ext}", entry.class)?,
                None => {
                    // Numerals render their own prefix, show the 16-bit pattern instead
                    let word = entry.value.value() as u16;
                    writeln!(f, "{name:<6}  {}  {}", to_hex(word), entry.class)?
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for LiteralTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (token, addr) in self.iter() {
            writeln!(f, "{token:<8}  {}", to_hex(addr))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_definition_wins() {
        let mut table = SymbolTable::new();
        assert!(table.define("LOOP", SymbolEntry::relative(0x3000)));
        assert!(!table.define("LOOP", SymbolEntry::relative(0x3004)));
        assert_eq!(table.get("LOOP"), Some(&SymbolEntry::relative(0x3000)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn symbols_are_case_sensitive() {
        let mut table = SymbolTable::new();
        table.define("Loop", SymbolEntry::relative(1));
        assert!(!table.contains("LOOP"));
    }

    #[test]
    fn literals_are_contiguous_and_deduplicated() {
        let mut lits = LiteralTable::new();
        let end = lits.allocate(0x3010, ["=#1", "=x2", "=#1", "=#-3"]);
        assert_eq!(end, 0x3013);
        let got: Vec<_> = lits.iter().collect();
        assert_eq!(got, vec![("=#1", 0x3010), ("=x2", 0x3011), ("=#-3", 0x3012)]);
    }

    #[test]
    fn literal_addresses_wrap() {
        let mut lits = LiteralTable::new();
        let end = lits.allocate(0xFFFF, ["=#1", "=#2"]);
        assert_eq!(lits.address("=#1"), Some(0xFFFF));
        assert_eq!(lits.address("=#2"), Some(0x0000));
        assert_eq!(end, 0x0001);
    }

    #[test]
    fn renders_tables() {
        let mut table = SymbolTable::new();
        table.define("START", SymbolEntry::relative(0x3000));
        table.define("SIX", SymbolEntry::absolute(Numeral::dec(6)));
        table.define("PUTS", SymbolEntry::external("EXTP"));
        assert_eq!(
            table.to_string(),
            "START   3000  R\nSIX     0006  A\nPUTS    ----  R  -> EXTP\n"
        );
    }
}
