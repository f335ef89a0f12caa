// Input
mod span;
pub use span::{Span, SrcOffset};
pub mod source;
pub use source::Line;

// Tables and encoding
pub mod codec;
pub mod ops;
pub mod symbol;

// Passes
pub mod pass1;
pub use pass1::Tables;
pub mod pass2;
pub use pass2::SecondPass;

// Output
pub mod listing;
pub mod object;

mod error;

pub mod env;

use std::io::Write;

use miette::Result;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;

/// Everything produced by one assembler run.
#[derive(Clone, Debug)]
pub struct Assembly {
    pub tables: Tables,
    pub object: String,
    pub listing: String,
}

/// Run both passes over `lines`, collecting the object file and listing in memory.
pub fn assemble(lines: &[Line]) -> Result<Assembly> {
    let (mut object, mut listing) = (Vec::new(), Vec::new());
    let tables = assemble_to(lines, &mut object, &mut listing)?;
    Ok(Assembly {
        tables,
        object: String::from_utf8_lossy(&object).into_owned(),
        listing: String::from_utf8_lossy(&listing).into_owned(),
    })
}

/// Run both passes over `lines`, writing records and listing lines as they are produced.
/// Output already written stays written when a later line fails.
pub fn assemble_to<O: Write, L: Write>(
    lines: &[Line],
    object: &mut O,
    listing: &mut L,
) -> Result<Tables> {
    let tables = pass1::run(lines)?;
    let code_end = pass2::generate(lines, &tables, object, listing)?;
    debug_assert_eq!(code_end, tables.code_end, "passes disagree on code length");
    Ok(tables)
}

/// Read fixed-column source and assemble it.
pub fn assemble_source(src: &str) -> Result<Assembly> {
    let lines = source::read(src)?;
    assemble(&lines)
}
