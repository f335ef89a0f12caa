//! Source lines as handed to the passes, and a reader for the fixed-column source format.

use std::ops::Range;

use miette::Result;

use crate::{
    error,
    ops::{DirKind, Mnemonic},
    span::{Span, SrcOffset},
};

const LABEL_COLS: Range<usize> = 0..6;
const FIRST_GAP: Range<usize> = 6..9;
const OP_COLS: Range<usize> = 9..14;
const SECOND_GAP: Range<usize> = 14..17;
const OPERAND_COL: usize = 17;

/// One validated source line: label, operation, raw operand field and 1-based line number.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Line {
    pub label: String,
    pub mnemonic: String,
    pub operands: String,
    pub number: usize,
    /// Operand field in the source, or the operation when there are no operands
    pub span: Span,
}

impl Line {
    pub fn new(
        label: impl Into<String>,
        mnemonic: impl Into<String>,
        operands: impl Into<String>,
        number: usize,
    ) -> Self {
        Line {
            label: label.into(),
            mnemonic: mnemonic.into(),
            operands: operands.into(),
            number,
            span: Span::dummy(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Look the operation up in the instruction and directive tables.
    pub fn op(&self) -> Result<Mnemonic> {
        self.mnemonic
            .parse::<Mnemonic>()
            .map_err(|_| error::unknown_op(self))
    }

    /// Comma separated operands. An empty field yields no operands.
    pub fn operand_list(&self) -> Vec<&str> {
        if self.operands.is_empty() {
            Vec::new()
        } else {
            self.operands.split(',').collect()
        }
    }
}

/// Split fixed-column source into lines. Comment and blank lines are dropped; the segment must
/// open with `.ORIG` and close with `.END`.
pub fn read(src: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    let mut offs = 0;

    for (idx, raw) in src.split_inclusive('\n').enumerate() {
        let start = offs;
        offs += raw.len();
        let raw = raw.trim_end_matches(['\n', '\r']);
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }
        lines.push(read_line(strip_comment(raw), start, idx + 1)?);
    }

    match lines.first() {
        Some(first) if first.mnemonic == DirKind::Orig.to_string() => (),
        Some(first) => return Err(error::source_missing_orig(first.span)),
        None => return Err(error::source_missing_orig(Span::new(SrcOffset(0), 0))),
    }
    match lines.last() {
        Some(last) if lines.len() > 1 && last.mnemonic == DirKind::End.to_string() => (),
        Some(last) => return Err(error::source_missing_end(last.span)),
        None => unreachable!(),
    }
    Ok(lines)
}

fn read_line(code: &str, start: usize, number: usize) -> Result<Line> {
    let field_span = |cols: Range<usize>, text: &str| {
        let field = column(code, cols.clone());
        let lead = field.len() - field.trim_start().len();
        Span::new(SrcOffset(start + cols.start + lead), text.len())
    };

    for gap in [FIRST_GAP, SECOND_GAP] {
        let text = column(code, gap.clone());
        if !text.trim().is_empty() {
            return Err(error::source_misaligned(field_span(gap, text.trim()), number));
        }
    }

    let label = column(code, LABEL_COLS).trim();
    let mnemonic = column(code, OP_COLS).trim();
    let op_span = field_span(OP_COLS, mnemonic);
    let op = mnemonic
        .parse::<Mnemonic>()
        .map_err(|_| error::source_unknown_op(op_span, number, mnemonic))?;

    let operand_end = code.len().max(OPERAND_COL);
    let operands = column(code, OPERAND_COL..operand_end).trim();
    let span = if operands.is_empty() {
        op_span
    } else {
        field_span(OPERAND_COL..operand_end, operands)
    };
    let operands = match op {
        Mnemonic::Dir(DirKind::Strz) => strip_quotes(operands),
        _ => operands,
    };

    Ok(Line {
        label: label.to_owned(),
        mnemonic: mnemonic.to_owned(),
        operands: operands.to_owned(),
        number,
        span,
    })
}

/// Slice of the line covering `cols`, empty where the line is shorter.
fn column(code: &str, cols: Range<usize>) -> &str {
    let end = cols.end.min(code.len());
    let start = cols.start.min(end);
    code.get(start..end).unwrap_or("")
}

/// Drop a trailing `;` comment that is not inside a string.
fn strip_comment(line: &str) -> &str {
    let mut in_str = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_str = !in_str,
            ';' if !in_str => return &line[..i],
            _ => (),
        }
    }
    line
}

fn strip_quotes(operand: &str) -> &str {
    operand
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(operand)
}
