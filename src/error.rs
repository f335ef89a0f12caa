use std::io;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::{
    codec::{Family, NumError, PageError},
    ops::DirKind,
    source::Line,
    span::Span,
};

// Source reader errors

pub fn source_misaligned(span: Span, number: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "source::columns",
        help = "labels go in columns 1-6, operations in 10-14 and operands from column 18",
        labels = vec![LabeledSpan::at(span, "misaligned field")],
        "Line {number}: fields are not in their fixed columns",
    )
}

pub fn source_unknown_op(span: Span, number: usize, op: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "source::unknown_op",
        help = "check the list of machine instructions and pseudo-ops",
        labels = vec![LabeledSpan::at(span, "unknown operation")],
        "Line {number}: `{op}` is not an instruction or pseudo-op",
    )
}

pub fn source_missing_orig(span: Span) -> Report {
    miette!(
        severity = Severity::Error,
        code = "source::missing_orig",
        help = "the first line of a segment must be `.ORIG`",
        labels = vec![LabeledSpan::at(span, "expected .ORIG")],
        "Segment does not start with .ORIG",
    )
}

pub fn source_missing_end(span: Span) -> Report {
    miette!(
        severity = Severity::Error,
        code = "source::missing_end",
        help = "the last line of a segment must be `.END`",
        labels = vec![LabeledSpan::at(span, "expected .END")],
        "Segment does not finish with .END",
    )
}

// Pass 1 errors

pub fn symbol_capacity(line: &Line) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass1::symbol_capacity",
        help = "a segment may define at most 100 symbols",
        labels = vec![LabeledSpan::at(line.span, "one symbol too many")],
        "Line {}: too many symbols",
        line.number,
    )
}

pub fn literal_capacity(line: &Line) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass1::literal_capacity",
        help = "a segment may use at most 50 distinct literals",
        labels = vec![LabeledSpan::at(line.span, "one literal too many")],
        "Line {}: too many literals",
        line.number,
    )
}

pub fn forward_reference(line: &Line, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass1::forward_reference",
        help = ".EQU may only refer to symbols defined above it or declared with .EXT",
        labels = vec![LabeledSpan::at(line.span, "not defined yet")],
        "Line {}: forward referencing error, `{name}` is not defined",
        line.number,
    )
}

pub fn ambiguous_alias(line: &Line) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass1::ambiguous_alias",
        help = "a labelled .EXT declares exactly one name, which the label stands for",
        labels = vec![LabeledSpan::at(line.span, "several names")],
        "Line {}: label `{}` cannot stand for more than one name",
        line.number,
        line.label,
    )
}

// Operand errors, shared by both passes

pub fn bad_value(line: &Line, token: &str, family: Family, err: NumError) -> Report {
    let (code, label) = match err {
        NumError::Malformed => ("operand::invalid_value", "invalid value"),
        NumError::OutOfRange => ("operand::out_of_range", "value out of range"),
    };
    miette!(
        severity = Severity::Error,
        code = code,
        help = format!("expected {family}"),
        labels = vec![LabeledSpan::at(line.span, label)],
        "Line {}: `{token}`: {err}",
        line.number,
    )
}

pub fn bad_register(line: &Line, token: &str, err: NumError) -> Report {
    miette!(
        severity = Severity::Error,
        code = "operand::register",
        help = "registers are R0 to R7, or an absolute symbol holding 0 to 7",
        labels = vec![LabeledSpan::at(line.span, "invalid register")],
        "Line {}: `{token}` is not a register: {err}",
        line.number,
    )
}

pub fn block_length(line: &Line, token: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "operand::block_length",
        help = ".BLKW reserves between #1 and #65535 (x1 and xFFFF) words",
        labels = vec![LabeledSpan::at(line.span, "invalid block length")],
        "Line {}: `{token}` is not a valid block length",
        line.number,
    )
}

pub fn operand_count(line: &Line, expected: usize, found: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "operand::count",
        help = "check the operands for this instruction",
        labels = vec![LabeledSpan::at(line.span, "wrong number of operands")],
        "Line {}: `{}` expects {expected} operand(s), found {found}",
        line.number,
        line.mnemonic,
    )
}

// Pass 2 errors

pub fn unknown_op(line: &Line) -> Report {
    source_unknown_op(line.span, line.number, &line.mnemonic)
}

pub fn page_range(line: &Line, err: PageError) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::page_range",
        help = "PC-relative targets must be on the same 512-word page as the next instruction",
        labels = vec![LabeledSpan::at(line.span, "target off page")],
        "Line {}: {err}",
        line.number,
    )
}

pub fn undefined_symbol(line: &Line, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::undefined_symbol",
        help = "define the symbol with a label or declare it with .EXT",
        labels = vec![LabeledSpan::at(line.span, "undefined symbol")],
        "Line {}: symbol `{name}` is not found in the symbol table",
        line.number,
    )
}

pub fn unknown_literal(line: &Line, token: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::unknown_literal",
        help = "literals are collected by the first pass, this indicates mismatched input",
        labels = vec![LabeledSpan::at(line.span, "unknown literal")],
        "Line {}: literal `{token}` is not found in the literal table",
        line.number,
    )
}

pub fn external_misuse(line: &Line, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::external_misuse",
        help = "external symbols have no value until link time",
        labels = vec![LabeledSpan::at(line.span, "external symbol")],
        "Line {}: external symbol `{name}` cannot be used as an absolute symbol",
        line.number,
    )
}

pub fn not_absolute(line: &Line, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::not_absolute",
        help = "registers, immediates, indices and trap vectors need a symbol defined with .EQU",
        labels = vec![LabeledSpan::at(line.span, "relative symbol")],
        "Line {}: symbol `{name}` is not an absolute symbol",
        line.number,
    )
}

pub fn not_relative(line: &Line, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::not_relative",
        help = "only labels defined within this segment can be entry points",
        labels = vec![LabeledSpan::at(line.span, "not relative")],
        "Line {}: symbol `{name}` is not a relative symbol",
        line.number,
    )
}

pub fn dangling_alias(line: &Line, name: &str, target: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::dangling_alias",
        help = "a symbol may only stand for a name declared with .EXT",
        labels = vec![LabeledSpan::at(line.span, "unresolved alias")],
        "Line {}: `{name}` refers to `{target}`, which is not an external symbol",
        line.number,
    )
}

pub fn too_many_names(line: &Line, dir: DirKind, found: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::too_many_names",
        help = "split the names over several lines",
        labels = vec![LabeledSpan::at(line.span, "more than 5 names")],
        "Line {}: {dir} lists {found} symbols, at most 5 are allowed",
        line.number,
    )
}

pub fn name_collision(line: &Line, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "pass2::name_collision",
        help = "a name cannot be both defined in this segment and external",
        labels = vec![LabeledSpan::at(line.span, "already defined")],
        "Line {}: symbol `{name}` is already defined in the symbol table",
        line.number,
    )
}

pub fn segment_size(line: &Line, size: u32, relocatable: bool) -> Report {
    let (help, limit) = if relocatable {
        ("relocatable segments must fit in one page", "a page length")
    } else {
        ("segments cannot exceed the address space", "xFFFF words")
    };
    miette!(
        severity = Severity::Error,
        code = "pass2::segment_size",
        help = help,
        labels = vec![LabeledSpan::at(line.span, "segment too large")],
        "Line {}: segment size x{size:X} is greater than {limit}",
        line.number,
    )
}

pub fn io_write(line: &Line, target: &str, err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "io::write",
        help = "check that the output location is writable",
        "Line {}: unable to write to the {target}: {err}",
        line.number,
    )
}
