//! Compile errors with source spans. A Patito program is one file, so the file
//! name is supplied when the diagnostic is rendered.

use crate::span::Span;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "error at {}: {}", span, self.message),
            None => write!(f, "error: {}", self.message),
        }
    }
}

/// Convert a byte offset to a 1-based (line, column) pair.
pub fn offset_to_line_col(source: &str, offset: u32) -> (u32, u32) {
    let offset = offset as usize;
    if offset >= source.len() {
        let lines = source.lines().count() as u32;
        let last_len = source.lines().last().map(|l| l.len()).unwrap_or(0) as u32;
        return (lines.max(1), last_len + 1);
    }
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Render a diagnostic as `file:line:col: error: message` followed by the offending
/// source line with a caret underline.
pub fn format_diagnostic(source: &str, file_name: &str, diag: &Diagnostic) -> String {
    let Some(span) = diag.span else {
        return format!("{}: error: {}", file_name, diag.message);
    };
    let (line, col) = offset_to_line_col(source, span.start);
    let line_content = source
        .lines()
        .nth((line as usize).saturating_sub(1))
        .unwrap_or("");
    let (end_line, col_end) = offset_to_line_col(source, span.end);
    let pad = " ".repeat((col as usize).saturating_sub(1));
    let underline = if end_line == line && col_end > col {
        pad + &"^".repeat((col_end - col) as usize)
    } else {
        pad + "^"
    };
    let gutter = " ".repeat(line.to_string().len());
    format!(
        "{}:{}:{}: error: {}\n {} | {}\n {} | {}",
        file_name, line, col, diag.message, line, line_content, gutter, underline
    )
}
