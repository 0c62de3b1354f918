//! The error taxonomy (spec §7) and caret-style diagnostic rendering,
//! grounded on `librustc_errors/emitter.rs`'s `render_source_line`.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// The six kinds from §7 ("Taxonomy (kinds, not names)").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    Lex,
    Parse,
    Type,
    Runtime,
    Resource,
    ControlFlow,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Parse => "parse error",
            ErrorKind::Type => "type error",
            ErrorKind::Runtime => "runtime error",
            ErrorKind::Resource => "resource error",
            ErrorKind::ControlFlow => "control-flow error",
        };
        write!(f, "{}", s)
    }
}

/// A fatal diagnostic. Propagation is "fatal: a non-local jump back to the
/// host-installed exit point" (§7) — here, simply `Result::Err` unwound by
/// `?` up to the interactive loop or the CLI's top level.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub pos: Pos,
    /// Set for assignment errors: (function name, 1-based argument index).
    pub arg_context: Option<(String, u32)>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, pos: Pos, message: impl Into<String>) -> Diagnostic {
        Diagnostic { kind, message: message.into(), pos, arg_context: None }
    }

    pub fn with_arg_context(mut self, fn_name: impl Into<String>, index: u32) -> Diagnostic {
        self.arg_context = Some((fn_name.into(), index));
        self
    }

    /// Renders the offending source line with a caret under `pos.col`,
    /// followed by `file:line:col message` (§7 "User-visible behavior").
    pub fn render(&self, filename: &str, source: &str) -> String {
        let line_text = source.lines().nth(self.pos.line.saturating_sub(1) as usize).unwrap_or("");
        let caret_col = self.pos.col.saturating_sub(1) as usize;
        let caret = " ".repeat(caret_col) + "^";
        let mut out = format!("{}\n{}\n{}:{} {}", line_text, caret, filename, self.pos, self.message);
        if let Some((fname, idx)) = &self.arg_context {
            out.push_str(&format!(" (in call to `{}`, argument {})", fname, idx));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.pos, self.kind, self.message)
    }
}

impl std::error::Error for Diagnostic {}

pub type CResult<T> = Result<T, Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_points_at_the_right_column() {
        let d = Diagnostic::new(ErrorKind::Type, Pos { line: 2, col: 5 }, "bad operand");
        let src = "int x;\nfoo + ;\n";
        let rendered = d.render("t.c", src);
        assert!(rendered.contains("foo + ;"));
        assert!(rendered.contains("    ^"));
        assert!(rendered.contains("t.c:2:5 bad operand"));
    }
}
