//! Small diagnostic constructors shared by `decl.rs`/`preprocess.rs`/`stmt.rs`,
//! mirroring `cembed_eval`'s private `parse_err`/`type_err`/`runtime_err`
//! family so error kinds stay consistent with spec §7's taxonomy across
//! crate boundaries.

use cembed_session::{Diagnostic, ErrorKind};

pub type LexPos = cembed_lexer::Pos;

fn sess_pos(p: LexPos) -> cembed_session::Pos {
    cembed_session::Pos { line: p.line, col: p.col }
}

pub fn parse_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Parse, sess_pos(pos), msg)
}

pub fn type_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Type, sess_pos(pos), msg)
}

pub fn runtime_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Runtime, sess_pos(pos), msg)
}

pub fn resource_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Resource, sess_pos(pos), msg)
}

pub fn control_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::ControlFlow, sess_pos(pos), msg)
}
