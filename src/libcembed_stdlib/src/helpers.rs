//! Shared plumbing every intrinsic pack needs: reading/writing C strings in
//! the guest arena, and installing a named integer constant the way a
//! header's `#define` would (spec §6.4 "Intrinsic Registration" treats a
//! constant exactly like a zero-argument macro, grounded in
//! `original_source/Lib/*.c`'s `PlatformSetConstant`/`VariableDefinePlatformVar`
//! helpers).

use cembed_interp::{pointer_address, Interp};
use cembed_lexer::{Keyword, Pos as LexPos, Token, TokenKind};
use cembed_session::{CResult, State};
use cembed_value::Value;

pub fn read_cstr(st: &State, addr: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut i = addr;
    loop {
        let b = st.arena.read(i, 1)[0];
        if b == 0 {
            break;
        }
        bytes.push(b);
        i += 1;
    }
    bytes
}

pub fn arg_cstr(st: &State, v: &Value) -> CResult<Vec<u8>> {
    let addr = pointer_address(st, v)? as usize;
    Ok(read_cstr(st, addr))
}

pub fn arg_ptr(st: &State, v: &Value) -> CResult<usize> {
    Ok(pointer_address(st, v)? as usize)
}

/// Writes `bytes` (no trailing NUL implied — callers append one if they
/// want a C string) into already-allocated guest storage at `addr`.
pub fn write_bytes(st: &mut State, addr: usize, bytes: &[u8]) {
    st.arena.write(addr, bytes);
}

/// Allocates `len` fresh heap bytes (spec §4.1 Arena) and writes `bytes`
/// into them, NUL-terminating — the shape `strdup`-like helpers and
/// `fopen`'s internal bookkeeping need.
pub fn heap_alloc_cstr(st: &mut State, bytes: &[u8]) -> Option<usize> {
    let addr = st.arena.heap_alloc(bytes.len() + 1)?;
    let mut buf = bytes.to_vec();
    buf.push(0);
    st.arena.write(addr, &buf);
    Some(addr)
}

/// Registers `name` as an object-like macro expanding to the integer
/// literal `value` — the zero-argument-macro shape §4.6 already gives
/// every `#define CONST value` line, reused here so a header's constants
/// (`EOF`, `SEEK_SET`, `EDOM`, ...) need no dedicated storage.
pub fn define_int_constant(interp: &mut Interp, name: &str, value: i64) {
    let sym = interp.state.interner.intern_str(name);
    let body = vec![Token { kind: TokenKind::IntLit(value), pos: LexPos::default() }];
    interp.aux.macros.insert(sym, cembed_interp::MacroDef { params: Vec::new(), body });
}

/// Registers `name` as an object-like macro expanding to the bare keyword
/// `int` — the no-typedef-API stand-in for `typedef int bool;`
/// (`original_source/Lib/stdbool.c`), reusing the same `#define` machinery
/// so `bool` in guest source re-lexes as the `int` keyword everywhere a
/// real typedef would have resolved it.
pub fn define_int_alias(interp: &mut Interp, name: &str) {
    let sym = interp.state.interner.intern_str(name);
    let body = vec![Token { kind: TokenKind::Keyword(Keyword::Int), pos: LexPos::default() }];
    interp.aux.macros.insert(sym, cembed_interp::MacroDef { params: Vec::new(), body });
}
