//! Parses a type-name (the thing inside `sizeof(...)` or an explicit cast,
//! and later reused by `cembed_interp` for full declarations): base-type
//! keyword combinations, a `struct`/`union`/`enum` tag, or a typedef name,
//! followed by zero or more `*` pointer levels.

use cembed_lexer::{Keyword, Punct, Token, TokenKind};
use cembed_session::{CResult, Diagnostic, ErrorKind, State};
use cembed_types::{BaseTag, Idx, IntWidth, TypeHandle};
use cembed_value::AnyValue;

fn err(pos: cembed_lexer::Pos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Parse, cembed_session::Pos { line: pos.line, col: pos.col }, msg)
}

/// True if the token at `toks[*pos]` could begin a type-name — callers use
/// this to decide between "parse a cast/sizeof(Type)" and "parse an
/// expression" without consuming anything.
pub fn looks_like_type_start(toks: &[Token], pos: usize, st: &State) -> bool {
    match &toks[pos].kind {
        TokenKind::Keyword(kw) => matches!(
            kw,
            Keyword::Void
                | Keyword::Char
                | Keyword::Short
                | Keyword::Int
                | Keyword::Long
                | Keyword::Float
                | Keyword::Double
                | Keyword::Signed
                | Keyword::Unsigned
                | Keyword::Struct
                | Keyword::Union
                | Keyword::Enum
                | Keyword::Const
                | Keyword::Volatile
        ),
        TokenKind::Ident(name) => is_typedef_name(st, name),
        _ => false,
    }
}

fn is_typedef_name(st: &State, name: &str) -> bool {
    let Some(sym) = st.interner.lookup_str(name) else { return false };
    let Some(value) = st.lookup(sym) else { return false };
    value.ty == st.types.type_of_types_handle()
}

/// Parses a type-name starting at `toks[*pos]`, advancing `*pos` past it.
/// Returns `Ok(None)` (without advancing) if the current token cannot start
/// one — callers fall back to parsing an expression.
pub fn parse_type_name(toks: &[Token], pos: &mut usize, st: &mut State) -> CResult<Option<TypeHandle>> {
    if !looks_like_type_start(toks, *pos, st) {
        return Ok(None);
    }

    let base = parse_base_type(toks, pos, st)?;
    let mut ty = base;
    while matches!(toks[*pos].kind, TokenKind::Punct(Punct::Star)) {
        *pos += 1;
        ty = st.types.pointer_to(ty);
    }
    Ok(Some(ty))
}

fn parse_base_type(toks: &[Token], pos: &mut usize, st: &mut State) -> CResult<TypeHandle> {
    // `const`/`volatile` are accepted and ignored: this interpreter has no
    // notion of a read-only binding distinct from a plain one.
    while matches!(toks[*pos].kind, TokenKind::Keyword(Keyword::Const) | TokenKind::Keyword(Keyword::Volatile)) {
        *pos += 1;
    }

    match &toks[*pos].kind {
        TokenKind::Keyword(Keyword::Void) => {
            *pos += 1;
            Ok(st.types.void())
        }
        TokenKind::Keyword(Keyword::Float) => {
            *pos += 1;
            Ok(st.types.float())
        }
        TokenKind::Keyword(Keyword::Double) => {
            *pos += 1;
            Ok(st.types.double())
        }
        TokenKind::Keyword(Keyword::Struct) | TokenKind::Keyword(Keyword::Union) => {
            let is_union = matches!(toks[*pos].kind, TokenKind::Keyword(Keyword::Union));
            *pos += 1;
            let name = expect_ident(toks, pos)?;
            let sym = st.interner.intern_str(&name);
            Ok(st.types.struct_or_union_tag(sym, is_union))
        }
        TokenKind::Keyword(Keyword::Enum) => {
            *pos += 1;
            let name = expect_ident(toks, pos)?;
            let sym = st.interner.intern_str(&name);
            Ok(st.types.enum_tag(sym))
        }
        TokenKind::Keyword(Keyword::Char)
        | TokenKind::Keyword(Keyword::Short)
        | TokenKind::Keyword(Keyword::Int)
        | TokenKind::Keyword(Keyword::Long)
        | TokenKind::Keyword(Keyword::Signed)
        | TokenKind::Keyword(Keyword::Unsigned) => Ok(parse_int_combo(toks, pos, st)),
        TokenKind::Ident(name) => {
            let name = name.clone();
            let sym = st.interner.intern_str(&name);
            let value = st.lookup(sym).copied().ok_or_else(|| err(toks[*pos].pos, format!("`{}` is not a type", name)))?;
            let bytes = st.arena.read(value.addr, 8).to_vec();
            let decoded = AnyValue::decode(&bytes, BaseTag::TypeOfTypes);
            *pos += 1;
            match decoded {
                AnyValue::TypeValue(h) => Ok(h),
                _ => Err(err(toks[*pos - 1].pos, format!("`{}` is not a type", name))),
            }
        }
        _ => Err(err(toks[*pos].pos, "expected a type name")),
    }
}

fn expect_ident(toks: &[Token], pos: &mut usize) -> CResult<String> {
    match &toks[*pos].kind {
        TokenKind::Ident(name) => {
            let name = name.clone();
            *pos += 1;
            Ok(name)
        }
        _ => Err(err(toks[*pos].pos, "expected a tag name")),
    }
}

/// Consumes the `signed`/`unsigned`/`char`/`short`/`int`/`long` keyword run
/// that makes up a built-in integer type name and resolves it to a width
/// and signedness. Defaults to `signed int` on an empty combo (the caller
/// only reaches here once a combo-starting keyword has been seen).
fn parse_int_combo(toks: &[Token], pos: &mut usize, st: &mut State) -> TypeHandle {
    let mut signed: Option<bool> = None;
    let mut saw_char = false;
    let mut long_count = 0u32;
    let mut saw_short = false;
    let mut saw_int = false;

    loop {
        match toks[*pos].kind {
            TokenKind::Keyword(Keyword::Signed) => {
                signed = Some(true);
                *pos += 1;
            }
            TokenKind::Keyword(Keyword::Unsigned) => {
                signed = Some(false);
                *pos += 1;
            }
            TokenKind::Keyword(Keyword::Char) => {
                saw_char = true;
                *pos += 1;
            }
            TokenKind::Keyword(Keyword::Short) => {
                saw_short = true;
                *pos += 1;
            }
            TokenKind::Keyword(Keyword::Long) => {
                long_count += 1;
                *pos += 1;
            }
            TokenKind::Keyword(Keyword::Int) => {
                saw_int = true;
                *pos += 1;
            }
            _ => break,
        }
    }
    let _ = saw_int;

    let width = if saw_char {
        IntWidth::W8
    } else if saw_short {
        IntWidth::W16
    } else if long_count > 0 {
        IntWidth::W64
    } else {
        IntWidth::W32
    };
    // Plain `char` is treated as signed; every other combo defaults signed
    // unless `unsigned` appeared.
    let is_signed = signed.unwrap_or(true);
    st.types.int(is_signed, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cembed_lexer::tokenize;
    use cembed_session::State;

    fn parse(src: &str) -> (TypeHandle, State) {
        let mut toks = tokenize(src).unwrap();
        toks.retain(|t| !matches!(t.kind, TokenKind::EndOfLine));
        let mut st = State::new(4096);
        let mut pos = 0;
        let ty = parse_type_name(&toks, &mut pos, &mut st).unwrap().unwrap();
        (ty, st)
    }

    #[test]
    fn unsigned_long_is_a_64_bit_unsigned_int() {
        let (ty, mut st) = parse("unsigned long");
        assert_eq!(ty, st.types.int(false, IntWidth::W64));
    }

    #[test]
    fn pointer_star_wraps_the_base_type() {
        let (ty, mut st) = parse("char *");
        let c = st.types.int(true, IntWidth::W8);
        assert_eq!(ty, st.types.pointer_to(c));
    }

    #[test]
    fn double_pointer_wraps_twice() {
        let (ty, mut st) = parse("int * *");
        let i = st.types.int(true, IntWidth::W32);
        let p = st.types.pointer_to(i);
        assert_eq!(ty, st.types.pointer_to(p));
    }

    #[test]
    fn plain_keyword_without_type_context_is_rejected_as_an_expression() {
        let toks = tokenize("1 + 2").unwrap();
        let mut st = State::new(4096);
        let mut pos = 0;
        assert!(parse_type_name(&toks, &mut pos, &mut st).unwrap().is_none());
        assert_eq!(pos, 0);
    }
}
