//! Eager, single-pass preprocessing (spec §4.6): `#if`/`#ifdef`/`#ifndef`/
//! `#elif`/`#else`/`#endif` gating, object-like `#define` expansion, and
//! `#include` resolution, all performed once over the whole token stream
//! before any declaration or statement is parsed — mirroring
//! `original_source/Lex.c`'s "the preprocessor runs ahead of the parser,
//! not interleaved with it" structure.

use cembed_lexer::{tokenize, Punct, Token, TokenKind};
use cembed_session::{CResult, State};

use crate::err::parse_err;
use crate::registry::{Aux, MacroDef};
use crate::Interp;

type LexPos = cembed_lexer::Pos;

struct GateFrame {
    parent_active: bool,
    any_taken: bool,
    taken: bool,
}

fn active(gates: &[GateFrame]) -> bool {
    gates.last().map_or(true, |g| g.parent_active && g.taken)
}

/// Runs the whole preprocessor pass over `tokens`, returning the expanded
/// stream ready for `decl::parse_declaration`. `EndOfLine` tokens are
/// dropped here (mirroring `typename.rs`'s own test helper pattern) so
/// nothing downstream has to skip them.
pub fn preprocess(interp: &mut Interp, tokens: Vec<Token>) -> CResult<Vec<Token>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut gates: Vec<GateFrame> = Vec::new();
    let mut i = 0usize;

    while i < tokens.len() {
        match &tokens[i].kind {
            TokenKind::EndOfLine => {
                i += 1;
            }
            TokenKind::Hash(dir) => {
                let dir = *dir;
                let pos = tokens[i].pos;
                i += 1;
                let line_start = i;
                while i < tokens.len() && !matches!(tokens[i].kind, TokenKind::EndOfLine | TokenKind::Eof) {
                    i += 1;
                }
                let line = &tokens[line_start..i];
                handle_directive(interp, dir, line, pos, &mut gates, &mut out)?;
            }
            TokenKind::Eof => {
                out.push(tokens[i].clone());
                i += 1;
            }
            TokenKind::Ident(name) => {
                if active(&gates) {
                    if let Some(expanded) = try_expand_object_macro(interp, name, &tokens, i) {
                        out.extend(expanded);
                        i += 1;
                        continue;
                    }
                }
                out.push(tokens[i].clone());
                i += 1;
            }
            _ => {
                if active(&gates) {
                    out.push(tokens[i].clone());
                }
                i += 1;
            }
        }
    }

    if !gates.is_empty() {
        return Err(parse_err(LexPos { line: 0, col: 0 }, "#if without matching #endif"));
    }
    Ok(out)
}

fn try_expand_object_macro(interp: &Interp, name: &str, toks: &[Token], i: usize) -> Option<Vec<Token>> {
    let sym = interp.state.interner.lookup_str(name)?;
    let def = interp.aux.macros.get(&sym)?;
    if !def.params.is_empty() {
        return None;
    }
    // `NAME(` immediately following is a function-like invocation, handled
    // by `Caller::call_macro` once the expression evaluator reaches it, not
    // by textual splicing here.
    if matches!(toks.get(i + 1).map(|t| &t.kind), Some(TokenKind::Punct(Punct::LParen))) {
        return None;
    }
    Some(def.body.clone())
}

#[allow(clippy::too_many_arguments)]
fn handle_directive(
    interp: &mut Interp,
    dir: cembed_lexer::HashDirective,
    line: &[Token],
    pos: LexPos,
    gates: &mut Vec<GateFrame>,
    out: &mut Vec<Token>,
) -> CResult<()> {
    use cembed_lexer::HashDirective::*;
    match dir {
        If | Ifdef | Ifndef => {
            let parent_active = active(gates);
            let cond = if parent_active {
                match dir {
                    If => eval_condition(line, &interp.state, &interp.aux),
                    Ifdef => !line.is_empty() && is_defined(&interp.state, &interp.aux, &line[0]),
                    Ifndef => line.is_empty() || !is_defined(&interp.state, &interp.aux, &line[0]),
                    _ => unreachable!(),
                }
            } else {
                false
            };
            gates.push(GateFrame { parent_active, any_taken: cond, taken: cond });
        }
        Elif => {
            let frame = gates.last_mut().ok_or_else(|| parse_err(pos, "#elif without #if"))?;
            if frame.parent_active && !frame.any_taken {
                let cond = eval_condition(line, &interp.state, &interp.aux);
                frame.taken = cond;
                frame.any_taken = cond;
            } else {
                frame.taken = false;
            }
        }
        Else => {
            let frame = gates.last_mut().ok_or_else(|| parse_err(pos, "#else without #if"))?;
            frame.taken = frame.parent_active && !frame.any_taken;
            frame.any_taken = frame.any_taken || frame.taken;
        }
        Endif => {
            gates.pop().ok_or_else(|| parse_err(pos, "#endif without #if"))?;
        }
        Define => {
            if active(gates) {
                define_macro(interp, line, pos)?;
            }
        }
        Undef => {
            if active(gates) {
                if let Some(name) = ident_text(line.first()) {
                    if let Some(sym) = interp.state.interner.lookup_str(&name) {
                        interp.aux.macros.remove(&sym);
                    }
                }
            }
        }
        Include => {
            if active(gates) {
                let tokens = do_include(interp, line, pos)?;
                out.extend(tokens);
            }
        }
    }
    Ok(())
}

fn ident_text(tok: Option<&Token>) -> Option<String> {
    match tok.map(|t| &t.kind) {
        Some(TokenKind::Ident(s)) => Some(s.clone()),
        _ => None,
    }
}

fn is_defined(st: &State, aux: &Aux, tok: &Token) -> bool {
    if let TokenKind::Ident(name) = &tok.kind {
        if let Some(sym) = st.interner.lookup_str(name) {
            return aux.macros.contains_key(&sym) || st.lookup(sym).is_some();
        }
    }
    false
}

/// Bare identifier (macro or declared name) or a bare int/char literal, per
/// §9's "kept at spec's conservative `#if` reading" decision — not a full
/// constant-expression grammar.
fn eval_condition(line: &[Token], st: &State, aux: &Aux) -> bool {
    let Some(first) = line.first() else { return false };
    match &first.kind {
        TokenKind::Ident(name) => {
            let Some(sym) = st.interner.lookup_str(name) else { return false };
            if let Some(def) = aux.macros.get(&sym) {
                // An empty-bodied `#define FOO` is the "is defined" idiom;
                // otherwise fall back to the body's own truthiness.
                return def.body.is_empty() || body_is_truthy(&def.body);
            }
            st.lookup(sym).is_some()
        }
        TokenKind::IntLit(n) => *n != 0,
        TokenKind::CharLit(c) => *c != 0,
        _ => false,
    }
}

fn body_is_truthy(body: &[Token]) -> bool {
    match body.first().map(|t| &t.kind) {
        Some(TokenKind::IntLit(n)) => *n != 0,
        Some(TokenKind::CharLit(c)) => *c != 0,
        _ => true,
    }
}

/// `#define NAME body...` or `#define NAME(params) body...`. The lexer does
/// not preserve whether `(` immediately followed `NAME` with no
/// intervening space, so — an accepted simplification — "next token is
/// literally `(`" is treated as the function-like form regardless of
/// whitespace.
fn define_macro(interp: &mut Interp, line: &[Token], pos: LexPos) -> CResult<()> {
    let Some(name) = ident_text(line.first()) else {
        return Err(parse_err(pos, "#define requires a macro name"));
    };
    let sym = interp.state.interner.intern_str(&name);
    let mut idx = 1;
    let params = if matches!(line.get(idx).map(|t| &t.kind), Some(TokenKind::Punct(Punct::LParen))) {
        idx += 1;
        let mut params = Vec::new();
        if !matches!(line.get(idx).map(|t| &t.kind), Some(TokenKind::Punct(Punct::RParen))) {
            loop {
                match line.get(idx).map(|t| &t.kind) {
                    Some(TokenKind::Ident(p)) => {
                        params.push(interp.state.interner.intern_str(p));
                        idx += 1;
                    }
                    _ => return Err(parse_err(pos, "expected a macro parameter name")),
                }
                match line.get(idx).map(|t| &t.kind) {
                    Some(TokenKind::Punct(Punct::Comma)) => {
                        idx += 1;
                        continue;
                    }
                    _ => break,
                }
            }
        }
        if !matches!(line.get(idx).map(|t| &t.kind), Some(TokenKind::Punct(Punct::RParen))) {
            return Err(parse_err(pos, "expected `)` to close macro parameter list"));
        }
        idx += 1;
        params
    } else {
        Vec::new()
    };
    let body = line[idx.min(line.len())..].to_vec();
    let is_function_like = !params.is_empty();
    interp.aux.macros.insert(sym, MacroDef { params, body });
    if is_function_like {
        let macro_ty = interp.state.types.macro_type();
        interp.state.declare(sym, cembed_value::Value::rvalue(macro_ty, 0, cembed_value::ScopeId::GLOBAL));
    }
    // Zero-param macros are expanded textually by `preprocess` itself and
    // never reach `Caller::call_macro`, so no global binding is needed for
    // the evaluator to recognize the name as callable.
    Ok(())
}

/// Resolves `#include <name>`/`"name"`: a registered Rust setup callback
/// first (§4.6 "a host-registered callback, not a second copy of the
/// declaration parser"), then the host's `read_file` hook for an arbitrary
/// header, recursively tokenized and preprocessed.
fn do_include(interp: &mut Interp, line: &[Token], pos: LexPos) -> CResult<Vec<Token>> {
    let header = match line.first().map(|t| &t.kind) {
        Some(TokenKind::HeaderName { name, .. }) => name.clone(),
        _ => return Err(parse_err(pos, "expected a header name after #include")),
    };
    if interp.aux.included.contains(&header) {
        return Ok(Vec::new());
    }
    if let Some(entry) = interp.aux.includes.get(header.as_str()).copied() {
        interp.aux.included.insert(header.clone());
        (entry.setup)(interp);
        return Ok(Vec::new());
    }
    if let Some(read_file) = interp.read_file.as_mut() {
        if let Some(src) = read_file(&header) {
            interp.aux.included.insert(header.clone());
            let inner_tokens = tokenize(&src).map_err(|e| parse_err(pos, e.to_string()))?;
            return preprocess(interp, inner_tokens);
        }
    }
    Err(parse_err(pos, format!("cannot find header `{}`", header)))
}
