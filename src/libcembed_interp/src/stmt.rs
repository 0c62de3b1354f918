//! The `RunMode` statement interpreter (spec §4.5): every construct below
//! re-parses its full syntax regardless of whether it is reached in
//! `RunMode::Run`, so `*pos` always stays correctly synchronized whether or
//! not code actually executes — mirrored from how `cembed_eval` parses a
//! suppressed `&&`/`||` operand or `sizeof` operand in full with
//! `executing=false` rather than skipping tokens outright.
//!
//! Free functions here (not methods on `Interp`) are what let `Aux`'s
//! `cembed_eval::Caller` impl call back into statement execution without
//! borrowing `Interp` twice: every entry point takes `&mut State` and
//! `&mut Aux` as two separate parameters.

use cembed_data_structures::Symbol;
use cembed_lexer::{Keyword, Punct, Token, TokenKind};
use cembed_session::{CResult, State};
use cembed_types::{BaseTag, TypeHandle};
use cembed_value::{AnyValue, ScopeId, Value};

use crate::err::{control_err, parse_err, resource_err, runtime_err};
use crate::mode::RunMode;
use crate::registry::Aux;

type LexPos = cembed_lexer::Pos;

fn here(toks: &[Token], pos: usize) -> LexPos {
    toks[pos].pos
}

fn current_punct(toks: &[Token], pos: usize) -> Option<Punct> {
    match toks[pos].kind {
        TokenKind::Punct(p) => Some(p),
        _ => None,
    }
}

fn current_keyword(toks: &[Token], pos: usize) -> Option<Keyword> {
    match toks[pos].kind {
        TokenKind::Keyword(k) => Some(k),
        _ => None,
    }
}

fn expect_punct(toks: &[Token], pos: &mut usize, want: Punct, what: &str) -> CResult<()> {
    if current_punct(toks, *pos) == Some(want) {
        *pos += 1;
        Ok(())
    } else {
        Err(parse_err(here(toks, *pos), format!("expected {}", what)))
    }
}

fn expect_keyword(toks: &[Token], pos: &mut usize, want: Keyword, what: &str) -> CResult<()> {
    if current_keyword(toks, *pos) == Some(want) {
        *pos += 1;
        Ok(())
    } else {
        Err(parse_err(here(toks, *pos), format!("expected {}", what)))
    }
}

// ---------------------------------------------------------------------
// Shared value helpers (mirror `cembed_eval`'s own private ones, since
// those aren't exposed as `pub` and this crate needs the same patterns
// for intrinsic results and macro-call materialization).
// ---------------------------------------------------------------------

pub(crate) fn decode(st: &State, v: &Value) -> CResult<AnyValue> {
    let node = st.types.node(v.ty);
    if matches!(node.base, BaseTag::Array) {
        return Ok(AnyValue::Pointer(v.addr as u64));
    }
    if matches!(node.base, BaseTag::Struct | BaseTag::Union | BaseTag::Function | BaseTag::Macro | BaseTag::Uber) {
        return Err(runtime_err(LexPos::default(), "value is not a scalar"));
    }
    let n = node.sizeof as usize;
    Ok(AnyValue::decode(st.arena.read(v.addr, n), node.base))
}

/// A pointer-like value's raw address: an array's own address for an array
/// operand (mirrors `cembed_eval`'s private `pointer_bits`, needed here by
/// intrinsics that walk a `char*`/`char[]` argument byte-by-byte).
pub(crate) fn ptr_bits(st: &State, v: &Value) -> CResult<i64> {
    match st.types.node(v.ty).base {
        BaseTag::Array => Ok(v.addr as i64),
        _ => Ok(decode(st, v)?.as_i64()),
    }
}

fn write_into(st: &mut State, addr: usize, ty: TypeHandle, av: AnyValue) {
    let n = (st.types.node(ty).sizeof as usize).max(1);
    let mut buf = vec![0u8; n];
    av.encode(&mut buf[..n.min(8)]);
    st.arena.write(addr, &buf);
}

fn push_result(st: &mut State, ty: TypeHandle, av: AnyValue) -> CResult<Value> {
    let n = (st.types.node(ty).sizeof as usize).max(1);
    let addr = st.arena.stack_alloc(n).ok_or_else(|| resource_err(LexPos::default(), "stack exhausted"))?;
    write_into(st, addr, ty, av);
    Ok(Value::rvalue(ty, addr, ScopeId::GLOBAL))
}

// ---------------------------------------------------------------------
// Calling
// ---------------------------------------------------------------------

/// Calls a user-defined or intrinsic function. A call frame is pushed (and
/// popped, via rewind) "even in skip mode, for balance" (spec §4.4);
/// `executing` only gates whether the body's side effects actually happen.
///
/// The return value's storage is allocated *before* the checkpoint that
/// the callee's frame and locals rewind back to, so `return`'s write into
/// it survives `st.rewind(cp)` tearing down everything the call itself
/// allocated.
pub fn call_function(st: &mut State, aux: &mut Aux, callee: Symbol, args: Vec<Value>, executing: bool) -> CResult<Value> {
    let def = aux.functions.get(&callee).cloned().ok_or_else(|| runtime_err(LexPos::default(), "call to an undeclared function"))?;
    let ret_ty = def.ret;
    let ret_size = st.types.sizeof(ret_ty).unwrap_or(0).max(1) as usize;
    let result_addr = st.arena.stack_alloc(ret_size).ok_or_else(|| resource_err(LexPos::default(), "stack exhausted"))?;

    let cp = st.checkpoint();
    let fn_name = st.interner.resolve_str(callee).to_string();
    st.push_frame(fn_name).ok_or_else(|| resource_err(LexPos::default(), "call stack exhausted"))?;
    st.frames.current_mut().unwrap().return_slot = Some(Value::rvalue(ret_ty, result_addr, ScopeId::GLOBAL));

    let param_scope = st.fresh_scope_id();
    for (i, (pname, pty)) in def.params.iter().enumerate() {
        let psize = st.types.sizeof(*pty).unwrap_or(0).max(1) as usize;
        let paddr = st.arena.stack_alloc(psize).ok_or_else(|| resource_err(LexPos::default(), "stack exhausted"))?;
        let pval = Value::new_owned(*pty, paddr, true, param_scope);
        if executing {
            if let Some(arg) = args.get(i) {
                cembed_eval::assign_forced(&pval, arg, st, true, 0, 0)?;
            }
        }
        st.declare(*pname, pval);
    }
    // Extra variadic arguments are never bound by name; an intrinsic that
    // needs them (e.g. `printf`) reads straight from `args`.

    if let Some(intrinsic) = def.intrinsic {
        if executing {
            let av = intrinsic(st, aux, &args)?;
            write_into(st, result_addr, ret_ty, av);
        }
    } else if let Some(body) = def.body.clone() {
        let mode = if executing { RunMode::Run } else { RunMode::Skip };
        let mut bpos = 0usize;
        let after = exec_block(&body, &mut bpos, st, aux, mode)?;
        if let RunMode::Goto(target) = after {
            bpos = 0;
            let after2 = exec_block(&body, &mut bpos, st, aux, RunMode::Goto(target))?;
            if matches!(after2, RunMode::Goto(_)) {
                let name = st.interner.resolve_str(target).to_string();
                return Err(control_err(LexPos::default(), format!("no such label `{}` in this function", name)));
            }
        }
    } else {
        return Err(runtime_err(LexPos::default(), "call to a function with no body"));
    }

    st.rewind(cp);
    Ok(Value::rvalue(ret_ty, result_addr, ScopeId::GLOBAL))
}

/// Expands and evaluates a function-like macro body as a single expression
/// (§4.6). Parameters alias the already-evaluated argument `Value`s
/// directly (no copy — macro substitution, not call-by-value), which is
/// why the result is decoded into a plain `AnyValue` *before* `rewind`
/// tears the temporary frame down, then re-materialized into fresh storage
/// above the (now rewound) stack top: a macro body that is literally just
/// a parameter name would otherwise alias storage this call reclaims.
pub fn call_macro(st: &mut State, aux: &mut Aux, callee: Symbol, args: Vec<Value>, executing: bool) -> CResult<Value> {
    let def = aux.macros.get(&callee).cloned().ok_or_else(|| runtime_err(LexPos::default(), "call to an undefined macro"))?;
    let cp = st.checkpoint();
    st.push_frame("<macro>").ok_or_else(|| resource_err(LexPos::default(), "call stack exhausted"))?;
    for (i, pname) in def.params.iter().enumerate() {
        if let Some(arg) = args.get(i).copied() {
            st.declare(*pname, arg);
        }
    }
    let mut bpos = 0usize;
    let evaluated = cembed_eval::eval_expr(&def.body, &mut bpos, st, executing, aux);
    let materialized = evaluated.and_then(|v| {
        let av = decode(st, &v)?;
        Ok((v.ty, av))
    });
    st.rewind(cp);
    let (ty, av) = materialized?;
    push_result(st, ty, av)
}

// ---------------------------------------------------------------------
// Blocks and statements
// ---------------------------------------------------------------------

/// Executes a `{ ... }` block. `*pos` must be at the opening `{`. The
/// block's own scope is exited, and its locals' stack space reclaimed,
/// unconditionally — whether the block ran for real or was only parsed
/// passively to stay in sync.
pub fn exec_block(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux, mode: RunMode) -> CResult<RunMode> {
    expect_punct(toks, pos, Punct::LBrace, "`{` to start a block")?;
    let scope = st.fresh_scope_id();
    let mark = st.stack_checkpoint();
    let mut cur = mode;
    while current_punct(toks, *pos) != Some(Punct::RBrace) {
        if matches!(toks[*pos].kind, TokenKind::Eof) {
            return Err(parse_err(here(toks, *pos), "unterminated block"));
        }
        cur = exec_stmt(toks, pos, st, aux, cur, scope)?;
    }
    *pos += 1; // '}'
    st.exit_scope(scope);
    st.stack_rewind(mark);
    Ok(cur)
}

/// Executes (or passively parses) one statement, returning the `RunMode`
/// that should be fed into whatever follows it.
fn exec_stmt(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux, mode: RunMode, scope: ScopeId) -> CResult<RunMode> {
    if mode.executing() {
        if let Some(hook) = aux.debug_hook.as_mut() {
            let p = here(toks, *pos);
            hook(cembed_session::Pos { line: p.line, col: p.col });
        }
    }

    // A leading `ident:` goto-label is transparent syntax: consume it, and
    // if we are searching for exactly this label, resolve the search to
    // `Run` before tail-parsing the statement it labels.
    if let (TokenKind::Ident(name), Some(Punct::Colon)) = (&toks[*pos].kind, current_punct(toks, *pos + 1)) {
        let sym = st.interner.intern_str(name);
        *pos += 2;
        let next_mode = match mode {
            RunMode::Goto(target) if target == sym => RunMode::Run,
            other => other,
        };
        return exec_stmt(toks, pos, st, aux, next_mode, scope);
    }

    if current_keyword(toks, *pos) == Some(Keyword::Case) {
        *pos += 1;
        // Case labels are constant expressions — always evaluated for
        // real, regardless of the outer mode.
        let v = cembed_eval::eval_expr(toks, pos, st, true, aux)?;
        let k = decode(st, &v)?.as_i64();
        expect_punct(toks, pos, Punct::Colon, "`:` after a `case` label")?;
        let next_mode = match mode {
            RunMode::CaseSearch(target) if target == k => RunMode::Run,
            other => other,
        };
        return exec_stmt(toks, pos, st, aux, next_mode, scope);
    }

    if current_keyword(toks, *pos) == Some(Keyword::Default) {
        *pos += 1;
        expect_punct(toks, pos, Punct::Colon, "`:` after `default`")?;
        // Simplification: `default` resolves a case search as soon as it
        // is textually reached, rather than only after every `case` in the
        // body has been tried — a `default` positioned before a later
        // matching `case` wins the search here.
        let next_mode = match mode {
            RunMode::CaseSearch(_) => RunMode::Run,
            other => other,
        };
        return exec_stmt(toks, pos, st, aux, next_mode, scope);
    }

    match &toks[*pos].kind {
        TokenKind::Punct(Punct::Semicolon) => {
            *pos += 1;
            Ok(mode)
        }
        TokenKind::Punct(Punct::LBrace) => exec_block(toks, pos, st, aux, mode),
        TokenKind::Keyword(Keyword::If) => exec_if(toks, pos, st, aux, mode, scope),
        TokenKind::Keyword(Keyword::While) => exec_while(toks, pos, st, aux, mode, scope),
        TokenKind::Keyword(Keyword::Do) => exec_do(toks, pos, st, aux, mode, scope),
        TokenKind::Keyword(Keyword::For) => exec_for(toks, pos, st, aux, mode, scope),
        TokenKind::Keyword(Keyword::Switch) => exec_switch(toks, pos, st, aux, mode, scope),
        TokenKind::Keyword(Keyword::Return) => exec_return(toks, pos, st, aux, mode),
        TokenKind::Keyword(Keyword::Break) => {
            *pos += 1;
            expect_punct(toks, pos, Punct::Semicolon, "`;` after `break`")?;
            Ok(if mode.executing() { RunMode::Break } else { mode })
        }
        TokenKind::Keyword(Keyword::Continue) => {
            *pos += 1;
            expect_punct(toks, pos, Punct::Semicolon, "`;` after `continue`")?;
            Ok(if mode.executing() { RunMode::Continue } else { mode })
        }
        TokenKind::Keyword(Keyword::Goto) => {
            *pos += 1;
            let name = match &toks[*pos].kind {
                TokenKind::Ident(n) => n.clone(),
                _ => return Err(parse_err(here(toks, *pos), "expected a label name after `goto`")),
            };
            *pos += 1;
            expect_punct(toks, pos, Punct::Semicolon, "`;` after a `goto` target")?;
            let sym = st.interner.intern_str(&name);
            Ok(if mode.executing() { RunMode::Goto(sym) } else { mode })
        }
        _ if crate::decl::looks_like_declaration_start(toks, *pos, st) => {
            crate::decl::parse_declaration(toks, pos, st, aux, mode.executing(), scope, false)?;
            Ok(mode)
        }
        _ => {
            cembed_eval::eval_expr(toks, pos, st, mode.executing(), aux)?;
            expect_punct(toks, pos, Punct::Semicolon, "`;` to end an expression statement")?;
            Ok(mode)
        }
    }
}

fn exec_if(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux, mode: RunMode, scope: ScopeId) -> CResult<RunMode> {
    *pos += 1; // 'if'
    expect_punct(toks, pos, Punct::LParen, "`(` after `if`")?;
    let active = mode.executing();
    let taken = if active {
        let cond = cembed_eval::eval_expr(toks, pos, st, true, aux)?;
        expect_punct(toks, pos, Punct::RParen, "`)` to close an `if` condition")?;
        Some(decode(st, &cond)?.is_truthy())
    } else {
        cembed_eval::eval_expr(toks, pos, st, false, aux)?;
        expect_punct(toks, pos, Punct::RParen, "`)` to close an `if` condition")?;
        None
    };

    match taken {
        Some(true) => {
            let result = exec_stmt(toks, pos, st, aux, RunMode::Run, scope)?;
            if current_keyword(toks, *pos) == Some(Keyword::Else) {
                *pos += 1;
                exec_stmt(toks, pos, st, aux, RunMode::Skip, scope)?;
            }
            Ok(result)
        }
        Some(false) => {
            exec_stmt(toks, pos, st, aux, RunMode::Skip, scope)?;
            if current_keyword(toks, *pos) == Some(Keyword::Else) {
                *pos += 1;
                exec_stmt(toks, pos, st, aux, RunMode::Run, scope)
            } else {
                Ok(RunMode::Run)
            }
        }
        None => {
            let then_result = exec_stmt(toks, pos, st, aux, mode, scope)?;
            // `then_result != mode` means the label/case search inside
            // "then" resolved to *something* — `Run` (found it, kept
            // executing), `Break`/`Continue`/`Return`, or a different
            // `Goto` — any of which is authoritative and must not be
            // overwritten by "else". Only an unchanged `then_result ==
            // mode` means the search is still unresolved and "else" gets
            // a real chance to resolve it.
            if current_keyword(toks, *pos) == Some(Keyword::Else) {
                *pos += 1;
                let resolved = then_result != mode;
                let else_feed = if resolved { RunMode::Skip } else { mode };
                let else_result = exec_stmt(toks, pos, st, aux, else_feed, scope)?;
                if resolved {
                    Ok(then_result)
                } else {
                    Ok(else_result)
                }
            } else {
                Ok(then_result)
            }
        }
    }
}

fn exec_while(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux, mode: RunMode, scope: ScopeId) -> CResult<RunMode> {
    *pos += 1; // 'while'
    expect_punct(toks, pos, Punct::LParen, "`(` after `while`")?;
    let cond_start = *pos;

    if mode.executing() {
        loop {
            *pos = cond_start;
            let cond = cembed_eval::eval_expr(toks, pos, st, true, aux)?;
            expect_punct(toks, pos, Punct::RParen, "`)` to close a `while` condition")?;
            if !decode(st, &cond)?.is_truthy() {
                exec_stmt(toks, pos, st, aux, RunMode::Skip, scope)?;
                break;
            }
            match exec_stmt(toks, pos, st, aux, RunMode::Run, scope)? {
                RunMode::Break => break,
                m @ (RunMode::Return | RunMode::Goto(_)) => return Ok(m),
                _ => {}
            }
        }
        Ok(RunMode::Run)
    } else {
        cembed_eval::eval_expr(toks, pos, st, false, aux)?;
        expect_punct(toks, pos, Punct::RParen, "`)` to close a `while` condition")?;
        exec_stmt(toks, pos, st, aux, mode, scope)
    }
}

fn exec_do(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux, mode: RunMode, scope: ScopeId) -> CResult<RunMode> {
    *pos += 1; // 'do'
    let body_start = *pos;

    if mode.executing() {
        loop {
            *pos = body_start;
            match exec_stmt(toks, pos, st, aux, RunMode::Run, scope)? {
                RunMode::Break => {
                    skip_condition_tail(toks, pos, st, aux)?;
                    break;
                }
                m @ (RunMode::Return | RunMode::Goto(_)) => return Ok(m),
                _ => {}
            }
            expect_keyword(toks, pos, Keyword::While, "`while` to close a `do` loop")?;
            expect_punct(toks, pos, Punct::LParen, "`(` after `while`")?;
            let cond = cembed_eval::eval_expr(toks, pos, st, true, aux)?;
            expect_punct(toks, pos, Punct::RParen, "`)` to close a `do`/`while` condition")?;
            expect_punct(toks, pos, Punct::Semicolon, "`;` after a `do`/`while` condition")?;
            if !decode(st, &cond)?.is_truthy() {
                break;
            }
        }
        Ok(RunMode::Run)
    } else {
        let result = exec_stmt(toks, pos, st, aux, mode, scope)?;
        skip_condition_tail(toks, pos, st, aux)?;
        Ok(result)
    }
}

fn skip_condition_tail(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux) -> CResult<()> {
    expect_keyword(toks, pos, Keyword::While, "`while` to close a `do` loop")?;
    expect_punct(toks, pos, Punct::LParen, "`(` after `while`")?;
    cembed_eval::eval_expr(toks, pos, st, false, aux)?;
    expect_punct(toks, pos, Punct::RParen, "`)` to close a `do`/`while` condition")?;
    expect_punct(toks, pos, Punct::Semicolon, "`;` after a `do`/`while` condition")?;
    Ok(())
}

/// Scans forward from `i` (a token just inside one already-opened paren,
/// i.e. depth starts at 1) to the index of its matching `)`.
fn skip_to_matching_rparen(toks: &[Token], mut i: usize) -> usize {
    let mut depth = 1i32;
    loop {
        match toks[i].kind {
            TokenKind::Punct(Punct::LParen) => depth += 1,
            TokenKind::Punct(Punct::RParen) => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
}

/// Scans forward from `i` for a `;` at the same paren-nesting depth — used
/// to find a `for` loop's condition/step boundary without caring what is
/// inside any nested call's argument list.
fn find_semicolon(toks: &[Token], mut i: usize) -> usize {
    let mut depth = 0i32;
    loop {
        match toks[i].kind {
            TokenKind::Punct(Punct::LParen) => depth += 1,
            TokenKind::Punct(Punct::RParen) => depth -= 1,
            TokenKind::Punct(Punct::Semicolon) if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
}

fn exec_for(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux, mode: RunMode, scope: ScopeId) -> CResult<RunMode> {
    let _ = scope;
    *pos += 1; // 'for'
    expect_punct(toks, pos, Punct::LParen, "`(` after `for`")?;
    let header_start = *pos;
    let rparen_idx = skip_to_matching_rparen(toks, header_start);
    let body_start = rparen_idx + 1;

    let for_scope = st.fresh_scope_id();
    let mark = st.stack_checkpoint();

    // Init clause (declaration or expression-statement; consumes its `;`).
    if crate::decl::looks_like_declaration_start(toks, *pos, st) {
        crate::decl::parse_declaration(toks, pos, st, aux, mode.executing(), for_scope, false)?;
    } else if current_punct(toks, *pos) == Some(Punct::Semicolon) {
        *pos += 1;
    } else {
        cembed_eval::eval_expr(toks, pos, st, mode.executing(), aux)?;
        expect_punct(toks, pos, Punct::Semicolon, "`;` after a `for` initializer")?;
    }

    let cond_start = *pos;
    let cond_end = find_semicolon(toks, cond_start);
    let step_start = cond_end + 1;

    let result = if mode.executing() {
        loop {
            *pos = cond_start;
            let keep_going = if cond_start == cond_end {
                true
            } else {
                let cond = cembed_eval::eval_expr(toks, pos, st, true, aux)?;
                decode(st, &cond)?.is_truthy()
            };
            if !keep_going {
                *pos = body_start;
                exec_stmt(toks, pos, st, aux, RunMode::Skip, for_scope)?;
                break RunMode::Run;
            }
            *pos = body_start;
            match exec_stmt(toks, pos, st, aux, RunMode::Run, for_scope)? {
                RunMode::Break => break RunMode::Run,
                m @ (RunMode::Return | RunMode::Goto(_)) => break m,
                _ => {}
            }
            if step_start != rparen_idx {
                *pos = step_start;
                cembed_eval::eval_expr(toks, pos, st, true, aux)?;
            }
        }
    } else {
        *pos = cond_start;
        if cond_start != cond_end {
            cembed_eval::eval_expr(toks, pos, st, false, aux)?;
        }
        if step_start != rparen_idx {
            *pos = step_start;
            cembed_eval::eval_expr(toks, pos, st, false, aux)?;
        }
        *pos = body_start;
        exec_stmt(toks, pos, st, aux, mode, for_scope)?
    };

    st.exit_scope(for_scope);
    st.stack_rewind(mark);
    Ok(result)
}

fn exec_switch(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux, mode: RunMode, scope: ScopeId) -> CResult<RunMode> {
    *pos += 1; // 'switch'
    expect_punct(toks, pos, Punct::LParen, "`(` after `switch`")?;
    let key = if mode.executing() {
        let v = cembed_eval::eval_expr(toks, pos, st, true, aux)?;
        expect_punct(toks, pos, Punct::RParen, "`)` to close a `switch` expression")?;
        Some(decode(st, &v)?.as_i64())
    } else {
        cembed_eval::eval_expr(toks, pos, st, false, aux)?;
        expect_punct(toks, pos, Punct::RParen, "`)` to close a `switch` expression")?;
        None
    };
    let body_mode = match key {
        Some(k) => RunMode::CaseSearch(k),
        None => mode,
    };
    match exec_stmt(toks, pos, st, aux, body_mode, scope)? {
        RunMode::Break => Ok(RunMode::Run),
        // No `case`/`default` matched: falls through silently (spec §4.5).
        RunMode::CaseSearch(_) => Ok(RunMode::Run),
        other => Ok(other),
    }
}

fn exec_return(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux, mode: RunMode) -> CResult<RunMode> {
    let p = here(toks, *pos);
    *pos += 1; // 'return'
    if current_punct(toks, *pos) == Some(Punct::Semicolon) {
        *pos += 1;
        return Ok(if mode.executing() { RunMode::Return } else { mode });
    }
    let v = cembed_eval::eval_expr(toks, pos, st, mode.executing(), aux)?;
    expect_punct(toks, pos, Punct::Semicolon, "`;` after a `return` value")?;
    if mode.executing() {
        if let Some(slot) = st.frames.current().and_then(|f| f.return_slot) {
            cembed_eval::assign_forced(&slot, &v, st, true, p.line, p.col)?;
        }
        Ok(RunMode::Return)
    } else {
        Ok(mode)
    }
}
