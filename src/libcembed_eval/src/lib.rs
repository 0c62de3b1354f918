//! The expression evaluator (spec §4.4): recursive precedence climbing
//! driven by [`precedence::precedence_of`], rather than the source's single
//! explicit stack of operator/value nodes — recursion already gives each
//! nested sub-expression its own "stack frame", so there is no separate
//! collapse-the-stack step to hand-roll. Short-circuit `&&`/`||` and `?:`
//! fall out of a plain `executing: bool` flag threaded down into whichever
//! branch should not run, instead of the source's `ignore_precedence` guard.
//!
//! `executing` is this crate's whole view of the statement interpreter's
//! `RunMode` (§4.5): `cembed_interp` reduces `matches!(mode, Mode::Run)` to
//! a bool before calling in, so this crate never depends on that enum.
//! Per §4.4's "Mode interaction", when `executing` is false an expression
//! still parses in full (so the token stream advances correctly) but reads
//! and writes are skipped — result *types* are still computed for real
//! (needed for `sizeof` and for nested casts to stay correct), only the
//! decoded *values* are replaced with zero.

mod caller;
mod precedence;
mod typename;

pub use caller::Caller;
pub use precedence::{is_right_to_left, precedence_of, BRACKET_PRECEDENCE};
pub use typename::{looks_like_type_start, parse_type_name};

use cembed_lexer::{Keyword, Punct, Token, TokenKind};
use cembed_session::{CResult, Diagnostic, ErrorKind, State};
use cembed_types::{BaseTag, IntWidth, TypeHandle};
use cembed_value::{AnyValue, ScopeId, Value};

type LexPos = cembed_lexer::Pos;

fn sess_pos(p: LexPos) -> cembed_session::Pos {
    cembed_session::Pos { line: p.line, col: p.col }
}

fn parse_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Parse, sess_pos(pos), msg)
}

fn type_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Type, sess_pos(pos), msg)
}

fn runtime_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Runtime, sess_pos(pos), msg)
}

fn resource_err(pos: LexPos, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorKind::Resource, sess_pos(pos), msg)
}

fn here(toks: &[Token], pos: usize) -> LexPos {
    toks[pos].pos
}

fn current_punct(toks: &[Token], pos: usize) -> Option<Punct> {
    match toks[pos].kind {
        TokenKind::Punct(p) => Some(p),
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

/// Parses one assignment-level expression (no top-level comma — §4.4 "comma
/// is not a general operator here"; callers of a call/argument list or a
/// `for` clause split on `Punct::Comma` themselves).
pub fn eval_expr(toks: &[Token], pos: &mut usize, st: &mut State, executing: bool, caller: &mut dyn Caller) -> CResult<Value> {
    parse_expr(toks, pos, st, executing, caller, 2)
}

fn parse_expr(
    toks: &[Token],
    pos: &mut usize,
    st: &mut State,
    executing: bool,
    caller: &mut dyn Caller,
    min_prec: u32,
) -> CResult<Value> {
    let mut lhs = parse_unary(toks, pos, st, executing, caller)?;
    loop {
        let Some(punct) = current_punct(toks, *pos) else { break };
        if punct == Punct::Colon {
            break;
        }
        let prec = precedence_of(punct);
        if prec.infix == 0 || prec.infix < min_prec {
            break;
        }
        if punct == Punct::Question {
            lhs = parse_ternary_tail(toks, pos, st, executing, caller, lhs, prec.infix)?;
            continue;
        }
        let op_pos = here(toks, *pos);
        *pos += 1;
        let next_min = if is_right_to_left(prec.infix) { prec.infix } else { prec.infix + 1 };
        // `&&` suppresses the right side once the left is already false;
        // `||` suppresses it once the left is already true (§5 ordering).
        let rhs_executing = match punct {
            Punct::AndAnd => executing && lhs_is_truthy(st, &lhs, executing)?,
            Punct::OrOr => executing && !lhs_is_truthy(st, &lhs, executing)?,
            _ => executing,
        };
        let rhs = parse_expr(toks, pos, st, rhs_executing, caller, next_min)?;
        lhs = if is_assign_punct(punct) {
            apply_assignment(punct, lhs, rhs, st, executing, op_pos)?
        } else {
            apply_binary(punct, &lhs, &rhs, st, executing, op_pos)?
        };
    }
    Ok(lhs)
}

fn lhs_is_truthy(st: &State, v: &Value, executing: bool) -> CResult<bool> {
    if !executing {
        return Ok(false);
    }
    Ok(decode_value(st, v)?.is_truthy())
}

fn parse_ternary_tail(
    toks: &[Token],
    pos: &mut usize,
    st: &mut State,
    executing: bool,
    caller: &mut dyn Caller,
    cond: Value,
    level: u32,
) -> CResult<Value> {
    *pos += 1; // '?'
    let cond_true = executing && decode_value(st, &cond)?.is_truthy();
    let then_val = parse_expr(toks, pos, st, executing && cond_true, caller, 2)?;
    expect_punct(toks, pos, Punct::Colon, "`:` in conditional expression")?;
    let else_val = parse_expr(toks, pos, st, executing && !cond_true, caller, level)?;
    Ok(if cond_true { then_val } else { else_val })
}

fn is_assign_punct(p: Punct) -> bool {
    matches!(
        p,
        Punct::Assign
            | Punct::AddAssign
            | Punct::SubAssign
            | Punct::MulAssign
            | Punct::DivAssign
            | Punct::ModAssign
            | Punct::ShlAssign
            | Punct::ShrAssign
            | Punct::AndAssign
            | Punct::OrAssign
            | Punct::XorAssign
    )
}

fn compound_base_op(p: Punct) -> Option<Punct> {
    match p {
        Punct::AddAssign => Some(Punct::Plus),
        Punct::SubAssign => Some(Punct::Minus),
        Punct::MulAssign => Some(Punct::Star),
        Punct::DivAssign => Some(Punct::Slash),
        Punct::ModAssign => Some(Punct::Percent),
        Punct::ShlAssign => Some(Punct::Shl),
        Punct::ShrAssign => Some(Punct::Shr),
        Punct::AndAssign => Some(Punct::Amp),
        Punct::OrAssign => Some(Punct::Or),
        Punct::XorAssign => Some(Punct::Xor),
        _ => None,
    }
}

// ---------------------------------------------------------------------
// Unary / postfix
// ---------------------------------------------------------------------

fn parse_unary(toks: &[Token], pos: &mut usize, st: &mut State, executing: bool, caller: &mut dyn Caller) -> CResult<Value> {
    let op_pos = here(toks, *pos);
    match &toks[*pos].kind {
        TokenKind::Keyword(Keyword::Sizeof) => parse_sizeof(toks, pos, st, caller),
        TokenKind::Punct(Punct::LParen) => parse_paren(toks, pos, st, executing, caller),
        TokenKind::Punct(Punct::Amp) => {
            *pos += 1;
            let operand = parse_unary(toks, pos, st, executing, caller)?;
            if !executing {
                let ptr_ty = st.types.pointer_to(operand.ty);
                return placeholder(st, ptr_ty, op_pos);
            }
            if !operand.is_lvalue() {
                return Err(type_err(op_pos, "cannot take the address of a non-lvalue"));
            }
            let ptr_ty = st.types.pointer_to(operand.ty);
            push_value(st, ptr_ty, AnyValue::Pointer(operand.addr as u64), op_pos)
        }
        TokenKind::Punct(Punct::Star) => {
            *pos += 1;
            let operand = parse_unary(toks, pos, st, executing, caller)?;
            let pointee = st.types.node(operand.ty).parent;
            if !executing {
                return placeholder(st, pointee, op_pos);
            }
            let addr = decode_value(st, &operand)?.as_i64();
            if addr == 0 {
                return Err(runtime_err(op_pos, "null pointer dereference"));
            }
            Ok(Value::share(pointee, addr as usize, operand.addr, operand.scope_id, true))
        }
        TokenKind::Punct(Punct::Plus) => {
            *pos += 1;
            parse_unary(toks, pos, st, executing, caller)
        }
        TokenKind::Punct(Punct::Minus) => {
            *pos += 1;
            let operand = parse_unary(toks, pos, st, executing, caller)?;
            if !executing {
                return placeholder(st, operand.ty, op_pos);
            }
            let v = decode_value(st, &operand)?;
            let result = if v.is_floating() { AnyValue::Double(-v.as_f64()) } else { AnyValue::SInt64(-v.as_i64()) };
            let ty = if v.is_floating() { st.types.double() } else { st.types.int(true, IntWidth::W64) };
            push_value(st, ty, result, op_pos)
        }
        TokenKind::Punct(Punct::Not) => {
            *pos += 1;
            let operand = parse_unary(toks, pos, st, executing, caller)?;
            let truthy = executing && decode_value(st, &operand)?.is_truthy();
            push_value(st, st.types.int(true, IntWidth::W32), AnyValue::SInt32((!truthy) as i32), op_pos)
        }
        TokenKind::Punct(Punct::Tilde) => {
            *pos += 1;
            let operand = parse_unary(toks, pos, st, executing, caller)?;
            if !executing {
                return placeholder(st, operand.ty, op_pos);
            }
            let v = decode_value(st, &operand)?.as_i64();
            push_value(st, st.types.int(true, IntWidth::W64), AnyValue::SInt64(!v), op_pos)
        }
        TokenKind::Punct(Punct::Incr) | TokenKind::Punct(Punct::Decr) => {
            let decr = matches!(toks[*pos].kind, TokenKind::Punct(Punct::Decr));
            *pos += 1;
            let operand = parse_unary(toks, pos, st, executing, caller)?;
            step_in_place(operand, if decr { -1 } else { 1 }, st, executing, op_pos)
        }
        _ => parse_postfix(toks, pos, st, executing, caller),
    }
}

/// Shared by prefix and postfix `++`/`--`: writes `old ± delta` back into
/// the operand's storage (when `executing`) and returns the requested view
/// of the value. `want_old = true` is the postfix form (§5 ordering: "yields
/// the old value but writes back before the containing expression finishes
/// collapsing").
fn step_value(operand: Value, delta: i64, st: &mut State, executing: bool, pos: LexPos, want_old: bool) -> CResult<Value> {
    if !operand.is_lvalue() {
        return Err(type_err(pos, "`++`/`--` requires an lvalue"));
    }
    if !executing {
        return Ok(Value::rvalue(operand.ty, operand.addr, operand.scope_id));
    }
    let old = decode_value(st, &operand)?;
    let node_base = st.types.node(operand.ty).base;
    let new_value = match node_base {
        BaseTag::Pointer => {
            let elem = st.types.node(operand.ty).parent;
            let sz = st.types.node(elem).sizeof.max(1) as i64;
            AnyValue::Pointer((old.as_i64() + delta * sz) as u64)
        }
        BaseTag::Float => AnyValue::Float((old.as_f64() + delta as f64) as f32),
        BaseTag::Double => AnyValue::Double(old.as_f64() + delta as f64),
        _ => int_truncate(old.as_i64() + delta, int_kind_of(st, operand.ty)),
    };
    write_scalar(st, operand.addr, operand.ty, new_value);
    if want_old {
        push_value(st, operand.ty, old, pos)
    } else {
        push_value(st, operand.ty, new_value, pos)
    }
}

fn step_in_place(operand: Value, delta: i64, st: &mut State, executing: bool, pos: LexPos) -> CResult<Value> {
    step_value(operand, delta, st, executing, pos, false)
}

fn parse_postfix(toks: &[Token], pos: &mut usize, st: &mut State, executing: bool, caller: &mut dyn Caller) -> CResult<Value> {
    let mut v = parse_primary(toks, pos, st, executing, caller)?;
    loop {
        let op_pos = here(toks, *pos);
        match current_punct(toks, *pos) {
            Some(Punct::LBracket) => {
                *pos += 1;
                let idx = parse_expr(toks, pos, st, executing, caller, 2)?;
                expect_punct(toks, pos, Punct::RBracket, "`]`")?;
                v = apply_index(v, idx, st, executing, op_pos)?;
            }
            Some(Punct::Dot) => {
                *pos += 1;
                let name = expect_ident(toks, pos)?;
                v = apply_member(v, &name, st, false, executing, op_pos)?;
            }
            Some(Punct::Arrow) => {
                *pos += 1;
                let name = expect_ident(toks, pos)?;
                v = apply_member(v, &name, st, true, executing, op_pos)?;
            }
            Some(Punct::Incr) => {
                *pos += 1;
                v = step_value(v, 1, st, executing, op_pos, true)?;
            }
            Some(Punct::Decr) => {
                *pos += 1;
                v = step_value(v, -1, st, executing, op_pos, true)?;
            }
            _ => break,
        }
    }
    Ok(v)
}

fn expect_ident(toks: &[Token], pos: &mut usize) -> CResult<String> {
    match &toks[*pos].kind {
        TokenKind::Ident(name) => {
            let name = name.clone();
            *pos += 1;
            Ok(name)
        }
        _ => Err(parse_err(here(toks, *pos), "expected an identifier")),
    }
}

// ---------------------------------------------------------------------
// Primary: literals, identifiers, calls, grouping/casts, sizeof
// ---------------------------------------------------------------------

fn parse_primary(toks: &[Token], pos: &mut usize, st: &mut State, executing: bool, caller: &mut dyn Caller) -> CResult<Value> {
    let p = here(toks, *pos);
    match toks[*pos].kind.clone() {
        TokenKind::IntLit(n) => {
            *pos += 1;
            let ty = if (i32::MIN as i64..=i32::MAX as i64).contains(&n) {
                st.types.int(true, IntWidth::W32)
            } else {
                st.types.int(true, IntWidth::W64)
            };
            let av = if (i32::MIN as i64..=i32::MAX as i64).contains(&n) { AnyValue::SInt32(n as i32) } else { AnyValue::SInt64(n) };
            push_value(st, ty, av, p)
        }
        TokenKind::FloatLit(f) => {
            *pos += 1;
            push_value(st, st.types.double(), AnyValue::Double(f), p)
        }
        TokenKind::CharLit(c) => {
            *pos += 1;
            push_value(st, st.types.int(true, IntWidth::W8), AnyValue::SInt8(c as i8), p)
        }
        TokenKind::StrLit(bytes) => {
            *pos += 1;
            let char_ty = st.types.int(true, IntWidth::W8);
            let arr_ty = st.types.array_of(char_ty, Some(bytes.len() as u32 + 1));
            let addr = st.arena.stack_alloc(bytes.len() + 1).ok_or_else(|| resource_err(p, "stack exhausted"))?;
            let mut buf = bytes;
            buf.push(0);
            st.arena.write(addr, &buf);
            Ok(Value::rvalue(arr_ty, addr, ScopeId::GLOBAL))
        }
        TokenKind::Ident(name) => {
            *pos += 1;
            if current_punct(toks, *pos) == Some(Punct::LParen) {
                parse_call(toks, pos, st, executing, caller, &name, p)
            } else {
                parse_ident(st, &name, executing, p)
            }
        }
        _ => Err(parse_err(p, "expected an expression")),
    }
}

fn parse_ident(st: &mut State, name: &str, executing: bool, pos: LexPos) -> CResult<Value> {
    let sym = st.interner.intern_str(name);
    match st.lookup(sym).copied() {
        Some(v) => Ok(v),
        None if executing => Err(parse_err(pos, format!("`{}` is undeclared", name))),
        None => placeholder(st, st.types.int(true, IntWidth::W32), pos),
    }
}

fn parse_call(
    toks: &[Token],
    pos: &mut usize,
    st: &mut State,
    executing: bool,
    caller: &mut dyn Caller,
    name: &str,
    name_pos: LexPos,
) -> CResult<Value> {
    *pos += 1; // '('
    let mut args = Vec::new();
    if current_punct(toks, *pos) != Some(Punct::RParen) {
        loop {
            args.push(parse_expr(toks, pos, st, executing, caller, 2)?);
            if current_punct(toks, *pos) == Some(Punct::Comma) {
                *pos += 1;
                continue;
            }
            break;
        }
    }
    expect_punct(toks, pos, Punct::RParen, "`)` to close argument list")?;
    let sym = st.interner.intern_str(name);
    match st.lookup(sym).copied() {
        None if !executing => placeholder(st, st.types.int(true, IntWidth::W32), name_pos),
        None => Err(parse_err(name_pos, format!("`{}` is undeclared", name))),
        Some(callee) => {
            if matches!(st.types.node(callee.ty).base, BaseTag::Macro) {
                caller.call_macro(st, sym, args, executing)
            } else {
                caller.call_function(st, sym, args, executing)
            }
        }
    }
}

fn parse_sizeof(toks: &[Token], pos: &mut usize, st: &mut State, caller: &mut dyn Caller) -> CResult<Value> {
    let p = here(toks, *pos);
    *pos += 1; // 'sizeof'
    let ty = if current_punct(toks, *pos) == Some(Punct::LParen) && looks_like_type_start(toks, *pos + 1, st) {
        *pos += 1;
        let ty = parse_type_name(toks, pos, st)?.expect("looks_like_type_start already checked");
        expect_punct(toks, pos, Punct::RParen, "`)` to close a type-name")?;
        ty
    } else {
        // The operand of `sizeof` never runs (§8 "`sizeof` purity"): it is
        // parsed with `executing = false` regardless of the outer mode.
        parse_unary(toks, pos, st, false, caller)?.ty
    };
    let n = st.types.sizeof(ty).map_err(|e| type_err(p, e.to_string()))?;
    push_value(st, st.types.int(false, IntWidth::W64), AnyValue::UInt64(n as u64), p)
}

fn parse_paren(toks: &[Token], pos: &mut usize, st: &mut State, executing: bool, caller: &mut dyn Caller) -> CResult<Value> {
    let p = here(toks, *pos);
    if looks_like_type_start(toks, *pos + 1, st) {
        *pos += 1; // '('
        let ty = parse_type_name(toks, pos, st)?.expect("looks_like_type_start already checked");
        expect_punct(toks, pos, Punct::RParen, "`)` to close a cast")?;
        let operand = parse_unary(toks, pos, st, executing, caller)?;
        convert_cast(operand, ty, st, executing, p)
    } else {
        *pos += 1; // '('
        let v = parse_expr(toks, pos, st, executing, caller, 2)?;
        expect_punct(toks, pos, Punct::RParen, "`)`")?;
        Ok(v)
    }
}

fn convert_cast(operand: Value, dest: TypeHandle, st: &mut State, executing: bool, pos: LexPos) -> CResult<Value> {
    if !executing {
        return placeholder(st, dest, pos);
    }
    let dest_base = st.types.node(dest).base;
    let av = match dest_base {
        BaseTag::Pointer => {
            let bits = match st.types.node(operand.ty).base {
                BaseTag::Array => operand.addr as u64,
                BaseTag::Pointer => decode_value(st, &operand)?.as_i64() as u64,
                _ => decode_value(st, &operand)?.as_i64() as u64,
            };
            AnyValue::Pointer(bits)
        }
        BaseTag::Float => AnyValue::Float(decode_value(st, &operand)?.as_f64() as f32),
        BaseTag::Double => AnyValue::Double(decode_value(st, &operand)?.as_f64()),
        BaseTag::Int(k) => int_truncate(decode_value(st, &operand)?.as_i64(), k),
        BaseTag::Void => AnyValue::Void,
        _ => return Err(type_err(pos, "cast to an aggregate type is not supported")),
    };
    push_value(st, dest, av, pos)
}

// ---------------------------------------------------------------------
// Binary operators
// ---------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum NumCat {
    Float,
    Int,
    Pointer,
    Other,
}

fn category(st: &State, ty: TypeHandle) -> NumCat {
    match st.types.node(ty).base {
        BaseTag::Float | BaseTag::Double => NumCat::Float,
        BaseTag::Int(_) | BaseTag::Enum => NumCat::Int,
        BaseTag::Pointer | BaseTag::Array => NumCat::Pointer,
        _ => NumCat::Other,
    }
}

fn classify_binary(op: Punct, lty: TypeHandle, rty: TypeHandle, st: &mut State, pos: LexPos) -> CResult<TypeHandle> {
    use Punct::*;
    if matches!(op, Eq | Ne | Lt | Gt | Le | Ge | AndAnd | OrOr) {
        return Ok(st.types.int(true, IntWidth::W32));
    }
    let lc = category(st, lty);
    let rc = category(st, rty);
    match (op, lc, rc) {
        (Plus, NumCat::Pointer, NumCat::Int) => Ok(lty),
        (Plus, NumCat::Int, NumCat::Pointer) => Ok(rty),
        (Minus, NumCat::Pointer, NumCat::Int) => Ok(lty),
        (Minus, NumCat::Pointer, NumCat::Pointer) => Ok(st.types.int(true, IntWidth::W64)),
        _ if lc == NumCat::Float || rc == NumCat::Float => Ok(st.types.double()),
        (_, NumCat::Int, NumCat::Int) => Ok(st.types.int(true, IntWidth::W64)),
        _ => Err(type_err(pos, "operator applied to incompatible operand types")),
    }
}

fn apply_binary(op: Punct, lhs: &Value, rhs: &Value, st: &mut State, executing: bool, pos: LexPos) -> CResult<Value> {
    let result_ty = classify_binary(op, lhs.ty, rhs.ty, st, pos)?;
    if !executing {
        return placeholder(st, result_ty, pos);
    }
    let av = compute_binary(op, lhs, rhs, st, pos)?;
    push_value(st, result_ty, av, pos)
}

fn compute_binary(op: Punct, lhs: &Value, rhs: &Value, st: &mut State, pos: LexPos) -> CResult<AnyValue> {
    use Punct::*;
    if matches!(op, AndAnd | OrOr) {
        let l = decode_value(st, lhs)?.is_truthy();
        let r = decode_value(st, rhs)?.is_truthy();
        let b = if op == AndAnd { l && r } else { l || r };
        return Ok(AnyValue::SInt32(b as i32));
    }
    let lc = category(st, lhs.ty);
    let rc = category(st, rhs.ty);
    if lc == NumCat::Pointer || rc == NumCat::Pointer {
        return compute_pointer_binary(op, lhs, rhs, st, pos);
    }
    let is_cmp = matches!(op, Eq | Ne | Lt | Gt | Le | Ge);
    if lc == NumCat::Float || rc == NumCat::Float {
        let a = decode_value(st, lhs)?.as_f64();
        let b = decode_value(st, rhs)?.as_f64();
        if is_cmp {
            return Ok(AnyValue::SInt32(compare(op, a, b) as i32));
        }
        let r = match op {
            Plus => a + b,
            Minus => a - b,
            Star => a * b,
            Slash => {
                if b == 0.0 {
                    return Err(runtime_err(pos, "division by zero"));
                }
                a / b
            }
            _ => return Err(type_err(pos, "operator is not valid on floating operands")),
        };
        return Ok(AnyValue::Double(r));
    }
    let a = decode_value(st, lhs)?.as_i64();
    let b = decode_value(st, rhs)?.as_i64();
    if is_cmp {
        return Ok(AnyValue::SInt32(compare(op, a, b) as i32));
    }
    let r = match op {
        Plus => a.wrapping_add(b),
        Minus => a.wrapping_sub(b),
        Star => a.wrapping_mul(b),
        Slash => {
            if b == 0 {
                return Err(runtime_err(pos, "division by zero"));
            }
            a.wrapping_div(b)
        }
        Percent => {
            if b == 0 {
                return Err(runtime_err(pos, "division by zero"));
            }
            a.wrapping_rem(b)
        }
        Amp => a & b,
        Or => a | b,
        Xor => a ^ b,
        Shl => a.wrapping_shl(b as u32),
        Shr => a.wrapping_shr(b as u32),
        _ => return Err(type_err(pos, "unsupported operator")),
    };
    Ok(AnyValue::SInt64(r))
}

fn compare<T: PartialOrd>(op: Punct, a: T, b: T) -> bool {
    match op {
        Punct::Eq => a == b,
        Punct::Ne => a != b,
        Punct::Lt => a < b,
        Punct::Gt => a > b,
        Punct::Le => a <= b,
        Punct::Ge => a >= b,
        _ => unreachable!("compare called with a non-comparison operator"),
    }
}

fn pointer_bits(st: &State, v: &Value) -> CResult<i64> {
    match st.types.node(v.ty).base {
        BaseTag::Array => Ok(v.addr as i64),
        _ => Ok(decode_value(st, v)?.as_i64()),
    }
}

fn compute_pointer_binary(op: Punct, lhs: &Value, rhs: &Value, st: &mut State, pos: LexPos) -> CResult<AnyValue> {
    use Punct::*;
    let lc = category(st, lhs.ty);
    let rc = category(st, rhs.ty);
    match (op, lc, rc) {
        (Plus, NumCat::Pointer, NumCat::Int) => {
            let elem = st.types.node(lhs.ty).parent;
            let sz = st.types.node(elem).sizeof.max(1) as i64;
            let base = pointer_bits(st, lhs)?;
            let n = decode_value(st, rhs)?.as_i64();
            Ok(AnyValue::Pointer((base + n * sz) as u64))
        }
        (Plus, NumCat::Int, NumCat::Pointer) => {
            let elem = st.types.node(rhs.ty).parent;
            let sz = st.types.node(elem).sizeof.max(1) as i64;
            let base = pointer_bits(st, rhs)?;
            let n = decode_value(st, lhs)?.as_i64();
            Ok(AnyValue::Pointer((base + n * sz) as u64))
        }
        (Minus, NumCat::Pointer, NumCat::Int) => {
            let elem = st.types.node(lhs.ty).parent;
            let sz = st.types.node(elem).sizeof.max(1) as i64;
            let base = pointer_bits(st, lhs)?;
            let n = decode_value(st, rhs)?.as_i64();
            Ok(AnyValue::Pointer((base - n * sz) as u64))
        }
        (Minus, NumCat::Pointer, NumCat::Pointer) => {
            let elem = st.types.node(lhs.ty).parent;
            let sz = st.types.node(elem).sizeof.max(1) as i64;
            if sz == 0 {
                return Err(type_err(pos, "pointer difference of a zero-sized element type"));
            }
            let a = pointer_bits(st, lhs)?;
            let b = pointer_bits(st, rhs)?;
            Ok(AnyValue::SInt64((a - b) / sz))
        }
        (Eq, ..) | (Ne, ..) | (Lt, ..) | (Gt, ..) | (Le, ..) | (Ge, ..) => {
            let a = pointer_bits(st, lhs)?;
            let b = pointer_bits(st, rhs)?;
            Ok(AnyValue::SInt32(compare(op, a, b) as i32))
        }
        _ => Err(type_err(pos, "invalid operator between these operand types")),
    }
}

// ---------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------

fn apply_assignment(op: Punct, lhs: Value, rhs: Value, st: &mut State, executing: bool, pos: LexPos) -> CResult<Value> {
    if !executing {
        return Ok(lhs);
    }
    if !lhs.is_lvalue() {
        return Err(type_err(pos, "assignment to a non-lvalue"));
    }
    let to_store = match compound_base_op(op) {
        Some(base_op) => apply_binary(base_op, &lhs, &rhs, st, executing, pos)?,
        None => rhs,
    };
    store_into(st, &lhs, &to_store, false, pos)
}

/// Writes `src`'s value into `dest`'s storage, applying §4.4's "Assignment
/// rules" coercions, and returns `dest` (now holding the converted value —
/// §8 "Assignment return").
fn store_into(st: &mut State, dest: &Value, src: &Value, allow_pointer_coercion: bool, pos: LexPos) -> CResult<Value> {
    let dest_base = st.types.node(dest.ty).base;
    match dest_base {
        BaseTag::Pointer => {
            let dest_pointee = st.types.node(dest.ty).parent;
            let bits: u64 = match st.types.node(src.ty).base {
                BaseTag::Pointer => {
                    let src_pointee = st.types.node(src.ty).parent;
                    if src_pointee != dest_pointee && !allow_pointer_coercion {
                        return Err(type_err(pos, "assignment between incompatible pointer types"));
                    }
                    decode_value(st, src)?.as_i64() as u64
                }
                BaseTag::Array => src.addr as u64,
                BaseTag::Int(_) => {
                    let n = decode_value(st, src)?.as_i64();
                    if n == 0 {
                        0
                    } else if allow_pointer_coercion {
                        n as u64
                    } else {
                        return Err(type_err(pos, "pointer assigned a non-zero integer without a cast"));
                    }
                }
                _ => return Err(type_err(pos, "incompatible types in pointer assignment")),
            };
            write_scalar(st, dest.addr, dest.ty, AnyValue::Pointer(bits));
        }
        BaseTag::Int(k) => {
            let n = decode_value(st, src)?.as_i64();
            write_scalar(st, dest.addr, dest.ty, int_truncate(n, k));
        }
        BaseTag::Enum => {
            let n = decode_value(st, src)?.as_i64();
            write_scalar(st, dest.addr, dest.ty, AnyValue::SInt32(n as i32));
        }
        BaseTag::Float => write_scalar(st, dest.addr, dest.ty, AnyValue::Float(decode_value(st, src)?.as_f64() as f32)),
        BaseTag::Double => write_scalar(st, dest.addr, dest.ty, AnyValue::Double(decode_value(st, src)?.as_f64())),
        BaseTag::Struct | BaseTag::Union => {
            if src.ty != dest.ty {
                return Err(type_err(pos, "struct/union assignment requires identical types"));
            }
            let n = st.types.node(dest.ty).sizeof as usize;
            let bytes = st.arena.read(src.addr, n).to_vec();
            st.arena.write(dest.addr, &bytes);
        }
        BaseTag::Array => return Err(type_err(pos, "arrays are not assignable with `=`; use an initializer")),
        _ => return Err(type_err(pos, "value of this type cannot be assigned")),
    }
    Ok(*dest)
}

/// `force = true` bypasses the lvalue requirement — used by return-value
/// binding and argument binding, where the destination is a fresh parameter
/// slot rather than something the guest program wrote as an lvalue.
pub fn assign_forced(dest: &Value, src: &Value, st: &mut State, allow_pointer_coercion: bool, pos_line: u32, pos_col: u32) -> CResult<Value> {
    store_into(st, dest, src, allow_pointer_coercion, LexPos { line: pos_line, col: pos_col })
}

// ---------------------------------------------------------------------
// Index / member
// ---------------------------------------------------------------------

fn apply_index(base: Value, idx: Value, st: &mut State, executing: bool, pos: LexPos) -> CResult<Value> {
    let base_kind = st.types.node(base.ty).base;
    let elem_ty = st.types.node(base.ty).parent;
    if !matches!(base_kind, BaseTag::Array | BaseTag::Pointer) {
        return Err(type_err(pos, "subscript of a non-array, non-pointer value"));
    }
    if !executing {
        return placeholder(st, elem_ty, pos);
    }
    let elem_size = st.types.node(elem_ty).sizeof.max(1) as i64;
    let n = decode_value(st, &idx)?.as_i64();
    let (base_addr, via_addr) = match base_kind {
        BaseTag::Array => (base.addr as i64, base.addr),
        _ => {
            let p = decode_value(st, &base)?.as_i64();
            if p == 0 {
                return Err(runtime_err(pos, "null pointer dereference"));
            }
            (p, base.addr)
        }
    };
    let addr = (base_addr + n * elem_size) as usize;
    Ok(Value::share(elem_ty, addr, via_addr, base.scope_id, true))
}

fn apply_member(base: Value, field: &str, st: &mut State, via_arrow: bool, executing: bool, pos: LexPos) -> CResult<Value> {
    let sym = st.interner.intern_str(field);
    let base_val = if via_arrow {
        let pointee = st.types.node(base.ty).parent;
        if !executing {
            // Keep the pointee type for downstream `sizeof`/further member
            // lookups even though there is no real address to follow yet.
            Value::rvalue(pointee, base.addr, base.scope_id)
        } else {
            let addr = decode_value(st, &base)?.as_i64();
            if addr == 0 {
                return Err(runtime_err(pos, "null pointer dereference"));
            }
            Value::share(pointee, addr as usize, base.addr, base.scope_id, true)
        }
    } else {
        base
    };
    let member_ty = st.types.member(base_val.ty, sym).map(|m| (m.offset, m.ty)).map_err(|e| type_err(pos, e.to_string()))?;
    if !executing {
        return placeholder(st, member_ty.1, pos);
    }
    let addr = base_val.addr + member_ty.0 as usize;
    Ok(Value::share(member_ty.1, addr, base_val.addr, base_val.scope_id, true))
}

// ---------------------------------------------------------------------
// Shared value helpers
// ---------------------------------------------------------------------

fn int_kind_of(st: &State, ty: TypeHandle) -> cembed_types::IntKind {
    match st.types.node(ty).base {
        BaseTag::Int(k) => k,
        _ => cembed_types::IntKind { signed: true, width: IntWidth::W32 },
    }
}

fn int_truncate(n: i64, k: cembed_types::IntKind) -> AnyValue {
    match (k.signed, k.width) {
        (true, IntWidth::W8) => AnyValue::SInt8(n as i8),
        (true, IntWidth::W16) => AnyValue::SInt16(n as i16),
        (true, IntWidth::W32) => AnyValue::SInt32(n as i32),
        (true, IntWidth::W64) => AnyValue::SInt64(n),
        (false, IntWidth::W8) => AnyValue::UInt8(n as u8),
        (false, IntWidth::W16) => AnyValue::UInt16(n as u16),
        (false, IntWidth::W32) => AnyValue::UInt32(n as u32),
        (false, IntWidth::W64) => AnyValue::UInt64(n as u64),
    }
}

fn write_scalar(st: &mut State, addr: usize, ty: TypeHandle, av: AnyValue) {
    let n = (st.types.node(ty).sizeof as usize).max(1);
    let mut buf = vec![0u8; n];
    av.encode(&mut buf[..n.min(8)]);
    st.arena.write(addr, &buf);
}

fn decode_value(st: &State, v: &Value) -> CResult<AnyValue> {
    let node = st.types.node(v.ty);
    if matches!(node.base, BaseTag::Struct | BaseTag::Union | BaseTag::Array | BaseTag::Function | BaseTag::Macro | BaseTag::Uber) {
        return Err(Diagnostic::new(ErrorKind::Type, cembed_session::Pos::default(), "value is not a scalar".to_string()));
    }
    let n = node.sizeof as usize;
    let bytes = st.arena.read(v.addr, n);
    Ok(AnyValue::decode(bytes, node.base))
}

fn push_value(st: &mut State, ty: TypeHandle, av: AnyValue, pos: LexPos) -> CResult<Value> {
    let n = (st.types.node(ty).sizeof as usize).max(1);
    let addr = st.arena.stack_alloc(n).ok_or_else(|| resource_err(pos, "expression stack exhausted"))?;
    let mut buf = vec![0u8; n];
    av.encode(&mut buf[..n.min(8)]);
    st.arena.write(addr, &buf);
    Ok(Value::rvalue(ty, addr, ScopeId::GLOBAL))
}

fn zero_of(st: &State, ty: TypeHandle) -> AnyValue {
    match st.types.node(ty).base {
        BaseTag::Float => AnyValue::Float(0.0),
        BaseTag::Double => AnyValue::Double(0.0),
        BaseTag::Pointer => AnyValue::Pointer(0),
        BaseTag::Int(k) => int_truncate(0, k),
        BaseTag::Enum => AnyValue::SInt32(0),
        _ => AnyValue::Void,
    }
}

/// A non-executed result: correctly typed (needed so `sizeof` and further
/// arithmetic on an unevaluated sub-expression still see the right type),
/// but holding a harmless zero instead of a real computed value.
fn placeholder(st: &mut State, ty: TypeHandle, pos: LexPos) -> CResult<Value> {
    let av = zero_of(st, ty);
    push_value(st, ty, av, pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cembed_data_structures::Symbol;
    use cembed_lexer::tokenize;

    struct NoCalls;
    impl Caller for NoCalls {
        fn call_function(&mut self, _st: &mut State, _callee: Symbol, _args: Vec<Value>, _executing: bool) -> CResult<Value> {
            panic!("no calls expected in this test")
        }
        fn call_macro(&mut self, _st: &mut State, _callee: Symbol, _args: Vec<Value>, _executing: bool) -> CResult<Value> {
            panic!("no calls expected in this test")
        }
    }

    fn eval(src: &str, st: &mut State) -> Value {
        let mut toks = tokenize(src).unwrap();
        toks.retain(|t| !matches!(t.kind, TokenKind::EndOfLine));
        let mut pos = 0;
        let mut caller = NoCalls;
        eval_expr(&toks, &mut pos, st, true, &mut caller).unwrap()
    }

    fn as_i64(st: &State, v: &Value) -> i64 {
        decode_value(st, v).unwrap().as_i64()
    }

    #[test]
    fn arithmetic_precedence() {
        let mut st = State::new(4096);
        let v = eval("1 + 2 * 3", &mut st);
        assert_eq!(as_i64(&st, &v), 7);
    }

    #[test]
    fn ternary_picks_one_branch() {
        let mut st = State::new(4096);
        let v = eval("1 ? 10 : 20", &mut st);
        assert_eq!(as_i64(&st, &v), 10);
        let v2 = eval("0 ? 10 : 20", &mut st);
        assert_eq!(as_i64(&st, &v2), 20);
    }

    #[test]
    fn assignment_stores_and_returns_the_stored_value() {
        let mut st = State::new(4096);
        let i = st.types.int(true, IntWidth::W32);
        let sym = st.interner.intern_str("x");
        let addr = st.arena.stack_alloc(4).unwrap();
        st.declare(sym, Value::new_owned(i, addr, false, ScopeId::GLOBAL));
        let v = eval("x = 5 + 2", &mut st);
        assert_eq!(as_i64(&st, &v), 7);
        assert_eq!(as_i64(&st, &Value::new_owned(i, addr, false, ScopeId::GLOBAL)), 7);
    }

    #[test]
    fn short_circuit_and_suppresses_an_assignment() {
        let mut st = State::new(4096);
        let i = st.types.int(true, IntWidth::W32);
        let sym = st.interner.intern_str("x");
        let addr = st.arena.stack_alloc(4).unwrap();
        st.declare(sym, Value::new_owned(i, addr, false, ScopeId::GLOBAL));
        eval("0 && (x = 1)", &mut st);
        assert_eq!(as_i64(&st, &Value::new_owned(i, addr, false, ScopeId::GLOBAL)), 0);
    }

    #[test]
    fn sizeof_does_not_execute_its_operand() {
        let mut st = State::new(4096);
        let i = st.types.int(true, IntWidth::W32);
        let sym = st.interner.intern_str("x");
        let addr = st.arena.stack_alloc(4).unwrap();
        st.declare(sym, Value::new_owned(i, addr, false, ScopeId::GLOBAL));
        let v = eval("sizeof(x = 9)", &mut st);
        assert_eq!(as_i64(&st, &v), 4);
        assert_eq!(as_i64(&st, &Value::new_owned(i, addr, false, ScopeId::GLOBAL)), 0);
    }

    #[test]
    fn pointer_arithmetic_scales_by_pointee_size() {
        let mut st = State::new(4096);
        let base = st.arena.stack_alloc(40).unwrap();
        let i = st.types.int(true, IntWidth::W32);
        let p = st.types.pointer_to(i);
        let psym = st.interner.intern_str("p");
        let paddr = st.arena.stack_alloc(8).unwrap();
        st.declare(psym, Value::new_owned(p, paddr, false, ScopeId::GLOBAL));
        write_scalar(&mut st, paddr, p, AnyValue::Pointer(base as u64));
        let v = eval("p + 3", &mut st);
        assert_eq!(decode_value(&st, &v).unwrap().as_i64() as usize, base + 12);
    }
}
