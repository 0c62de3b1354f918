//! Declaration parsing (spec §4.5 "Declarations"): variables, arrays,
//! `typedef`, `static`, enums, structs/unions, and function
//! prototypes/definitions — the grammar `cembed_eval::typename` deliberately
//! does not cover, since a cast/`sizeof` type-name never needs per-declarator
//! pointer-star placement or an inline aggregate body.

use cembed_data_structures::Symbol;
use cembed_lexer::{Keyword, Punct, Token, TokenKind};
use cembed_session::{CResult, State};
use cembed_types::{BaseTag, IntWidth, TypeHandle};
use cembed_value::{AnyValue, ScopeId, Value};

use crate::err::{parse_err, resource_err, type_err};
use crate::registry::{Aux, FunctionDef};

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

fn expect_punct(toks: &[Token], pos: &mut usize, want: Punct, what: &str) -> CResult<()> {
    if current_punct(toks, *pos) == Some(want) {
        *pos += 1;
        Ok(())
    } else {
        Err(parse_err(here(toks, *pos), format!("expected {}", what)))
    }
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

/// True if `toks[pos]` could open a declaration — used by the statement
/// interpreter to tell "declaration" from "expression statement" the same
/// way `cembed_eval::looks_like_type_start` already does for casts/`sizeof`,
/// extended with the storage-class keywords a statement (but never a cast)
/// can start with.
pub fn looks_like_declaration_start(toks: &[Token], pos: usize, st: &State) -> bool {
    match &toks[pos].kind {
        TokenKind::Keyword(Keyword::Static) | TokenKind::Keyword(Keyword::Typedef) => true,
        _ => cembed_eval::looks_like_type_start(toks, pos, st),
    }
}

/// Parses one `;`-terminated declaration (a `typedef`, or one or more
/// comma-separated variable/function declarators sharing a base type) at
/// `at_file_scope` (top level) or inside a function body.
pub fn parse_declaration(
    toks: &[Token],
    pos: &mut usize,
    st: &mut State,
    aux: &mut Aux,
    executing: bool,
    scope: ScopeId,
    at_file_scope: bool,
) -> CResult<()> {
    let is_static = if current_punct_is_keyword(toks, *pos, Keyword::Static) {
        *pos += 1;
        true
    } else {
        false
    };
    if current_punct_is_keyword(toks, *pos, Keyword::Typedef) {
        *pos += 1;
        return parse_typedef(toks, pos, st);
    }

    let base = parse_base_type_only(toks, pos, st)?;

    loop {
        let (name, ty) = parse_declarator(toks, pos, st, base)?;
        let sym = st.interner.intern_str(&name);

        if current_punct(toks, *pos) == Some(Punct::LParen) {
            parse_function_declarator(toks, pos, st, aux, sym, ty, at_file_scope)?;
        } else {
            let (final_ty, dims_done) = parse_array_suffixes(toks, pos, st, ty)?;
            let _ = dims_done;
            let init = if current_punct(toks, *pos) == Some(Punct::Assign) {
                *pos += 1;
                Some(parse_initializer(toks, pos, st, aux, final_ty, executing)?)
            } else {
                None
            };
            if is_static {
                declare_static_var(st, sym, &name, final_ty, init, scope, at_file_scope, here(toks, *pos))?;
            } else {
                declare_plain_var(st, sym, final_ty, init, scope, here(toks, *pos))?;
            }
        }

        if current_punct(toks, *pos) == Some(Punct::Comma) {
            *pos += 1;
            continue;
        }
        break;
    }
    expect_punct(toks, pos, Punct::Semicolon, "`;` to end a declaration")?;
    Ok(())
}

fn current_punct_is_keyword(toks: &[Token], pos: usize, kw: Keyword) -> bool {
    matches!(toks[pos].kind, TokenKind::Keyword(k) if k == kw)
}

/// Duplicates `cembed_eval::typename`'s private base-type grammar (combo
/// int keywords, `struct`/`union`/`enum` tag, typedef name) rather than
/// reusing `parse_type_name`, which bundles in pointer-star consumption —
/// wrong here, where `*` must attach per-declarator (`int *a, b;`). Also
/// extends that grammar with an inline aggregate body, which a cast or
/// `sizeof` type-name never needs.
fn parse_base_type_only(toks: &[Token], pos: &mut usize, st: &mut State) -> CResult<TypeHandle> {
    while current_punct_is_keyword(toks, *pos, Keyword::Const) || current_punct_is_keyword(toks, *pos, Keyword::Volatile) {
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
        TokenKind::Keyword(Keyword::Struct) | TokenKind::Keyword(Keyword::Union) => parse_struct_or_union(toks, pos, st),
        TokenKind::Keyword(Keyword::Enum) => {
            let mut scratch = Aux::new();
            parse_enum(toks, pos, st, &mut scratch)
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
            let value = st.lookup(sym).copied().ok_or_else(|| parse_err(here(toks, *pos), format!("`{}` is not a type", name)))?;
            if value.ty != st.types.type_of_types_handle() {
                return Err(parse_err(here(toks, *pos), format!("`{}` is not a type", name)));
            }
            let bytes = st.arena.read(value.addr, 8).to_vec();
            *pos += 1;
            match AnyValue::decode(&bytes, BaseTag::TypeOfTypes) {
                AnyValue::TypeValue(h) => Ok(h),
                _ => unreachable!("typedef binding always decodes to a TypeValue"),
            }
        }
        _ => Err(parse_err(here(toks, *pos), "expected a type")),
    }
}

fn parse_int_combo(toks: &[Token], pos: &mut usize, st: &mut State) -> TypeHandle {
    let mut signed: Option<bool> = None;
    let mut saw_char = false;
    let mut long_count = 0u32;
    let mut saw_short = false;
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
                *pos += 1;
            }
            _ => break,
        }
    }
    let width = if saw_char {
        IntWidth::W8
    } else if saw_short {
        IntWidth::W16
    } else if long_count > 0 {
        IntWidth::W64
    } else {
        IntWidth::W32
    };
    st.types.int(signed.unwrap_or(true), width)
}

fn parse_struct_or_union(toks: &[Token], pos: &mut usize, st: &mut State) -> CResult<TypeHandle> {
    let is_union = current_punct_is_keyword(toks, *pos, Keyword::Union);
    *pos += 1;
    let tag = if let TokenKind::Ident(name) = &toks[*pos].kind {
        let name = name.clone();
        *pos += 1;
        st.interner.intern_str(&name)
    } else {
        // An anonymous aggregate still needs a tag to canonicalize on;
        // mint one from the declaration site so it never collides.
        st.interner.intern_str(&format!("$anon@{}:{}", here(toks, *pos).line, here(toks, *pos).col))
    };
    let h = st.types.struct_or_union_tag(tag, is_union);
    if current_punct(toks, *pos) == Some(Punct::LBrace) {
        *pos += 1;
        let mut members = Vec::new();
        while current_punct(toks, *pos) != Some(Punct::RBrace) {
            let member_base = parse_base_type_only(toks, pos, st)?;
            loop {
                let (name, ty) = parse_declarator(toks, pos, st, member_base)?;
                let (ty, _) = parse_array_suffixes(toks, pos, st, ty)?;
                members.push((st.interner.intern_str(&name), ty));
                if current_punct(toks, *pos) == Some(Punct::Comma) {
                    *pos += 1;
                    continue;
                }
                break;
            }
            expect_punct(toks, pos, Punct::Semicolon, "`;` to end a member declaration")?;
        }
        *pos += 1; // '}'
        st.types.define_members(h, members).map_err(|e| type_err(here(toks, *pos), e.to_string()))?;
    }
    Ok(h)
}

fn parse_enum(toks: &[Token], pos: &mut usize, st: &mut State, aux: &mut Aux) -> CResult<TypeHandle> {
    *pos += 1; // 'enum'
    let tag = if let TokenKind::Ident(name) = &toks[*pos].kind {
        let name = name.clone();
        *pos += 1;
        st.interner.intern_str(&name)
    } else {
        st.interner.intern_str(&format!("$anon_enum@{}:{}", here(toks, *pos).line, here(toks, *pos).col))
    };
    let h = st.types.enum_tag(tag);
    if current_punct(toks, *pos) == Some(Punct::LBrace) {
        *pos += 1;
        let int_ty = st.types.int(true, IntWidth::W32);
        let mut next = 0i64;
        loop {
            if current_punct(toks, *pos) == Some(Punct::RBrace) {
                break;
            }
            let name = expect_ident(toks, pos)?;
            let sym = st.interner.intern_str(&name);
            if current_punct(toks, *pos) == Some(Punct::Assign) {
                *pos += 1;
                // Enum initializers are constant expressions — always
                // evaluated for real regardless of the outer `RunMode`.
                // Evaluated against a scratch `Aux` (no registered
                // functions/macros), so only literal/arithmetic/`sizeof`
                // constant expressions are actually reachable here.
                let v = cembed_eval::eval_expr(toks, pos, st, true, aux)?;
                next = decode_scalar(st, &v)?.as_i64();
            }
            let addr = st.arena.stack_alloc(4).ok_or_else(|| resource_err(here(toks, *pos), "stack exhausted"))?;
            write_i64(st, addr, int_ty, next);
            st.declare(sym, Value::rvalue(int_ty, addr, ScopeId::GLOBAL));
            next += 1;
            if current_punct(toks, *pos) == Some(Punct::Comma) {
                *pos += 1;
                continue;
            }
            break;
        }
        expect_punct(toks, pos, Punct::RBrace, "`}` to close an enum body")?;
    }
    Ok(h)
}

/// Consumes a declarator's leading `*`s and its name. Array dimensions and
/// function-parameter lists are handled by the caller, since those differ
/// between a top-level/member declarator and a `sizeof`/cast type-name.
fn parse_declarator(toks: &[Token], pos: &mut usize, st: &mut State, base: TypeHandle) -> CResult<(String, TypeHandle)> {
    let mut ty = base;
    while current_punct(toks, *pos) == Some(Punct::Star) {
        *pos += 1;
        ty = st.types.pointer_to(ty);
    }
    let name = expect_ident(toks, pos)?;
    Ok((name, ty))
}

/// Consumes zero or more `[n]`/`[]` suffixes, building the array type
/// innermost-first (`int a[2][3]` is "array of 2 of array of 3 of int").
fn parse_array_suffixes(toks: &[Token], pos: &mut usize, st: &mut State, base: TypeHandle) -> CResult<(TypeHandle, bool)> {
    let mut dims = Vec::new();
    let mut any = false;
    while current_punct(toks, *pos) == Some(Punct::LBracket) {
        any = true;
        *pos += 1;
        let dim = if current_punct(toks, *pos) == Some(Punct::RBracket) {
            None
        } else {
            match toks[*pos].kind {
                TokenKind::IntLit(n) => {
                    *pos += 1;
                    Some(n as u32)
                }
                _ => return Err(parse_err(here(toks, *pos), "expected a constant array length")),
            }
        };
        expect_punct(toks, pos, Punct::RBracket, "`]`")?;
        dims.push(dim);
    }
    let mut ty = base;
    for dim in dims.into_iter().rev() {
        ty = st.types.array_of(ty, dim);
    }
    Ok((ty, any))
}

fn parse_param_list(toks: &[Token], pos: &mut usize, st: &mut State) -> CResult<(Vec<(Symbol, TypeHandle)>, bool)> {
    expect_punct(toks, pos, Punct::LParen, "`(` to start a parameter list")?;
    let mut params = Vec::new();
    let mut variadic = false;
    if current_punct_is_keyword(toks, *pos, Keyword::Void) && current_punct(toks, *pos + 1) == Some(Punct::RParen) {
        *pos += 1;
    } else if current_punct(toks, *pos) != Some(Punct::RParen) {
        loop {
            if current_punct(toks, *pos) == Some(Punct::Ellipsis) {
                *pos += 1;
                variadic = true;
                break;
            }
            let base = parse_base_type_only(toks, pos, st)?;
            let (name, elem_ty) = parse_declarator(toks, pos, st, base)?;
            // A trailing `[]`/`[n]` on a parameter decays straight to a
            // pointer to the element type (spec §3.3 "array parameters
            // decay"); never an array-typed binding, so the dimensions
            // themselves are parsed and discarded.
            let ty = if current_punct(toks, *pos) == Some(Punct::LBracket) {
                let _ = parse_array_suffixes(toks, pos, st, elem_ty)?;
                st.types.pointer_to(elem_ty)
            } else {
                elem_ty
            };
            params.push((st.interner.intern_str(&name), ty));
            if current_punct(toks, *pos) == Some(Punct::Comma) {
                *pos += 1;
                continue;
            }
            break;
        }
    }
    expect_punct(toks, pos, Punct::RParen, "`)` to close a parameter list")?;
    Ok((params, variadic))
}

fn parse_function_declarator(
    toks: &[Token],
    pos: &mut usize,
    st: &mut State,
    aux: &mut Aux,
    sym: Symbol,
    ret: TypeHandle,
    at_file_scope: bool,
) -> CResult<()> {
    let (params, variadic) = parse_param_list(toks, pos, st)?;
    let param_tys: Vec<TypeHandle> = params.iter().map(|(_, t)| *t).collect();
    let fn_ty = st.types.function(ret, param_tys, variadic);

    if current_punct(toks, *pos) == Some(Punct::LBrace) {
        if !at_file_scope {
            return Err(parse_err(here(toks, *pos), "nested function definitions are not supported"));
        }
        let body_start = *pos;
        let body_end = skip_balanced_braces(toks, pos)?;
        let body = toks[body_start..body_end].to_vec();
        let entry = aux.functions.entry(sym).or_insert_with(|| FunctionDef {
            ret,
            params: params.clone(),
            variadic,
            body: None,
            intrinsic: None,
            declared_at: cembed_session::Pos { line: here(toks, body_start).line, col: here(toks, body_start).col },
        });
        entry.ret = ret;
        entry.params = params;
        entry.variadic = variadic;
        entry.body = Some(body);
        st.declare(sym, Value::rvalue(fn_ty, 0, ScopeId::GLOBAL));
    } else {
        expect_punct(toks, pos, Punct::Semicolon, "`;` to end a function prototype")?;
        aux.functions.entry(sym).or_insert_with(|| FunctionDef {
            ret,
            params,
            variadic,
            body: None,
            intrinsic: None,
            declared_at: cembed_session::Pos::default(),
        });
        st.declare(sym, Value::rvalue(fn_ty, 0, ScopeId::GLOBAL));
    }
    Ok(())
}

/// Scans forward from a `{` at `*pos`, consuming matching braces, and
/// returns the index just past the closing `}` (advancing `*pos` there).
fn skip_balanced_braces(toks: &[Token], pos: &mut usize) -> CResult<usize> {
    let start = *pos;
    let mut depth = 0i32;
    loop {
        match current_punct(toks, *pos) {
            Some(Punct::LBrace) => depth += 1,
            Some(Punct::RBrace) => {
                depth -= 1;
                if depth == 0 {
                    *pos += 1;
                    return Ok(*pos);
                }
            }
            None if matches!(toks[*pos].kind, TokenKind::Eof) => {
                return Err(parse_err(here(toks, start), "unterminated function body"));
            }
            _ => {}
        }
        *pos += 1;
    }
}

pub enum Initializer {
    Scalar(Value),
    Bytes(Vec<u8>, u32),
}

fn parse_initializer(
    toks: &[Token],
    pos: &mut usize,
    st: &mut State,
    aux: &mut Aux,
    declared_ty: TypeHandle,
    executing: bool,
) -> CResult<Initializer> {
    if current_punct(toks, *pos) == Some(Punct::LBrace) {
        *pos += 1;
        let elem_ty = st.types.node(declared_ty).parent;
        let mut elems = Vec::new();
        while current_punct(toks, *pos) != Some(Punct::RBrace) {
            let v = cembed_eval::eval_expr(toks, pos, st, executing, aux)?;
            elems.push(v);
            if current_punct(toks, *pos) == Some(Punct::Comma) {
                *pos += 1;
                continue;
            }
            break;
        }
        expect_punct(toks, pos, Punct::RBrace, "`}` to close an initializer list")?;
        let mut bytes = Vec::new();
        for v in &elems {
            bytes.extend(encode_converted(st, elem_ty, v)?);
        }
        Ok(Initializer::Bytes(bytes, elems.len() as u32))
    } else if let TokenKind::StrLit(s) = &toks[*pos].kind {
        let mut bytes = s.clone();
        *pos += 1;
        bytes.push(0);
        let n = bytes.len() as u32;
        Ok(Initializer::Bytes(bytes, n))
    } else {
        let v = cembed_eval::eval_expr(toks, pos, st, executing, aux)?;
        Ok(Initializer::Scalar(v))
    }
}

/// Mirrors the int-truncate/float-cast coercions `cembed_eval::store_into`
/// already applies for plain assignment, duplicated here since that helper
/// isn't exposed as `pub` — an initializer is conceptually "assign once,
/// into fresh storage" (spec §4.5 "Variable initializer").
fn encode_converted(st: &mut State, dest_ty: TypeHandle, src: &Value) -> CResult<Vec<u8>> {
    let n = st.types.node(dest_ty).sizeof.max(1) as usize;
    let av = convert_for_store(st, dest_ty, src)?;
    let mut buf = vec![0u8; n];
    av.encode(&mut buf[..n.min(8)]);
    Ok(buf)
}

fn convert_for_store(st: &State, dest_ty: TypeHandle, src: &Value) -> CResult<AnyValue> {
    let scalar = decode_scalar(st, src)?;
    Ok(match st.types.node(dest_ty).base {
        BaseTag::Float => AnyValue::Float(scalar.as_f64() as f32),
        BaseTag::Double => AnyValue::Double(scalar.as_f64()),
        BaseTag::Pointer => {
            let bits = if matches!(st.types.node(src.ty).base, BaseTag::Array) { src.addr as i64 } else { scalar.as_i64() };
            AnyValue::Pointer(bits as u64)
        }
        BaseTag::Int(k) => int_truncate(scalar.as_i64(), k),
        BaseTag::Enum => AnyValue::SInt32(scalar.as_i64() as i32),
        _ => scalar,
    })
}

fn decode_scalar(st: &State, v: &Value) -> CResult<AnyValue> {
    let node = st.types.node(v.ty);
    if matches!(node.base, BaseTag::Array) {
        return Ok(AnyValue::Pointer(v.addr as u64));
    }
    let n = node.sizeof as usize;
    Ok(AnyValue::decode(st.arena.read(v.addr, n), node.base))
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

fn write_i64(st: &mut State, addr: usize, ty: TypeHandle, n: i64) {
    let size = st.types.node(ty).sizeof.max(1) as usize;
    let mut buf = vec![0u8; size];
    AnyValue::SInt32(n as i32).encode(&mut buf[..size.min(8)]);
    st.arena.write(addr, &buf);
}

fn declare_plain_var(
    st: &mut State,
    sym: Symbol,
    ty: TypeHandle,
    init: Option<Initializer>,
    scope: ScopeId,
    pos: LexPos,
) -> CResult<()> {
    match init {
        Some(Initializer::Bytes(bytes, count)) => {
            let ty = if st.types.is_unsized_array(ty) { st.types.resize_array(ty, count) } else { ty };
            let n = st.types.sizeof(ty).map_err(|e| type_err(pos, e.to_string()))?;
            let addr = st.arena.stack_alloc(n as usize).ok_or_else(|| resource_err(pos, "stack exhausted"))?;
            let mut buf = bytes;
            buf.resize(n as usize, 0);
            st.arena.write(addr, &buf);
            declare_or_err(st, sym, Value::new_owned(ty, addr, true, scope), pos)
        }
        Some(Initializer::Scalar(v)) => {
            let n = st.types.sizeof(ty).map_err(|e| type_err(pos, e.to_string()))?;
            let addr = st.arena.stack_alloc(n as usize).ok_or_else(|| resource_err(pos, "stack exhausted"))?;
            let converted = encode_converted(st, ty, &v)?;
            st.arena.write(addr, &converted);
            declare_or_err(st, sym, Value::new_owned(ty, addr, true, scope), pos)
        }
        None => {
            let n = st.types.sizeof(ty).unwrap_or(0).max(0);
            let addr = st.arena.stack_alloc(n as usize).ok_or_else(|| resource_err(pos, "stack exhausted"))?;
            declare_or_err(st, sym, Value::new_owned(ty, addr, true, scope), pos)
        }
    }
}

fn declare_or_err(st: &mut State, sym: Symbol, v: Value, pos: LexPos) -> CResult<()> {
    if st.declare(sym, v) {
        Ok(())
    } else {
        Err(parse_err(pos, "redeclaration of a name already visible in this scope"))
    }
}

/// At file scope, `static` only affects linkage (irrelevant to a
/// single-translation-unit interpreter), so it behaves exactly like a plain
/// declaration. At block scope, the storage must persist across repeated
/// calls to the enclosing function: the mangled name `{function}.{var}`
/// is looked up in `st.globals` first, and only initialized once.
fn declare_static_var(
    st: &mut State,
    sym: Symbol,
    name: &str,
    ty: TypeHandle,
    init: Option<Initializer>,
    scope: ScopeId,
    at_file_scope: bool,
    pos: LexPos,
) -> CResult<()> {
    if at_file_scope {
        return declare_plain_var(st, sym, ty, init, scope, pos);
    }
    let function_name = st.frames.current().map(|f| f.function_name.clone()).unwrap_or_default();
    let mangled = st.interner.intern_str(&format!("{}.{}", function_name, name));

    if let Some(existing) = st.globals.get(&mangled).copied() {
        // Already initialized by a prior call: re-running the initializer
        // would defeat `static`'s whole point, so just alias the existing
        // storage under the unmangled local name and move on.
        st.declare(sym, existing);
        return Ok(());
    }

    // Heap-allocated, not stack-allocated: a block-scope `static`'s storage
    // must survive `call_function`'s `st.rewind(cp)` (stmt.rs) on every
    // call after the first, which the rewindable stack region does not.
    let (addr, final_ty) = match init {
        Some(Initializer::Bytes(bytes, count)) => {
            let final_ty = if st.types.is_unsized_array(ty) { st.types.resize_array(ty, count) } else { ty };
            let n = st.types.sizeof(final_ty).map_err(|e| type_err(pos, e.to_string()))?;
            let addr = st.arena.heap_alloc(n as usize).ok_or_else(|| resource_err(pos, "heap exhausted"))?;
            let mut buf = bytes;
            buf.resize(n as usize, 0);
            st.arena.write(addr, &buf);
            (addr, final_ty)
        }
        Some(Initializer::Scalar(v)) => {
            let n = st.types.sizeof(ty).map_err(|e| type_err(pos, e.to_string()))?;
            let addr = st.arena.heap_alloc(n as usize).ok_or_else(|| resource_err(pos, "heap exhausted"))?;
            let converted = encode_converted(st, ty, &v)?;
            st.arena.write(addr, &converted);
            (addr, ty)
        }
        None => {
            let n = st.types.sizeof(ty).unwrap_or(0);
            let addr = st.arena.heap_alloc(n as usize).ok_or_else(|| resource_err(pos, "heap exhausted"))?;
            (addr, ty)
        }
    };
    let v = Value::new_owned(final_ty, addr, true, ScopeId::GLOBAL);
    st.declare_static(mangled, v);
    st.declare(sym, v);
    Ok(())
}

fn parse_typedef(toks: &[Token], pos: &mut usize, st: &mut State) -> CResult<()> {
    let base = parse_base_type_only(toks, pos, st)?;
    let (name, mut ty) = parse_declarator(toks, pos, st, base)?;
    let (final_ty, _) = parse_array_suffixes(toks, pos, st, ty)?;
    ty = final_ty;
    expect_punct(toks, pos, Punct::Semicolon, "`;` to end a typedef")?;
    let sym = st.interner.intern_str(&name);
    let tot = st.types.type_of_types_handle();
    let addr = st.arena.stack_alloc(8).ok_or_else(|| resource_err(here(toks, *pos), "stack exhausted"))?;
    let mut buf = [0u8; 8];
    AnyValue::TypeValue(ty).encode(&mut buf);
    st.arena.write(addr, &buf);
    st.declare(sym, Value::rvalue(tot, addr, ScopeId::GLOBAL));
    Ok(())
}
