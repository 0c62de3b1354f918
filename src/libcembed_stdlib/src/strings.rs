//! `string.h` pack (spec SPEC_FULL "string.h pack", grounded in
//! `original_source/Lib.c`'s mini-stdlib section) — bound straight onto
//! the arena-backed byte storage the evaluator already produces for
//! arrays and string literals, via `cembed_interp::pointer_address`.

use cembed_interp::{decode_value, pointer_address, Aux, Interp};
use cembed_session::CResult;
use cembed_session::State;
use cembed_types::IntWidth;
use cembed_value::{AnyValue, Value};

use crate::helpers::{arg_cstr, arg_ptr};

pub fn setup(interp: &mut Interp) {
    let int_ty = interp.state.types.int(true, IntWidth::W32);
    let char_ty = interp.state.types.int(true, IntWidth::W8);
    let char_ptr = interp.state.types.pointer_to(char_ty);
    let void_ty = interp.state.types.void();
    let void_ptr = interp.state.types.pointer_to(void_ty);

    interp.register_intrinsic("strlen", int_ty, vec![("s", char_ptr)], false, strlen);
    interp.register_intrinsic("strcpy", char_ptr, vec![("dst", char_ptr), ("src", char_ptr)], false, strcpy);
    interp.register_intrinsic("strncpy", char_ptr, vec![("dst", char_ptr), ("src", char_ptr), ("n", int_ty)], false, strncpy);
    interp.register_intrinsic("strcmp", int_ty, vec![("a", char_ptr), ("b", char_ptr)], false, strcmp);
    interp.register_intrinsic("strncmp", int_ty, vec![("a", char_ptr), ("b", char_ptr), ("n", int_ty)], false, strncmp);
    interp.register_intrinsic("strcat", char_ptr, vec![("dst", char_ptr), ("src", char_ptr)], false, strcat);
    interp.register_intrinsic("strchr", char_ptr, vec![("s", char_ptr), ("c", int_ty)], false, strchr);
    interp.register_intrinsic("strrchr", char_ptr, vec![("s", char_ptr), ("c", int_ty)], false, strrchr);
    interp.register_intrinsic("strstr", char_ptr, vec![("hay", char_ptr), ("needle", char_ptr)], false, strstr);
    interp.register_intrinsic("memcpy", void_ptr, vec![("dst", void_ptr), ("src", void_ptr), ("n", int_ty)], false, memcpy);
    interp.register_intrinsic("memmove", void_ptr, vec![("dst", void_ptr), ("src", void_ptr), ("n", int_ty)], false, memmove);
    interp.register_intrinsic("memset", void_ptr, vec![("dst", void_ptr), ("c", int_ty), ("n", int_ty)], false, memset);
    interp.register_intrinsic("memcmp", int_ty, vec![("a", void_ptr), ("b", void_ptr), ("n", int_ty)], false, memcmp);
}

fn strlen(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let bytes = arg_cstr(st, &args[0])?;
    Ok(AnyValue::SInt32(bytes.len() as i32))
}

fn strcpy(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let dst = arg_ptr(st, &args[0])?;
    let mut bytes = arg_cstr(st, &args[1])?;
    bytes.push(0);
    st.arena.write(dst, &bytes);
    Ok(AnyValue::Pointer(dst as u64))
}

fn strncpy(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let dst = arg_ptr(st, &args[0])?;
    let src = arg_cstr(st, &args[1])?;
    let n = decode_value(st, &args[2])?.as_i64() as usize;
    let mut bytes = src;
    bytes.truncate(n);
    bytes.resize(n, 0);
    st.arena.write(dst, &bytes);
    Ok(AnyValue::Pointer(dst as u64))
}

fn strcmp(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let a = arg_cstr(st, &args[0])?;
    let b = arg_cstr(st, &args[1])?;
    Ok(AnyValue::SInt32(lexicographic_cmp(&a, &b)))
}

fn strncmp(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let mut a = arg_cstr(st, &args[0])?;
    let mut b = arg_cstr(st, &args[1])?;
    let n = decode_value(st, &args[2])?.as_i64() as usize;
    a.truncate(n);
    b.truncate(n);
    Ok(AnyValue::SInt32(lexicographic_cmp(&a, &b)))
}

fn lexicographic_cmp(a: &[u8], b: &[u8]) -> i32 {
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x as i32 - y as i32;
        }
    }
    0
}

fn strcat(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let dst = arg_ptr(st, &args[0])?;
    let dst_len = arg_cstr(st, &args[0])?.len();
    let mut src = arg_cstr(st, &args[1])?;
    src.push(0);
    st.arena.write(dst + dst_len, &src);
    Ok(AnyValue::Pointer(dst as u64))
}

fn strchr(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let base = arg_ptr(st, &args[0])?;
    let bytes = arg_cstr(st, &args[0])?;
    let c = decode_value(st, &args[1])?.as_i64() as u8;
    match bytes.iter().position(|&b| b == c) {
        Some(i) => Ok(AnyValue::Pointer((base + i) as u64)),
        None if c == 0 => Ok(AnyValue::Pointer((base + bytes.len()) as u64)),
        None => Ok(AnyValue::Pointer(0)),
    }
}

fn strrchr(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let base = arg_ptr(st, &args[0])?;
    let bytes = arg_cstr(st, &args[0])?;
    let c = decode_value(st, &args[1])?.as_i64() as u8;
    match bytes.iter().rposition(|&b| b == c) {
        Some(i) => Ok(AnyValue::Pointer((base + i) as u64)),
        None if c == 0 => Ok(AnyValue::Pointer((base + bytes.len()) as u64)),
        None => Ok(AnyValue::Pointer(0)),
    }
}

fn strstr(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let base = arg_ptr(st, &args[0])?;
    let hay = arg_cstr(st, &args[0])?;
    let needle = arg_cstr(st, &args[1])?;
    if needle.is_empty() {
        return Ok(AnyValue::Pointer(base as u64));
    }
    for start in 0..hay.len() {
        if hay[start..].starts_with(&needle[..]) {
            return Ok(AnyValue::Pointer((base + start) as u64));
        }
    }
    Ok(AnyValue::Pointer(0))
}

fn memcpy(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let dst = pointer_address(st, &args[0])? as usize;
    let src = pointer_address(st, &args[1])? as usize;
    let n = decode_value(st, &args[2])?.as_i64() as usize;
    let bytes = st.arena.read(src, n).to_vec();
    st.arena.write(dst, &bytes);
    Ok(AnyValue::Pointer(dst as u64))
}

fn memmove(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    memcpy(st, _aux, args)
}

fn memset(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let dst = pointer_address(st, &args[0])? as usize;
    let c = decode_value(st, &args[1])?.as_i64() as u8;
    let n = decode_value(st, &args[2])?.as_i64() as usize;
    let bytes = vec![c; n];
    st.arena.write(dst, &bytes);
    Ok(AnyValue::Pointer(dst as u64))
}

fn memcmp(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let a_addr = pointer_address(st, &args[0])? as usize;
    let b_addr = pointer_address(st, &args[1])? as usize;
    let n = decode_value(st, &args[2])?.as_i64() as usize;
    let a = st.arena.read(a_addr, n).to_vec();
    let b = st.arena.read(b_addr, n).to_vec();
    Ok(AnyValue::SInt32(lexicographic_cmp(&a, &b)))
}
