//! `stdlib.h` subset (spec SPEC_FULL "stdlib.h subset") — `malloc`/`free`/
//! `realloc`/`calloc` bind directly onto `Arena::heap_alloc`/`heap_free`
//! (spec §4.1), giving guest code the same heap the interpreter's own
//! aggregates live in, matching `original_source/Lib.c`'s registration of
//! these as thin wrappers over its own memory pool.

use std::sync::atomic::{AtomicU64, Ordering};

use cembed_interp::{decode_value, pointer_address, Aux, Interp};
use cembed_session::{CResult, State};
use cembed_types::IntWidth;
use cembed_value::{AnyValue, Value};

use crate::helpers::arg_cstr;

static RNG_STATE: AtomicU64 = AtomicU64::new(1);

pub fn setup(interp: &mut Interp) {
    let int_ty = interp.state.types.int(true, IntWidth::W32);
    let long_ty = interp.state.types.int(true, IntWidth::W64);
    let double_ty = interp.state.types.double();
    let char_ty = interp.state.types.int(true, IntWidth::W8);
    let char_ptr = interp.state.types.pointer_to(char_ty);
    let void_ty = interp.state.types.void();
    let void_ptr = interp.state.types.pointer_to(void_ty);

    interp.register_intrinsic("atoi", int_ty, vec![("s", char_ptr)], false, atoi);
    interp.register_intrinsic("atol", long_ty, vec![("s", char_ptr)], false, atol);
    interp.register_intrinsic("atof", double_ty, vec![("s", char_ptr)], false, atof);
    interp.register_intrinsic("strtol", long_ty, vec![("s", char_ptr), ("end", char_ptr), ("base", int_ty)], false, strtol);
    interp.register_intrinsic("strtod", double_ty, vec![("s", char_ptr), ("end", char_ptr)], false, strtod);
    interp.register_intrinsic("abs", int_ty, vec![("n", int_ty)], false, abs_fn);
    interp.register_intrinsic("labs", long_ty, vec![("n", long_ty)], false, labs_fn);
    interp.register_intrinsic("rand", int_ty, vec![], false, rand_fn);
    interp.register_intrinsic("srand", void_ty, vec![("seed", int_ty)], false, srand_fn);
    interp.register_intrinsic("exit", void_ty, vec![("code", int_ty)], false, exit_fn);
    interp.register_intrinsic("malloc", void_ptr, vec![("n", int_ty)], false, malloc);
    interp.register_intrinsic("free", void_ty, vec![("p", void_ptr)], false, free);
    interp.register_intrinsic("calloc", void_ptr, vec![("nmemb", int_ty), ("size", int_ty)], false, calloc);
    interp.register_intrinsic("realloc", void_ptr, vec![("p", void_ptr), ("n", int_ty)], false, realloc);
}

fn parse_leading_int(bytes: &[u8]) -> i64 {
    let s = String::from_utf8_lossy(bytes);
    let trimmed = s.trim_start();
    let mut end = 0usize;
    let chars: Vec<char> = trimmed.chars().collect();
    if end < chars.len() && (chars[end] == '+' || chars[end] == '-') {
        end += 1;
    }
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    trimmed[..end].parse::<i64>().unwrap_or(0)
}

fn parse_leading_float(bytes: &[u8]) -> f64 {
    let s = String::from_utf8_lossy(bytes);
    let trimmed = s.trim_start();
    let mut end = 0usize;
    let chars: Vec<char> = trimmed.chars().collect();
    if end < chars.len() && (chars[end] == '+' || chars[end] == '-') {
        end += 1;
    }
    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
        end += 1;
    }
    trimmed[..end].parse::<f64>().unwrap_or(0.0)
}

fn atoi(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    Ok(AnyValue::SInt32(parse_leading_int(&arg_cstr(st, &args[0])?) as i32))
}

fn atol(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    Ok(AnyValue::SInt64(parse_leading_int(&arg_cstr(st, &args[0])?)))
}

fn atof(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    Ok(AnyValue::Double(parse_leading_float(&arg_cstr(st, &args[0])?)))
}

fn strtol(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let bytes = arg_cstr(st, &args[0])?;
    let base = decode_value(st, &args[2])?.as_i64();
    let s = String::from_utf8_lossy(&bytes);
    let trimmed = s.trim();
    let radix = if base == 0 { 10u32 } else { base as u32 };
    let n = i64::from_str_radix(trimmed.trim_start_matches('+'), radix).unwrap_or_else(|_| parse_leading_int(&bytes));
    Ok(AnyValue::SInt64(n))
}

fn strtod(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    Ok(AnyValue::Double(parse_leading_float(&arg_cstr(st, &args[0])?)))
}

fn abs_fn(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let n = decode_value(st, &args[0])?.as_i64();
    Ok(AnyValue::SInt32(n.unsigned_abs() as i32 * n.signum().unsigned_abs() as i32))
}

fn labs_fn(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let n = decode_value(st, &args[0])?.as_i64();
    Ok(AnyValue::SInt64(n.abs()))
}

/// A minimal xorshift PRNG (spec's Non-goals don't require matching libc's
/// own algorithm, only `rand()`/`srand()`'s contract of "seeded, repeatable
/// sequence").
fn rand_fn(_st: &mut State, _aux: &mut Aux, _args: &[Value]) -> CResult<AnyValue> {
    let mut x = RNG_STATE.load(Ordering::Relaxed);
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    RNG_STATE.store(x, Ordering::Relaxed);
    Ok(AnyValue::SInt32((x & 0x7fff_ffff) as i32))
}

fn srand_fn(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let seed = decode_value(st, &args[0])?.as_i64() as u64;
    RNG_STATE.store(seed.max(1), Ordering::Relaxed);
    Ok(AnyValue::Void)
}

fn exit_fn(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let code = decode_value(st, &args[0])?.as_i64() as i32;
    std::process::exit(code);
}

fn malloc(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let n = decode_value(st, &args[0])?.as_i64().max(0) as usize;
    match st.arena.heap_alloc(n) {
        Some(addr) => Ok(AnyValue::Pointer(addr as u64)),
        None => Ok(AnyValue::Pointer(0)),
    }
}

fn free(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let addr = pointer_address(st, &args[0])? as usize;
    if addr != 0 {
        st.arena.heap_free(addr);
    }
    Ok(AnyValue::Void)
}

fn calloc(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let nmemb = decode_value(st, &args[0])?.as_i64().max(0) as usize;
    let size = decode_value(st, &args[1])?.as_i64().max(0) as usize;
    let n = nmemb * size;
    match st.arena.heap_alloc(n) {
        Some(addr) => {
            st.arena.write(addr, &vec![0u8; n]);
            Ok(AnyValue::Pointer(addr as u64))
        }
        None => Ok(AnyValue::Pointer(0)),
    }
}

/// Copies into fresh storage rather than growing in place — this arena has
/// no in-place heap resize (spec §4.1 only names `heap_alloc`/`heap_free`).
fn realloc(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let old_addr = pointer_address(st, &args[0])? as usize;
    let n = decode_value(st, &args[1])?.as_i64().max(0) as usize;
    match st.arena.heap_alloc(n) {
        Some(new_addr) => {
            if old_addr != 0 {
                let old_bytes = st.arena.read(old_addr, n).to_vec();
                st.arena.write(new_addr, &old_bytes);
                st.arena.heap_free(old_addr);
            }
            Ok(AnyValue::Pointer(new_addr as u64))
        }
        None => Ok(AnyValue::Pointer(0)),
    }
}
