//! `stdio.h` pack (spec SPEC_FULL "stdio.h pack", grounded in
//! `original_source/Lib/stdio.c`'s `StdioSetupFunc` registration list).
//!
//! `printf`/`puts`/`putchar` write into `Aux::stdout` — the interpreter's
//! captured output stream (`Interp::stdout`/`take_stdout`) — rather than a
//! real OS file descriptor, so embedders can redirect or inspect output
//! without the guest program knowing the difference; the `cembed` binary
//! flushes that buffer to the real process stdout after `CallMain`
//! returns. `fopen`'d files are real host files, tracked in a small
//! process-global handle table since an `Intrinsic` is a plain `fn`
//! pointer with nowhere else to stash non-`Copy` state.
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use cembed_interp::{pointer_address, Aux, Interp};
use cembed_session::{CResult, State};
use cembed_types::IntWidth;
use cembed_value::{AnyValue, Value};

use crate::helpers::{arg_cstr, arg_ptr, define_int_constant, write_bytes};

const STDIN_HANDLE: i64 = 0;
const STDOUT_HANDLE: i64 = 1;
const STDERR_HANDLE: i64 = 2;

static NEXT_HANDLE: AtomicI64 = AtomicI64::new(3);
static OPEN_FILES: Mutex<Option<HashMap<i64, File>>> = Mutex::new(None);

fn with_files<R>(f: impl FnOnce(&mut HashMap<i64, File>) -> R) -> R {
    let mut guard = OPEN_FILES.lock().unwrap();
    if guard.is_none() {
        *guard = Some(HashMap::new());
    }
    f(guard.as_mut().unwrap())
}

pub fn setup(interp: &mut Interp) {
    let int_ty = interp.state.types.int(true, IntWidth::W32);
    let char_ty = interp.state.types.int(true, IntWidth::W8);
    let char_ptr = interp.state.types.pointer_to(char_ty);
    let void_ty = interp.state.types.void();
    let void_ptr = interp.state.types.pointer_to(void_ty);

    interp.register_intrinsic("printf", int_ty, vec![("fmt", char_ptr)], true, printf);
    interp.register_intrinsic("sprintf", int_ty, vec![("dst", char_ptr), ("fmt", char_ptr)], true, sprintf);
    interp.register_intrinsic("fprintf", int_ty, vec![("stream", void_ptr), ("fmt", char_ptr)], true, fprintf);
    interp.register_intrinsic("puts", int_ty, vec![("s", char_ptr)], false, puts);
    interp.register_intrinsic("putchar", int_ty, vec![("c", int_ty)], false, putchar);
    interp.register_intrinsic("getchar", int_ty, vec![], false, getchar);
    interp.register_intrinsic("fopen", void_ptr, vec![("path", char_ptr), ("mode", char_ptr)], false, fopen);
    interp.register_intrinsic("fclose", int_ty, vec![("stream", void_ptr)], false, fclose);
    interp.register_intrinsic("fgetc", int_ty, vec![("stream", void_ptr)], false, fgetc);
    interp.register_intrinsic("fputc", int_ty, vec![("c", int_ty), ("stream", void_ptr)], false, fputc);
    interp.register_intrinsic(
        "fread",
        int_ty,
        vec![("ptr", void_ptr), ("size", int_ty), ("nmemb", int_ty), ("stream", void_ptr)],
        false,
        fread,
    );
    interp.register_intrinsic(
        "fwrite",
        int_ty,
        vec![("ptr", void_ptr), ("size", int_ty), ("nmemb", int_ty), ("stream", void_ptr)],
        false,
        fwrite,
    );

    define_int_constant(interp, "EOF", -1);
    define_int_constant(interp, "SEEK_SET", 0);
    define_int_constant(interp, "SEEK_CUR", 1);
    define_int_constant(interp, "SEEK_END", 2);
    define_int_constant(interp, "BUFSIZ", 1024);
    define_int_constant(interp, "NULL", 0);
    define_int_constant(interp, "stdin", STDIN_HANDLE);
    define_int_constant(interp, "stdout", STDOUT_HANDLE);
    define_int_constant(interp, "stderr", STDERR_HANDLE);
}

fn printf(st: &mut State, aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let fmt = arg_cstr(st, &args[0])?;
    let out = crate::format::format_c(st, &fmt, &args[1..])?;
    let n = out.len() as i32;
    aux.stdout.extend(out);
    Ok(AnyValue::SInt32(n))
}

fn sprintf(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let dst_addr = arg_ptr(st, &args[0])?;
    let fmt = arg_cstr(st, &args[1])?;
    let out = crate::format::format_c(st, &fmt, &args[2..])?;
    let n = out.len() as i32;
    let mut bytes = out;
    bytes.push(0);
    write_bytes(st, dst_addr, &bytes);
    Ok(AnyValue::SInt32(n))
}

fn fprintf(st: &mut State, aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let handle = pointer_address(st, &args[0])?;
    let fmt = arg_cstr(st, &args[1])?;
    let out = crate::format::format_c(st, &fmt, &args[2..])?;
    let n = out.len() as i32;
    write_to_stream(aux, handle, &out);
    Ok(AnyValue::SInt32(n))
}

fn write_to_stream(aux: &mut Aux, handle: i64, bytes: &[u8]) {
    match handle {
        STDOUT_HANDLE => aux.stdout.extend_from_slice(bytes),
        STDERR_HANDLE => {
            let _ = std::io::stderr().write_all(bytes);
        }
        _ => {
            with_files(|files| {
                if let Some(f) = files.get_mut(&handle) {
                    let _ = f.write_all(bytes);
                }
            });
        }
    }
}

fn puts(st: &mut State, aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let mut bytes = arg_cstr(st, &args[0])?;
    let n = bytes.len() as i32 + 1;
    bytes.push(b'\n');
    aux.stdout.extend(bytes);
    Ok(AnyValue::SInt32(n))
}

fn putchar(_st: &mut State, aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let c = cembed_interp::decode_value(_st, &args[0])?.as_i64() as u8;
    aux.stdout.push(c);
    Ok(AnyValue::SInt32(c as i32))
}

fn getchar(_st: &mut State, _aux: &mut Aux, _args: &[Value]) -> CResult<AnyValue> {
    let mut buf = [0u8; 1];
    match std::io::stdin().read(&mut buf) {
        Ok(0) => Ok(AnyValue::SInt32(-1)),
        Ok(_) => Ok(AnyValue::SInt32(buf[0] as i32)),
        Err(_) => Ok(AnyValue::SInt32(-1)),
    }
}

fn fopen(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let path = String::from_utf8_lossy(&arg_cstr(st, &args[0])?).into_owned();
    let mode = String::from_utf8_lossy(&arg_cstr(st, &args[1])?).into_owned();
    let opened = if mode.contains('w') {
        File::create(&path)
    } else if mode.contains('a') {
        std::fs::OpenOptions::new().create(true).append(true).open(&path)
    } else {
        File::open(&path)
    };
    match opened {
        Ok(f) => {
            let handle = NEXT_HANDLE.fetch_add(1, Ordering::SeqCst);
            with_files(|files| files.insert(handle, f));
            Ok(AnyValue::Pointer(handle as u64))
        }
        Err(_) => Ok(AnyValue::Pointer(0)),
    }
}

fn fclose(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let handle = pointer_address(st, &args[0])?;
    let existed = with_files(|files| files.remove(&handle).is_some());
    Ok(AnyValue::SInt32(if existed { 0 } else { -1 }))
}

fn fgetc(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let handle = pointer_address(st, &args[0])?;
    if handle == STDIN_HANDLE {
        return getchar(st, _aux, &[]);
    }
    let byte = with_files(|files| {
        files.get_mut(&handle).and_then(|f| {
            let mut buf = [0u8; 1];
            match f.read(&mut buf) {
                Ok(1) => Some(buf[0]),
                _ => None,
            }
        })
    });
    Ok(AnyValue::SInt32(byte.map(|b| b as i32).unwrap_or(-1)))
}

fn fputc(st: &mut State, aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let c = cembed_interp::decode_value(st, &args[0])?.as_i64() as u8;
    let handle = pointer_address(st, &args[1])?;
    write_to_stream(aux, handle, &[c]);
    Ok(AnyValue::SInt32(c as i32))
}

fn fread(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let dst = arg_ptr(st, &args[0])?;
    let size = cembed_interp::decode_value(st, &args[1])?.as_i64() as usize;
    let nmemb = cembed_interp::decode_value(st, &args[2])?.as_i64() as usize;
    let handle = pointer_address(st, &args[3])?;
    let total = size * nmemb;
    let mut buf = vec![0u8; total];
    let read_n = with_files(|files| files.get_mut(&handle).and_then(|f| f.read(&mut buf).ok()).unwrap_or(0));
    write_bytes(st, dst, &buf[..read_n]);
    Ok(AnyValue::SInt32((read_n / size.max(1)) as i32))
}

fn fwrite(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let src = arg_ptr(st, &args[0])?;
    let size = cembed_interp::decode_value(st, &args[1])?.as_i64() as usize;
    let nmemb = cembed_interp::decode_value(st, &args[2])?.as_i64() as usize;
    let handle = pointer_address(st, &args[3])?;
    let total = size * nmemb;
    let bytes = read_cstr_fixed(st, src, total);
    let wrote = with_files(|files| files.get_mut(&handle).map(|f| f.write_all(&bytes).is_ok()).unwrap_or(false));
    Ok(AnyValue::SInt32(if wrote { nmemb as i32 } else { 0 }))
}

fn read_cstr_fixed(st: &State, addr: usize, n: usize) -> Vec<u8> {
    st.arena.read(addr, n).to_vec()
}
