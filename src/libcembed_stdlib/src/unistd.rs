//! `unistd.h` subset (spec SPEC_FULL "unistd.h subset": `getpid`, `sleep`,
//! `isatty`) — implemented against plain `std` rather than `libc`, since no
//! repo in the retrieval pack grounds a `libc` dependency.

use std::io::IsTerminal;
use std::thread;
use std::time::Duration;

use cembed_interp::{decode_value, Aux, Interp};
use cembed_session::{CResult, State};
use cembed_types::IntWidth;
use cembed_value::{AnyValue, Value};

pub fn setup(interp: &mut Interp) {
    let int_ty = interp.state.types.int(true, IntWidth::W32);

    interp.register_intrinsic("getpid", int_ty, vec![], false, getpid);
    interp.register_intrinsic("sleep", int_ty, vec![("secs", int_ty)], false, sleep);
    interp.register_intrinsic("isatty", int_ty, vec![("fd", int_ty)], false, isatty);
}

fn getpid(_st: &mut State, _aux: &mut Aux, _args: &[Value]) -> CResult<AnyValue> {
    Ok(AnyValue::SInt32(std::process::id() as i32))
}

fn sleep(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let secs = decode_value(st, &args[0])?.as_i64().max(0) as u64;
    thread::sleep(Duration::from_secs(secs));
    Ok(AnyValue::SInt32(0))
}

fn isatty(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let fd = decode_value(st, &args[0])?.as_i64();
    let tty = match fd {
        0 => std::io::stdin().is_terminal(),
        1 => std::io::stdout().is_terminal(),
        2 => std::io::stderr().is_terminal(),
        _ => false,
    };
    Ok(AnyValue::SInt32(if tty { 1 } else { 0 }))
}
